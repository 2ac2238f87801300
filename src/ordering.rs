use crate::recurrence::Slot;
use std::collections::HashMap;

/// Subject label used for counting when a slot has no subject.
pub const UNASSIGNED_SUBJECT: &str = "미정";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LessonOrderKey {
    pub grade: i64,
    pub class_number: i64,
    pub period: i64,
    pub subject: String,
}

impl LessonOrderKey {
    pub fn for_slot(slot: &Slot) -> Self {
        Self {
            grade: slot.grade,
            class_number: slot.class_number,
            period: slot.period,
            subject: slot
                .subject
                .clone()
                .unwrap_or_else(|| UNASSIGNED_SUBJECT.to_string()),
        }
    }
}

/// Hands out 1-based, gap-free sequence numbers per key.
#[derive(Debug, Default)]
pub struct LessonOrderCounter {
    next: HashMap<LessonOrderKey, i64>,
}

impl LessonOrderCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current value for `key` and advances it.
    pub fn take(&mut self, key: LessonOrderKey) -> i64 {
        let slot = self.next.entry(key).or_insert(1);
        let n = *slot;
        *slot += 1;
        n
    }
}
