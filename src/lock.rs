use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};

/// Per-timetable mutual exclusion for regeneration. Runs on different
/// timetables never wait on each other.
#[derive(Debug, Default)]
pub struct TimetableLocks {
    held: Mutex<HashSet<i64>>,
    released: Condvar,
}

#[derive(Debug)]
pub struct TimetableGuard<'a> {
    locks: &'a TimetableLocks,
    timetable_id: i64,
}

impl TimetableLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until no other guard for `timetable_id` is alive.
    pub fn acquire(&self, timetable_id: i64) -> TimetableGuard<'_> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while held.contains(&timetable_id) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(timetable_id);
        TimetableGuard {
            locks: self,
            timetable_id,
        }
    }
}

impl Drop for TimetableGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.timetable_id);
        drop(held);
        self.locks.released.notify_all();
    }
}
