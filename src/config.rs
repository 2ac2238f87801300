use crate::db;
use rusqlite::Connection;
use serde_json::{json, Map, Value as JsonValue};

pub const LOG_ENV: &str = "PROGRESSD_LOG";
pub const DEFAULT_LOG_FILTER: &str = "info";

pub const GENERATION_SETTINGS_KEY: &str = "setup.generation";
pub const DEFAULT_MAX_RANGE_DAYS: i64 = 1000;
const MAX_RANGE_DAYS_LIMIT: i64 = 3660;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationSettings {
    /// Upper bound on the number of calendar days one run may walk.
    pub max_range_days: i64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_range_days: DEFAULT_MAX_RANGE_DAYS,
        }
    }
}

impl GenerationSettings {
    pub fn to_json(&self) -> JsonValue {
        json!({ "maxRangeDays": self.max_range_days })
    }

    /// Applies a partial update; unknown keys are rejected so typos surface.
    pub fn apply_patch(&self, patch: &Map<String, JsonValue>) -> Result<Self, String> {
        let mut next = self.clone();
        for (k, v) in patch {
            match k.as_str() {
                "maxRangeDays" => {
                    let n = v
                        .as_i64()
                        .ok_or_else(|| "maxRangeDays must be an integer".to_string())?;
                    if !(1..=MAX_RANGE_DAYS_LIMIT).contains(&n) {
                        return Err(format!(
                            "maxRangeDays must be in 1..={}",
                            MAX_RANGE_DAYS_LIMIT
                        ));
                    }
                    next.max_range_days = n;
                }
                other => return Err(format!("unknown setting: {}", other)),
            }
        }
        Ok(next)
    }
}

/// Stored values that fail validation fall back to defaults field by field.
pub fn load_generation_settings(conn: &Connection) -> GenerationSettings {
    let obj = db::settings_get_json(conn, GENERATION_SETTINGS_KEY)
        .ok()
        .flatten()
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default();
    let max_range_days = obj
        .get("maxRangeDays")
        .and_then(|v| v.as_i64())
        .filter(|v| (1..=MAX_RANGE_DAYS_LIMIT).contains(v))
        .unwrap_or(DEFAULT_MAX_RANGE_DAYS);
    GenerationSettings { max_range_days }
}

pub fn save_generation_settings(conn: &Connection, settings: &GenerationSettings) -> anyhow::Result<()> {
    db::settings_set_json(conn, GENERATION_SETTINGS_KEY, &settings.to_json())
}

pub fn log_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        conn
    }

    #[test]
    fn defaults_when_unset_or_garbage() {
        let conn = conn();
        assert_eq!(load_generation_settings(&conn), GenerationSettings::default());

        db::settings_set_json(&conn, GENERATION_SETTINGS_KEY, &json!({ "maxRangeDays": -5 }))
            .expect("set");
        assert_eq!(load_generation_settings(&conn).max_range_days, DEFAULT_MAX_RANGE_DAYS);
    }

    #[test]
    fn patch_validates_and_persists() {
        let conn = conn();
        let base = load_generation_settings(&conn);

        let bad = json!({ "maxRangeDays": 0 });
        assert!(base.apply_patch(bad.as_object().expect("obj")).is_err());
        let unknown = json!({ "maxRangeDayz": 10 });
        assert!(base.apply_patch(unknown.as_object().expect("obj")).is_err());

        let good = json!({ "maxRangeDays": 200 });
        let next = base.apply_patch(good.as_object().expect("obj")).expect("patch");
        save_generation_settings(&conn, &next).expect("save");
        assert_eq!(load_generation_settings(&conn).max_range_days, 200);
    }
}
