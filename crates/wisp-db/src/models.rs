//! Database row types — these map directly to SQLite rows.
//! Distinct from wisp-types API models to keep the DB layer independent.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub creator_id: String,
    /// JSON-serialized content array, or an envelope record when `secret`.
    pub content: String,
    pub view_token: String,
    pub secret: bool,
    pub expires_at: String,
    pub viewed_at: Option<String>,
    pub response: Option<String>,
    pub created_at: String,
}

/// All timestamps are stored in this format so SQL string comparison is
/// chronological and matches sqlite's own datetime('now').
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_ts(t: DateTime<Utc>) -> String {
    t.format(TS_FORMAT).to_string()
}

pub fn parse_ts(s: &str) -> DateTime<Utc> {
    match NaiveDateTime::parse_from_str(s, TS_FORMAT) {
        Ok(ndt) => ndt.and_utc(),
        Err(_) => s.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", s, e);
            DateTime::default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ts_roundtrip() {
        let t = Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 45).unwrap();
        assert_eq!(parse_ts(&format_ts(t)), t);
    }

    #[test]
    fn ts_ordering_is_lexical() {
        let early = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 11, 3, 9, 0, 0).unwrap();
        assert!(format_ts(early) < format_ts(late));
    }
}
