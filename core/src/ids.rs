//! Opaque ID generation and UTC clock helpers.
//!
//! Every record carries an ID of the form `<kind>-<random>` where the random
//! part is 16 alphanumeric characters. Timestamps are stored as RFC 3339 UTC
//! strings with fixed microsecond precision so that lexicographic order on
//! the stored text equals chronological order.

use chrono::{DateTime, SecondsFormat, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of the random suffix in generated IDs.
const ID_SUFFIX_LEN: usize = 16;

/// Generate a unique ID with the given kind prefix.
///
/// Example: `task-AbcDef1234567890`.
pub fn generate_id(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{}-{}", prefix, suffix)
}

/// Current UTC time.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for storage.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp back into a UTC datetime.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_generate_id_format() {
        let id = generate_id("task");
        assert!(id.starts_with("task-"));
        let suffix = &id["task-".len()..];
        assert_eq!(suffix.len(), ID_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generate_id_unique() {
        let a = generate_id("report");
        let b = generate_id("report");
        assert_ne!(a, b);
    }

    #[test]
    fn test_timestamp_round_trip() {
        let now = now_utc();
        let raw = format_timestamp(&now);
        let parsed = parse_timestamp(&raw).unwrap();
        // Fixed microsecond precision loses sub-microsecond digits only.
        assert!((now - parsed).num_microseconds().unwrap().abs() < 1);
    }

    #[test]
    fn test_timestamp_text_order_matches_time_order() {
        let base = now_utc();
        let earlier = format_timestamp(&base);
        let later = format_timestamp(&(base + Duration::seconds(1)));
        assert!(earlier < later);
    }
}
