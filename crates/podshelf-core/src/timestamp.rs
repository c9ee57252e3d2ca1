// ABOUTME: Timestamp helpers shared by the store: microsecond precision and a fixed text encoding.
// ABOUTME: Guarantees that a value written to SQLite reads back equal and that updates move time forward.

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};

/// The current time truncated to the precision stored on disk.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A timestamp strictly later than `prev`, normally just `now()`.
///
/// Protects `updated_at` ordering against clock steps and sub-microsecond updates.
pub fn after(prev: DateTime<Utc>) -> DateTime<Utc> {
    let now = now();
    if now > prev {
        now
    } else {
        prev + Duration::microseconds(1)
    }
}

/// Encode for storage in a TEXT column.
pub fn to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a value written by [`to_db`].
pub fn from_db(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_encoding_round_trips_exactly() {
        let ts = now();
        let decoded = from_db(&to_db(&ts)).unwrap();
        assert_eq!(decoded, ts);
    }

    #[test]
    fn after_is_strictly_later() {
        let future = now() + Duration::seconds(60);
        let next = after(future);
        assert!(next > future);
        assert_eq!(next - future, Duration::microseconds(1));

        let past = now() - Duration::seconds(60);
        assert!(after(past) > past);
    }
}
