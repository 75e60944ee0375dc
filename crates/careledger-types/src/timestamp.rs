//! Canonical timestamp encoding.
//!
//! Persisted timestamps are RFC 3339 in UTC with a fixed nine-digit fraction
//! (`2026-10-19T08:30:00.000000000Z`). Every encoded value has the same
//! width, so the ledger's string range comparisons order them
//! chronologically.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Formats a timestamp in the canonical persisted form.
pub fn canonical(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parses any RFC 3339 timestamp and normalises it to UTC.
pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&canonical(ts))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    #[test]
    fn canonical_form_has_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap();
        let fractional = whole + Duration::nanoseconds(1_500);

        assert_eq!(canonical(&whole), "2026-10-19T08:30:00.000000000Z");
        assert_eq!(canonical(&whole).len(), canonical(&fractional).len());
    }

    #[test]
    fn parse_normalises_offsets() {
        let parsed = parse("2026-10-19T10:30:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap());
    }

    proptest! {
        /// Property: string order of the canonical form is chronological order
        #[test]
        fn prop_string_order_matches_time_order(
            a in 0i64..4_000_000_000_000_000_000,
            b in 0i64..4_000_000_000_000_000_000,
        ) {
            let ta = Utc.timestamp_nanos(a);
            let tb = Utc.timestamp_nanos(b);
            prop_assert_eq!(ta.cmp(&tb), canonical(&ta).cmp(&canonical(&tb)));
        }
    }
}
