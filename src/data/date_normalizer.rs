use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::errors::MalformedDate;

/// Offset-carrying layouts tried after RFC 3339.
const OFFSET_FORMATS: [&str; 1] = ["%Y-%m-%dT%H:%M:%S%.f%z"];

/// Layouts without an offset. These are read as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Converts a raw date field into a UTC instant.
///
/// Absent, `null` and empty values are `Ok(None)`; what that means ("does not
/// expire", "not purchased") is up to the caller. Anything present that is not
/// a recognisable ISO-8601 timestamp is a `MalformedDate`.
pub(crate) fn normalize(raw: Option<&Value>) -> Result<Option<DateTime<Utc>>, MalformedDate> {
    let text = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => s.trim(),
        Some(other) => return Err(MalformedDate::new(other.to_string())),
    };
    if text.is_empty() {
        return Ok(None);
    }
    parse_timestamp(text)
        .map(Some)
        .ok_or_else(|| MalformedDate::new(text))
}

/// Encodes an instant in the format `normalize` reads back to the same value.
pub(crate) fn format(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    OFFSET_FORMATS
        .iter()
        .find_map(|f| DateTime::parse_from_str(text, f).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
                .map(|naive| naive.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn absent_null_and_empty_are_none() {
        assert_eq!(normalize(None), Ok(None));
        assert_eq!(normalize(Some(&Value::Null)), Ok(None));
        assert_eq!(normalize(Some(&json!(""))), Ok(None));
        assert_eq!(normalize(Some(&json!("   "))), Ok(None));
    }

    #[test]
    fn parses_zulu_timestamps() {
        assert_eq!(
            normalize(Some(&json!("2024-01-01T00:00:00Z"))),
            Ok(Some(utc(2024, 1, 1, 0, 0, 0)))
        );
    }

    #[test]
    fn converts_offsets_to_utc() {
        assert_eq!(
            normalize(Some(&json!("2024-01-01T02:30:00+02:30"))),
            Ok(Some(utc(2024, 1, 1, 0, 0, 0)))
        );
        assert_eq!(
            normalize(Some(&json!("2024-01-01T02:00:00+0200"))),
            Ok(Some(utc(2024, 1, 1, 0, 0, 0)))
        );
    }

    #[test]
    fn reads_naive_timestamps_as_utc() {
        assert_eq!(
            normalize(Some(&json!("2024-03-05T10:20:30"))),
            Ok(Some(utc(2024, 3, 5, 10, 20, 30)))
        );
        assert_eq!(
            normalize(Some(&json!("2024-03-05 10:20:30"))),
            Ok(Some(utc(2024, 3, 5, 10, 20, 30)))
        );
    }

    #[test]
    fn keeps_fractional_seconds() {
        let parsed = normalize(Some(&json!("2024-01-01T00:00:00.250Z")))
            .unwrap()
            .unwrap();
        assert_eq!(parsed.timestamp_subsec_millis(), 250);
        assert_eq!(format(&parsed), "2024-01-01T00:00:00.250Z");
    }

    #[test]
    fn rejects_garbage_and_non_strings() {
        assert_eq!(
            normalize(Some(&json!("not a date"))),
            Err(MalformedDate::new("not a date"))
        );
        assert_eq!(
            normalize(Some(&json!(1704067200000_i64))),
            Err(MalformedDate::new("1704067200000"))
        );
        assert!(normalize(Some(&json!({"date": "2024-01-01T00:00:00Z"}))).is_err());
        assert!(normalize(Some(&json!("2024-13-01T00:00:00Z"))).is_err());
    }

    #[test]
    fn format_is_read_back_unchanged() {
        let t = utc(2024, 2, 1, 0, 0, 0);
        assert_eq!(format(&t), "2024-02-01T00:00:00Z");
        assert_eq!(normalize(Some(&json!(format(&t)))), Ok(Some(t)));
    }
}
