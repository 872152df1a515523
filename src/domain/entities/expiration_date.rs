use chrono::{DateTime, Utc};
use serde_json::Value;

/// Expiration state of a product or entitlement that has been purchased.
///
/// A record that states no expiration (`null` or missing) is `NeverExpires`;
/// that is never conflated with a date that was present but could not be
/// read, which is `Unparsed`.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpirationDate {
    /// Access ends at this instant (exclusive).
    Expires(DateTime<Utc>),
    /// Purchased and does not expire.
    NeverExpires,
    /// The record had a value here that is not a valid timestamp. Holds the
    /// original value so it can be written back untouched.
    Unparsed(Value),
}

impl ExpirationDate {
    /// The expiration instant, if one is known.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        match self {
            ExpirationDate::Expires(date) => Some(*date),
            ExpirationDate::NeverExpires | ExpirationDate::Unparsed(_) => None,
        }
    }

    /// Whether access is still granted at `at`, ignoring the purchase date.
    ///
    /// Expiration is exclusive: an instant equal to the expiration date is
    /// already expired. An unparsed date never grants access.
    pub fn is_unexpired_at(&self, at: DateTime<Utc>) -> bool {
        match self {
            ExpirationDate::Expires(date) => at < *date,
            ExpirationDate::NeverExpires => true,
            ExpirationDate::Unparsed(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    use super::*;

    #[test]
    fn expiration_is_exclusive() {
        let t1 = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let e = ExpirationDate::Expires(t1);
        assert!(e.is_unexpired_at(t1 - Duration::seconds(1)));
        assert!(!e.is_unexpired_at(t1));
        assert!(!e.is_unexpired_at(t1 + Duration::days(30)));
        assert_eq!(e.date(), Some(t1));
    }

    #[test]
    fn never_expires_has_no_upper_bound() {
        let far = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();
        assert!(ExpirationDate::NeverExpires.is_unexpired_at(far));
        assert_eq!(ExpirationDate::NeverExpires.date(), None);
    }

    #[test]
    fn unparsed_never_grants_access() {
        let e = ExpirationDate::Unparsed(json!("garbage"));
        assert!(!e.is_unexpired_at(Utc::now()));
        assert_eq!(e.date(), None);
    }
}
