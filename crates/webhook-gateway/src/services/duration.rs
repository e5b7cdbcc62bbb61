//! Subscription duration parsing
//!
//! The provider metadata carries the duration as a JSON string such as
//! `{"months":1}` or `{"days":7}`. Malformed input falls back to one
//! month so a paid subscription is never lost to a metadata typo; the
//! fallback is surfaced to the caller for alerting.

use chrono::{DateTime, Duration, Months, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SubscriptionDuration {
    pub days: Option<i64>,
    pub months: Option<u32>,
}

impl SubscriptionDuration {
    fn is_valid(&self) -> bool {
        self.days.is_some() || self.months.is_some()
    }

    fn one_month() -> Self {
        Self {
            days: None,
            months: Some(1),
        }
    }
}

/// Parse a raw duration descriptor. The second element of the pair is
/// `true` when the fallback of one month was used.
pub fn parse(raw: &str) -> (SubscriptionDuration, bool) {
    match serde_json::from_str::<SubscriptionDuration>(raw) {
        Ok(duration) if duration.is_valid() => (duration, false),
        _ => {
            tracing::error!(raw = %raw, "Unparseable subscription duration, defaulting to one month");
            (SubscriptionDuration::one_month(), true)
        }
    }
}

/// Compute the expiry instant for a duration starting at `now`.
///
/// When both units are present, months win: calendar months model the
/// billing cycle, days are only used for short promotional periods.
/// Values that overflow the calendar get the same one-month treatment as
/// a malformed descriptor.
pub fn expiry_from(now: DateTime<Utc>, duration: &SubscriptionDuration) -> DateTime<Utc> {
    let expiry = if let Some(months) = duration.months {
        now.checked_add_months(Months::new(months))
    } else {
        duration
            .days
            .and_then(Duration::try_days)
            .and_then(|d| now.checked_add_signed(d))
    };

    expiry.unwrap_or_else(|| {
        tracing::error!(
            days = ?duration.days,
            months = ?duration.months,
            "Subscription duration out of range, defaulting to one month"
        );
        now.checked_add_months(Months::new(1)).unwrap_or(now)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_months() {
        let (duration, fallback) = parse("{\"months\":2}");
        assert!(!fallback);
        assert_eq!(duration.months, Some(2));
        assert_eq!(duration.days, None);
    }

    #[test]
    fn test_parse_days() {
        let (duration, fallback) = parse("{\"days\":7}");
        assert!(!fallback);
        assert_eq!(duration.days, Some(7));
    }

    #[test]
    fn test_garbage_falls_back_to_one_month() {
        let (duration, fallback) = parse("not json");
        assert!(fallback);
        assert_eq!(duration.months, Some(1));
    }

    #[test]
    fn test_empty_object_falls_back() {
        let (duration, fallback) = parse("{}");
        assert!(fallback);
        assert_eq!(duration.months, Some(1));
    }

    #[test]
    fn test_months_win_over_days() {
        let (duration, fallback) = parse("{\"days\":7,\"months\":1}");
        assert!(!fallback);

        let now = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        let expiry = expiry_from(now, &duration);
        assert_eq!(expiry, Utc.with_ymd_and_hms(2025, 2, 15, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_days_expiry() {
        let duration = SubscriptionDuration {
            days: Some(7),
            months: None,
        };
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(
            expiry_from(now, &duration),
            Utc.with_ymd_and_hms(2025, 1, 22, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_out_of_range_days_default_to_one_month() {
        let (duration, fallback) = parse("{\"days\":4000000000000000000}");
        assert!(!fallback);
        assert_eq!(duration.days, Some(4_000_000_000_000_000_000));

        let now = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(
            expiry_from(now, &duration),
            Utc.with_ymd_and_hms(2025, 2, 15, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_negative_days_default_to_one_month() {
        let duration = SubscriptionDuration {
            days: Some(i64::MIN),
            months: None,
        };
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(
            expiry_from(now, &duration),
            Utc.with_ymd_and_hms(2025, 2, 15, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_month_end_clamping() {
        let duration = SubscriptionDuration {
            days: None,
            months: Some(1),
        };
        let now = Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap();
        assert_eq!(
            expiry_from(now, &duration),
            Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap()
        );
    }
}
