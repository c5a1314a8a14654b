//! Deterministic identity helpers.
//!
//! Two processes computing `day_id(user, date)` (or the template/series
//! equivalents) for the same inputs MUST agree bitwise — they hash into a
//! fixed namespace with UUID v5, which is pure and has no process-local
//! state.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

const DAY_NAMESPACE: Uuid = Uuid::from_bytes([
    0xd3, 0x1f, 0x1a, 0x00, 0x6d, 0x61, 0x45, 0x88, 0x9b, 0x2a, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66,
]);
const DAY_TEMPLATE_NAMESPACE: Uuid = Uuid::from_bytes([
    0xd3, 0x1f, 0x1a, 0x01, 0x6d, 0x61, 0x45, 0x88, 0x9b, 0x2a, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66,
]);
const CALENDAR_ENTRY_SERIES_NAMESPACE: Uuid = Uuid::from_bytes([
    0xd3, 0x1f, 0x1a, 0x02, 0x6d, 0x61, 0x45, 0x88, 0x9b, 0x2a, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66,
]);
const KIOSK_ALARM_NAMESPACE: Uuid = Uuid::from_bytes([
    0xd3, 0x1f, 0x1a, 0x03, 0x6d, 0x61, 0x45, 0x88, 0x9b, 0x2a, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66,
]);

pub fn day_id(user_id: Uuid, date: NaiveDate) -> Uuid {
    let name = format!("{user_id}:{date}");
    Uuid::new_v5(&DAY_NAMESPACE, name.as_bytes())
}

pub fn day_template_id(user_id: Uuid, slug: &str) -> Uuid {
    let name = format!("{user_id}:{slug}");
    Uuid::new_v5(&DAY_TEMPLATE_NAMESPACE, name.as_bytes())
}

pub fn calendar_entry_series_id(platform: &str, series_platform_id: &str) -> Uuid {
    let name = format!("{platform}:{series_platform_id}");
    Uuid::new_v5(&CALENDAR_ENTRY_SERIES_NAMESPACE, name.as_bytes())
}

/// The synthetic `KIOSK_ALARM` triggered by a calendar-entry reminder rule
/// (spec §4.5.2): `UUID5(entry.id, starts_at, minutes_before, "KIOSK_ALARM")`,
/// never persisted as an `Alarm` value object on the Day.
pub fn calendar_kiosk_alarm_id(
    entry_id: Uuid,
    starts_at: DateTime<Utc>,
    minutes_before: i64,
) -> Uuid {
    let name = format!("{entry_id}:{starts_at}:{minutes_before}:KIOSK_ALARM");
    Uuid::new_v5(&KIOSK_ALARM_NAMESPACE, name.as_bytes())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::{calendar_entry_series_id, day_id, day_template_id};

    #[test]
    fn day_id_is_deterministic_across_calls() {
        let user_id = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2025, 11, 27).expect("valid date");
        assert_eq!(day_id(user_id, date), day_id(user_id, date));
    }

    #[test]
    fn day_id_differs_across_users_and_dates() {
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2025, 11, 27).expect("valid date");
        assert_ne!(day_id(user_a, date), day_id(user_b, date));

        let other_date = NaiveDate::from_ymd_opt(2025, 11, 28).expect("valid date");
        assert_ne!(day_id(user_a, date), day_id(user_a, other_date));
    }

    #[test]
    fn day_template_id_is_deterministic_per_slug() {
        let user_id = Uuid::new_v4();
        assert_eq!(
            day_template_id(user_id, "default"),
            day_template_id(user_id, "default")
        );
        assert_ne!(
            day_template_id(user_id, "default"),
            day_template_id(user_id, "weekend")
        );
    }

    #[test]
    fn calendar_entry_series_id_keys_on_platform_and_platform_id() {
        assert_eq!(
            calendar_entry_series_id("google", "series-1"),
            calendar_entry_series_id("google", "series-1")
        );
        assert_ne!(
            calendar_entry_series_id("google", "series-1"),
            calendar_entry_series_id("outlook", "series-1")
        );
    }
}
