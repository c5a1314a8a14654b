use chrono::{
    DateTime, Datelike, Days, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Timelike, Utc,
};
use chrono_tz::Tz;

pub const DEFAULT_USER_TIME_ZONE: &str = "UTC";

/// Monday = 0 .. Sunday = 6, matching the index order of
/// `User.settings.template_defaults`.
pub fn weekday_index(date: NaiveDate) -> usize {
    date.weekday().num_days_from_monday() as usize
}

/// True if `now_utc`, converted to the user's local time, falls in the
/// 15-minute bucket that contains `local_time_minutes` (minutes since local
/// midnight). Used by the morning-overview evaluator, which runs on a
/// `*/15 * * * *` cron and must match whichever bucket the user's configured
/// time falls into, not just an exact minute.
pub fn is_in_15_minute_bucket(now_utc: DateTime<Utc>, time_zone: &str, local_time_minutes: u16) -> bool {
    let local_time = user_local_time(now_utc, time_zone);
    let now_minutes = i64::from(local_time.hour()) * 60 + i64::from(local_time.minute());
    let bucket_start = (i64::from(local_time_minutes) / 15) * 15;
    let now_bucket_start = (now_minutes / 15) * 15;
    bucket_start == now_bucket_start
}

pub fn normalize_time_zone(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    trimmed.parse::<Tz>().ok().map(|tz| tz.name().to_string())
}

pub fn parse_time_zone_or_default(value: &str) -> Tz {
    normalize_time_zone(value)
        .and_then(|normalized| normalized.parse::<Tz>().ok())
        .unwrap_or(chrono_tz::UTC)
}

pub fn user_local_date(now_utc: DateTime<Utc>, time_zone: &str) -> NaiveDate {
    let tz = parse_time_zone_or_default(time_zone);
    now_utc.with_timezone(&tz).date_naive()
}

pub fn user_local_time(now_utc: DateTime<Utc>, time_zone: &str) -> NaiveTime {
    let tz = parse_time_zone_or_default(time_zone);
    now_utc.with_timezone(&tz).time()
}

pub fn local_day_bounds_utc(
    local_date: NaiveDate,
    time_zone: &str,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start_of_day = local_date.and_hms_opt(0, 0, 0)?;
    let next_day = local_date.checked_add_days(Days::new(1))?;
    let start_of_next_day = next_day.and_hms_opt(0, 0, 0)?;

    let tz = parse_time_zone_or_default(time_zone);
    let local_start = resolve_local_datetime(&tz, start_of_day)?;
    let local_end = resolve_local_datetime(&tz, start_of_next_day)?;

    Some((
        local_start.with_timezone(&Utc),
        local_end.with_timezone(&Utc),
    ))
}

fn resolve_local_datetime(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(value) => Some(value),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Timelike, Utc};

    use super::{
        DEFAULT_USER_TIME_ZONE, local_day_bounds_utc, normalize_time_zone, user_local_date,
        user_local_time,
    };

    #[test]
    fn normalize_time_zone_accepts_valid_iana_name() {
        assert_eq!(
            normalize_time_zone("America/Los_Angeles"),
            Some("America/Los_Angeles".to_string())
        );
    }

    #[test]
    fn normalize_time_zone_rejects_invalid_values() {
        assert_eq!(normalize_time_zone(""), None);
        assert_eq!(normalize_time_zone("Mars/Olympus"), None);
    }

    #[test]
    fn user_local_date_uses_default_when_time_zone_is_invalid() {
        let now = Utc
            .with_ymd_and_hms(2026, 2, 17, 1, 15, 0)
            .single()
            .expect("valid utc datetime");
        let local_date = user_local_date(now, "not-a-time-zone");
        assert_eq!(local_date.to_string(), "2026-02-17");
        assert_eq!(DEFAULT_USER_TIME_ZONE, "UTC");
    }

    #[test]
    fn local_day_bounds_convert_local_midnight_to_utc() {
        let local_date = NaiveDate::from_ymd_opt(2026, 2, 17).expect("valid local date");
        let (start_utc, end_utc) =
            local_day_bounds_utc(local_date, "America/Los_Angeles").expect("time bounds");

        assert_eq!(start_utc.date_naive().to_string(), "2026-02-17");
        assert_eq!(start_utc.hour(), 8);
        assert_eq!(end_utc.hour(), 8);
    }

    #[test]
    fn user_local_time_converts_from_utc() {
        let now = Utc
            .with_ymd_and_hms(2026, 2, 17, 9, 30, 0)
            .single()
            .expect("valid utc datetime");
        let local_time = user_local_time(now, "America/New_York");
        assert_eq!(local_time.format("%H:%M").to_string(), "04:30");
    }

    #[test]
    fn weekday_index_is_monday_zero() {
        use super::weekday_index;

        let monday = NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date");
        let sunday = NaiveDate::from_ymd_opt(2026, 2, 22).expect("valid date");
        assert_eq!(weekday_index(monday), 0);
        assert_eq!(weekday_index(sunday), 6);
    }

    #[test]
    fn is_in_15_minute_bucket_matches_the_containing_bucket() {
        use super::is_in_15_minute_bucket;

        let now = Utc
            .with_ymd_and_hms(2026, 2, 17, 8, 7, 0)
            .single()
            .expect("valid utc datetime");
        assert!(is_in_15_minute_bucket(now, "UTC", 8 * 60));
        assert!(is_in_15_minute_bucket(now, "UTC", 8 * 60 + 14));
        assert!(!is_in_15_minute_bucket(now, "UTC", 8 * 60 + 15));
    }
}
