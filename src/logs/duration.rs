use time::macros::format_description;
use time::{Date, Duration, Time};

use crate::error::ApiError;

/// Fixed unpaid break deducted from every shift.
const BREAK: Duration = Duration::HOUR;

/// Accepts `HH:MM` (what the clock-in form submits) and `HH:MM:SS`.
pub fn parse_time(s: &str) -> Result<Time, ApiError> {
    let with_seconds = format_description!("[hour]:[minute]:[second]");
    let without_seconds = format_description!("[hour]:[minute]");
    Time::parse(s, &with_seconds)
        .or_else(|_| Time::parse(s, &without_seconds))
        .map_err(|_| ApiError::Format)
}

/// Calendar dates are `YYYY-MM-DD`.
pub fn parse_date(s: &str) -> Result<Date, ApiError> {
    let fmt = format_description!("[year]-[month]-[day]");
    Date::parse(s, &fmt).map_err(|_| ApiError::Format)
}

/// Net work duration in minutes. A clock-out strictly earlier than clock-in
/// means the shift crossed midnight; equal times are a zero-length shift,
/// not a 24h one. The result never goes negative, even when the shift is
/// shorter than the break.
pub fn net_work_minutes(clock_in: Time, clock_out: Time) -> i32 {
    let mut elapsed = clock_out - clock_in;
    if clock_out < clock_in {
        elapsed += Duration::DAY;
    }
    let net = (elapsed - BREAK).max(Duration::ZERO);
    net.whole_minutes() as i32
}

/// Fixed-width `HH:MM`.
pub fn format_hhmm(minutes: i32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Human form, e.g. `7h 30m`.
pub fn format_human(minutes: i32) -> String {
    format!("{}h {}m", minutes / 60, minutes % 60)
}

pub fn format_time(t: Time) -> String {
    format!("{:02}:{:02}", t.hour(), t.minute())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Time {
        parse_time(s).expect("valid time")
    }

    #[test]
    fn same_day_shift_subtracts_break() {
        assert_eq!(net_work_minutes(t("09:00"), t("17:00")), 7 * 60);
        assert_eq!(format_hhmm(net_work_minutes(t("09:00"), t("17:00"))), "07:00");
    }

    #[test]
    fn half_hours_survive() {
        assert_eq!(net_work_minutes(t("09:00"), t("17:30")), 7 * 60 + 30);
        assert_eq!(format_human(7 * 60 + 30), "7h 30m");
    }

    #[test]
    fn overnight_shift_crosses_midnight() {
        // 22:00 -> 02:00 is 4h elapsed, 3h net after the break.
        assert_eq!(net_work_minutes(t("22:00"), t("02:00")), 3 * 60);
        assert_eq!(format_hhmm(3 * 60), "03:00");
    }

    #[test]
    fn zero_length_shift_is_zero_not_a_day() {
        assert_eq!(net_work_minutes(t("12:00"), t("12:00")), 0);
        assert_eq!(format_hhmm(0), "00:00");
    }

    #[test]
    fn shift_shorter_than_break_floors_at_zero() {
        assert_eq!(net_work_minutes(t("09:00"), t("09:30")), 0);
    }

    #[test]
    fn almost_full_day_is_valid() {
        // One minute short of a full wrap: 23h59m elapsed, minus the break.
        assert_eq!(net_work_minutes(t("09:00"), t("08:59")), 22 * 60 + 59);
    }

    #[test]
    fn accepts_seconds_resolution() {
        assert_eq!(t("09:00:00"), t("09:00"));
    }

    #[test]
    fn rejects_malformed_times() {
        assert!(matches!(parse_time("25:00"), Err(ApiError::Format)));
        assert!(matches!(parse_time("12:61"), Err(ApiError::Format)));
        assert!(matches!(parse_time("noon"), Err(ApiError::Format)));
        assert!(matches!(parse_time(""), Err(ApiError::Format)));
    }

    #[test]
    fn rejects_malformed_dates() {
        assert!(parse_date("2025-12-09").is_ok());
        assert!(matches!(parse_date("2025-13-01"), Err(ApiError::Format)));
        assert!(matches!(parse_date("09/12/2025"), Err(ApiError::Format)));
    }
}
