//! Time-of-day and calendar-day helpers.
//!
//! The booking API is loose about formats: days arrive as `YYYY-MM-DD` or as
//! full timestamps, times as `HH:MM`, `HH:MM:SS` or RFC 3339 timestamps.
//! Everything here is total: unparseable input yields `None`.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike};

use crate::model::Minutes;

const DAY_PREFIX_LEN: usize = 10;

pub fn minutes_of(t: NaiveTime) -> Minutes {
    (t.hour() * 60 + t.minute()) as Minutes
}

/// Inverse of [`minutes_of`]. `None` outside `[0, 24h)`.
pub fn time_from_minutes(m: Minutes) -> Option<NaiveTime> {
    if !(0..24 * 60).contains(&m) {
        return None;
    }
    NaiveTime::from_hms_opt((m / 60) as u32, (m % 60) as u32, 0)
}

pub fn format_hhmm(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

/// Weekday index with Monday as 0 through Sunday as 6.
///
/// Recurring blocks are stored in this numbering; the Sunday-first numbering
/// most platforms use must go through this conversion.
pub fn monday_index(date: NaiveDate) -> u8 {
    let sunday_based = date.weekday().num_days_from_sunday();
    ((sunday_based + 6) % 7) as u8
}

/// Parse the calendar day at the front of `raw` (`2025-03-31`, `2025-03-31T00:00:00.000Z`, ...).
pub fn parse_calendar_day(raw: &str) -> Option<NaiveDate> {
    let head = raw.get(..DAY_PREFIX_LEN)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Parse a time of day. Timestamps are read in UTC, matching how the API stores them.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    if let Ok(t) = NaiveTime::parse_from_str(raw, "%H:%M") {
        return Some(t);
    }
    if let Ok(t) = NaiveTime::parse_from_str(raw, "%H:%M:%S%.f") {
        return Some(t.with_nanosecond(0).unwrap_or(t));
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.naive_utc().time())
        .map(|t| t.with_nanosecond(0).unwrap_or(t))
}

/// Serde adapter for `HH:MM` times.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_hhmm(*t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_time_of_day(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid time of day: {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn monday_is_zero_sunday_is_six() {
        // 2025-03-31 is a Monday
        let monday = d(2025, 3, 31);
        for offset in 0..7 {
            let day = monday + chrono::Days::new(offset);
            assert_eq!(monday_index(day), offset as u8);
        }
        assert_eq!(monday_index(d(2025, 4, 6)), 6); // Sunday
    }

    #[test]
    fn minutes_roundtrip_edges() {
        assert_eq!(minutes_of(NaiveTime::from_hms_opt(0, 0, 0).unwrap()), 0);
        assert_eq!(minutes_of(NaiveTime::from_hms_opt(23, 59, 0).unwrap()), 1439);
        assert_eq!(time_from_minutes(570), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(time_from_minutes(24 * 60), None);
        assert_eq!(time_from_minutes(-1), None);
    }

    #[test]
    fn calendar_day_ignores_suffix() {
        assert_eq!(parse_calendar_day("2025-03-31"), Some(d(2025, 3, 31)));
        assert_eq!(parse_calendar_day("2025-03-31T00:00:00.000Z"), Some(d(2025, 3, 31)));
        assert_eq!(parse_calendar_day("2025-03"), None);
        assert_eq!(parse_calendar_day("not-a-date"), None);
    }

    #[test]
    fn time_of_day_formats() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0);
        assert_eq!(parse_time_of_day("09:00"), nine);
        assert_eq!(parse_time_of_day("09:00:00"), nine);
        assert_eq!(parse_time_of_day("2025-03-31T09:00:00.000Z"), nine);
        // Offsets are normalised to UTC
        assert_eq!(parse_time_of_day("2025-03-31T06:00:00-03:00"), nine);
        assert_eq!(parse_time_of_day("nine"), None);
    }

    #[test]
    fn formats_two_digit_hours() {
        let t = NaiveTime::from_hms_opt(8, 5, 0).unwrap();
        assert_eq!(format_hhmm(t), "08:05");
    }
}
