// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and local calendar windows.
//!
//! Windows are half-open: `[start, end)`, both in UTC.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, SecondsFormat, TimeZone, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// A half-open UTC time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

/// UTC instant of local midnight at the start of `date`.
pub fn local_midnight(date: NaiveDate, offset: &FixedOffset) -> DateTime<Utc> {
    let naive = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    match offset.from_local_datetime(&naive).single() {
        Some(local) => local.with_timezone(&Utc),
        // Fixed offsets are never ambiguous; fall back to treating it as UTC.
        None => Utc.from_utc_datetime(&naive),
    }
}

/// The local calendar day containing `date`.
pub fn local_day(date: NaiveDate, offset: &FixedOffset) -> Window {
    let next = date.succ_opt().unwrap_or(date);
    Window {
        start: local_midnight(date, offset),
        end: local_midnight(next, offset),
    }
}

/// The local calendar day containing `now`.
pub fn today(now: DateTime<Utc>, offset: &FixedOffset) -> Window {
    local_day(now.with_timezone(offset).date_naive(), offset)
}

/// The local calendar month that is `months_back` months before the one
/// containing `now` (0 = current month).
pub fn local_month(now: DateTime<Utc>, offset: &FixedOffset, months_back: u32) -> Window {
    let local = now.with_timezone(offset);
    let (year, month) = shift_month(local.year(), local.month(), months_back);
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default();
    let next_first = NaiveDate::from_ymd_opt(next_year, next_month, 1).unwrap_or_default();

    Window {
        start: local_midnight(first, offset),
        end: local_midnight(next_first, offset),
    }
}

/// `YYYY-MM` key of the local month containing `at`.
pub fn month_key(at: DateTime<Utc>, offset: &FixedOffset) -> String {
    at.with_timezone(offset).format("%Y-%m").to_string()
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn shift_month(year: i32, month: u32, back: u32) -> (i32, u32) {
    let index = year * 12 + (month as i32 - 1) - back as i32;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wib() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    #[test]
    fn today_uses_local_midnight() {
        // 2026-03-10 20:00 UTC is already 2026-03-11 03:00 in WIB.
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 20, 0, 0).unwrap();
        let window = today(now, &wib());

        assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 3, 10, 17, 0, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2026, 3, 11, 17, 0, 0).unwrap());
        assert!(window.contains(now));
    }

    #[test]
    fn local_month_wraps_years() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();

        let current = local_month(now, &wib(), 0);
        assert_eq!(current.start, Utc.with_ymd_and_hms(2025, 12, 31, 17, 0, 0).unwrap());

        let previous = local_month(now, &wib(), 1);
        assert_eq!(previous.start, Utc.with_ymd_and_hms(2025, 11, 30, 17, 0, 0).unwrap());
        assert_eq!(previous.end, current.start);

        let six_back = local_month(now, &wib(), 5);
        assert_eq!(month_key(six_back.start, &wib()), "2025-08");
    }

    #[test]
    fn parse_date_accepts_iso_days_only() {
        assert_eq!(parse_date("2026-02-01"), NaiveDate::from_ymd_opt(2026, 2, 1));
        assert_eq!(parse_date(" 2026-02-01 "), NaiveDate::from_ymd_opt(2026, 2, 1));
        assert_eq!(parse_date("01/02/2026"), None);
        assert_eq!(parse_date("2026-02-30"), None);
    }

    #[test]
    fn format_uses_z_suffix() {
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 8, 30, 0).unwrap();
        assert_eq!(format_utc_rfc3339(at), "2026-05-01T08:30:00Z");
    }
}
