//! Effective-date computation and day boundaries.
//!
//! The operator's subjective "today" can lag the calendar date: with a
//! custom day start of 06:00, work done at 02:30 still belongs to the
//! previous day. Everything clock-dependent in the core takes an explicit
//! `now` so callers (and tests) control the wall clock; production code
//! passes `Local::now().naive_local()`.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{CoreError, Result};

/// Parse an `HH:MM` time-of-day string.
pub fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| CoreError::InvalidArgument {
        field: "time",
        message: format!("expected HH:MM, got '{s}'"),
    })
}

/// Translates wall-clock instants into effective dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateContext {
    /// When set, local times before this boundary belong to the previous day.
    day_start: Option<NaiveTime>,
}

impl DateContext {
    /// Plain calendar dates: the effective date is the local date of `now`.
    pub fn calendar() -> Self {
        Self { day_start: None }
    }

    /// Shifted days: local time-of-day before `day_start` maps to yesterday.
    pub fn with_day_start(day_start: NaiveTime) -> Self {
        Self {
            day_start: Some(day_start),
        }
    }

    /// Build from the persisted settings fields.
    pub fn from_settings(day_start_enabled: bool, day_start_time: &str) -> Result<Self> {
        if day_start_enabled {
            Ok(Self::with_day_start(parse_hhmm(day_start_time)?))
        } else {
            Ok(Self::calendar())
        }
    }

    /// The operator's "today" for the given instant.
    ///
    /// Non-decreasing in real time: advancing `now` never moves the
    /// effective date backwards.
    pub fn effective_date(&self, now: NaiveDateTime) -> NaiveDate {
        match self.day_start {
            Some(boundary) if now.time() < boundary => now.date().pred_opt().unwrap_or(now.date()),
            _ => now.date(),
        }
    }

    /// True when `now` has crossed into a later effective date than `last_date`.
    pub fn is_new_day(&self, now: NaiveDateTime, last_date: NaiveDate) -> bool {
        self.effective_date(now) > last_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn calendar_mode_uses_local_date() {
        let ctx = DateContext::calendar();
        assert_eq!(ctx.effective_date(dt("2025-03-10 00:00")), d("2025-03-10"));
        assert_eq!(ctx.effective_date(dt("2025-03-10 23:59")), d("2025-03-10"));
    }

    #[test]
    fn early_morning_belongs_to_yesterday_with_day_start() {
        let ctx = DateContext::with_day_start(parse_hhmm("06:00").unwrap());
        assert_eq!(ctx.effective_date(dt("2025-03-10 03:00")), d("2025-03-09"));
        assert_eq!(ctx.effective_date(dt("2025-03-10 06:00")), d("2025-03-10"));
        assert_eq!(ctx.effective_date(dt("2025-03-10 05:59")), d("2025-03-09"));
    }

    #[test]
    fn effective_date_is_non_decreasing() {
        let ctx = DateContext::with_day_start(parse_hhmm("06:00").unwrap());
        let instants = [
            dt("2025-03-09 12:00"),
            dt("2025-03-09 23:59"),
            dt("2025-03-10 00:00"),
            dt("2025-03-10 05:59"),
            dt("2025-03-10 06:00"),
            dt("2025-03-10 12:00"),
        ];
        let mut prev = ctx.effective_date(instants[0]);
        for now in &instants[1..] {
            let cur = ctx.effective_date(*now);
            assert!(cur >= prev, "effective date went backwards at {now}");
            prev = cur;
        }
    }

    #[test]
    fn is_new_day_compares_effective_dates() {
        let ctx = DateContext::with_day_start(parse_hhmm("06:00").unwrap());
        // 03:00 on the 10th is still effectively the 9th.
        assert!(!ctx.is_new_day(dt("2025-03-10 03:00"), d("2025-03-09")));
        assert!(ctx.is_new_day(dt("2025-03-10 06:01"), d("2025-03-09")));
    }

    #[test]
    fn parse_hhmm_accepts_and_rejects() {
        assert!(parse_hhmm("06:00").is_ok());
        assert!(parse_hhmm("23:59").is_ok());
        assert!(parse_hhmm("24:00").is_err());
        assert!(parse_hhmm("6am").is_err());
        assert!(parse_hhmm("").is_err());
    }

    #[test]
    fn from_settings_disabled_ignores_time_string() {
        let ctx = DateContext::from_settings(false, "garbage").unwrap();
        assert_eq!(ctx, DateContext::calendar());
    }
}
