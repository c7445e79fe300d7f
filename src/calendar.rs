//! Weekday ordinals, period numbering and period bounds.
//!
//! Weekdays are plain ordinals with Monday = 0 through Sunday = 6. All
//! modulo arithmetic is non-negative (`rem_euclid`).

use crate::error::{AotwError, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Weekday names indexed by ordinal.
pub const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Default period length in days.
pub const DEFAULT_PERIOD_DAYS: u32 = 7;

/// Map a weekday name to its ordinal (Monday = 0 … Sunday = 6).
///
/// Matching is case-insensitive and ignores surrounding whitespace.
pub fn day_name_to_ordinal(name: &str) -> Result<u8> {
    let trimmed = name.trim();
    DAY_NAMES
        .iter()
        .position(|day| day.eq_ignore_ascii_case(trimmed))
        .map(|idx| idx as u8)
        .ok_or_else(|| AotwError::InvalidDayName(name.to_owned()))
}

/// Map an ordinal back to its weekday name.
pub fn ordinal_to_day_name(ordinal: u8) -> Result<&'static str> {
    DAY_NAMES
        .get(usize::from(ordinal))
        .copied()
        .ok_or_else(|| AotwError::InvalidDayName(ordinal.to_string()))
}

/// Parse a comma-separated list of weekday names.
///
/// Empty segments are ignored, so `""` yields an empty list.
pub fn parse_day_list(list: &str) -> Result<Vec<u8>> {
    list.split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(day_name_to_ordinal)
        .collect()
}

/// Weekday ordinal of a civil date.
pub fn weekday_ordinal(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

/// Running count of `anchor_weekday` occurrences this year, 1-based.
///
/// This is not an ISO week number. The count is exact on anchor days; in
/// between it can step on another weekday, so [`Period::for_date`] always
/// evaluates it on the period's anchor date.
pub fn current_period_number(today: NaiveDate, anchor_weekday: u8) -> u32 {
    let start_of_year = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
    let elapsed_days = (today - start_of_year).num_days() + 1;
    let first_occurrence_offset =
        (i64::from(anchor_weekday) - i64::from(weekday_ordinal(start_of_year))).rem_euclid(7);

    let mut count = elapsed_days / 7;
    if elapsed_days >= first_occurrence_offset {
        count += 1;
    }
    count as u32
}

/// Most recent date on or before `today` that falls on `anchor_weekday`.
pub fn most_recent_anchor(today: NaiveDate, anchor_weekday: u8) -> NaiveDate {
    let back = (i64::from(weekday_ordinal(today)) - i64::from(anchor_weekday)).rem_euclid(7);
    today - Duration::days(back)
}

/// Start (midnight of the most recent anchor day) and end of the period.
pub fn period_bounds(
    today: NaiveDate,
    anchor_weekday: u8,
    length_days: u32,
) -> (NaiveDateTime, NaiveDateTime) {
    let start = most_recent_anchor(today, anchor_weekday).and_time(chrono::NaiveTime::MIN);
    let end = start + Duration::days(i64::from(length_days));
    (start, end)
}

/// `abs((to - from) mod 7)`, used for "days left" messaging.
///
/// The result is the forward distance from `from` to `to`; for distinct
/// weekdays `days_until_weekday(a, b) + days_until_weekday(b, a) == 7`.
pub fn days_until_weekday(from_weekday: u8, to_weekday: u8) -> u8 {
    (i64::from(to_weekday) - i64::from(from_weekday))
        .rem_euclid(7)
        .unsigned_abs() as u8
}

/// Civil date of the instant `now` as seen in `zone`.
pub fn date_in_timezone(now: DateTime<Utc>, zone: Tz) -> NaiveDate {
    now.with_timezone(&zone).date_naive()
}

/// One period ("week") of the rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// Running anchor-day count, see [`current_period_number`].
    pub number: u32,
    /// Civil date of the period's anchor day.
    pub anchor_date: NaiveDate,
    /// Midnight of the anchor day.
    pub start: NaiveDateTime,
    /// `start` plus the configured period length.
    pub end: NaiveDateTime,
}

impl Period {
    /// The period containing `today`. The number is taken on the anchor
    /// date, so every day of a period shares it.
    pub fn for_date(today: NaiveDate, anchor_weekday: u8, length_days: u32) -> Self {
        let (start, end) = period_bounds(today, anchor_weekday, length_days);
        let anchor_date = start.date();
        Self {
            number: current_period_number(anchor_date, anchor_weekday),
            anchor_date,
            start,
            end,
        }
    }

    /// Returns `true` if `at` lies within `[start, end]`.
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.start && at <= self.end
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "period {} ({} .. {})",
            self.number,
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}
