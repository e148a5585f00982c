//! Time truncation and aggregation window arithmetic.
//!
//! All windows are half-open: `[start, end)`. Measurements are stored with
//! whole-second timestamps, so a window boundary that falls on a whole second
//! assigns every stored row to exactly one window.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, SubsecRound, TimeZone, Utc};
use serde::Serialize;
use thiserror::Error;

/// Errors produced when building a time window.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("Window end {end} must be after start {start}")]
    Empty {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Discards sub-second precision.
pub fn truncate_to_second(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(0)
}

/// Discards seconds and sub-second precision.
pub fn truncate_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    let secs = at.timestamp();
    let floored = secs - secs.rem_euclid(60);
    DateTime::from_timestamp(floored, 0).unwrap_or_else(|| truncate_to_second(at))
}

/// A half-open interval of time `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window, rejecting empty or inverted intervals.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, WindowError> {
        if end <= start {
            return Err(WindowError::Empty { start, end });
        }
        Ok(Self { start, end })
    }

    /// The most recently completed window of `width` ending at `now`
    /// truncated to the second.
    ///
    /// Consecutive calls one `width` apart produce contiguous windows.
    pub fn ending_at_second(now: DateTime<Utc>, width: Duration) -> Self {
        let end = truncate_to_second(now);
        Self {
            start: end - width,
            end,
        }
    }

    /// The trailing window of `width` whose boundaries are truncated to the
    /// minute.
    pub fn trailing_minutes(now: DateTime<Utc>, width: Duration) -> Self {
        let end = truncate_to_minute(now);
        Self {
            start: truncate_to_minute(now - width),
            end,
        }
    }

    /// Whether `at` falls inside the window.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// A calendar day in some time zone, expressed as a UTC window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayWindow {
    /// The calendar date being covered.
    pub date: NaiveDate,
    pub window: TimeWindow,
}

impl DayWindow {
    /// The calendar day `date` in time zone `tz`.
    ///
    /// Spans midnight to the following midnight, so DST transition days
    /// cover 23 or 25 hours.
    pub fn for_date<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Self {
        let next = date.succ_opt().unwrap_or(date);
        let start = local_midnight(tz, date);
        let mut end = local_midnight(tz, next);
        if end <= start {
            end = start + Duration::days(1);
        }
        Self {
            date,
            window: TimeWindow { start, end },
        }
    }

    /// The most recently completed calendar day in `tz` relative to `now`.
    pub fn previous_day<Tz: TimeZone>(tz: &Tz, now: DateTime<Utc>) -> Self {
        let today = now.with_timezone(tz).date_naive();
        let yesterday = today.pred_opt().unwrap_or(today);
        Self::for_date(tz, yesterday)
    }
}

/// Longest stretch of local time a DST jump can skip.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// The first instant of `date` in `tz`.
///
/// When a DST jump skips midnight the day starts at the first local time
/// that exists after the gap.
fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    let mut local = midnight;
    for _ in 0..=MAX_GAP_MINUTES {
        match tz.from_local_datetime(&local) {
            LocalResult::Single(at) => return at.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => local += Duration::minutes(1),
        }
    }
    tz.from_utc_datetime(&midnight).with_timezone(&Utc)
}
