//! Civil day boundaries for the operating region's timezone.
//!
//! Every budget window in the console is a civil day in a fixed named
//! timezone, expressed as the UTC instant range `[start, start + 24h)`.
//! The conversion never assumes a literal hour offset: a candidate UTC
//! instant is read back in the target zone and corrected until it lands on
//! civil midnight. An unknown zone is a hard error; falling back to UTC
//! would shift every boundary by the offset amount.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimeError {
    #[error("unknown timezone '{0}'")]
    UnknownZone(String),

    #[error("invalid civil date '{0}', expected YYYY-MM-DD")]
    BadDate(String),
}

/// Resolve a named timezone from the tz database.
pub fn zone(name: &str) -> Result<Tz, TimeError> {
    name.parse()
        .map_err(|_| TimeError::UnknownZone(name.to_string()))
}

/// Parse a `YYYY-MM-DD` civil date.
pub fn parse_civil_date(input: &str) -> Result<NaiveDate, TimeError> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| TimeError::BadDate(input.to_string()))
}

/// The civil date of `now` in `tz`.
pub fn civil_date(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// A civil day as a half-open UTC instant range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// UTC window `[civil midnight, civil midnight + 24h)` for `date` in `tz`.
///
/// The offset is derived by fixpoint: read the candidate back in the target
/// zone, shift by the civil difference, repeat. Converges in one step for
/// fixed-offset zones; the iteration cap only matters around DST gaps.
pub fn day_window(date: NaiveDate, tz: Tz) -> DayWindow {
    let midnight = date.and_time(NaiveTime::MIN);
    let mut start = Utc.from_utc_datetime(&midnight);

    for _ in 0..4 {
        let seen = start.with_timezone(&tz).naive_local();
        let correction = midnight - seen;
        if correction == TimeDelta::zero() {
            break;
        }
        start = start + correction;
    }

    DayWindow {
        start,
        end: start + Duration::hours(24),
    }
}

/// The window of the civil day containing `now` in `tz`.
pub fn today_window(now: DateTime<Utc>, tz: Tz) -> DayWindow {
    day_window(civil_date(now, tz), tz)
}

/// Pure string-in form: `(date, zone name) -> (startUtc, endUtc)`.
pub fn civil_day_window(date: &str, zone_name: &str) -> Result<DayWindow, TimeError> {
    Ok(day_window(parse_civil_date(date)?, zone(zone_name)?))
}
