//! Free-slot computation over busy calendar intervals.
//!
//! [`find_free_slots`] takes the complete set of busy intervals for a search
//! window and returns the complementary free intervals that are at least a
//! minimum number of minutes long.
//!
//! The input must be fully materialized before calling: gaps can only be
//! computed once every busy interval overlapping the window is known.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::time::{EventTime, start_of_day};

/// A busy calendar interval, as reported by a calendar backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    /// Start of the interval.
    pub start: EventTime,
    /// End of the interval.
    pub end: EventTime,
}

impl BusyInterval {
    /// Creates a busy interval from two event times.
    pub fn new(start: EventTime, end: EventTime) -> Self {
        Self { start, end }
    }

    /// Creates a busy interval between two UTC datetimes.
    pub fn from_utc(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::new(EventTime::DateTime(start), EventTime::DateTime(end))
    }

    /// Resolves the start boundary to a UTC instant.
    ///
    /// All-day starts resolve to midnight UTC at the beginning of the date.
    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.to_utc_datetime()
    }

    /// Resolves the end boundary to a UTC instant.
    ///
    /// All-day ends are exclusive dates (an entry on March 15 ends on
    /// March 16), so they resolve to midnight at the start of that date.
    /// An all-day end that does not come after the start date is treated
    /// as covering the whole start day.
    pub fn end_utc(&self) -> DateTime<Utc> {
        match &self.end {
            EventTime::DateTime(dt) => *dt,
            EventTime::AllDay(date) => {
                if *date <= self.start.date() && self.start.is_all_day() {
                    start_of_day(self.start.date()) + Duration::days(1)
                } else {
                    start_of_day(*date)
                }
            }
        }
    }
}

/// A computed free interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeInterval {
    /// Start of the free interval (inclusive).
    pub start: DateTime<Utc>,
    /// End of the free interval (exclusive).
    pub end: DateTime<Utc>,
    /// Length of the interval in whole minutes (truncated).
    pub duration_minutes: i64,
}

impl FreeInterval {
    fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            duration_minutes: (end - start).num_minutes(),
        }
    }
}

/// Computes the free intervals of at least `min_duration_minutes` within
/// `[window_start, window_end)`.
///
/// Busy intervals may arrive in any order; they are sorted by start time,
/// then end time. Overlapping and contained intervals are absorbed by
/// advancing a cursor to the furthest busy end seen so far, so no
/// negative-length or duplicate gap is ever emitted. Intervals that end
/// before `window_start` have no effect, and gaps never extend past
/// `window_end`.
pub fn find_free_slots(
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    min_duration_minutes: u32,
    busy: &[BusyInterval],
) -> Vec<FreeInterval> {
    let min_duration = Duration::minutes(i64::from(min_duration_minutes));

    let mut resolved: Vec<(DateTime<Utc>, DateTime<Utc>)> = busy
        .iter()
        .map(|interval| (interval.start_utc(), interval.end_utc()))
        .collect();
    resolved.sort();

    let mut slots = Vec::new();
    let mut cursor = window_start;

    for (start, end) in resolved {
        let gap_end = start.min(window_end);
        if gap_end - cursor >= min_duration {
            slots.push(FreeInterval::between(cursor, gap_end));
        }
        cursor = cursor.max(end);
    }

    if window_end - cursor >= min_duration {
        slots.push(FreeInterval::between(cursor, window_end));
    }

    slots
}
