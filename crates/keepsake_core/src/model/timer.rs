//! Anniversary countdown/elapsed timer.

use chrono::{DateTime, FixedOffset, TimeZone};

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;

/// Time between the anniversary and `now`, split for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    /// `true` when the anniversary is still ahead and the values count down.
    pub is_upcoming: bool,
}

impl Elapsed {
    pub fn between<Tz: TimeZone>(anniversary: &DateTime<FixedOffset>, now: &DateTime<Tz>) -> Self {
        let delta = now.timestamp() - anniversary.timestamp();
        let is_upcoming = delta < 0;
        let total = delta.abs();
        Self {
            days: total / SECONDS_PER_DAY,
            hours: (total % SECONDS_PER_DAY) / SECONDS_PER_HOUR,
            minutes: (total % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE,
            seconds: total % SECONDS_PER_MINUTE,
            is_upcoming,
        }
    }

    pub fn total_seconds(&self) -> i64 {
        self.days * SECONDS_PER_DAY
            + self.hours * SECONDS_PER_HOUR
            + self.minutes * SECONDS_PER_MINUTE
            + self.seconds
    }
}
