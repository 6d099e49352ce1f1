//! Timezone projection: combine a calendar date with a wall-clock time of
//! day in a named IANA zone and produce the UTC instant.
//!
//! Wall-clock time is preserved across DST transitions, not the UTC offset:
//! two occurrences either side of a transition differ by a non-24h multiple.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

use crate::error::CoreError;

/// Resolves an IANA timezone name. Falling back to a default zone is the
/// caller's decision, not this module's.
pub fn resolve_timezone(name: &str) -> Result<Tz, CoreError> {
    Tz::from_str(name).map_err(|_| CoreError::UnknownTimezone(name.to_string()))
}

/// Projects `date + time` as a local wall-clock moment in `tz` to UTC.
///
/// Ambiguous local times (DST fall-back) resolve to the earliest offset.
/// Nonexistent local times (the spring-forward gap) shift forward to the
/// first valid wall-clock moment after the gap.
pub fn project(date: NaiveDate, time: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let local = date.and_time(time);
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            // Probe forward in half-hour steps; gaps are offset-change sized,
            // so a valid moment exists within a couple of hours.
            let mut probe = local;
            for _ in 0..48 {
                probe += Duration::minutes(30);
                if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
                    return dt.with_timezone(&Utc);
                }
            }
            // No real zone has a day-long gap; treat the naive moment as UTC.
            Utc.from_utc_datetime(&local)
        }
    }
}
