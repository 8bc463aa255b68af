//! Billing rounding policy.
//!
//! Every closed entry bills in whole units of [`ROUNDING_UNIT_MINUTES`],
//! always rounding up. Elapsed time that comes out negative (clock skew or a
//! corrupted start time) clamps to exactly one unit.

use chrono::{DateTime, TimeDelta, Utc};

use crate::types::ValidationError;

/// Size of one billing unit in minutes.
pub const ROUNDING_UNIT_MINUTES: u32 = 15;

const UNIT_MS: u64 = 15 * 60 * 1000;

/// Largest representable duration that is still a whole number of units.
const MAX_DURATION_MINUTES: u32 = u32::MAX - u32::MAX % ROUNDING_UNIT_MINUTES;

/// Rounds an elapsed span up to the next whole unit, in minutes.
///
/// A zero-length span still bills one unit.
pub fn round_up_to_unit(elapsed: TimeDelta) -> u32 {
    let Ok(ms) = u64::try_from(elapsed.num_milliseconds()) else {
        return ROUNDING_UNIT_MINUTES;
    };
    let units = ms.div_ceil(UNIT_MS).max(1);
    units
        .checked_mul(u64::from(ROUNDING_UNIT_MINUTES))
        .and_then(|minutes| u32::try_from(minutes).ok())
        .unwrap_or(MAX_DURATION_MINUTES)
}

/// Billable minutes between two instants.
pub fn billable_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
    round_up_to_unit(end.signed_duration_since(start))
}

/// Returns true when `minutes` is a whole number of units.
pub const fn is_rounded(minutes: u32) -> bool {
    minutes % ROUNDING_UNIT_MINUTES == 0
}

/// Checks a manually entered duration before it is written through.
pub const fn validate_manual_duration(minutes: u32) -> Result<u32, ValidationError> {
    if is_rounded(minutes) {
        Ok(minutes)
    } else {
        Err(ValidationError::UnroundedDuration {
            value: minutes,
            unit: ROUNDING_UNIT_MINUTES,
        })
    }
}
