//! Clock drift compensation.
//!
//! A playback snapshot is stale the moment it is written: while the room is
//! playing, the true position keeps advancing past `currentTime`. The
//! estimator re-derives the logical position from any snapshot plus the
//! current wall clock; it is invoked on every remote update and never
//! cached.

use crate::store::RoomRecord;

/// Adjusted playback position for `record` as of `now_ms`.
///
/// Elapsed times outside the open interval (0, `max_drift_secs`) indicate
/// clock skew, a stale write, or a just-written record; the raw
/// `currentTime` is returned unchanged to avoid large erroneous jumps.
pub fn estimate_position(record: &RoomRecord, now_ms: u64, max_drift_secs: f64) -> f64 {
    if !record.is_playing {
        return record.current_time;
    }
    let Some(last_update) = record.last_update else {
        return record.current_time;
    };
    let elapsed = (now_ms as f64 - last_update as f64) / 1000.0;
    if elapsed > 0.0 && elapsed < max_drift_secs {
        record.current_time + elapsed
    } else {
        record.current_time
    }
}
