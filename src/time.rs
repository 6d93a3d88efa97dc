use std::time::SystemTime;

use thiserror::Error;

/// Errors that can occur when reading the wall clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimeError {
    /// System time is before UNIX epoch
    #[error("system time is before the UNIX epoch")]
    SystemTimeBeforeEpoch,
}

/// Returns the current wall-clock time in milliseconds since the UNIX epoch.
///
/// # Errors
/// Returns `TimeError::SystemTimeBeforeEpoch` if system time is before the
/// UNIX epoch.
pub fn try_stamp64() -> Result<u64, TimeError> {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|_| TimeError::SystemTimeBeforeEpoch)
}

/// Returns the current wall-clock time as a 16-bit millisecond stamp
/// (milliseconds modulo 65536). Used for the short timestamps exchanged by
/// the latency planner.
pub fn try_stamp16() -> Result<u16, TimeError> {
    try_stamp64().map(to_stamp16)
}

/// Truncates a full millisecond timestamp to its 16-bit wire form.
pub fn to_stamp16(stamp64: u64) -> u16 {
    (stamp64 & 0xFFFF) as u16
}

/// Elapsed milliseconds between two 16-bit stamps, honoring the wrap.
/// Only meaningful when the true gap is under 65536ms.
pub fn wrap16_elapsed(now16: u16, then16: u16) -> u16 {
    now16.wrapping_sub(then16)
}
