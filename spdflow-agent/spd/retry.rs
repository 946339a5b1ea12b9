//! Retrying SPD reads across transient bus contention

use std::time::Duration;

use spdflow_raw::SmbusResult;

/// Pause between SPD accesses and between retries
pub const SPD_IO_DELAY: Duration = Duration::from_millis(spdflow_raw::spd::SPD_IO_DELAY_MS);

/// Run `op`, retrying up to `retries` more times while it fails with
/// `Busy` or `Timeout`. Any other outcome is returned as is.
pub fn retry_transient<T, F>(retries: u32, delay: Duration, mut op: F) -> SmbusResult<T>
where
    F: FnMut() -> SmbusResult<T>,
{
    let mut result = op();
    let mut remaining = retries;

    while let Err(e) = &result {
        if !e.is_transient() || remaining == 0 {
            break;
        }
        remaining -= 1;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        result = op();
    }

    result
}
