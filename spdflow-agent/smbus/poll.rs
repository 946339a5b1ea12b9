//! Status polling shared by every host controller family

use std::time::Duration;

use spdflow_raw::controller::{MAX_RETRIES, POLL_INTERVAL_US};
use spdflow_raw::SmbusResult;

/// How often and how long to poll a status register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_retries: u32,
}

impl PollPolicy {
    /// Transaction completion on i801/PIIX4 hosts
    pub const COMPLETION: PollPolicy = PollPolicy {
        interval: Duration::from_micros(POLL_INTERVAL_US),
        max_retries: MAX_RETRIES,
    };

    /// Manual-mode completion and FIFO refill on Nuvoton Super-I/O hosts
    pub const SUPERIO: PollPolicy = PollPolicy {
        interval: Duration::from_millis(1),
        max_retries: MAX_RETRIES,
    };

    /// No sleeping between polls
    pub const fn immediate(max_retries: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::ZERO,
            max_retries,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::COMPLETION
    }
}

/// Last status observed by [`poll_status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Polled {
    pub status: u8,
    pub timed_out: bool,
}

/// Sleep-then-read until `done` accepts the status or the retry ceiling is hit.
///
/// The status register is read at most `max_retries + 1` times.
pub fn poll_status<R, D>(policy: &PollPolicy, mut read: R, mut done: D) -> SmbusResult<Polled>
where
    R: FnMut() -> SmbusResult<u8>,
    D: FnMut(u8) -> bool,
{
    let mut status = 0;
    for _ in 0..=policy.max_retries {
        if !policy.interval.is_zero() {
            std::thread::sleep(policy.interval);
        }
        status = read()?;
        if done(status) {
            return Ok(Polled {
                status,
                timed_out: false,
            });
        }
    }

    Ok(Polled {
        status,
        timed_out: true,
    })
}
