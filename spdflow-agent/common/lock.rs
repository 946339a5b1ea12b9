//! Cross-process SMBus arbitration
//!
//! Other monitoring software may drive the same host controller. Every
//! process that agrees on the lock file path serializes its transactions
//! through an exclusive `flock`.

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use nix::fcntl::{flock, FlockArg};

use crate::error::{Result, SpdflowError};

pub const DEFAULT_LOCK_PATH: &str = "/run/lock/spdflow-smbus.lock";

pub struct GlobalBusLock {
    file: File,
    path: PathBuf,
}

impl GlobalBusLock {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                SpdflowError::LockError(format!("Failed to open {}: {e}", path.display()))
            })?;

        tracing::debug!("Opened bus lock {}", path.display());
        Ok(Self { file, path })
    }

    /// Block until the lock is held; released when the guard drops
    pub fn acquire(&self) -> Result<GlobalBusGuard<'_>> {
        flock(self.file.as_raw_fd(), FlockArg::LockExclusive).map_err(|e| {
            SpdflowError::LockError(format!("Failed to lock {}: {e}", self.path.display()))
        })?;
        Ok(GlobalBusGuard { lock: self })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub struct GlobalBusGuard<'a> {
    lock: &'a GlobalBusLock,
}

impl Drop for GlobalBusGuard<'_> {
    fn drop(&mut self) {
        let _ = flock(self.lock.file.as_raw_fd(), FlockArg::Unlock);
    }
}
