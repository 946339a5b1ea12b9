//! SMBus transaction status codes
//!
//! The numeric values mirror the errno-style codes used by existing SMBus
//! tooling and must stay bit-exact. A transaction reports success as a
//! non-negative status and failure as the negated code.

/// Raw error numbers carried by [`SmbusError`]
pub mod errno {
    pub const EIO: i32 = 5;
    pub const ENXIO: i32 = 6;
    pub const EAGAIN: i32 = 11;
    pub const EBUSY: i32 = 16;
    pub const EINVAL: i32 = 22;
    pub const ENOTSUP: i32 = 129;
    pub const EOPNOTSUPP: i32 = 130;
    pub const EPROTO: i32 = 134;
    pub const ETIMEDOUT: i32 = 138;
}

pub type SmbusResult<T> = std::result::Result<T, SmbusError>;

/// Failure of a single SMBus transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum SmbusError {
    #[error("SMBus host is busy")]
    Busy,

    #[error("SMBus transaction timed out")]
    Timeout,

    #[error("no device acknowledged the address")]
    NoSuchDevice,

    #[error("SMBus transaction failed")]
    Io,

    #[error("bus error, transaction may be retried")]
    TryAgain,

    #[error("invalid transaction argument")]
    InvalidArgument,

    #[error("SMBus protocol violation")]
    Protocol,

    #[error("transaction type not supported")]
    NotSupported,

    #[error("operation not supported by this controller")]
    OpNotSupported,
}

impl SmbusError {
    pub const ALL: [SmbusError; 9] = [
        SmbusError::Busy,
        SmbusError::Timeout,
        SmbusError::NoSuchDevice,
        SmbusError::Io,
        SmbusError::TryAgain,
        SmbusError::InvalidArgument,
        SmbusError::Protocol,
        SmbusError::NotSupported,
        SmbusError::OpNotSupported,
    ];

    /// Positive error number
    pub const fn errno(self) -> i32 {
        match self {
            SmbusError::Busy => errno::EBUSY,
            SmbusError::Timeout => errno::ETIMEDOUT,
            SmbusError::NoSuchDevice => errno::ENXIO,
            SmbusError::Io => errno::EIO,
            SmbusError::TryAgain => errno::EAGAIN,
            SmbusError::InvalidArgument => errno::EINVAL,
            SmbusError::Protocol => errno::EPROTO,
            SmbusError::NotSupported => errno::ENOTSUP,
            SmbusError::OpNotSupported => errno::EOPNOTSUPP,
        }
    }

    /// Negative transaction status as reported by the host driver
    pub const fn status(self) -> i32 {
        -self.errno()
    }

    /// Map a negative transaction status back to an error.
    ///
    /// Returns `None` for success codes and unknown values.
    pub fn from_status(status: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.status() == status)
    }

    /// Busy and timeout conditions clear on their own and may be retried
    pub const fn is_transient(self) -> bool {
        matches!(self, SmbusError::Busy | SmbusError::Timeout)
    }
}

/// Collapse a transaction result into the signed status convention
pub fn to_status<T>(result: &SmbusResult<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.status(),
    }
}
