use std::io;
use thiserror::Error;

use spdflow_raw::{PortError, SmbusError};

#[derive(Error, Debug)]
pub enum SpdflowError {
    #[error("Port I/O failed: {0}")]
    PortError(#[from] PortError),

    #[error("PCI operation failed: {0}")]
    PciError(String),

    #[error("SMBus transaction failed: {0}")]
    SmbusError(#[from] SmbusError),

    #[error("Super-I/O access failed: {0}")]
    SuperIoError(String),

    #[error("Bus lock failed: {0}")]
    LockError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Nix error: {0}")]
    NixError(#[from] nix::Error),

    #[error("Prometheus error: {0}")]
    PrometheusError(#[from] prometheus::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("No usable SMBus controller found")]
    NoBus,
}

pub type Result<T> = std::result::Result<T, SpdflowError>;
