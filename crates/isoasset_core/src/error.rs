//! Error taxonomy for interception and manifest resolution.
//!
//! # Invariants
//! - Configuration and state violations are fatal and returned to the caller.
//! - Missing manifests (development mode) and missing assets are not errors;
//!   they are logged where they happen and never reach this type.

use crate::config::ConfigError;
use crate::waiter::WaitError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type AssetResult<T> = Result<T, AssetError>;

#[derive(Debug)]
pub enum AssetError {
    /// Runtime was used before a required value was configured.
    Configuration(&'static str),
    /// Operation is not permitted in the current mode.
    InvalidState(&'static str),
    /// Another hook already owns this extension.
    DuplicateExtension(String),
    /// Manifest file could not be read.
    ManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Manifest file is not valid JSON or lacks an `assets` mapping.
    ManifestParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    InvalidConfig(ConfigError),
    /// Startup wait for the manifest ended without finding it.
    Wait(WaitError),
}

impl Display for AssetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(details) => write!(f, "configuration error: {details}"),
            Self::InvalidState(details) => write!(f, "invalid state: {details}"),
            Self::DuplicateExtension(value) => {
                write!(f, "extension already has a load hook: {value}")
            }
            Self::ManifestRead { path, source } => {
                write!(f, "failed to read manifest `{}`: {source}", path.display())
            }
            Self::ManifestParse { path, source } => {
                write!(f, "failed to parse manifest `{}`: {source}", path.display())
            }
            Self::InvalidConfig(err) => write!(f, "invalid configuration: {err}"),
            Self::Wait(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AssetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ManifestRead { source, .. } => Some(source),
            Self::ManifestParse { source, .. } => Some(source),
            Self::InvalidConfig(err) => Some(err),
            Self::Wait(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for AssetError {
    fn from(value: ConfigError) -> Self {
        Self::InvalidConfig(value)
    }
}

impl From<WaitError> for AssetError {
    fn from(value: WaitError) -> Self {
        Self::Wait(value)
    }
}
