//! Tool configuration and its validation.
//!
//! # Responsibility
//! - Deserialize the JSON configuration shared with the asset build.
//! - Compile asset type entries into [`AssetTypeDescriptor`]s.
//!
//! # Invariants
//! - `manifest_file_path` is relative and has no `..` segment; it is joined to
//!   the project root at server activation.
//! - Every asset type declares at least one valid extension.
//!
//! Predicate matchers cannot be expressed in JSON; attach them with
//! `IsoAssetService::add_asset_type`.

use crate::policy::{normalize_extension, AssetTypeDescriptor, Matcher};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Component, Path};
use std::time::Duration;

pub const DEFAULT_MANIFEST_FILE_PATH: &str = "webpack-assets.json";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolConfig {
    /// Asset type name to its declaration.
    #[serde(default)]
    pub assets: BTreeMap<String, AssetTypeConfig>,
    /// Request prefix to project-relative target.
    #[serde(default)]
    pub alias: BTreeMap<String, String>,
    #[serde(default = "default_manifest_file_path")]
    pub manifest_file_path: String,
    /// Promotes per-load diagnostics from `debug` to `info`.
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Caps the startup wait; `None` waits indefinitely.
    #[serde(default)]
    pub max_wait_polls: Option<u32>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            assets: BTreeMap::new(),
            alias: BTreeMap::new(),
            manifest_file_path: default_manifest_file_path(),
            debug: false,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_wait_polls: None,
        }
    }
}

/// Declaration of one asset type as written in the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AssetTypeConfig {
    /// Single-extension shorthand, merged with `extensions`.
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub include: Vec<MatcherConfig>,
    #[serde(default)]
    pub exclude: Vec<MatcherConfig>,
}

/// Serialized matcher: a bare string is a literal key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum MatcherConfig {
    Literal(String),
    Pattern { pattern: String },
}

impl ToolConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    /// Checks declaration-level invariants without touching the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let manifest_path = self.manifest_file_path.trim();
        if manifest_path.is_empty() {
            return Err(ConfigError::EmptyManifestPath);
        }
        if Path::new(manifest_path).is_absolute() {
            return Err(ConfigError::AbsoluteManifestPath(manifest_path.to_string()));
        }
        if Path::new(manifest_path)
            .components()
            .any(|component| component == Component::ParentDir)
        {
            return Err(ConfigError::EscapingManifestPath(manifest_path.to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        for (name, entry) in &self.assets {
            entry.compile(name)?;
        }
        Ok(())
    }

    /// Compiles every asset type entry, keyed by type name.
    pub fn descriptors(&self) -> Result<BTreeMap<String, AssetTypeDescriptor>, ConfigError> {
        self.assets
            .iter()
            .map(|(name, entry)| Ok((name.clone(), entry.compile(name)?)))
            .collect()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl AssetTypeConfig {
    pub fn compile(&self, type_name: &str) -> Result<AssetTypeDescriptor, ConfigError> {
        let mut descriptor = AssetTypeDescriptor::default();
        for raw in self.extension.iter().chain(self.extensions.iter()) {
            let extension =
                normalize_extension(raw).ok_or_else(|| ConfigError::InvalidExtension {
                    asset_type: type_name.to_string(),
                    value: raw.clone(),
                })?;
            descriptor.extensions.insert(extension);
        }
        if descriptor.extensions.is_empty() {
            return Err(ConfigError::MissingExtensions(type_name.to_string()));
        }

        descriptor.include = compile_matchers(type_name, &self.include)?;
        descriptor.exclude = compile_matchers(type_name, &self.exclude)?;
        Ok(descriptor)
    }
}

fn compile_matchers(
    type_name: &str,
    entries: &[MatcherConfig],
) -> Result<Vec<Matcher>, ConfigError> {
    entries
        .iter()
        .map(|entry| match entry {
            MatcherConfig::Literal(value) => Ok(Matcher::literal(value.as_str())),
            MatcherConfig::Pattern { pattern } => {
                Matcher::pattern(pattern).map_err(|err| ConfigError::InvalidPattern {
                    asset_type: type_name.to_string(),
                    pattern: pattern.clone(),
                    message: err.to_string(),
                })
            }
        })
        .collect()
}

fn default_manifest_file_path() -> String {
    DEFAULT_MANIFEST_FILE_PATH.to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Read { path: String, message: String },
    Parse(String),
    EmptyManifestPath,
    AbsoluteManifestPath(String),
    EscapingManifestPath(String),
    ZeroPollInterval,
    MissingExtensions(String),
    InvalidExtension { asset_type: String, value: String },
    InvalidPattern {
        asset_type: String,
        pattern: String,
        message: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, message } => write!(f, "failed to read config `{path}`: {message}"),
            Self::Parse(message) => write!(f, "config is not valid JSON: {message}"),
            Self::EmptyManifestPath => write!(f, "manifest_file_path must not be empty"),
            Self::AbsoluteManifestPath(value) => {
                write!(f, "manifest_file_path must be relative, got `{value}`")
            }
            Self::EscapingManifestPath(value) => {
                write!(f, "manifest_file_path must stay below the project root, got `{value}`")
            }
            Self::ZeroPollInterval => write!(f, "poll_interval_ms must be greater than zero"),
            Self::MissingExtensions(name) => {
                write!(f, "asset type `{name}` declares no extensions")
            }
            Self::InvalidExtension { asset_type, value } => {
                write!(f, "asset type `{asset_type}` has invalid extension `{value}`")
            }
            Self::InvalidPattern {
                asset_type,
                pattern,
                message,
            } => write!(
                f,
                "asset type `{asset_type}` has invalid pattern `{pattern}`: {message}"
            ),
        }
    }
}

impl Error for ConfigError {}
