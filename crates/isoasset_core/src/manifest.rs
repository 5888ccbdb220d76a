//! Bundler manifest model and its in-process cache.
//!
//! # Responsibility
//! - Read the manifest written by the external asset build.
//! - Serve repeated loads from memory until explicitly invalidated.
//!
//! # Invariants
//! - Only the presence of the `assets` mapping is checked; values are opaque.
//! - A development-mode placeholder for a missing file is never cached.

use crate::error::{AssetError, AssetResult};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

/// Manifest emitted by the asset build step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Canonical key to resolved value (URL string or structured data).
    pub assets: BTreeMap<String, Value>,
    /// Entry-point script chunks.
    #[serde(default)]
    pub javascript: BTreeMap<String, Value>,
    /// Entry-point stylesheet chunks.
    #[serde(default)]
    pub styles: BTreeMap<String, Value>,
}

/// Borrowed view over the chunk maps of one manifest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chunks<'a> {
    pub javascript: &'a BTreeMap<String, Value>,
    pub styles: &'a BTreeMap<String, Value>,
}

impl Manifest {
    pub fn asset(&self, key: &str) -> Option<&Value> {
        self.assets.get(key)
    }

    pub fn chunks(&self) -> Chunks<'_> {
        Chunks {
            javascript: &self.javascript,
            styles: &self.styles,
        }
    }
}

/// Manifest cache with explicit invalidation.
#[derive(Debug, Default)]
pub struct ManifestStore {
    cached: Option<Rc<Manifest>>,
    disk_reads: u64,
}

impl ManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the manifest at `path`, reading it only on a cache miss.
    ///
    /// # Errors
    /// - `ManifestRead` when the file cannot be read, except for a missing
    ///   file in development mode, which yields an empty manifest.
    /// - `ManifestParse` when the content is not a manifest.
    pub fn load(&mut self, path: &Path, development: bool) -> AssetResult<Rc<Manifest>> {
        if let Some(manifest) = &self.cached {
            return Ok(Rc::clone(manifest));
        }

        if development && !path.exists() {
            warn!(
                "event=manifest_load module=manifest status=missing path={} fallback=empty",
                path.display()
            );
            return Ok(Rc::new(Manifest::default()));
        }

        let raw = std::fs::read_to_string(path).map_err(|source| AssetError::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;
        self.disk_reads += 1;
        let manifest: Manifest =
            serde_json::from_str(&raw).map_err(|source| AssetError::ManifestParse {
                path: path.to_path_buf(),
                source,
            })?;

        info!(
            "event=manifest_load module=manifest status=ok path={} assets={}",
            path.display(),
            manifest.assets.len()
        );
        let manifest = Rc::new(manifest);
        self.cached = Some(Rc::clone(&manifest));
        Ok(manifest)
    }

    /// Drops the cached manifest. Returns whether anything was cached.
    pub fn invalidate(&mut self) -> bool {
        let dropped = self.cached.take().is_some();
        debug!("event=manifest_invalidate module=manifest dropped={dropped}");
        dropped
    }

    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    /// Number of successful reads from disk since construction.
    pub fn disk_reads(&self) -> u64 {
        self.disk_reads
    }
}
