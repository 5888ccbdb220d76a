//! Host module-loading pipeline that interceptors plug into.
//!
//! # Responsibility
//! - Rewrite requests through resolve hooks before default resolution.
//! - Dispatch resolved paths to the load hook owning their extension.
//! - Fall back to reading the file when no hook claims the load.
//! - Keep a load-result cache with explicit eviction.
//!
//! # Invariants
//! - At most one load hook per extension; a second install is rejected.
//! - A cached result is returned without consulting any hook.
//! - Hooks are identified only by the [`HookToken`] returned at install time.

use crate::error::{AssetError, AssetResult};
use crate::path::absolutize;
use crate::policy::normalize_extension;
use log::debug;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Disposal handle for one installed hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HookToken(u64);

/// Outcome of a load hook for one candidate path.
#[derive(Debug, Clone, PartialEq)]
pub enum Interception {
    /// The hook owns the load; `None` is the missing-asset placeholder.
    Claimed(Option<Value>),
    /// Fall through to default loading.
    Declined,
}

/// Hook consulted after resolution for paths with a given extension.
pub trait LoadHook {
    fn intercept(&self, path: &Path, extension: &str) -> AssetResult<Interception>;
}

/// Hook consulted before default resolution; `None` leaves the request as is.
pub trait ResolveHook {
    fn rewrite(&self, request: &str) -> AssetResult<Option<PathBuf>>;
}

/// Result of one load through the host.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedModule {
    /// Synthesized by a load hook.
    Asset(Option<Value>),
    /// Read from disk by the default loader.
    Source(String),
}

#[derive(Debug)]
pub enum LoadError {
    Hook(AssetError),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hook(err) => write!(f, "load hook failed: {err}"),
            Self::Io { path, source } => {
                write!(f, "failed to load `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Hook(err) => Some(err),
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<AssetError> for LoadError {
    fn from(value: AssetError) -> Self {
        Self::Hook(value)
    }
}

#[derive(Default)]
pub struct ModuleHost {
    resolve_hooks: Vec<(HookToken, Rc<dyn ResolveHook>)>,
    load_hooks: BTreeMap<String, (HookToken, Rc<dyn LoadHook>)>,
    cache: HashMap<PathBuf, LoadedModule>,
    next_token: u64,
}

impl ModuleHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a resolve hook; earlier hooks take priority.
    pub fn install_resolve_hook(&mut self, hook: Rc<dyn ResolveHook>) -> HookToken {
        let token = self.issue_token();
        self.resolve_hooks.push((token, hook));
        token
    }

    /// Installs the load hook for `extension`.
    ///
    /// # Errors
    /// - `DuplicateExtension` when another hook already owns the extension.
    /// - `InvalidState` when `extension` is not a bare file extension.
    pub fn install_load_hook(
        &mut self,
        extension: &str,
        hook: Rc<dyn LoadHook>,
    ) -> AssetResult<HookToken> {
        let extension = normalize_extension(extension)
            .ok_or(AssetError::InvalidState("load hook extension is not valid"))?;
        if self.load_hooks.contains_key(&extension) {
            return Err(AssetError::DuplicateExtension(extension));
        }
        let token = self.issue_token();
        self.load_hooks.insert(extension, (token, hook));
        Ok(token)
    }

    /// Removes the hook behind `token`. Returns false when it is already gone.
    pub fn remove_hook(&mut self, token: HookToken) -> bool {
        let before = self.resolve_hooks.len() + self.load_hooks.len();
        self.resolve_hooks.retain(|(owned, _)| *owned != token);
        self.load_hooks.retain(|_, (owned, _)| *owned != token);
        before != self.resolve_hooks.len() + self.load_hooks.len()
    }

    pub fn has_load_hook(&self, extension: &str) -> bool {
        normalize_extension(extension).is_some_and(|ext| self.load_hooks.contains_key(&ext))
    }

    pub fn resolve_hook_count(&self) -> usize {
        self.resolve_hooks.len()
    }

    /// Resolves `request` against `from_dir`, applying resolve hooks first.
    ///
    /// The result is always absolute, with dot segments folded.
    pub fn resolve(&self, request: &str, from_dir: &Path) -> AssetResult<PathBuf> {
        for (_, hook) in &self.resolve_hooks {
            if let Some(rewritten) = hook.rewrite(request)? {
                return Ok(absolutize(&rewritten));
            }
        }
        let requested = Path::new(request);
        if requested.is_absolute() {
            return Ok(absolutize(requested));
        }
        Ok(absolutize(&from_dir.join(requested)))
    }

    /// Loads `request` as seen from `from_dir`.
    pub fn load(&mut self, request: &str, from_dir: &Path) -> Result<LoadedModule, LoadError> {
        let path = self.resolve(request, from_dir)?;
        if let Some(cached) = self.cache.get(&path) {
            return Ok(cached.clone());
        }

        let hook = path
            .extension()
            .and_then(|ext| normalize_extension(&ext.to_string_lossy()))
            .and_then(|ext| {
                self.load_hooks
                    .get(&ext)
                    .map(|(_, hook)| (ext, Rc::clone(hook)))
            });

        let loaded = match hook {
            Some((ext, hook)) => match hook.intercept(&path, &ext)? {
                Interception::Claimed(value) => LoadedModule::Asset(value),
                Interception::Declined => default_load(&path)?,
            },
            None => default_load(&path)?,
        };

        self.cache.insert(path, loaded.clone());
        Ok(loaded)
    }

    /// Drops one cached load result. Returns whether it was cached.
    pub fn evict(&mut self, path: &Path) -> bool {
        self.cache.remove(path).is_some()
    }

    pub fn is_cached(&self, path: &Path) -> bool {
        self.cache.contains_key(path)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    fn issue_token(&mut self) -> HookToken {
        self.next_token += 1;
        HookToken(self.next_token)
    }
}

fn default_load(path: &Path) -> Result<LoadedModule, LoadError> {
    debug!("event=default_load module=host path={}", path.display());
    std::fs::read_to_string(path)
        .map(LoadedModule::Source)
        .map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })
}
