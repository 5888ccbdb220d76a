//! Runtime state shared between the service and its installed hooks.

use crate::error::{AssetError, AssetResult};
use crate::manifest::{Manifest, ManifestStore};
use crate::path::{absolutize, lexical_normalize};
use once_cell::unsync::OnceCell;
use std::cell::{Cell, Ref, RefCell};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Process-local state read by hooks on the loading thread.
///
/// # Invariants
/// - `manifest_file_path` is set once, at server activation.
/// - `cached_paths` only grows while development mode is on and is emptied
///   only by `take_cached_paths`.
#[derive(Debug, Default)]
pub struct RuntimeContext {
    project_root: OnceCell<PathBuf>,
    manifest_file_path: OnceCell<PathBuf>,
    development_mode: Cell<bool>,
    verbose: Cell<bool>,
    store: RefCell<ManifestStore>,
    cached_paths: RefCell<BTreeSet<PathBuf>>,
}

impl RuntimeContext {
    pub fn new(verbose: bool) -> Rc<Self> {
        let context = Self::default();
        context.verbose.set(verbose);
        Rc::new(context)
    }

    /// Fixes the project root and the manifest path derived from it.
    pub(crate) fn activate(&self, project_root: &Path, manifest_file: &str) -> AssetResult<()> {
        let (project_root, manifest_path) = activation_paths(project_root, manifest_file);
        self.project_root
            .set(project_root)
            .map_err(|_| AssetError::InvalidState("server is already activated"))?;
        self.manifest_file_path
            .set(manifest_path)
            .map_err(|_| AssetError::InvalidState("manifest path is already fixed"))
    }

    pub fn is_activated(&self) -> bool {
        self.project_root.get().is_some()
    }

    pub fn project_root(&self) -> AssetResult<&Path> {
        self.project_root
            .get()
            .map(PathBuf::as_path)
            .ok_or(AssetError::Configuration("project root is not set"))
    }

    pub fn manifest_file_path(&self) -> AssetResult<&Path> {
        self.manifest_file_path
            .get()
            .map(PathBuf::as_path)
            .ok_or(AssetError::Configuration("manifest path is not set"))
    }

    pub fn is_development(&self) -> bool {
        self.development_mode.get()
    }

    pub(crate) fn set_development(&self, flag: bool) {
        self.development_mode.set(flag);
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose.get()
    }

    pub fn load_manifest(&self) -> AssetResult<Rc<Manifest>> {
        let path = self.manifest_file_path()?;
        self.store.borrow_mut().load(path, self.is_development())
    }

    pub fn store(&self) -> Ref<'_, ManifestStore> {
        self.store.borrow()
    }

    pub(crate) fn invalidate_manifest(&self) -> bool {
        self.store.borrow_mut().invalidate()
    }

    pub(crate) fn track(&self, path: &Path) {
        if self.is_development() {
            self.cached_paths.borrow_mut().insert(path.to_path_buf());
        }
    }

    pub fn cached_paths(&self) -> Vec<PathBuf> {
        self.cached_paths.borrow().iter().cloned().collect()
    }

    pub(crate) fn take_cached_paths(&self) -> BTreeSet<PathBuf> {
        std::mem::take(&mut *self.cached_paths.borrow_mut())
    }
}

/// Absolute, dot-free project root and the manifest path below it.
///
/// Hooks compare these against host-resolved paths, which are always absolute
/// and folded.
pub(crate) fn activation_paths(project_root: &Path, manifest_file: &str) -> (PathBuf, PathBuf) {
    let root = absolutize(project_root);
    let manifest = lexical_normalize(&root.join(manifest_file));
    (root, manifest)
}
