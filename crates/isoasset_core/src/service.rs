//! Server-side asset service: the consumer-facing lifecycle.
//!
//! # Responsibility
//! - Own configuration, runtime state and every installed hook token.
//! - Activate server mode: fix the manifest path, install hooks, wait for the
//!   manifest in development mode.
//! - Refresh manifest and tracked load results in development mode.
//!
//! # Invariants
//! - Each extension has exactly one active registration.
//! - `refresh` mutates nothing outside development mode.
//! - `undo` removes every hook this service installed.
//! - A failed activation leaves no asset hook installed and no root fixed.
//!
//! The development-mode startup wait blocks the activating thread; only
//! [`IsoAssetService::cancel_token`], used from another thread, can stop it.

use crate::alias::AliasInterceptor;
use crate::config::ToolConfig;
use crate::error::{AssetError, AssetResult};
use crate::host::{HookToken, ModuleHost};
use crate::interceptor::{self, InterceptorRegistration};
use crate::manifest::Manifest;
use crate::policy::AssetTypeDescriptor;
use crate::runtime::{activation_paths, RuntimeContext};
use crate::waiter::{CancelToken, ManifestWaiter};
use log::{info, warn};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

pub struct IsoAssetService {
    config: ToolConfig,
    asset_types: BTreeMap<String, Rc<AssetTypeDescriptor>>,
    runtime: Rc<RuntimeContext>,
    registrations: Vec<InterceptorRegistration>,
    alias_registration: Option<HookToken>,
    cancel: CancelToken,
}

impl IsoAssetService {
    /// Builds a service in production mode from a validated configuration.
    pub fn new(config: ToolConfig) -> AssetResult<Self> {
        config.validate()?;
        let asset_types = config
            .descriptors()?
            .into_iter()
            .map(|(name, descriptor)| (name, Rc::new(descriptor)))
            .collect();
        let runtime = RuntimeContext::new(config.debug);
        Ok(Self {
            config,
            asset_types,
            runtime,
            registrations: vec![],
            alias_registration: None,
            cancel: CancelToken::new(),
        })
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    pub fn runtime(&self) -> &Rc<RuntimeContext> {
        &self.runtime
    }

    pub fn set_development_mode(&mut self, flag: bool) -> &mut Self {
        self.runtime.set_development(flag);
        self
    }

    /// Shorthand for `set_development_mode(true)`.
    pub fn development(&mut self) -> &mut Self {
        self.set_development_mode(true)
    }

    pub fn is_development(&self) -> bool {
        self.runtime.is_development()
    }

    /// Adds or replaces an asset type before activation.
    ///
    /// Use this for descriptors carrying predicate matchers.
    pub fn add_asset_type(
        &mut self,
        name: impl Into<String>,
        descriptor: AssetTypeDescriptor,
    ) -> AssetResult<()> {
        if self.runtime.is_activated() {
            return Err(AssetError::InvalidState(
                "asset types must be added before server activation",
            ));
        }
        self.asset_types.insert(name.into(), Rc::new(descriptor));
        Ok(())
    }

    /// Installs the alias hook when aliases are configured. Idempotent.
    pub fn enable_aliasing(&mut self, host: &mut ModuleHost) -> bool {
        if self.alias_registration.is_some() {
            return true;
        }
        let alias = AliasInterceptor::new(&self.config.alias, Rc::clone(&self.runtime));
        if alias.is_empty() {
            warn!("event=enable_aliasing module=service status=skipped reason=no_aliases");
            return false;
        }
        self.alias_registration = Some(host.install_resolve_hook(Rc::new(alias)));
        info!(
            "event=enable_aliasing module=service status=ok aliases={}",
            self.config.alias.len()
        );
        true
    }

    /// Activates server mode and returns once the manifest is available.
    pub fn activate_server(
        &mut self,
        host: &mut ModuleHost,
        project_root: impl AsRef<Path>,
    ) -> AssetResult<()> {
        self.activate_server_with(host, project_root, || {})
    }

    /// Activates server mode and runs `on_ready` once the manifest is available.
    ///
    /// Production mode runs `on_ready` immediately; development mode polls for
    /// the manifest first. The project root is made absolute against the
    /// current directory.
    ///
    /// A failed activation leaves the service unactivated with none of its
    /// asset hooks installed, so it can be reconfigured and retried.
    ///
    /// # Errors
    /// - `InvalidState` when the service was already activated.
    /// - `DuplicateExtension` when two asset types share an extension.
    /// - `Wait` when the startup wait is cancelled or exhausted.
    pub fn activate_server_with(
        &mut self,
        host: &mut ModuleHost,
        project_root: impl AsRef<Path>,
        on_ready: impl FnOnce(),
    ) -> AssetResult<()> {
        let started_at = Instant::now();
        if self.runtime.is_activated() {
            return Err(AssetError::InvalidState("server is already activated"));
        }
        let (project_root, manifest_path) =
            activation_paths(project_root.as_ref(), self.config.manifest_file_path.trim());

        let mut installed = match self.install_asset_hooks(host) {
            Ok(installed) => installed,
            Err(err) => {
                warn!("event=activate_server module=service status=error phase=hooks error={err}");
                return Err(err);
            }
        };

        if self.is_development() {
            let waited = ManifestWaiter::new(
                manifest_path.as_path(),
                self.config.poll_interval(),
                self.cancel.clone(),
            )
            .with_max_polls(self.config.max_wait_polls)
            .wait(|| {});
            if let Err(err) = waited {
                interceptor::unregister(host, &mut installed);
                warn!("event=activate_server module=service status=error phase=wait error={err}");
                return Err(err.into());
            }
        }

        if let Err(err) = self
            .runtime
            .activate(&project_root, self.config.manifest_file_path.trim())
        {
            interceptor::unregister(host, &mut installed);
            return Err(err);
        }
        self.registrations.extend(installed);
        on_ready();

        info!(
            "event=activate_server module=service status=ok development={} manifest={} hooks={} duration_ms={}",
            self.is_development(),
            manifest_path.display(),
            self.registrations.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Installs load hooks for one asset type.
    pub fn register(
        &mut self,
        host: &mut ModuleHost,
        asset_type: &str,
        descriptor: Rc<AssetTypeDescriptor>,
    ) -> AssetResult<()> {
        let installed = interceptor::register(host, &self.runtime, asset_type, descriptor)?;
        self.registrations.extend(installed);
        Ok(())
    }

    /// Removes the load hooks of one asset type. Returns how many were removed.
    pub fn unregister(&mut self, host: &mut ModuleHost, asset_type: &str) -> usize {
        let (mut removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.registrations)
            .into_iter()
            .partition(|registration| registration.asset_type == asset_type);
        self.registrations = kept;
        interceptor::unregister(host, &mut removed)
    }

    pub fn registered_extensions(&self) -> BTreeSet<String> {
        self.registrations
            .iter()
            .map(|registration| registration.extension.clone())
            .collect()
    }

    pub fn manifest(&self) -> AssetResult<Rc<Manifest>> {
        self.runtime.load_manifest()
    }

    /// Looks up one canonical key without going through the host.
    pub fn asset(&self, key: &str) -> AssetResult<Option<Value>> {
        Ok(self.manifest()?.asset(key).cloned())
    }

    /// Drops the cached manifest and every load result claimed since the last
    /// refresh. Returns how many host cache entries were evicted.
    ///
    /// # Errors
    /// - `InvalidState` outside development mode; nothing is evicted.
    pub fn refresh(&mut self, host: &mut ModuleHost) -> AssetResult<usize> {
        if !self.is_development() {
            return Err(AssetError::InvalidState(
                "refresh is only allowed in development mode",
            ));
        }

        self.runtime.invalidate_manifest();
        let tracked = self.runtime.take_cached_paths();
        let evicted = tracked.iter().filter(|path| host.evict(path)).count();
        info!(
            "event=refresh module=service status=ok tracked={} evicted={evicted}",
            tracked.len()
        );
        Ok(evicted)
    }

    /// Removes every hook this service installed.
    pub fn undo(&mut self, host: &mut ModuleHost) {
        let removed = self.unregister_all(host);
        info!("event=undo module=service status=ok removed={removed}");
    }

    /// Token that stops the development-mode startup wait from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cached_paths(&self) -> Vec<PathBuf> {
        self.runtime.cached_paths()
    }

    /// Installs every configured asset type; all or nothing.
    fn install_asset_hooks(
        &self,
        host: &mut ModuleHost,
    ) -> AssetResult<Vec<InterceptorRegistration>> {
        let mut installed = Vec::new();
        for (name, descriptor) in &self.asset_types {
            match interceptor::register(host, &self.runtime, name, Rc::clone(descriptor)) {
                Ok(registrations) => installed.extend(registrations),
                Err(err) => {
                    interceptor::unregister(host, &mut installed);
                    return Err(err);
                }
            }
        }
        Ok(installed)
    }

    fn unregister_all(&mut self, host: &mut ModuleHost) -> usize {
        let mut removed = interceptor::unregister(host, &mut self.registrations);
        if let Some(token) = self.alias_registration.take() {
            if host.remove_hook(token) {
                removed += 1;
            }
        }
        removed
    }
}
