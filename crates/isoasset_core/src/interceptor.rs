//! Per-extension load hooks resolving asset requests through the manifest.
//!
//! # Responsibility
//! - Install one load hook per extension of an asset type.
//! - Map a claimed path to its manifest value, or decline it.
//! - Record claimed paths for development-mode eviction.
//!
//! # Invariants
//! - The manifest file itself is never intercepted.
//! - Paths outside the project root and paths rejected by policy are declined.
//! - A missing manifest entry is claimed with a placeholder, never declined.

use crate::error::AssetResult;
use crate::host::{HookToken, Interception, LoadHook, ModuleHost};
use crate::path::normalize;
use crate::policy::AssetTypeDescriptor;
use crate::runtime::RuntimeContext;
use log::{debug, info, warn};
use std::path::Path;
use std::rc::Rc;

/// One installed load hook.
#[derive(Debug, Clone)]
pub struct InterceptorRegistration {
    pub asset_type: String,
    pub extension: String,
    pub descriptor: Rc<AssetTypeDescriptor>,
    pub token: HookToken,
}

/// Load hook shared by every extension of one asset type.
pub struct AssetInterceptor {
    asset_type: String,
    descriptor: Rc<AssetTypeDescriptor>,
    runtime: Rc<RuntimeContext>,
}

impl AssetInterceptor {
    pub fn new(
        asset_type: impl Into<String>,
        descriptor: Rc<AssetTypeDescriptor>,
        runtime: Rc<RuntimeContext>,
    ) -> Self {
        Self {
            asset_type: asset_type.into(),
            descriptor,
            runtime,
        }
    }

    fn is_manifest_file(&self, path: &Path, extension: &str) -> AssetResult<bool> {
        let manifest_path = self.runtime.manifest_file_path()?;
        let manifest_extension = manifest_path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
        Ok(path == manifest_path && manifest_extension.as_deref() == Some(extension))
    }
}

impl LoadHook for AssetInterceptor {
    fn intercept(&self, path: &Path, extension: &str) -> AssetResult<Interception> {
        let root = self.runtime.project_root()?;
        if self.is_manifest_file(path, extension)? {
            return Ok(Interception::Declined);
        }

        let Some(key) = normalize(path, root) else {
            debug!(
                "event=intercept module=interceptor status=declined reason=outside_root path={}",
                path.display()
            );
            return Ok(Interception::Declined);
        };
        if !self.descriptor.accepts(&key) {
            debug!(
                "event=intercept module=interceptor status=declined reason=policy asset_type={} key={key}",
                self.asset_type
            );
            return Ok(Interception::Declined);
        }

        let manifest = self.runtime.load_manifest()?;
        let value = manifest.asset(&key).cloned();
        if value.is_none() {
            warn!(
                "event=intercept module=interceptor status=asset_not_found asset_type={} key={key}",
                self.asset_type
            );
        } else if self.runtime.is_verbose() {
            info!(
                "event=intercept module=interceptor status=ok asset_type={} key={key}",
                self.asset_type
            );
        } else {
            debug!(
                "event=intercept module=interceptor status=ok asset_type={} key={key}",
                self.asset_type
            );
        }

        self.runtime.track(path);
        Ok(Interception::Claimed(value))
    }
}

/// Installs hooks for every extension of `descriptor`.
///
/// Either all extensions are installed or none: on a failure the hooks already
/// installed for this descriptor are removed before the error is returned.
pub fn register(
    host: &mut ModuleHost,
    runtime: &Rc<RuntimeContext>,
    asset_type: &str,
    descriptor: Rc<AssetTypeDescriptor>,
) -> AssetResult<Vec<InterceptorRegistration>> {
    let hook: Rc<dyn LoadHook> = Rc::new(AssetInterceptor::new(
        asset_type,
        Rc::clone(&descriptor),
        Rc::clone(runtime),
    ));

    let mut installed = Vec::with_capacity(descriptor.extensions.len());
    for extension in &descriptor.extensions {
        match host.install_load_hook(extension, Rc::clone(&hook)) {
            Ok(token) => installed.push(InterceptorRegistration {
                asset_type: asset_type.to_string(),
                extension: extension.clone(),
                descriptor: Rc::clone(&descriptor),
                token,
            }),
            Err(err) => {
                unregister(host, &mut installed);
                return Err(err);
            }
        }
    }

    info!(
        "event=register module=interceptor status=ok asset_type={asset_type} extensions={}",
        installed.len()
    );
    Ok(installed)
}

/// Removes every hook in `registrations` and empties it.
///
/// Returns how many hooks were removed; a second call returns zero.
pub fn unregister(host: &mut ModuleHost, registrations: &mut Vec<InterceptorRegistration>) -> usize {
    registrations
        .drain(..)
        .filter(|registration| host.remove_hook(registration.token))
        .count()
}
