//! Server-side loading of bundler-built assets.
//!
//! Load requests for configured file extensions are intercepted inside a
//! [`ModuleHost`] and answered from the manifest written by the asset build,
//! so server code can load images, styles and fonts like any other module.

pub mod alias;
pub mod config;
pub mod error;
pub mod host;
pub mod interceptor;
pub mod logging;
pub mod manifest;
pub mod path;
pub mod policy;
pub mod runtime;
pub mod service;
pub mod waiter;

pub use config::{AssetTypeConfig, ConfigError, MatcherConfig, ToolConfig};
pub use error::{AssetError, AssetResult};
pub use host::{
    HookToken, Interception, LoadError, LoadHook, LoadedModule, ModuleHost, ResolveHook,
};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status};
pub use manifest::{Chunks, Manifest, ManifestStore};
pub use policy::{decide, AssetTypeDescriptor, Matcher};
pub use service::IsoAssetService;
pub use waiter::{CancelToken, ManifestWaiter, WaitError, WaiterState};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
