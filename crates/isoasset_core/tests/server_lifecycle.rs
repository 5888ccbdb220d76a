use isoasset_core::{
    AssetError, AssetTypeDescriptor, IsoAssetService, LoadError, LoadedModule, ModuleHost,
    ToolConfig, WaitError,
};
use serde_json::json;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;
use tempfile::TempDir;

const MANIFEST: &str = "webpack-assets.json";

fn styles_config() -> ToolConfig {
    ToolConfig::from_json_str(
        r#"{
            "assets": {
                "styles": { "extensions": ["css"], "include": [{ "pattern": "^styles/" }] },
                "images": { "extensions": ["png", "svg"], "exclude": ["images/raw.png"] }
            },
            "poll_interval_ms": 5
        }"#,
    )
    .expect("config should parse")
}

fn write_manifest(root: &Path, assets: serde_json::Value) {
    std::fs::write(root.join(MANIFEST), json!({ "assets": assets }).to_string())
        .expect("manifest should be written");
}

fn seed_project(root: &Path) {
    write_manifest(
        root,
        json!({
            "styles/main.css": "/build/main.abc123.css",
            "images/logo.png": "/build/logo.1f2e.png",
        }),
    );
    std::fs::create_dir_all(root.join("other")).unwrap();
    std::fs::write(root.join("other/x.css"), "body { margin: 0 }").unwrap();
}

fn project_with_manifest() -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    seed_project(dir.path());
    dir
}

#[test]
fn resolves_styles_through_manifest_and_declines_other_paths() {
    let dir = project_with_manifest();
    let mut service = IsoAssetService::new(styles_config()).unwrap();
    let mut host = ModuleHost::new();
    service.activate_server(&mut host, dir.path()).unwrap();

    assert_eq!(
        host.load("styles/main.css", dir.path()).unwrap(),
        LoadedModule::Asset(Some(json!("/build/main.abc123.css")))
    );
    assert_eq!(
        host.load("other/x.css", dir.path()).unwrap(),
        LoadedModule::Source("body { margin: 0 }".to_string())
    );
    assert_eq!(
        service.registered_extensions().into_iter().collect::<Vec<_>>(),
        vec!["css", "png", "svg"]
    );
}

#[test]
fn activation_callback_runs_once_in_production() {
    let dir = project_with_manifest();
    let mut service = IsoAssetService::new(styles_config()).unwrap();
    let mut host = ModuleHost::new();

    let mut calls = 0;
    service
        .activate_server_with(&mut host, dir.path(), || calls += 1)
        .unwrap();
    assert_eq!(calls, 1);
}

#[test]
fn unregistered_extension_falls_through_without_residue() {
    let dir = project_with_manifest();
    std::fs::create_dir_all(dir.path().join("styles")).unwrap();
    std::fs::write(dir.path().join("styles/main.css"), "/* source */").unwrap();
    let mut service = IsoAssetService::new(styles_config()).unwrap();
    let mut host = ModuleHost::new();
    service.activate_server(&mut host, dir.path()).unwrap();

    assert_eq!(service.unregister(&mut host, "styles"), 1);
    assert_eq!(service.unregister(&mut host, "styles"), 0);
    assert!(!host.has_load_hook("css"));
    assert_eq!(
        host.load("styles/main.css", dir.path()).unwrap(),
        LoadedModule::Source("/* source */".to_string())
    );
    assert!(host.has_load_hook("png"));
}

#[test]
fn undo_removes_every_hook() {
    let dir = project_with_manifest();
    let mut config = styles_config();
    config
        .alias
        .insert("brand".to_string(), "images".to_string());
    let mut service = IsoAssetService::new(config).unwrap();
    let mut host = ModuleHost::new();
    assert!(service.enable_aliasing(&mut host));
    service.activate_server(&mut host, dir.path()).unwrap();

    service.undo(&mut host);
    service.undo(&mut host);
    assert!(service.registered_extensions().is_empty());
    assert_eq!(host.resolve_hook_count(), 0);
    for extension in ["css", "png", "svg"] {
        assert!(!host.has_load_hook(extension));
    }
}

#[test]
fn alias_rewrites_before_extension_hooks() {
    let dir = project_with_manifest();
    let mut config = styles_config();
    config
        .alias
        .insert("brand".to_string(), "images".to_string());
    let mut service = IsoAssetService::new(config).unwrap();
    let mut host = ModuleHost::new();
    service.enable_aliasing(&mut host);
    service.activate_server(&mut host, dir.path()).unwrap();

    assert_eq!(
        host.load("brand/logo.png", Path::new("/elsewhere")).unwrap(),
        LoadedModule::Asset(Some(json!("/build/logo.1f2e.png")))
    );
}

#[test]
fn excluded_and_missing_assets_are_handled_without_failing() {
    let dir = project_with_manifest();
    std::fs::create_dir_all(dir.path().join("images")).unwrap();
    std::fs::write(dir.path().join("images/raw.png"), "png-bytes").unwrap();
    let mut service = IsoAssetService::new(styles_config()).unwrap();
    let mut host = ModuleHost::new();
    service.activate_server(&mut host, dir.path()).unwrap();

    assert_eq!(
        host.load("images/raw.png", dir.path()).unwrap(),
        LoadedModule::Source("png-bytes".to_string())
    );
    assert_eq!(
        host.load("images/unknown.svg", dir.path()).unwrap(),
        LoadedModule::Asset(None)
    );
}

#[test]
fn refresh_in_production_fails_without_eviction() {
    let dir = project_with_manifest();
    let mut service = IsoAssetService::new(styles_config()).unwrap();
    let mut host = ModuleHost::new();
    service.activate_server(&mut host, dir.path()).unwrap();
    host.load("styles/main.css", dir.path()).unwrap();

    let err = service.refresh(&mut host).unwrap_err();
    assert!(matches!(err, AssetError::InvalidState(_)));
    assert!(host.is_cached(&dir.path().join("styles/main.css")));
    assert!(service.runtime().store().is_cached());
    assert!(service.cached_paths().is_empty());
}

#[test]
fn development_refresh_rereads_manifest_and_clears_tracking() {
    let dir = project_with_manifest();
    let mut service = IsoAssetService::new(styles_config()).unwrap();
    service.development();
    let mut host = ModuleHost::new();
    service.activate_server(&mut host, dir.path()).unwrap();

    let first = host.load("styles/main.css", dir.path()).unwrap();
    write_manifest(
        dir.path(),
        json!({ "styles/main.css": "/build/main.def456.css" }),
    );
    let second = host.load("styles/main.css", dir.path()).unwrap();
    assert_eq!(first, second);
    assert_eq!(service.runtime().store().disk_reads(), 1);
    assert_eq!(
        service.cached_paths(),
        vec![dir.path().join("styles/main.css")]
    );

    assert_eq!(service.refresh(&mut host).unwrap(), 1);
    assert!(service.cached_paths().is_empty());
    assert!(!service.runtime().store().is_cached());

    assert_eq!(
        host.load("styles/main.css", dir.path()).unwrap(),
        LoadedModule::Asset(Some(json!("/build/main.def456.css")))
    );
    assert_eq!(service.runtime().store().disk_reads(), 2);
}

#[test]
fn development_activation_waits_for_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let writer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        write_manifest(&root, json!({ "styles/main.css": "/build/late.css" }));
    });

    let mut service = IsoAssetService::new(styles_config()).unwrap();
    service.set_development_mode(true);
    let mut host = ModuleHost::new();
    let mut manifest_seen = false;
    service
        .activate_server_with(&mut host, dir.path(), || {
            manifest_seen = dir.path().join(MANIFEST).exists()
        })
        .unwrap();
    writer.join().unwrap();

    assert!(manifest_seen);
    assert_eq!(
        service.asset("styles/main.css").unwrap(),
        Some(json!("/build/late.css"))
    );
}

#[test]
fn bounded_development_wait_reports_exhaustion() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = styles_config();
    config.max_wait_polls = Some(2);
    let mut service = IsoAssetService::new(config).unwrap();
    service.development();
    let mut host = ModuleHost::new();

    let err = service.activate_server(&mut host, dir.path()).unwrap_err();
    assert!(matches!(
        err,
        AssetError::Wait(WaitError::Exhausted { polls: 2 })
    ));
}

#[test]
fn cancelled_wait_never_runs_callback() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = IsoAssetService::new(styles_config()).unwrap();
    service.development();
    service.cancel_token().cancel();
    let mut host = ModuleHost::new();

    let mut called = false;
    let err = service
        .activate_server_with(&mut host, dir.path(), || called = true)
        .unwrap_err();
    assert!(matches!(err, AssetError::Wait(WaitError::Cancelled { .. })));
    assert!(!called);
}

#[test]
fn load_before_activation_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = IsoAssetService::new(styles_config()).unwrap();
    let mut host = ModuleHost::new();
    let descriptor = styles_config().descriptors().unwrap()["styles"].clone();
    service
        .register(&mut host, "styles", Rc::new(descriptor))
        .unwrap();

    let err = host.load("styles/main.css", dir.path()).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Hook(AssetError::Configuration(_))
    ));
}

#[test]
fn missing_manifest_in_development_yields_placeholder() {
    let dir = project_with_manifest();
    let mut service = IsoAssetService::new(styles_config()).unwrap();
    service.development();
    let mut host = ModuleHost::new();
    service.activate_server(&mut host, dir.path()).unwrap();

    std::fs::remove_file(dir.path().join(MANIFEST)).unwrap();
    service.refresh(&mut host).unwrap();
    assert_eq!(
        host.load("styles/main.css", dir.path()).unwrap(),
        LoadedModule::Asset(None)
    );
    assert!(service.manifest().unwrap().assets.is_empty());
}

#[test]
fn duplicate_extension_across_types_is_rejected_at_activation() {
    let dir = project_with_manifest();
    let config = ToolConfig::from_json_str(
        r#"{
            "assets": {
                "images": { "extensions": ["svg", "png"] },
                "vectors": { "extension": "svg" }
            }
        }"#,
    )
    .unwrap();
    let mut service = IsoAssetService::new(config).unwrap();
    let mut host = ModuleHost::new();

    let err = service.activate_server(&mut host, dir.path()).unwrap_err();
    assert!(matches!(err, AssetError::DuplicateExtension(ext) if ext == "svg"));
    assert!(!host.has_load_hook("png"));
    assert!(service.registered_extensions().is_empty());
}

#[test]
fn relative_project_root_is_anchored_at_current_dir() {
    let dir = tempfile::tempdir_in(".").expect("temp dir under the working directory");
    seed_project(dir.path());
    let relative = dir
        .path()
        .strip_prefix(std::env::current_dir().unwrap())
        .unwrap_or(dir.path())
        .to_path_buf();
    assert!(relative.is_relative());

    let mut service = IsoAssetService::new(styles_config()).unwrap();
    service.development();
    let mut host = ModuleHost::new();
    service.activate_server(&mut host, &relative).unwrap();

    assert_eq!(
        host.load("styles/main.css", &relative).unwrap(),
        LoadedModule::Asset(Some(json!("/build/main.abc123.css")))
    );
    let absolute_root = std::env::current_dir().unwrap().join(&relative);
    assert_eq!(
        service.runtime().project_root().unwrap(),
        absolute_root.as_path()
    );
    assert_eq!(
        service.cached_paths(),
        vec![absolute_root.join("styles/main.css")]
    );
    assert_eq!(service.refresh(&mut host).unwrap(), 1);
}

#[test]
fn dotted_project_root_still_matches_resolved_paths() {
    let dir = project_with_manifest();
    let dotted = dir.path().join("other/./../.");
    let mut service = IsoAssetService::new(styles_config()).unwrap();
    let mut host = ModuleHost::new();
    service.activate_server(&mut host, &dotted).unwrap();

    assert_eq!(
        host.load("styles/main.css", dir.path()).unwrap(),
        LoadedModule::Asset(Some(json!("/build/main.abc123.css")))
    );
    assert_eq!(service.runtime().project_root().unwrap(), dir.path());
}

#[test]
fn aliasing_before_activation_only_fails_aliased_requests() {
    let dir = project_with_manifest();
    let mut config = styles_config();
    config
        .alias
        .insert("brand".to_string(), "images".to_string());
    let mut service = IsoAssetService::new(config).unwrap();
    let mut host = ModuleHost::new();
    assert!(service.enable_aliasing(&mut host));

    assert_eq!(
        host.load("other/x.css", dir.path()).unwrap(),
        LoadedModule::Source("body { margin: 0 }".to_string())
    );
    let err = host.load("brand/logo.png", dir.path()).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Hook(AssetError::Configuration(_))
    ));
}

#[test]
fn activation_can_be_retried_after_duplicate_extension() {
    let dir = project_with_manifest();
    let config = ToolConfig::from_json_str(
        r#"{
            "assets": {
                "images": { "extensions": ["svg", "png"] },
                "vectors": { "extension": "svg" }
            }
        }"#,
    )
    .unwrap();
    let mut service = IsoAssetService::new(config).unwrap();
    let mut host = ModuleHost::new();

    service.activate_server(&mut host, dir.path()).unwrap_err();
    assert!(!service.runtime().is_activated());

    service
        .add_asset_type("vectors", AssetTypeDescriptor::new(["eps"]))
        .unwrap();
    service.activate_server(&mut host, dir.path()).unwrap();
    for extension in ["eps", "png", "svg"] {
        assert!(host.has_load_hook(extension));
    }
    assert_eq!(
        host.load("images/logo.png", dir.path()).unwrap(),
        LoadedModule::Asset(Some(json!("/build/logo.1f2e.png")))
    );
}

#[test]
fn exhausted_wait_leaves_no_hooks_and_allows_retry() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = styles_config();
    config.max_wait_polls = Some(1);
    let mut service = IsoAssetService::new(config).unwrap();
    service.development();
    let mut host = ModuleHost::new();

    let err = service.activate_server(&mut host, dir.path()).unwrap_err();
    assert!(matches!(err, AssetError::Wait(WaitError::Exhausted { .. })));
    assert!(!host.has_load_hook("css"));
    assert!(service.registered_extensions().is_empty());
    assert!(!service.runtime().is_activated());

    write_manifest(dir.path(), json!({ "styles/main.css": "/build/main.css" }));
    service.activate_server(&mut host, dir.path()).unwrap();
    assert_eq!(
        host.load("styles/main.css", dir.path()).unwrap(),
        LoadedModule::Asset(Some(json!("/build/main.css")))
    );
}

#[test]
fn cancel_token_stops_wait_from_another_thread() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = IsoAssetService::new(styles_config()).unwrap();
    service.development();
    let token = service.cancel_token();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        token.cancel();
    });
    let mut host = ModuleHost::new();

    let err = service.activate_server(&mut host, dir.path()).unwrap_err();
    canceller.join().unwrap();
    assert!(matches!(err, AssetError::Wait(WaitError::Cancelled { .. })));
    assert!(!host.has_load_hook("css"));
}
