//! Smoke CLI for `isoasset_core`.
//!
//! Usage: `isoasset_cli [<project_root> <config.json> <request>...]`
//!
//! Without arguments it prints the core version. With arguments it activates a
//! production-mode service over `project_root` and prints how each request
//! resolves through the module host.

use isoasset_core::{
    core_version, default_log_level, init_stderr_logging, IsoAssetService, LoadedModule,
    ModuleHost, ToolConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("isoasset_core version={}", core_version());

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        return ExitCode::SUCCESS;
    }
    if args.len() < 2 {
        eprintln!("usage: isoasset_cli [<project_root> <config.json> <request>...]");
        return ExitCode::from(2);
    }

    if let Err(err) = init_stderr_logging(default_log_level()) {
        eprintln!("logging disabled: {err}");
    }

    match run(PathBuf::from(&args[0]), &args[1], &args[2..]) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(
    project_root: PathBuf,
    config_path: &str,
    requests: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ToolConfig::from_file(config_path)?;
    let mut service = IsoAssetService::new(config)?;
    let mut host = ModuleHost::new();
    service.enable_aliasing(&mut host);
    service.activate_server(&mut host, &project_root)?;

    for request in requests {
        match host.load(request, &project_root)? {
            LoadedModule::Asset(Some(value)) => println!("{request} => {value}"),
            LoadedModule::Asset(None) => println!("{request} => (missing asset)"),
            LoadedModule::Source(source) => {
                println!("{request} => (default load, {} bytes)", source.len())
            }
        }
    }
    service.undo(&mut host);
    Ok(())
}
