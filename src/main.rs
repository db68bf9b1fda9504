mod config;
mod error;
mod host;
mod plist;
mod routes;

use std::path::Path;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use config::{Command, Config};
use error::AppResult;
use host::macos::MacOsHost;
use host::{DryRunExecutor, RouteExecutor};
use routes::reconcile::{Decision, MutationStatus, RouteReconciler, RunReport};

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.as_str().to_ascii_lowercase()))
        .with_writer(std::io::stderr)
        .init();

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> AppResult<()> {
    if let Some(path) = &config.override_file {
        tracing::info!("[OVERRIDE] Found override file: {}", path.display());
    }
    for warning in &config.warnings {
        tracing::warn!("{}", warning);
    }

    match &config.command {
        Some(Command::RequestOption { code, remove, plist }) => {
            request_option(config, *code, *remove, plist)
        }
        None => apply_routes(config),
    }
}

fn apply_routes(config: &Config) -> AppResult<()> {
    if !config.skip_preflight {
        host::ensure_native_support_absent()?;
        if !config.dry_run {
            host::ensure_root()?;
        }
    }

    let host = MacOsHost;
    let executor: &dyn RouteExecutor = if config.dry_run { &DryRunExecutor } else { &host };
    let reconciler = RouteReconciler::new(&host, executor);

    let report = reconciler.run(&config.reconcile)?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn request_option(config: &Config, code: u8, remove: bool, path: &Path) -> AppResult<()> {
    if !config.skip_preflight {
        host::ensure_root()?;
    }

    let changed = if remove {
        plist::update_plist_file(path, |contents| plist::remove_requested_option(contents, code))?
    } else {
        plist::update_plist_file(path, |contents| plist::insert_requested_option(contents, code))?
    };

    match (changed, remove) {
        (true, false) => println!("Reboot to have DHCP requests with option {}", code),
        (true, true) => println!("Reboot to stop requesting DHCP option {}", code),
        (false, false) => println!("Option {} is already requested", code),
        (false, true) => println!("Option {} is not requested", code),
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!("{} ({}) at {}", report.hostname, report.interface, report.timestamp);
    if !report.lease_present {
        println!("  no DHCP lease, only stale routes were cleared");
    }

    for outcome in report.deleted.iter().chain(&report.added) {
        let status = match &outcome.status {
            MutationStatus::Applied => "ok".to_string(),
            MutationStatus::DryRun => "dry-run".to_string(),
            MutationStatus::Conflict(message) => format!("failed: {}", message),
        };
        println!("  route {} [{}]", outcome.mutation, status);
    }

    for planned in &report.planned {
        match planned.decision {
            Decision::Install => {}
            Decision::SkipAlreadyPresent => println!("  {} already present", planned.route),
            Decision::SkipUnreachableGateway => println!("  {} skipped, gateway unreachable", planned.route),
        }
    }

    let conflicts = report.conflicts();
    if conflicts > 0 {
        println!("  {} route change(s) rejected by the kernel", conflicts);
    }
}
