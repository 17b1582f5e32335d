//! NetView Core Engine — Subnet Discovery & Device Registry CLI
//!
//! Thin presentation shell over the reconciliation engine:
//! - One-shot and periodic discovery cycles
//! - Device registry and alert log queries (JSON to stdout)
//! - Device renaming and health reporting

use anyhow::{Context, Result};

use netview::{
    compute_health, log_error, log_stderr, measure_latency, read_io_counters, Database,
    EngineConfig, ReconciliationEngine,
};

mod cli;

use cli::CliCommand;

#[tokio::main]
async fn main() {
    let command = match cli::parse_cli_args(std::env::args()) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e:#}");
            std::process::exit(2);
        }
    };

    match command {
        CliCommand::Help => {
            println!("{}", cli::usage_text());
            return;
        }
        CliCommand::Version => {
            println!("{}", cli::version_text());
            return;
        }
        _ => {}
    }

    if let Err(e) = netview::logging::init_logging() {
        eprintln!("[WARN] Logging initialization failed: {}", e);
    }

    if let Err(e) = run(command).await {
        log_error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(command: CliCommand) -> Result<()> {
    let config = EngineConfig::from_env();
    let db_path = config
        .db_path
        .clone()
        .unwrap_or_else(Database::default_path);
    let db = Database::new(db_path)?;
    let engine = ReconciliationEngine::new(db, config);

    match command {
        CliCommand::Scan => {
            let devices = engine.run_cycle().await.context("Reconciliation failed")?;
            print_json(&devices)?;
        }
        CliCommand::Watch { interval } => {
            let interval = interval
                .map(std::time::Duration::from_secs)
                .unwrap_or(engine.config().scan_interval);
            watch_loop(&engine, interval).await;
        }
        CliCommand::Devices => {
            print_json(&engine.get_devices()?)?;
        }
        CliCommand::Alerts => {
            print_json(&engine.list_alerts()?)?;
        }
        CliCommand::Health => {
            let devices = engine.get_devices()?;
            let latency = measure_latency(&engine.config().latency_target).await;
            let (bytes_sent, bytes_recv) = read_io_counters();
            let report = compute_health(
                &devices,
                &latency,
                bytes_sent,
                bytes_recv,
                engine.config().scan_interval,
            );
            print_json(&report)?;
        }
        CliCommand::Rename { mac, name } => {
            engine.rename_device(&mac, &name)?;
            if name.is_empty() {
                log_stderr!("Cleared label for {}", mac);
            } else {
                log_stderr!("Renamed {} to '{}'", mac, name);
            }
        }
        CliCommand::Help | CliCommand::Version => unreachable!("handled before engine setup"),
    }

    Ok(())
}

/// Periodic scheduler: one cycle per tick, failures logged and retried
/// on the next tick, never propagated.
async fn watch_loop(engine: &ReconciliationEngine, interval: std::time::Duration) {
    log_stderr!(
        "Watching local subnet (interval: {}s). Press Ctrl+C to stop.",
        interval.as_secs()
    );

    loop {
        match engine.run_cycle().await {
            Ok(devices) => {
                let online = devices.iter().filter(|d| d.online).count();
                log_stderr!(
                    "Cycle complete: {} devices known, {} online",
                    devices.len(),
                    online
                );
            }
            Err(e) => {
                log_error!("Reconciliation cycle failed: {:#}", e);
            }
        }

        tokio::time::sleep(interval).await;
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}
