//! `bluebreeze` -- runs the bridge core against a scripted BLE producer.
//!
//! Forwarded events are printed to stdout, one per line. Logs go to stderr
//! so the event stream stays machine-readable with `--format json`.

mod cli;
mod output;
mod simulate;

use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Result, bail};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use bluebreeze_config::{
    Config, LogFormat, LogSettings, config_path, load_config, render_config, save_config,
};
use bluebreeze_core::{BleStore, Bridge, BridgeEvent};

use crate::cli::{Cli, Command, ConfigCommand, EventFormat, GlobalOpts, SimulateArgs};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    match cli.command {
        // Config commands run before the file is loaded so `init` works on a
        // path that does not exist yet.
        Command::Config(command) => config_cmd(command, &cli.global),
        Command::Simulate(args) => {
            let cfg = load_config(cli.global.config.as_deref())?;
            init_tracing(cli.global.verbose, &cfg.log);
            simulate_cmd(args, cfg).await
        }
    }
}

fn init_tracing(verbosity: u8, settings: &LogSettings) {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&settings.filter)),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match settings.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

// ── simulate ─────────────────────────────────────────────────────────

async fn simulate_cmd(args: SimulateArgs, mut cfg: Config) -> Result<()> {
    if let Some(devices) = args.devices {
        cfg.simulator.devices = devices;
    }
    if let Some(ticks) = args.ticks {
        cfg.simulator.ticks = ticks;
    }
    if let Some(interval_ms) = args.interval_ms {
        cfg.simulator.interval_ms = interval_ms;
    }
    if args.min_rssi.is_some() {
        cfg.bridge.min_scan_rssi = args.min_rssi;
    }
    cfg.validate()?;

    let store = Arc::new(BleStore::new(cfg.store));
    let bridge = Bridge::new(Arc::clone(&store), cfg.bridge);

    let (tx, rx) = mpsc::unbounded_channel::<BridgeEvent>();
    bridge.attach(tx);
    let printer = tokio::spawn(print_events(rx, args.format));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received");
            on_signal.cancel();
        }
    });

    let script = simulate::Script {
        devices: cfg.simulator.devices,
        ticks: cfg.simulator.ticks,
        interval: Duration::from_millis(cfg.simulator.interval_ms),
    };
    let outcome = simulate::run(Arc::clone(&store), script, cancel).await;

    let stats = bridge.tracker_stats();
    info!(
        devices = stats.devices,
        services = stats.services,
        characteristics = stats.characteristics,
        forwarders = stats.forwarders,
        "simulation finished"
    );

    // Detaching clears the sink, which drops the last sender so the printer
    // drains and exits.
    bridge.detach();
    printer.await??;
    outcome
}

async fn print_events(
    mut rx: mpsc::UnboundedReceiver<BridgeEvent>,
    format: EventFormat,
) -> Result<()> {
    let mut stdout = std::io::stdout();
    while let Some(event) = rx.recv().await {
        let line = output::render(&event, format)?;
        if writeln!(stdout, "{line}").is_err() {
            // Downstream closed the pipe.
            break;
        }
    }
    stdout.flush().ok();
    Ok(())
}

// ── config ───────────────────────────────────────────────────────────

fn config_cmd(command: ConfigCommand, global: &GlobalOpts) -> Result<()> {
    let path = global.config.clone().unwrap_or_else(config_path);
    match command {
        ConfigCommand::Path => {
            println!("{}", path.display());
        }
        ConfigCommand::Show => {
            let cfg = load_config(global.config.as_deref())?;
            print!("{}", render_config(&cfg)?);
        }
        ConfigCommand::Init { force } => init_config(&path, force)?,
    }
    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "config file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    save_config(&Config::default(), path)?;
    eprintln!("wrote {}", path.display());
    Ok(())
}
