//! `odom-cli` – motor odometry node
//!
//! This binary wires the odometry stack together and runs it until Ctrl-C:
//!
//! 1. Loads `~/.motor_odom/config.toml` (writing the defaults on first run)
//!    and applies `ODOM_*` environment overrides.
//! 2. Starts the rosbridge WebSocket server so encoder clients can publish
//!    samples and consumers can subscribe to the estimates.
//! 3. Optionally drives a simulated encoder for headless runs.
//! 4. Runs the single-threaded odometry loop and prints its counters on exit.

mod config;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use tokio::sync::watch;
use tracing::{error, info, warn};

use odom_hal::SimEncoder;
use odom_middleware::{BusPublisher, EventBus, RosBridge};
use odom_runtime::{LoopStats, OdomLoop, init_tracing, spawn_encoder_feed};
use odom_types::OdomError;

fn main() -> ExitCode {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG sets the filter (default "info"); ODOM_LOG_FORMAT=json
    // switches to JSON lines. User-facing output still uses println!.
    let _telemetry = init_tracing("motor_odom");

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let mut cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };
    config::apply_env_overrides(&mut cfg);
    if let Err(e) = cfg.validate() {
        println!("{}: {}", "Config error".red(), e);
        return ExitCode::FAILURE;
    }
    print_summary(&cfg);

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        let _ = shutdown_tx.send(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // The node is single-threaded: one runtime thread serves every task.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cfg, shutdown_rx)) {
        Ok(stats) => {
            print_stats(&stats);
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{}: {}", "Startup error".red(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: config::Config, shutdown: watch::Receiver<bool>) -> Result<LoopStats, OdomError> {
    let bus = Arc::new(EventBus::new(cfg.bus_capacity));
    // Subscribe before any producer starts so no sample is missed.
    let samples = bus.subscribe_samples();
    let odom_loop = OdomLoop::new(cfg.odometry.clone(), BusPublisher::new(Arc::clone(&bus)))?;

    if cfg.bridge.enabled {
        let bridge = RosBridge::new(Arc::clone(&bus), cfg.topics.clone().into());
        let addr = cfg.bridge.bind;
        tokio::spawn(async move {
            if let Err(e) = bridge.run_ws_server(addr).await {
                error!(error = %e, "rosbridge server stopped");
            }
        });
    } else {
        info!("rosbridge server disabled");
    }

    let feed = cfg.sim.enabled.then(|| {
        spawn_encoder_feed(
            SimEncoder::new("sim", cfg.sim.ticks_per_second),
            Arc::clone(&bus),
            Duration::from_millis(cfg.sim.period_ms),
        )
    });

    let stats = odom_loop.run(samples, shutdown).await;

    if let Some(feed) = feed {
        feed.abort();
    }
    Ok(stats)
}

// ─────────────────────────────────────────────────────────────────────────────
// Console output
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", "  ┌─────────────────────────────┐".bold().cyan());
    println!("{}", "  │     motor odometry node     │".bold().cyan());
    println!("{}", "  └─────────────────────────────┘".bold().cyan());
    println!(
        "  {} {}",
        "motor_odom".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!();
}

fn print_summary(cfg: &config::Config) {
    let odom = &cfg.odometry;
    println!(
        "  ticks/m {}  frame {}  σ² {}  deadline {}s",
        odom.ticks_per_meter.to_string().bold(),
        odom.frame_id.bold(),
        odom.uncertainty_fixed.to_string().bold(),
        odom.deadline_timeout.to_string().bold()
    );
    if cfg.bridge.enabled {
        println!(
            "  rosbridge on {}  ({} → {}, {})",
            format!("ws://{}", cfg.bridge.bind).bold(),
            cfg.topics.encoder.dimmed(),
            cfg.topics.odom.dimmed(),
            cfg.topics.encoder_abs.dimmed()
        );
    }
    if cfg.sim.enabled {
        println!(
            "  {} {} ticks/s every {} ms",
            "simulated encoder".yellow(),
            cfg.sim.ticks_per_second,
            cfg.sim.period_ms
        );
    }
    println!();
}

fn print_stats(stats: &LoopStats) {
    println!();
    println!("  {}", "Session summary".bold());
    println!("    samples           {}", stats.samples);
    println!("    rejected          {}", stats.rejected);
    println!("    watchdog fires    {}", stats.watchdog_fires);
    println!("    publish failures  {}", stats.publish_failures);
    println!("    lagged samples    {}", stats.lagged_samples);
    println!("  {}", "✓ Exiting motor_odom.".green());
}
