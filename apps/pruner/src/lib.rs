//! Queue Pruner Service
//!
//! A CLI worker that consumes messages from a RabbitMQ queue, drops the ones
//! matching the configured substring rules, and optionally republishes the
//! rest back onto the same queue.
//!
//! ## Architecture
//!
//! ```text
//! RabbitMQ queue
//!   ↓ (basic_get, --workers concurrent consumers)
//! Worker → Matcher (--match / --match-mode / --ignore-case)
//!   ↓ (republish confirmed before ack when --republish)
//! BatchAcker (flush every --batch-size tags, once more at drain)
//!   ↓
//! RabbitMQ (basic_ack)
//! ```
//!
//! ## Behavior
//!
//! - Stops cleanly on SIGINT/SIGTERM, when the queue drains, or after
//!   `--max-messages` (the over-limit fetch is requeued, never dropped)
//! - Exits non-zero on connection or acknowledgment failure; unflushed
//!   tags stay unacknowledged and the broker redelivers them
//! - Prints a JSON summary of processed/matched/republished/dropped counts
//!   at the end of every run, clean or not

use clap::Parser;
use eyre::{Result, WrapErr};
use queue_filter::{AmqpQueue, Coordinator, StopReason};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

mod cli;

use cli::Cli;

/// Run the pruner: parse flags, connect, filter until a stop condition.
///
/// # Errors
///
/// Returns an error (non-zero exit) if:
/// - The configuration is invalid
/// - The broker connection cannot be established
/// - The run ends with a fatal broker error
pub async fn run() -> Result<()> {
    install_color_eyre();
    init_tracing();

    let cli = Cli::parse();
    let filter_config = cli.filter_config();

    // Validates the configuration; fails fast before any broker interaction.
    let coordinator = Coordinator::new(filter_config.clone()).wrap_err("Invalid configuration")?;
    info!(
        queue = %filter_config.queue,
        workers = filter_config.workers,
        batch_size = filter_config.batch_size,
        max_messages = ?filter_config.max_messages,
        mode = %filter_config.mode,
        rules = filter_config.patterns.len(),
        republish = filter_config.republish,
        "Configuration loaded"
    );

    info!("Connecting to broker...");
    let prefetch = filter_config.batch_size.min(u16::MAX as usize) as u16;
    let broker = Arc::new(
        AmqpQueue::connect(&cli.amqp_config(), &filter_config.queue, prefetch)
            .await
            .wrap_err("Failed to connect to broker")?,
    );

    // Set up a shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let report = coordinator.run(broker.clone(), shutdown_rx).await;

    if let Err(e) = broker.close().await {
        warn!(error = %e, "Broker connection did not close cleanly");
    }

    // The summary is printed whether the run ended cleanly or not.
    println!("{}", serde_json::to_string_pretty(&report.summary)?);

    match report.reason {
        StopReason::Fatal(e) => {
            error!(error = %e, "Queue pruner stopped with a fatal error");
            Err(eyre::Report::new(e).wrap_err("run ended with a fatal broker error"))
        }
        reason => {
            info!(reason = ?reason, "Queue pruner stopped");
            Ok(())
        }
    }
}

/// Install color-eyre early so startup errors already get the full display.
/// Safe to call multiple times.
fn install_color_eyre() {
    let _ = color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install();
}

/// Initialize tracing: JSON output when `APP_ENV=production`, pretty output
/// otherwise, with `RUST_LOG` overriding the default `info` filter.
fn init_tracing() {
    let is_production =
        std::env::var("APP_ENV").is_ok_and(|v| v.eq_ignore_ascii_case("production"));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if is_production {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    };

    // Already initialized is fine (common in tests).
    let _ = result;
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }
}
