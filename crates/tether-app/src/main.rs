//! Tether application binary - composition root.
//!
//! 1. Load configuration from TOML
//! 2. Open the in-memory persistent stack
//! 3. Build the action engine with recording + logging notifications
//! 4. Schedule a batch of ledger actions, canceling some of them
//! 5. Wait for the queue to drain (Ctrl+C cancels everything) and print
//!    a summary

mod cli;
mod ledger;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tether_action::{
    on_completion, ActionEngine, CompletionStatus, FanoutNotifications, LoggingNotifications,
    ProxyView, RecordingNotifications, Runnable,
};
use tether_core::config::TetherConfig;
use tether_core::stack::{MemoryStack, ModelDescriptor, PersistentStack, StoreLocation};

use cli::CliArgs;
use ledger::{LedgerAction, Plan};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing starts so its log level can apply.
    let config_file = args.resolve_config_path();
    let loaded = TetherConfig::load(&config_file);
    let config_level = loaded
        .as_ref()
        .map(|c| c.general.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(args.resolve_log_level(&config_level))
            }),
        )
        .init();

    tracing::info!("Starting Tether v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match loaded {
        Ok(config) => {
            tracing::info!(path = %config_file.display(), "Configuration loaded");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %config_file.display(),
                error = %e,
                "Failed to load config. Using defaults."
            );
            TetherConfig::default()
        }
    };
    if let Some(max) = args.max_concurrent {
        config.queue.max_concurrent = max;
    }

    // Store.
    let stack = Arc::new(MemoryStack::new());
    stack.open(&ModelDescriptor::new("ledger", 1), &StoreLocation::InMemory)?;
    tracing::info!("In-memory store opened");

    // Engine.
    let recorder = Arc::new(RecordingNotifications::new());
    let mut notifications = FanoutNotifications::new().with(recorder.clone());
    if config.notifications.log_transitions {
        notifications.add(Arc::new(LoggingNotifications));
    }
    let engine = ActionEngine::new(&config, Some(Arc::new(notifications)))?;

    // Schedule.
    let mut proxies = Vec::with_capacity(args.actions);
    for index in 0..args.actions {
        let plan = Plan {
            records: args.records,
            work: Duration::from_millis(args.work_ms),
            fail: args.should_fail(index),
        };
        let action = LedgerAction::new(format!("ledger-{}", index), Arc::clone(&stack), plan);
        let proxy = engine.schedule_status_coded(
            action,
            Some(on_completion(|view| {
                tracing::debug!(
                    proxy = %view.id(),
                    action = view.action_name(),
                    status = %view.completion_status(),
                    "Completion callback"
                );
            })),
        )?;
        if args.should_cancel(index) {
            proxy.cancel();
        }
        proxies.push(proxy);
    }
    tracing::info!(count = proxies.len(), "Actions scheduled");

    tokio::select! {
        _ = engine.wait_idle() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, canceling pending actions");
            engine.cancel_all();
        }
    }
    engine.shutdown().await;

    // Summary.
    let mut counts = [0usize; 4];
    for proxy in &proxies {
        let status = proxy.completion_status();
        let slot = match status {
            CompletionStatus::Successful => 0,
            CompletionStatus::Failed => 1,
            CompletionStatus::Canceled => 2,
            CompletionStatus::Unknown => 3,
        };
        counts[slot] += 1;
        println!("{}  {:<10}  {}", proxy, status.to_string(), proxy.statistics());
    }
    println!(
        "successful: {}  failed: {}  canceled: {}  unknown: {}  notifications: {}",
        counts[0],
        counts[1],
        counts[2],
        counts[3],
        recorder.len()
    );

    Ok(())
}
