//! # areamediad — area media-player daemon
//!
//! Composition root that wires the aggregate engine to a host adapter and
//! keeps it running.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialize `tracing`
//! - Construct the host adapter (in-memory demo host)
//! - Construct the aggregate engine, injecting adapters via port traits
//! - Run the initial build, then drive the engine loop
//! - Rebuild on SIGHUP with the exclusion list re-read from disk
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod demo;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing_subscriber::EnvFilter;

use areamedia_adapter_memory::{InMemoryDirectory, InMemoryStateBus, SimulatedTransport};
use areamedia_app::aggregate_engine::{self, AggregateEngine, EngineHandle};
use areamedia_app::event_bus::InProcessSwitchBus;
use areamedia_domain::event::SwitchEvent;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Host
    let directory = Arc::new(InMemoryDirectory::new());
    let state_bus = InMemoryStateBus::new();
    if config.demo.enabled {
        demo::seed(&config.demo, &directory, &state_bus)?;
    } else {
        tracing::warn!("demo host disabled, no media players will be found");
    }
    let transport = Arc::new(
        SimulatedTransport::new(state_bus.clone())
            .with_latency(Duration::from_millis(config.demo.latency_ms)),
    );

    // Switch events
    let switch_bus = Arc::new(InProcessSwitchBus::new(config.engine.event_capacity));
    let logger = tokio::spawn(log_switch_events(switch_bus.subscribe()));

    // Engine
    let mut engine = AggregateEngine::new(
        Arc::clone(&directory),
        state_bus,
        transport,
        Arc::clone(&switch_bus),
        config.active_states()?,
    );
    let report = engine.rebuild(&config.exclusions()).await?;
    tracing::info!(
        switches = report.created.len(),
        unassigned = report.unassigned,
        issues = report.issues.len(),
        "initial build done"
    );
    for (area, players) in engine.players_by_area().await? {
        let players: Vec<&str> = players.iter().map(|player| player.name.as_str()).collect();
        tracing::debug!(%area, ?players, "candidate players");
    }

    let (handle, commands) = EngineHandle::channel(config.engine.command_capacity);
    let engine_task = tokio::spawn(aggregate_engine::run(engine, commands));
    let reloader = tokio::spawn(reload_on_hangup(handle.clone()));

    shutdown_signal().await;
    tracing::info!("shutting down");

    handle.shutdown().await;
    engine_task.await?;
    reloader.abort();
    logger.abort();

    Ok(())
}

async fn log_switch_events(receiver: broadcast::Receiver<SwitchEvent>) {
    let mut events = BroadcastStream::new(receiver);
    while let Some(event) = events.next().await {
        match event {
            Ok(SwitchEvent::Updated { snapshot }) => tracing::info!(
                unique_id = %snapshot.unique_id,
                name = %snapshot.name,
                is_on = snapshot.is_on,
                count_of = %snapshot.attributes.count_of,
                "switch updated"
            ),
            Ok(SwitchEvent::Retracted { unique_id }) => {
                tracing::info!(%unique_id, "switch retracted");
            }
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "switch event logger lagged");
            }
        }
    }
}

#[cfg(unix)]
async fn reload_on_hangup(handle: EngineHandle) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(err) => {
            tracing::warn!(%err, "cannot listen for SIGHUP, reload disabled");
            return;
        }
    };

    while hangup.recv().await.is_some() {
        let config = match Config::load() {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(%err, "config reload failed, keeping current aggregates");
                continue;
            }
        };
        match handle.reload(config.exclusions()).await {
            Ok(report) => tracing::info!(
                created = report.created.len(),
                retired = report.retired.len(),
                "aggregates reloaded"
            ),
            Err(err) => tracing::warn!(%err, "reload failed, keeping current aggregates"),
        }
    }
}

#[cfg(not(unix))]
async fn reload_on_hangup(_handle: EngineHandle) {
    std::future::pending::<()>().await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
