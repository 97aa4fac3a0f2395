//! # autoflowd: autoflow daemon
//!
//! Composition root that wires all adapters together and runs the geofence
//! monitor against a location feed.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Initialize logging, the `SQLite` connection pool and migrations
//! - Construct repository implementations (adapters)
//! - Build the executor registry, the execution engine and the launcher
//! - Spawn the geofence monitor and load stored geofences and triggers
//! - Forward NDJSON location samples until the feed ends or Ctrl-C
//! - Drain or cancel in-flight workflow runs on the way out
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;
mod feed;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use autoflow_adapter_builtin::Builtins;
use autoflow_adapter_storage_sqlite_sqlx::{
    Config as DatabaseConfig, SqliteGeofenceRepository, SqliteWorkflowRepository,
};
use autoflow_app::engine::ExecutionEngine;
use autoflow_app::geofence_monitor::{GeofenceMonitor, MonitorHandle};
use autoflow_app::launcher::EngineLauncher;
use autoflow_app::registry::ExecutorRegistry;
use autoflow_app::services::geofence_service::GeofenceService;
use autoflow_app::transition_bus::TransitionBus;
use autoflow_domain::geofence::GeofenceTransition;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading autoflow.toml")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Database
    let db = DatabaseConfig::new(config.database_url())
        .with_max_connections(config.database.max_connections)
        .with_busy_timeout(config.busy_timeout())
        .build()
        .await
        .context("opening database")?;
    let pool = db.pool().clone();

    // Repositories
    let workflow_repo = Arc::new(SqliteWorkflowRepository::new(pool.clone()));
    let geofence_repo = SqliteGeofenceRepository::new(pool);

    // Executors and engine
    let builtins = Builtins::new();
    let registry = builtins.register(ExecutorRegistry::builder()).build();
    tracing::info!(node_types = ?registry.node_types(), "executor registry ready");
    let engine =
        Arc::new(ExecutionEngine::new(Arc::new(registry)).with_max_steps(config.engine.max_steps));
    let launcher = Arc::new(EngineLauncher::new(engine, Arc::clone(&workflow_repo)));

    // Monitor
    let bus = TransitionBus::new(config.monitor.bus_capacity);
    let observer = tokio::spawn(log_transitions(bus.subscribe()));
    let (monitor, monitor_task) = MonitorHandle::spawn(
        GeofenceMonitor::new(Arc::clone(&launcher), bus),
        config.monitor.channel_capacity,
    );

    let geofences = GeofenceService::new(geofence_repo, workflow_repo, monitor.clone());
    geofences.load_all().await.context("loading geofences")?;

    // Location feed
    let source = config.feed_source();
    let reader = feed::open(&source)
        .await
        .with_context(|| format!("opening location feed {source:?}"))?;
    tracing::info!(?source, "autoflowd started, reading location samples");

    tokio::select! {
        forwarded = monitor.forward(feed::samples(reader)) => {
            let forwarded = forwarded?;
            tracing::info!(forwarded, "location feed ended, waiting for running workflows");
            // queued samples are processed before the status reply
            let status = monitor.status().await?;
            tracing::debug!(?status, "geofence monitor caught up");
            launcher.drain().await;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for Ctrl-C")?;
            tracing::info!("interrupted, cancelling running workflows");
            launcher.shutdown().await;
        }
    }

    monitor.shutdown().await?;
    monitor_task.await.context("geofence monitor task panicked")?;
    observer.await.context("transition observer panicked")?;

    tracing::info!(sent = builtins.outbox().len(), "autoflowd stopped");
    Ok(())
}

/// Log every transition published by the monitor until the bus closes.
async fn log_transitions(mut transitions: broadcast::Receiver<GeofenceTransition>) {
    loop {
        match transitions.recv().await {
            Ok(transition) => tracing::info!(
                geofence_id = %transition.geofence_id,
                geofence = %transition.geofence_name,
                event = %transition.event,
                distance_meters = transition.distance_meters,
                debounced = transition.debounced,
                "geofence transition"
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "transition observer lagged behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
