//! End-to-end tests for the full autoflowd stack.
//!
//! Each test wires the complete application (in-memory `SQLite`, real repos,
//! built-in executors, real engine, launcher and monitor task) and drives it
//! with location samples, the way the daemon does.

use std::convert::Infallible;
use std::sync::Arc;

use chrono::Duration;
use serde_json::{Map, json};
use tokio_util::sync::CancellationToken;

use autoflow_adapter_builtin::{Builtins, Outbox};
use autoflow_adapter_storage_sqlite_sqlx::{
    Config, SqliteGeofenceRepository, SqliteWorkflowRepository,
};
use autoflow_app::engine::ExecutionEngine;
use autoflow_app::geofence_monitor::{GeofenceMonitor, MonitorHandle, MonitorStatus};
use autoflow_app::launcher::EngineLauncher;
use autoflow_app::registry::ExecutorRegistry;
use autoflow_app::services::geofence_service::GeofenceService;
use autoflow_app::services::workflow_service::WorkflowService;
use autoflow_app::transition_bus::TransitionBus;
use autoflow_domain::geofence::{GeofenceConfig, GeofenceEvent, GeofenceTrigger, LocationSample};
use autoflow_domain::time::now;
use autoflow_domain::workflow::{Node, Port, Workflow, kinds};

type Launcher = EngineLauncher<SqliteWorkflowRepository>;

struct Stack {
    workflows: WorkflowService<Arc<SqliteWorkflowRepository>>,
    geofences: GeofenceService<SqliteGeofenceRepository, Arc<SqliteWorkflowRepository>>,
    monitor: MonitorHandle,
    launcher: Arc<Launcher>,
    bus: TransitionBus,
    outbox: Outbox,
}

/// Build a fully-wired stack backed by an in-memory `SQLite` database.
async fn stack() -> Stack {
    let db = Config::new("sqlite::memory:")
        .build()
        .await
        .expect("in-memory database should initialise");
    let pool = db.pool().clone();

    let workflow_repo = Arc::new(SqliteWorkflowRepository::new(pool.clone()));
    let builtins = Builtins::new();
    let registry = builtins.register(ExecutorRegistry::builder()).build();
    let engine = Arc::new(ExecutionEngine::new(Arc::new(registry)));
    let launcher = Arc::new(EngineLauncher::new(
        Arc::clone(&engine),
        Arc::clone(&workflow_repo),
    ));

    let bus = TransitionBus::new(64);
    let (monitor, _task) = MonitorHandle::spawn(
        GeofenceMonitor::new(Arc::clone(&launcher), bus.clone()),
        16,
    );

    Stack {
        workflows: WorkflowService::new(Arc::clone(&workflow_repo), engine),
        geofences: GeofenceService::new(
            SqliteGeofenceRepository::new(pool),
            workflow_repo,
            monitor.clone(),
        ),
        monitor,
        launcher,
        bus,
        outbox: builtins.outbox().clone(),
    }
}

fn arrival_workflow() -> Workflow {
    Workflow::builder()
        .name("Arrive home")
        .node(Node::trigger("start", kinds::GEOFENCE_TRIGGER).with_output_variable("trigger"))
        .node(Node::action(
            "notify",
            kinds::NOTIFICATION,
            json!({"title": "Geofence", "message": "{{geofence.event}} {{geofence.name}}"}),
        ))
        .edge("start", "notify", Port::Default)
        .build()
        .unwrap()
}

fn home() -> GeofenceConfig {
    GeofenceConfig::builder()
        .name("Home")
        .center(41.0, 29.0)
        .radius_meters(100.0)
        .build()
        .unwrap()
}

/// Samples alternating between ~1.1 km away and the center, 10 s apart.
fn walk(inside: &[bool]) -> Vec<Result<LocationSample, Infallible>> {
    let start = now();
    (0..)
        .zip(inside)
        .map(|(i, &inside)| {
            let latitude = if inside { 41.0 } else { 41.01 };
            Ok(LocationSample::new(
                latitude,
                29.0,
                start + Duration::seconds(10 * i),
            ))
        })
        .collect()
}

async fn settle(stack: &Stack) {
    stack.monitor.status().await.unwrap();
    stack.launcher.drain().await;
}

#[tokio::test]
async fn should_run_linked_workflow_once_when_entering_geofence() {
    let stack = stack().await;
    let workflow = stack.workflows.create_workflow(arrival_workflow()).await.unwrap();
    let geofence = stack.geofences.create_geofence(home()).await.unwrap();
    stack
        .geofences
        .register_trigger(GeofenceTrigger::new(
            geofence.id,
            GeofenceEvent::Enter,
            workflow.id,
        ))
        .await
        .unwrap();
    let mut transitions = stack.bus.subscribe();

    let forwarded = stack
        .monitor
        .forward(tokio_stream::iter(walk(&[false, true, true, false])))
        .await
        .unwrap();
    settle(&stack).await;

    assert_eq!(forwarded, 4);
    let sent = stack.outbox.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].message, "enter Home");

    let first = transitions.recv().await.unwrap();
    let second = transitions.recv().await.unwrap();
    assert_eq!(first.event, GeofenceEvent::Enter);
    assert_eq!(second.event, GeofenceEvent::Exit);
    assert!(transitions.try_recv().is_err());
}

#[tokio::test]
async fn should_restore_monitoring_from_storage_when_loading() {
    let stack = stack().await;
    let workflow = stack.workflows.create_workflow(arrival_workflow()).await.unwrap();
    let geofence = stack.geofences.create_geofence(home()).await.unwrap();
    stack
        .geofences
        .register_trigger(GeofenceTrigger::new(
            geofence.id,
            GeofenceEvent::Enter,
            workflow.id,
        ))
        .await
        .unwrap();

    let loaded = stack.geofences.load_all().await.unwrap();

    assert_eq!(loaded, 1);
    assert_eq!(stack.geofences.status().await.unwrap(), MonitorStatus::Running);
}

#[tokio::test]
async fn should_not_launch_anything_after_geofence_is_deleted() {
    let stack = stack().await;
    let workflow = stack.workflows.create_workflow(arrival_workflow()).await.unwrap();
    let geofence = stack.geofences.create_geofence(home()).await.unwrap();
    stack
        .geofences
        .register_trigger(GeofenceTrigger::new(
            geofence.id,
            GeofenceEvent::Enter,
            workflow.id,
        ))
        .await
        .unwrap();

    stack.geofences.delete_geofence(geofence.id).await.unwrap();
    stack
        .monitor
        .forward(tokio_stream::iter(walk(&[false, true])))
        .await
        .unwrap();
    settle(&stack).await;

    assert!(stack.outbox.is_empty());
    assert!(stack.geofences.get_trigger(geofence.id).await.unwrap().is_none());
    assert_eq!(stack.geofences.status().await.unwrap(), MonitorStatus::Idle);
}

#[tokio::test]
async fn should_explain_missing_context_when_geofence_workflow_run_manually() {
    let stack = stack().await;
    let workflow = stack.workflows.create_workflow(arrival_workflow()).await.unwrap();

    let report = stack
        .workflows
        .run_workflow(workflow.id, Map::new(), CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.visits[0].success);
    let output = report.variables.get("trigger").unwrap();
    assert_eq!(output["success"], false);
    assert!(
        output["error"]
            .as_str()
            .unwrap()
            .contains("entering or leaving a geofence")
    );
}

#[tokio::test]
async fn should_disable_monitoring_when_location_source_fails() {
    let stack = stack().await;
    stack.geofences.create_geofence(home()).await.unwrap();

    let samples = vec![Err::<LocationSample, _>("GPS unavailable")];
    stack
        .monitor
        .forward(tokio_stream::iter(samples))
        .await
        .unwrap();

    assert_eq!(stack.geofences.status().await.unwrap(), MonitorStatus::Disabled);
}
