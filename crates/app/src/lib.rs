//! # autoflow-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `NodeExecutor`: the uniform contract behind every node type
//!   - `WorkflowRepository`: CRUD for workflow graphs
//!   - `GeofenceRepository`: CRUD for geofences and their trigger bindings
//!   - `WorkflowLauncher`: fire-and-forget start of a stored workflow
//! - Provide the core runtime:
//!   - `ExecutorRegistry`: node type tag → executor, read-only once built
//!   - `ExecutionEngine`: graph traversal, branching, loops, port routing
//!   - `GeofenceMonitor`: membership state machine, debounce, launch
//! - Define **driving/inbound ports** as use-case structs:
//!   - `WorkflowService`: create, update, list, run
//!   - `GeofenceService`: create, activate, bind triggers, delete, load
//! - Provide **in-process infrastructure** (transition bus, launcher) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `autoflow-domain` only (plus `tokio` primitives).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod engine;
pub mod geofence_monitor;
pub mod launcher;
pub mod ports;
pub mod registry;
pub mod services;
pub mod transition_bus;
