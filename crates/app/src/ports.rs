//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod executor;
pub mod geofence_repo;
pub mod launcher;
pub mod workflow_repo;

pub use executor::{NodeExecutor, NodeOutcome};
pub use geofence_repo::GeofenceRepository;
pub use launcher::WorkflowLauncher;
pub use workflow_repo::WorkflowRepository;
