//! # autoflow-adapter-builtin
//!
//! In-process executors for the node types every installation ships with.
//!
//! ## Provided executors
//!
//! | Node type | Behaviour |
//! |-----------|-----------|
//! | `MANUAL_TRIGGER`, `TIME_TRIGGER` | Always start the run |
//! | `GEOFENCE_TRIGGER`, `NOTIFICATION_TRIGGER`, `SMS_TRIGGER`, `CALL_TRIGGER` | Require the reserved trigger variables of their event |
//! | `GEOFENCE_TRIGGER` with `geofenceId`/`event` | Ends the run for transitions it does not match |
//! | `SET_VARIABLE` | Stores a resolved template in the scope |
//! | `DELAY` | Sleeps, aborting when the run is cancelled |
//! | `LOG` | Emits a resolved message through `tracing` |
//! | `NOTIFICATION` | Records a notification in an in-memory [`Outbox`] |
//!
//! ## Dependency rule
//!
//! Depends on `autoflow-app` (port traits) and `autoflow-domain` only.

mod executors;

pub use executors::{
    DelayExecutor, LogExecutor, Notification, NotificationExecutor, Outbox, SetVariableExecutor,
    TriggerExecutor,
};

use autoflow_app::registry::ExecutorRegistryBuilder;
use autoflow_domain::trigger::TriggerSource;
use autoflow_domain::workflow::kinds;

/// The built-in executor set, sharing one notification outbox.
#[derive(Debug, Clone, Default)]
pub struct Builtins {
    outbox: Outbox,
}

impl Builtins {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications sent by `NOTIFICATION` nodes so far.
    #[must_use]
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Add every built-in executor to `builder`.
    #[must_use]
    pub fn register(&self, builder: ExecutorRegistryBuilder) -> ExecutorRegistryBuilder {
        builder
            .register(kinds::MANUAL_TRIGGER, TriggerExecutor::new(TriggerSource::Manual))
            .register(kinds::TIME_TRIGGER, TriggerExecutor::new(TriggerSource::Time))
            .register(kinds::GEOFENCE_TRIGGER, TriggerExecutor::new(TriggerSource::Geofence))
            .register(
                kinds::NOTIFICATION_TRIGGER,
                TriggerExecutor::new(TriggerSource::Notification),
            )
            .register(kinds::SMS_TRIGGER, TriggerExecutor::new(TriggerSource::Sms))
            .register(kinds::CALL_TRIGGER, TriggerExecutor::new(TriggerSource::Call))
            .register(kinds::SET_VARIABLE, SetVariableExecutor)
            .register(kinds::DELAY, DelayExecutor)
            .register(kinds::LOG, LogExecutor)
            .register(
                kinds::NOTIFICATION,
                NotificationExecutor::new(self.outbox.clone()),
            )
    }
}
