//! Actor wrapper serializing samples and lifecycle commands.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};

use autoflow_domain::error::AutoflowError;
use autoflow_domain::geofence::{GeofenceConfig, GeofenceTrigger, LocationSample};
use autoflow_domain::id::GeofenceId;

use super::{GeofenceMonitor, MonitorStatus};
use crate::ports::WorkflowLauncher;

/// Message processed by the monitor task, one at a time.
#[derive(Debug)]
pub enum MonitorCommand {
    Sample(LocationSample),
    /// The location source reported an error.
    Failure(String),
    UpsertGeofence(GeofenceConfig),
    RegisterTrigger(GeofenceTrigger),
    RemoveGeofence(GeofenceId),
    Status(oneshot::Sender<MonitorStatus>),
    Shutdown,
}

/// Cloneable sender side of a running [`GeofenceMonitor`].
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    sender: mpsc::Sender<MonitorCommand>,
}

impl MonitorHandle {
    /// Move `monitor` onto its own task.
    ///
    /// The task ends on [`MonitorHandle::shutdown`] or once every handle
    /// has been dropped.
    pub fn spawn<L>(monitor: GeofenceMonitor<L>, capacity: usize) -> (Self, JoinHandle<()>)
    where
        L: WorkflowLauncher + 'static,
    {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(run(monitor, receiver));
        (Self { sender }, task)
    }

    /// Queue a location sample.
    ///
    /// # Errors
    ///
    /// Returns [`AutoflowError::ExternalService`] when the monitor task has stopped.
    pub async fn push_sample(&self, sample: LocationSample) -> Result<(), AutoflowError> {
        self.send(MonitorCommand::Sample(sample)).await
    }

    /// Report a location-source failure; monitoring is disabled until the
    /// next geofence or trigger registration.
    ///
    /// # Errors
    ///
    /// Returns [`AutoflowError::ExternalService`] when the monitor task has stopped.
    pub async fn report_failure(&self, cause: impl Into<String>) -> Result<(), AutoflowError> {
        self.send(MonitorCommand::Failure(cause.into())).await
    }

    /// # Errors
    ///
    /// Returns [`AutoflowError::ExternalService`] when the monitor task has stopped.
    pub async fn upsert_geofence(&self, config: GeofenceConfig) -> Result<(), AutoflowError> {
        self.send(MonitorCommand::UpsertGeofence(config)).await
    }

    /// # Errors
    ///
    /// Returns [`AutoflowError::ExternalService`] when the monitor task has stopped.
    pub async fn register_trigger(&self, trigger: GeofenceTrigger) -> Result<(), AutoflowError> {
        self.send(MonitorCommand::RegisterTrigger(trigger)).await
    }

    /// # Errors
    ///
    /// Returns [`AutoflowError::ExternalService`] when the monitor task has stopped.
    pub async fn remove_geofence(&self, id: GeofenceId) -> Result<(), AutoflowError> {
        self.send(MonitorCommand::RemoveGeofence(id)).await
    }

    /// Status after every previously queued command has been applied.
    ///
    /// # Errors
    ///
    /// Returns [`AutoflowError::ExternalService`] when the monitor task has stopped.
    pub async fn status(&self) -> Result<MonitorStatus, AutoflowError> {
        let (reply, response) = oneshot::channel();
        self.send(MonitorCommand::Status(reply)).await?;
        response.await.map_err(|_| stopped())
    }

    /// Ask the monitor task to stop after the queued commands.
    ///
    /// # Errors
    ///
    /// Returns [`AutoflowError::ExternalService`] when the monitor task has stopped.
    pub async fn shutdown(&self) -> Result<(), AutoflowError> {
        self.send(MonitorCommand::Shutdown).await
    }

    /// Feed a whole sample stream into the monitor.
    ///
    /// Source errors are reported as failures and the stream keeps being
    /// drained. Returns the number of samples forwarded.
    ///
    /// # Errors
    ///
    /// Returns [`AutoflowError::ExternalService`] when the monitor task has stopped.
    pub async fn forward<S, E>(&self, samples: S) -> Result<usize, AutoflowError>
    where
        S: Stream<Item = Result<LocationSample, E>>,
        E: std::fmt::Display,
    {
        tokio::pin!(samples);
        let mut forwarded = 0;
        while let Some(item) = samples.next().await {
            match item {
                Ok(sample) => {
                    self.push_sample(sample).await?;
                    forwarded += 1;
                }
                Err(err) => self.report_failure(err.to_string()).await?,
            }
        }
        Ok(forwarded)
    }

    async fn send(&self, command: MonitorCommand) -> Result<(), AutoflowError> {
        self.sender.send(command).await.map_err(|_| stopped())
    }
}

fn stopped() -> AutoflowError {
    AutoflowError::ExternalService("geofence monitor is not running".to_string())
}

async fn run<L: WorkflowLauncher>(
    mut monitor: GeofenceMonitor<L>,
    mut commands: mpsc::Receiver<MonitorCommand>,
) {
    tracing::info!("geofence monitor started");
    while let Some(command) = commands.recv().await {
        match command {
            MonitorCommand::Sample(sample) => {
                monitor.process(&sample);
            }
            MonitorCommand::Failure(cause) => monitor.fail(cause),
            MonitorCommand::UpsertGeofence(config) => monitor.upsert_geofence(config),
            MonitorCommand::RegisterTrigger(trigger) => monitor.register_trigger(trigger),
            MonitorCommand::RemoveGeofence(id) => {
                if monitor.remove_geofence(id).is_none() {
                    tracing::debug!(geofence_id = %id, "removing unknown geofence");
                }
            }
            MonitorCommand::Status(reply) => {
                let _ = reply.send(monitor.status());
            }
            MonitorCommand::Shutdown => break,
        }
    }
    tracing::info!("geofence monitor stopped");
}
