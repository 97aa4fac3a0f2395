//! Geofence service: lifecycle of regions and their trigger bindings.
//!
//! Storage is the source of truth; every successful change is mirrored into
//! the running [`MonitorHandle`] so monitoring starts, stops or changes
//! without a restart.

use autoflow_domain::error::{AutoflowError, NotFoundError};
use autoflow_domain::geofence::{GeofenceConfig, GeofenceTrigger};
use autoflow_domain::id::GeofenceId;

use crate::geofence_monitor::{MonitorHandle, MonitorStatus};
use crate::ports::{GeofenceRepository, WorkflowRepository};

/// Application service for geofence CRUD and trigger registration.
pub struct GeofenceService<GR, WR> {
    geofences: GR,
    workflows: WR,
    monitor: MonitorHandle,
}

impl<GR, WR> GeofenceService<GR, WR>
where
    GR: GeofenceRepository,
    WR: WorkflowRepository,
{
    /// Create a new service backed by the given repositories and monitor.
    pub fn new(geofences: GR, workflows: WR, monitor: MonitorHandle) -> Self {
        Self {
            geofences,
            workflows,
            monitor,
        }
    }

    /// Persist a geofence and start monitoring it.
    ///
    /// # Errors
    ///
    /// Returns [`AutoflowError::Validation`] if invariants fail, a storage
    /// error from the repository, or [`AutoflowError::ExternalService`]
    /// when the monitor is not running.
    #[tracing::instrument(skip(self, config), fields(geofence_id = %config.id, name = %config.name))]
    pub async fn create_geofence(
        &self,
        config: GeofenceConfig,
    ) -> Result<GeofenceConfig, AutoflowError> {
        config.validate()?;
        let created = self.geofences.create(config).await?;
        self.monitor.upsert_geofence(created.clone()).await?;
        tracing::info!("geofence created");
        Ok(created)
    }

    /// Look up a geofence by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`AutoflowError::NotFound`] when no geofence with `id` exists,
    /// or a storage error from the repository.
    pub async fn get_geofence(&self, id: GeofenceId) -> Result<GeofenceConfig, AutoflowError> {
        self.geofences.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Geofence",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all geofences.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_geofences(&self) -> Result<Vec<GeofenceConfig>, AutoflowError> {
        self.geofences.get_all().await
    }

    /// Activate or deactivate a geofence.
    ///
    /// # Errors
    ///
    /// Returns [`AutoflowError::NotFound`] when the geofence does not exist,
    /// a storage error, or [`AutoflowError::ExternalService`] when the
    /// monitor is not running.
    #[tracing::instrument(skip(self))]
    pub async fn set_active(
        &self,
        id: GeofenceId,
        active: bool,
    ) -> Result<GeofenceConfig, AutoflowError> {
        let mut config = self.get_geofence(id).await?;
        config.is_active = active;
        let updated = self.geofences.update(config).await?;
        self.monitor.upsert_geofence(updated.clone()).await?;
        Ok(updated)
    }

    /// Bind a transition of an existing geofence to an existing workflow.
    ///
    /// Replaces any previous binding of that geofence.
    ///
    /// # Errors
    ///
    /// Returns [`AutoflowError::NotFound`] when the geofence or the workflow
    /// does not exist, a storage error, or [`AutoflowError::ExternalService`]
    /// when the monitor is not running.
    #[tracing::instrument(skip(self, trigger), fields(geofence_id = %trigger.geofence_id, workflow_id = %trigger.workflow_id))]
    pub async fn register_trigger(
        &self,
        trigger: GeofenceTrigger,
    ) -> Result<GeofenceTrigger, AutoflowError> {
        self.get_geofence(trigger.geofence_id).await?;
        if self.workflows.get_by_id(trigger.workflow_id).await?.is_none() {
            return Err(NotFoundError {
                entity: "Workflow",
                id: trigger.workflow_id.to_string(),
            }
            .into());
        }
        let saved = self.geofences.save_trigger(trigger).await?;
        self.monitor.register_trigger(saved.clone()).await?;
        tracing::info!(event = %saved.event, "geofence trigger registered");
        Ok(saved)
    }

    /// Trigger bound to a geofence, if any.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn get_trigger(
        &self,
        geofence_id: GeofenceId,
    ) -> Result<Option<GeofenceTrigger>, AutoflowError> {
        self.geofences.get_trigger(geofence_id).await
    }

    /// Delete a geofence and its trigger; other geofences keep being
    /// monitored.
    ///
    /// # Errors
    ///
    /// Returns [`AutoflowError::NotFound`] when the geofence does not exist,
    /// a storage error, or [`AutoflowError::ExternalService`] when the
    /// monitor is not running.
    #[tracing::instrument(skip(self))]
    pub async fn delete_geofence(&self, id: GeofenceId) -> Result<(), AutoflowError> {
        self.get_geofence(id).await?;
        self.geofences.delete(id).await?;
        self.monitor.remove_geofence(id).await?;
        tracing::info!("geofence deleted");
        Ok(())
    }

    /// Push every stored geofence and trigger into the monitor.
    ///
    /// Returns the number of geofences loaded.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or [`AutoflowError::ExternalService`] when
    /// the monitor is not running.
    #[tracing::instrument(skip(self))]
    pub async fn load_all(&self) -> Result<usize, AutoflowError> {
        let configs = self.geofences.get_all().await?;
        let triggers = self.geofences.get_all_triggers().await?;
        let count = configs.len();
        for config in configs {
            self.monitor.upsert_geofence(config).await?;
        }
        for trigger in triggers {
            self.monitor.register_trigger(trigger).await?;
        }
        tracing::info!(geofences = count, "geofences loaded");
        Ok(count)
    }

    /// Current monitor status.
    ///
    /// # Errors
    ///
    /// Returns [`AutoflowError::ExternalService`] when the monitor is not running.
    pub async fn status(&self) -> Result<MonitorStatus, AutoflowError> {
        self.monitor.status().await
    }
}
