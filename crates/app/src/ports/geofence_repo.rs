//! Geofence repository port: persistence for regions and their trigger bindings.
//!
//! One record per geofence keyed by its id, one trigger record per geofence
//! keyed by the geofence id. Both are loaded eagerly at process start.

use std::future::Future;

use autoflow_domain::error::AutoflowError;
use autoflow_domain::geofence::{GeofenceConfig, GeofenceTrigger};
use autoflow_domain::id::GeofenceId;

/// Repository for [`GeofenceConfig`]s and [`GeofenceTrigger`]s.
pub trait GeofenceRepository {
    /// Persist a new geofence.
    fn create(
        &self,
        config: GeofenceConfig,
    ) -> impl Future<Output = Result<GeofenceConfig, AutoflowError>> + Send;

    /// Get a geofence by id.
    fn get_by_id(
        &self,
        id: GeofenceId,
    ) -> impl Future<Output = Result<Option<GeofenceConfig>, AutoflowError>> + Send;

    /// Get all geofences.
    fn get_all(&self) -> impl Future<Output = Result<Vec<GeofenceConfig>, AutoflowError>> + Send;

    /// Replace an existing geofence (only `is_active` is expected to change).
    fn update(
        &self,
        config: GeofenceConfig,
    ) -> impl Future<Output = Result<GeofenceConfig, AutoflowError>> + Send;

    /// Delete a geofence together with its trigger binding.
    fn delete(&self, id: GeofenceId) -> impl Future<Output = Result<(), AutoflowError>> + Send;

    /// Insert or replace the trigger bound to `trigger.geofence_id`.
    fn save_trigger(
        &self,
        trigger: GeofenceTrigger,
    ) -> impl Future<Output = Result<GeofenceTrigger, AutoflowError>> + Send;

    /// Get the trigger bound to a geofence.
    fn get_trigger(
        &self,
        geofence_id: GeofenceId,
    ) -> impl Future<Output = Result<Option<GeofenceTrigger>, AutoflowError>> + Send;

    /// Get every trigger binding.
    fn get_all_triggers(
        &self,
    ) -> impl Future<Output = Result<Vec<GeofenceTrigger>, AutoflowError>> + Send;
}

impl<T: GeofenceRepository + Send + Sync> GeofenceRepository for std::sync::Arc<T> {
    fn create(
        &self,
        config: GeofenceConfig,
    ) -> impl Future<Output = Result<GeofenceConfig, AutoflowError>> + Send {
        (**self).create(config)
    }

    fn get_by_id(
        &self,
        id: GeofenceId,
    ) -> impl Future<Output = Result<Option<GeofenceConfig>, AutoflowError>> + Send {
        (**self).get_by_id(id)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<GeofenceConfig>, AutoflowError>> + Send {
        (**self).get_all()
    }

    fn update(
        &self,
        config: GeofenceConfig,
    ) -> impl Future<Output = Result<GeofenceConfig, AutoflowError>> + Send {
        (**self).update(config)
    }

    fn delete(&self, id: GeofenceId) -> impl Future<Output = Result<(), AutoflowError>> + Send {
        (**self).delete(id)
    }

    fn save_trigger(
        &self,
        trigger: GeofenceTrigger,
    ) -> impl Future<Output = Result<GeofenceTrigger, AutoflowError>> + Send {
        (**self).save_trigger(trigger)
    }

    fn get_trigger(
        &self,
        geofence_id: GeofenceId,
    ) -> impl Future<Output = Result<Option<GeofenceTrigger>, AutoflowError>> + Send {
        (**self).get_trigger(geofence_id)
    }

    fn get_all_triggers(
        &self,
    ) -> impl Future<Output = Result<Vec<GeofenceTrigger>, AutoflowError>> + Send {
        (**self).get_all_triggers()
    }
}
