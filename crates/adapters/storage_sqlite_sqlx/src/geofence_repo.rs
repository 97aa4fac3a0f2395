//! `SQLite` implementation of [`GeofenceRepository`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use autoflow_app::ports::GeofenceRepository;
use autoflow_domain::error::AutoflowError;
use autoflow_domain::geofence::{
    Coordinates, GeofenceConfig, GeofenceEvent, GeofenceTrigger, TransitionMode,
};
use autoflow_domain::id::{GeofenceId, WorkflowId};

use crate::decode_err;
use crate::error::StorageError;

/// Decode a lowercase serde tag such as `"enter"` or `"both"`.
fn decode_tag<T: serde::de::DeserializeOwned>(tag: String) -> Result<T, sqlx::Error> {
    serde_json::from_value(serde_json::Value::String(tag)).map_err(decode_err)
}

struct GeofenceRow(GeofenceConfig);

impl<'r> FromRow<'r, SqliteRow> for GeofenceRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let name: String = row.try_get("name")?;
        let latitude: f64 = row.try_get("latitude")?;
        let longitude: f64 = row.try_get("longitude")?;
        let radius_meters: f64 = row.try_get("radius_meters")?;
        let transition_mode: String = row.try_get("transition_mode")?;
        let is_active: bool = row.try_get("is_active")?;
        let created_at: String = row.try_get("created_at")?;
        let linked_workflow_id: Option<String> = row.try_get("linked_workflow_id")?;

        let id = GeofenceId::from_str(&id).map_err(decode_err)?;
        let transition_mode: TransitionMode = decode_tag(transition_mode)?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.to_utc())
            .map_err(decode_err)?;
        let linked_workflow_id = linked_workflow_id
            .map(|s| WorkflowId::from_str(&s).map_err(decode_err))
            .transpose()?;

        Ok(Self(GeofenceConfig {
            id,
            name,
            center: Coordinates::new(latitude, longitude),
            radius_meters,
            transition_mode,
            is_active,
            created_at,
            linked_workflow_id,
        }))
    }
}

struct TriggerRow(GeofenceTrigger);

impl<'r> FromRow<'r, SqliteRow> for TriggerRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let geofence_id: String = row.try_get("geofence_id")?;
        let event: String = row.try_get("event")?;
        let debounce_ms: i64 = row.try_get("debounce_ms")?;
        let workflow_id: String = row.try_get("workflow_id")?;
        let result_variable_name: Option<String> = row.try_get("result_variable_name")?;

        let event: GeofenceEvent = decode_tag(event)?;
        Ok(Self(GeofenceTrigger {
            geofence_id: GeofenceId::from_str(&geofence_id).map_err(decode_err)?,
            event,
            debounce_ms: u64::try_from(debounce_ms).map_err(decode_err)?,
            workflow_id: WorkflowId::from_str(&workflow_id).map_err(decode_err)?,
            result_variable_name,
        }))
    }
}

/// `SQLite`-backed repository for geofences and their trigger bindings.
pub struct SqliteGeofenceRepository {
    pool: SqlitePool,
}

impl SqliteGeofenceRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl GeofenceRepository for SqliteGeofenceRepository {
    async fn create(&self, config: GeofenceConfig) -> Result<GeofenceConfig, AutoflowError> {
        sqlx::query(
            "INSERT INTO geofences (id, name, latitude, longitude, radius_meters, transition_mode, is_active, created_at, linked_workflow_id) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(config.id.to_string())
        .bind(&config.name)
        .bind(config.center.latitude)
        .bind(config.center.longitude)
        .bind(config.radius_meters)
        .bind(config.transition_mode.to_string())
        .bind(config.is_active)
        .bind(config.created_at.to_rfc3339())
        .bind(config.linked_workflow_id.map(|id| id.to_string()))
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(config)
    }

    async fn get_by_id(&self, id: GeofenceId) -> Result<Option<GeofenceConfig>, AutoflowError> {
        let row: Option<GeofenceRow> = sqlx::query_as("SELECT * FROM geofences WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|r| r.0))
    }

    async fn get_all(&self) -> Result<Vec<GeofenceConfig>, AutoflowError> {
        let rows: Vec<GeofenceRow> =
            sqlx::query_as("SELECT * FROM geofences ORDER BY created_at, name")
                .fetch_all(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn update(&self, config: GeofenceConfig) -> Result<GeofenceConfig, AutoflowError> {
        sqlx::query(
            "UPDATE geofences SET name = ?, latitude = ?, longitude = ?, radius_meters = ?, transition_mode = ?, is_active = ?, linked_workflow_id = ? WHERE id = ?",
        )
        .bind(&config.name)
        .bind(config.center.latitude)
        .bind(config.center.longitude)
        .bind(config.radius_meters)
        .bind(config.transition_mode.to_string())
        .bind(config.is_active)
        .bind(config.linked_workflow_id.map(|id| id.to_string()))
        .bind(config.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(config)
    }

    async fn delete(&self, id: GeofenceId) -> Result<(), AutoflowError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        sqlx::query("DELETE FROM geofence_triggers WHERE geofence_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        sqlx::query("DELETE FROM geofences WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        tx.commit().await.map_err(StorageError::from)?;
        Ok(())
    }

    async fn save_trigger(&self, trigger: GeofenceTrigger) -> Result<GeofenceTrigger, AutoflowError> {
        let debounce_ms = i64::try_from(trigger.debounce_ms).unwrap_or(i64::MAX);
        sqlx::query(
            "INSERT INTO geofence_triggers (geofence_id, event, debounce_ms, workflow_id, result_variable_name) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(geofence_id) DO UPDATE SET event = excluded.event, debounce_ms = excluded.debounce_ms, workflow_id = excluded.workflow_id, result_variable_name = excluded.result_variable_name",
        )
        .bind(trigger.geofence_id.to_string())
        .bind(trigger.event.to_string())
        .bind(debounce_ms)
        .bind(trigger.workflow_id.to_string())
        .bind(&trigger.result_variable_name)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(trigger)
    }

    async fn get_trigger(
        &self,
        geofence_id: GeofenceId,
    ) -> Result<Option<GeofenceTrigger>, AutoflowError> {
        let row: Option<TriggerRow> =
            sqlx::query_as("SELECT * FROM geofence_triggers WHERE geofence_id = ?")
                .bind(geofence_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(row.map(|r| r.0))
    }

    async fn get_all_triggers(&self) -> Result<Vec<GeofenceTrigger>, AutoflowError> {
        let rows: Vec<TriggerRow> = sqlx::query_as("SELECT * FROM geofence_triggers")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}
