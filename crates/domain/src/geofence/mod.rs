//! Geofence: a circular region whose enter/exit transitions start workflows.
//!
//! A [`GeofenceConfig`] describes the region; at most one
//! [`GeofenceTrigger`] per region binds one of its transitions to a
//! workflow with a debounce window.

mod geo;

pub use geo::{Coordinates, EARTH_RADIUS_METERS, LocationSample};

use serde::{Deserialize, Serialize};

use crate::error::{AutoflowError, ValidationError};
use crate::id::{GeofenceId, WorkflowId};
use crate::time::{Timestamp, now};

/// A detected region-membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeofenceEvent {
    Enter,
    Exit,
}

impl GeofenceEvent {
    /// Event produced when membership flips to `inside`.
    #[must_use]
    pub fn from_membership(inside: bool) -> Self {
        if inside { Self::Enter } else { Self::Exit }
    }
}

impl std::fmt::Display for GeofenceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enter => f.write_str("enter"),
            Self::Exit => f.write_str("exit"),
        }
    }
}

/// Which transitions of a region are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionMode {
    Enter,
    Exit,
    #[default]
    Both,
}

impl TransitionMode {
    #[must_use]
    pub fn accepts(self, event: GeofenceEvent) -> bool {
        matches!(
            (self, event),
            (Self::Both, _)
                | (Self::Enter, GeofenceEvent::Enter)
                | (Self::Exit, GeofenceEvent::Exit)
        )
    }
}

impl std::fmt::Display for TransitionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enter => f.write_str("enter"),
            Self::Exit => f.write_str("exit"),
            Self::Both => f.write_str("both"),
        }
    }
}

/// A circular region. Only `is_active` changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceConfig {
    pub id: GeofenceId,
    pub name: String,
    pub center: Coordinates,
    pub radius_meters: f64,
    pub transition_mode: TransitionMode,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub linked_workflow_id: Option<WorkflowId>,
}

impl GeofenceConfig {
    /// Create a builder for constructing a [`GeofenceConfig`].
    #[must_use]
    pub fn builder() -> GeofenceConfigBuilder {
        GeofenceConfigBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AutoflowError::Validation`] when:
    /// - `name` is empty ([`ValidationError::EmptyName`])
    /// - the center is out of range ([`ValidationError::InvalidLatitude`], [`ValidationError::InvalidLongitude`])
    /// - the radius is not a positive finite number ([`ValidationError::InvalidRadius`])
    pub fn validate(&self) -> Result<(), AutoflowError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        self.center.validate()?;
        if !self.radius_meters.is_finite() || self.radius_meters <= 0.0 {
            return Err(ValidationError::InvalidRadius(self.radius_meters).into());
        }
        Ok(())
    }

    /// Distance from `position` to the center, in meters.
    #[must_use]
    pub fn distance_from(&self, position: &Coordinates) -> f64 {
        self.center.distance_to(position)
    }

    /// Whether `position` lies inside the region (boundary included).
    #[must_use]
    pub fn contains(&self, position: &Coordinates) -> bool {
        self.distance_from(position) <= self.radius_meters
    }
}

/// Step-by-step builder for [`GeofenceConfig`].
#[derive(Debug, Default)]
pub struct GeofenceConfigBuilder {
    id: Option<GeofenceId>,
    name: Option<String>,
    center: Option<Coordinates>,
    radius_meters: Option<f64>,
    transition_mode: Option<TransitionMode>,
    is_active: Option<bool>,
    created_at: Option<Timestamp>,
    linked_workflow_id: Option<WorkflowId>,
}

impl GeofenceConfigBuilder {
    #[must_use]
    pub fn id(mut self, id: GeofenceId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn center(mut self, latitude: f64, longitude: f64) -> Self {
        self.center = Some(Coordinates::new(latitude, longitude));
        self
    }

    #[must_use]
    pub fn radius_meters(mut self, radius: f64) -> Self {
        self.radius_meters = Some(radius);
        self
    }

    #[must_use]
    pub fn transition_mode(mut self, mode: TransitionMode) -> Self {
        self.transition_mode = Some(mode);
        self
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.is_active = Some(active);
        self
    }

    #[must_use]
    pub fn created_at(mut self, ts: Timestamp) -> Self {
        self.created_at = Some(ts);
        self
    }

    #[must_use]
    pub fn linked_workflow_id(mut self, id: WorkflowId) -> Self {
        self.linked_workflow_id = Some(id);
        self
    }

    /// Consume the builder, validate, and return a [`GeofenceConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AutoflowError::Validation`] if the name, center or radius is invalid.
    pub fn build(self) -> Result<GeofenceConfig, AutoflowError> {
        let config = GeofenceConfig {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            center: self.center.unwrap_or(Coordinates::new(0.0, 0.0)),
            radius_meters: self.radius_meters.unwrap_or(100.0),
            transition_mode: self.transition_mode.unwrap_or_default(),
            is_active: self.is_active.unwrap_or(true),
            created_at: self.created_at.unwrap_or_else(now),
            linked_workflow_id: self.linked_workflow_id,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Binds one transition of a region to a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeofenceTrigger {
    pub geofence_id: GeofenceId,
    pub event: GeofenceEvent,
    pub debounce_ms: u64,
    pub workflow_id: WorkflowId,
    /// Variable that also receives the whole transition payload.
    pub result_variable_name: Option<String>,
}

impl GeofenceTrigger {
    #[must_use]
    pub fn new(geofence_id: GeofenceId, event: GeofenceEvent, workflow_id: WorkflowId) -> Self {
        Self {
            geofence_id,
            event,
            debounce_ms: 0,
            workflow_id,
            result_variable_name: None,
        }
    }

    #[must_use]
    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    #[must_use]
    pub fn with_result_variable(mut self, name: impl Into<String>) -> Self {
        self.result_variable_name = Some(name.into());
        self
    }
}

/// A membership change detected by the monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceTransition {
    pub geofence_id: GeofenceId,
    pub geofence_name: String,
    pub event: GeofenceEvent,
    pub position: Coordinates,
    pub distance_meters: f64,
    pub timestamp: Timestamp,
    /// `true` when the linked workflow invocation was suppressed by debouncing.
    pub debounced: bool,
}
