//! Reserved trigger variables.
//!
//! Whoever starts a workflow from a background event (geofence,
//! notification, SMS, call, schedule) seeds the run's scope with
//! `trigger_type`, `trigger_timestamp` and a payload object named after
//! the source. Trigger executors read them back to tell a real event from a
//! manual run without context.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::geofence::GeofenceTransition;
use crate::time::Timestamp;
use crate::variables::VariableScope;

pub const TRIGGER_TYPE: &str = "trigger_type";
pub const TRIGGER_TIMESTAMP: &str = "trigger_timestamp";

/// Origin of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriggerSource {
    Manual,
    Time,
    Geofence,
    Notification,
    Sms,
    Call,
}

impl TriggerSource {
    /// Tag stored under [`TRIGGER_TYPE`].
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Manual => "MANUAL",
            Self::Time => "TIME",
            Self::Geofence => "GEOFENCE",
            Self::Notification => "NOTIFICATION",
            Self::Sms => "SMS",
            Self::Call => "CALL",
        }
    }

    /// Variable holding the event payload.
    #[must_use]
    pub fn payload_variable(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Time => "time",
            Self::Geofence => "geofence",
            Self::Notification => "notification",
            Self::Sms => "sms",
            Self::Call => "call",
        }
    }

    /// Source recorded in a run's scope, if any.
    #[must_use]
    pub fn from_scope(vars: &VariableScope) -> Option<Self> {
        let tag = vars.get(TRIGGER_TYPE)?.as_str()?;
        [
            Self::Manual,
            Self::Time,
            Self::Geofence,
            Self::Notification,
            Self::Sms,
            Self::Call,
        ]
        .into_iter()
        .find(|source| source.tag() == tag)
    }
}

/// Builder for the reserved variables of one run.
#[derive(Debug, Clone)]
pub struct TriggerContext {
    source: TriggerSource,
    timestamp: Timestamp,
    payload: Map<String, Value>,
    alias: Option<String>,
}

impl TriggerContext {
    #[must_use]
    pub fn new(source: TriggerSource, timestamp: Timestamp) -> Self {
        Self {
            source,
            timestamp,
            payload: Map::new(),
            alias: None,
        }
    }

    /// Context for a geofence transition.
    #[must_use]
    pub fn geofence(transition: &GeofenceTransition) -> Self {
        Self::new(TriggerSource::Geofence, transition.timestamp)
            .field("id", transition.geofence_id.to_string())
            .field("name", transition.geofence_name.clone())
            .field("event", transition.event.to_string())
            .field("latitude", transition.position.latitude)
            .field("longitude", transition.position.longitude)
            .field("distance", transition.distance_meters)
    }

    #[must_use]
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    /// Also expose the payload under a caller-chosen variable name.
    #[must_use]
    pub fn alias(mut self, name: Option<String>) -> Self {
        self.alias = name.filter(|n| !n.is_empty());
        self
    }

    /// Flatten into the variables a run is started with.
    #[must_use]
    pub fn into_variables(self) -> Map<String, Value> {
        let mut vars = Map::new();
        vars.insert(TRIGGER_TYPE.to_string(), json!(self.source.tag()));
        vars.insert(
            TRIGGER_TIMESTAMP.to_string(),
            json!(self.timestamp.to_rfc3339()),
        );
        let payload = Value::Object(self.payload);
        if let Some(alias) = self.alias {
            vars.insert(alias, payload.clone());
        }
        vars.insert(self.source.payload_variable().to_string(), payload);
        vars
    }
}
