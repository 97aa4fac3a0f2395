//! Trigger executors, the entry nodes of a workflow.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use autoflow_app::ports::{NodeExecutor, NodeOutcome};
use autoflow_domain::error::AutoflowError;
use autoflow_domain::geofence::GeofenceEvent;
use autoflow_domain::id::GeofenceId;
use autoflow_domain::trigger::{TRIGGER_TIMESTAMP, TriggerSource};
use autoflow_domain::variables::VariableScope;

use super::parse;

/// Optional filters of a `GEOFENCE_TRIGGER` node.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeofenceFilter {
    #[serde(default)]
    geofence_id: Option<GeofenceId>,
    #[serde(default)]
    event: Option<EventFilter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum EventFilter {
    Enter,
    Exit,
    Both,
}

impl EventFilter {
    fn matches(self, event: &str) -> bool {
        match self {
            Self::Both => true,
            Self::Enter => event == GeofenceEvent::Enter.to_string(),
            Self::Exit => event == GeofenceEvent::Exit.to_string(),
        }
    }
}

/// Starts a run and checks it was started by the expected kind of event.
///
/// Manual and time triggers accept runs without context. Event triggers
/// fail with an explanation when the reserved trigger variables of their
/// event are missing, which happens when such a workflow is run by hand.
/// A geofence trigger whose `geofenceId`/`event` filter rejects the
/// transition ends the run there.
#[derive(Debug, Clone, Copy)]
pub struct TriggerExecutor {
    source: TriggerSource,
}

impl TriggerExecutor {
    #[must_use]
    pub fn new(source: TriggerSource) -> Self {
        Self { source }
    }

    fn requires_context(self) -> bool {
        !matches!(self.source, TriggerSource::Manual | TriggerSource::Time)
    }

    fn missing_context_message(self) -> String {
        let cause = match self.source {
            TriggerSource::Geofence => "entering or leaving a geofence",
            TriggerSource::Notification => "an incoming notification",
            TriggerSource::Sms => "an incoming SMS",
            TriggerSource::Call => "a phone call",
            TriggerSource::Manual | TriggerSource::Time => "its schedule",
        };
        format!("This workflow must be triggered by {cause}; it cannot be run manually.")
    }

    fn check_geofence(config: &Value, payload: &Value) -> Result<(), String> {
        let filter: GeofenceFilter = if config.is_null() {
            GeofenceFilter::default()
        } else {
            parse(config)?
        };
        if let Some(expected) = filter.geofence_id {
            let actual = payload.get("id").and_then(Value::as_str).unwrap_or_default();
            if actual != expected.to_string() {
                return Err(format!("Triggered by geofence {actual}, expected {expected}."));
            }
        }
        if let Some(event) = filter.event {
            let actual = payload.get("event").and_then(Value::as_str).unwrap_or_default();
            if !event.matches(actual) {
                return Err(format!("Triggered by a geofence {actual} event, which this trigger ignores."));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl NodeExecutor for TriggerExecutor {
    async fn execute(
        &self,
        config: &Value,
        vars: &mut VariableScope,
        _cancel: CancellationToken,
    ) -> Result<NodeOutcome, AutoflowError> {
        let triggered_by = TriggerSource::from_scope(vars);
        if triggered_by != Some(self.source) {
            if self.requires_context() {
                return Ok(NodeOutcome::failed(self.missing_context_message()));
            }
            return Ok(NodeOutcome::ok().with_field("triggerType", self.source.tag()));
        }

        let payload = vars
            .get(self.source.payload_variable())
            .cloned()
            .unwrap_or(Value::Null);
        if self.source == TriggerSource::Geofence
            && let Err(reason) = Self::check_geofence(config, &payload)
        {
            tracing::debug!(%reason, "geofence transition filtered out");
            return Ok(NodeOutcome::stopped(reason));
        }

        let mut outcome = NodeOutcome::ok().with_field("triggerType", self.source.tag());
        if let Some(timestamp) = vars.get(TRIGGER_TIMESTAMP) {
            outcome = outcome.with_field("timestamp", timestamp.clone());
        }
        Ok(outcome.with_field("event", payload))
    }

    fn validate(&self, config: &Value) -> Result<(), String> {
        if self.source == TriggerSource::Geofence && !config.is_null() {
            parse::<GeofenceFilter>(config)?;
        }
        Ok(())
    }
}
