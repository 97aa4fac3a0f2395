use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use autoflow_app::ports::{NodeExecutor, NodeOutcome};
use autoflow_domain::error::AutoflowError;
use autoflow_domain::variables::VariableScope;

use super::parse;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DelayConfig {
    #[serde(default)]
    milliseconds: Option<f64>,
    #[serde(default)]
    seconds: Option<f64>,
}

impl DelayConfig {
    fn duration(&self) -> Result<Duration, String> {
        let millis = match (self.milliseconds, self.seconds) {
            (Some(ms), _) => ms,
            (None, Some(s)) => s * 1000.0,
            (None, None) => return Err("delay needs `milliseconds` or `seconds`".to_string()),
        };
        if !millis.is_finite() || millis < 0.0 {
            return Err(format!("delay of {millis} ms is not a valid duration"));
        }
        Duration::try_from_secs_f64(millis / 1000.0).map_err(|err| err.to_string())
    }
}

/// `DELAY`: pauses the branch, giving up as soon as the run is cancelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelayExecutor;

#[async_trait]
impl NodeExecutor for DelayExecutor {
    async fn execute(
        &self,
        config: &Value,
        _vars: &mut VariableScope,
        cancel: CancellationToken,
    ) -> Result<NodeOutcome, AutoflowError> {
        let duration = match parse::<DelayConfig>(config).and_then(|c| c.duration()) {
            Ok(duration) => duration,
            Err(reason) => return Ok(NodeOutcome::failed(reason)),
        };
        tokio::select! {
            () = tokio::time::sleep(duration) => {}
            () = cancel.cancelled() => return Err(AutoflowError::Cancelled),
        }
        #[allow(clippy::cast_possible_truncation)]
        let waited = duration.as_millis() as u64;
        Ok(NodeOutcome::ok().with_field("waitedMs", waited))
    }

    fn validate(&self, config: &Value) -> Result<(), String> {
        parse::<DelayConfig>(config)?.duration().map(|_| ())
    }
}
