use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use autoflow_app::ports::{NodeExecutor, NodeOutcome};
use autoflow_domain::error::AutoflowError;
use autoflow_domain::variables::VariableScope;

use super::parse;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Level {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

#[derive(Debug, Deserialize)]
struct LogConfig {
    message: String,
    #[serde(default)]
    level: Level,
}

/// `LOG`: resolves `message` and emits it through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogExecutor;

#[async_trait]
impl NodeExecutor for LogExecutor {
    async fn execute(
        &self,
        config: &Value,
        vars: &mut VariableScope,
        _cancel: CancellationToken,
    ) -> Result<NodeOutcome, AutoflowError> {
        let config: LogConfig = match parse(config) {
            Ok(config) => config,
            Err(reason) => return Ok(NodeOutcome::failed(reason)),
        };
        let message = vars.resolve_string(&config.message);
        match config.level {
            Level::Debug => tracing::debug!(target: "autoflow::workflow", "{message}"),
            Level::Info => tracing::info!(target: "autoflow::workflow", "{message}"),
            Level::Warn => tracing::warn!(target: "autoflow::workflow", "{message}"),
            Level::Error => tracing::error!(target: "autoflow::workflow", "{message}"),
        }
        Ok(NodeOutcome::ok().with_field("message", message))
    }

    fn validate(&self, config: &Value) -> Result<(), String> {
        parse::<LogConfig>(config).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn should_expose_resolved_message() {
        let mut vars = VariableScope::new();
        vars.set("geofence", json!({"name": "Office"}));

        let outcome = LogExecutor
            .execute(
                &json!({"message": "arrived at {{geofence.name}}", "level": "warn"}),
                &mut vars,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.fields["message"], "arrived at Office");
    }

    #[test]
    fn should_reject_unknown_level() {
        assert!(LogExecutor
            .validate(&json!({"message": "x", "level": "loud"}))
            .is_err());
    }
}
