use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use autoflow_app::ports::{NodeExecutor, NodeOutcome};
use autoflow_domain::error::AutoflowError;
use autoflow_domain::variables::VariableScope;

use super::parse;

#[derive(Debug, Deserialize)]
struct SetVariableConfig {
    name: String,
    #[serde(default)]
    value: Value,
}

/// `SET_VARIABLE`: writes `value` into the scope under `name`.
///
/// String values are resolved as templates first, so `"{{contacts}}"`
/// copies the whole list and `"Hi {{user.name}}"` interpolates text.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetVariableExecutor;

#[async_trait]
impl NodeExecutor for SetVariableExecutor {
    async fn execute(
        &self,
        config: &Value,
        vars: &mut VariableScope,
        _cancel: CancellationToken,
    ) -> Result<NodeOutcome, AutoflowError> {
        let config: SetVariableConfig = match parse(config) {
            Ok(config) => config,
            Err(reason) => return Ok(NodeOutcome::failed(reason)),
        };
        let value = match &config.value {
            Value::String(template) => vars.resolve_value(template),
            other => other.clone(),
        };
        vars.set(config.name.clone(), value.clone());
        Ok(NodeOutcome::ok()
            .with_field("name", config.name)
            .with_field("value", value))
    }

    fn validate(&self, config: &Value) -> Result<(), String> {
        let config: SetVariableConfig = parse(config)?;
        if config.name.trim().is_empty() {
            return Err("variable name must not be empty".to_string());
        }
        Ok(())
    }
}
