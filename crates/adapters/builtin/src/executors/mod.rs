//! Built-in executor implementations.
//!
//! Configs are parsed with `serde` into small typed structs; a config that
//! does not parse is rejected when the workflow is loaded, through
//! [`NodeExecutor::validate`](autoflow_app::ports::NodeExecutor::validate).

mod delay;
mod log;
mod notification;
mod set_variable;
mod trigger;

pub use delay::DelayExecutor;
pub use log::LogExecutor;
pub use notification::{Notification, NotificationExecutor, Outbox};
pub use set_variable::SetVariableExecutor;
pub use trigger::TriggerExecutor;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Parse a node config into its typed shape.
fn parse<T: DeserializeOwned>(config: &Value) -> Result<T, String> {
    T::deserialize(config).map_err(|err| err.to_string())
}
