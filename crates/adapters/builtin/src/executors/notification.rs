use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use autoflow_app::ports::{NodeExecutor, NodeOutcome};
use autoflow_domain::error::AutoflowError;
use autoflow_domain::time::{Timestamp, now};
use autoflow_domain::variables::VariableScope;

use super::parse;

/// A notification delivered by a `NOTIFICATION` node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub sent_at: Timestamp,
}

/// Shared in-memory sink standing in for the platform notification service.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl Outbox {
    fn lock(&self) -> MutexGuard<'_, Vec<Notification>> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `notification` and return its position in the outbox.
    fn push(&self, notification: Notification) -> usize {
        let mut sent = self.lock();
        sent.push(notification);
        sent.len()
    }

    /// Snapshot of every notification sent so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[derive(Debug, Default, Deserialize)]
struct NotificationConfig {
    #[serde(default)]
    title: String,
    #[serde(default)]
    message: String,
}

/// `NOTIFICATION`: resolves `title` and `message` and posts them to the
/// [`Outbox`].
#[derive(Debug, Clone)]
pub struct NotificationExecutor {
    outbox: Outbox,
}

impl NotificationExecutor {
    #[must_use]
    pub fn new(outbox: Outbox) -> Self {
        Self { outbox }
    }
}

#[async_trait]
impl NodeExecutor for NotificationExecutor {
    async fn execute(
        &self,
        config: &Value,
        vars: &mut VariableScope,
        _cancel: CancellationToken,
    ) -> Result<NodeOutcome, AutoflowError> {
        let config: NotificationConfig = match parse(config) {
            Ok(config) => config,
            Err(reason) => return Ok(NodeOutcome::failed(reason)),
        };
        let notification = Notification {
            title: vars.resolve_string(&config.title),
            message: vars.resolve_string(&config.message),
            sent_at: now(),
        };
        let title = notification.title.clone();
        let notification_id = self.outbox.push(notification);
        tracing::info!(notification_id, %title, "notification sent");
        Ok(NodeOutcome::ok().with_field("notificationId", notification_id))
    }

    fn validate(&self, config: &Value) -> Result<(), String> {
        let config: NotificationConfig = parse(config)?;
        if config.title.is_empty() && config.message.is_empty() {
            return Err("notification needs a title or a message".to_string());
        }
        Ok(())
    }
}
