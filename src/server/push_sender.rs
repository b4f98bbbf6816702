//! Fire-and-forget webhook delivery of task snapshots.
//!
//! The bus processor invokes the sender after each successful persist.
//! Delivery failures are logged and never retried; they cannot block or
//! fail the main pipeline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::types::Task;
use crate::utils::constants::NOTIFICATION_TOKEN_HEADER;

use super::push_config::PushNotificationConfigStore;

/// Dispatches task snapshots to configured webhooks.
#[async_trait]
pub trait PushNotificationSender: Send + Sync {
    /// Deliver the latest task snapshot to every webhook configured for
    /// its task id. Must not propagate delivery failures.
    async fn send_notification(&self, task: &Task);
}

/// HTTP sender: one POST per configured webhook with the task snapshot as
/// the JSON body. A non-blank configured token is echoed in the
/// `X-A2A-Notification-Token` header.
pub struct HttpPushSender {
    client: reqwest::Client,
    config_store: Arc<dyn PushNotificationConfigStore>,
}

impl HttpPushSender {
    /// Build a sender reading webhook configs from `config_store`.
    pub fn new(config_store: Arc<dyn PushNotificationConfigStore>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            config_store,
        }
    }

    /// Build a sender with a caller-provided HTTP client.
    pub fn with_client(
        config_store: Arc<dyn PushNotificationConfigStore>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            client,
            config_store,
        }
    }
}

#[async_trait]
impl PushNotificationSender for HttpPushSender {
    async fn send_notification(&self, task: &Task) {
        let configs = match self.config_store.list_info(&task.id).await {
            Ok(configs) => configs,
            Err(err) => {
                warn!(task_id = %task.id, error = %err, "Failed to load push configs");
                return;
            }
        };

        for config in configs {
            let target = config.push_notification_config;
            let mut request = self
                .client
                .post(&target.url)
                .header("Content-Type", "application/json")
                .json(task);

            if let Some(token) = target.token.as_deref() {
                if !token.trim().is_empty() {
                    request = request.header(NOTIFICATION_TOKEN_HEADER, token);
                }
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(
                        task_id = %task.id,
                        url = %target.url,
                        "Push notification delivered"
                    );
                }
                Ok(response) => {
                    warn!(
                        task_id = %task.id,
                        url = %target.url,
                        status = response.status().as_u16(),
                        "Push notification rejected by endpoint"
                    );
                }
                Err(err) => {
                    warn!(
                        task_id = %task.id,
                        url = %target.url,
                        error = %err,
                        "Push notification delivery failed"
                    );
                }
            }
        }
    }
}
