//! Persistence of per-task push notification (webhook) configurations.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::A2AResult;
use crate::types::{PushNotificationConfig, TaskPushNotificationConfig};

/// Trait for storing per-task webhook configurations.
///
/// A task may carry multiple configs; `id` is unique within a task and a
/// set with an existing id replaces that config.
#[async_trait]
pub trait PushNotificationConfigStore: Send + Sync {
    /// Store a config for a task. A missing `id` is assigned a fresh one.
    /// Returns the stored config (with its id populated).
    async fn set_info(
        &self,
        task_id: &str,
        config: PushNotificationConfig,
    ) -> A2AResult<TaskPushNotificationConfig>;

    /// Retrieve one config. With `config_id == None`, the first config for
    /// the task is returned.
    async fn get_info(
        &self,
        task_id: &str,
        config_id: Option<&str>,
    ) -> A2AResult<Option<TaskPushNotificationConfig>>;

    /// All configs registered for the task, in registration order.
    async fn list_info(&self, task_id: &str) -> A2AResult<Vec<TaskPushNotificationConfig>>;

    /// Delete one config. Returns whether it existed.
    async fn delete_info(&self, task_id: &str, config_id: &str) -> A2AResult<bool>;
}

/// In-memory push config store.
#[derive(Debug, Default)]
pub struct InMemoryPushNotificationConfigStore {
    configs: RwLock<HashMap<String, Vec<PushNotificationConfig>>>,
}

impl InMemoryPushNotificationConfigStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PushNotificationConfigStore for InMemoryPushNotificationConfigStore {
    async fn set_info(
        &self,
        task_id: &str,
        mut config: PushNotificationConfig,
    ) -> A2AResult<TaskPushNotificationConfig> {
        if config.id.is_none() {
            config.id = Some(Uuid::new_v4().to_string());
        }

        let mut configs = self.configs.write().await;
        let entry = configs.entry(task_id.to_string()).or_default();

        match entry.iter().position(|c| c.id == config.id) {
            Some(idx) => entry[idx] = config.clone(),
            None => entry.push(config.clone()),
        }

        debug!(
            task_id = %task_id,
            config_id = config.id.as_deref().unwrap_or(""),
            "Push notification config stored"
        );

        Ok(TaskPushNotificationConfig {
            task_id: task_id.to_string(),
            push_notification_config: config,
        })
    }

    async fn get_info(
        &self,
        task_id: &str,
        config_id: Option<&str>,
    ) -> A2AResult<Option<TaskPushNotificationConfig>> {
        let configs = self.configs.read().await;
        let entry = configs.get(task_id);

        let found = match (entry, config_id) {
            (Some(entry), Some(id)) => entry.iter().find(|c| c.id.as_deref() == Some(id)),
            (Some(entry), None) => entry.first(),
            (None, _) => None,
        };

        Ok(found.map(|config| TaskPushNotificationConfig {
            task_id: task_id.to_string(),
            push_notification_config: config.clone(),
        }))
    }

    async fn list_info(&self, task_id: &str) -> A2AResult<Vec<TaskPushNotificationConfig>> {
        let configs = self.configs.read().await;
        Ok(configs
            .get(task_id)
            .map(|entry| {
                entry
                    .iter()
                    .map(|config| TaskPushNotificationConfig {
                        task_id: task_id.to_string(),
                        push_notification_config: config.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_info(&self, task_id: &str, config_id: &str) -> A2AResult<bool> {
        let mut configs = self.configs.write().await;
        let Some(entry) = configs.get_mut(task_id) else {
            return Ok(false);
        };

        let before = entry.len();
        entry.retain(|c| c.id.as_deref() != Some(config_id));
        let removed = entry.len() < before;
        if entry.is_empty() {
            configs.remove(task_id);
        }
        Ok(removed)
    }
}
