//! Task store — pluggable persistence of canonical task records.
//!
//! Saves are atomic per task. The runtime guarantees a single writer per
//! task id (the bus processor), so implementations do not need their own
//! per-task serialization; they may be internally concurrent across
//! different task ids.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::A2AResult;
use crate::types::{ListTasksParams, ListTasksResponse, Task};
use crate::utils::apply_history_length;

/// Trait for persisting and retrieving tasks.
///
/// Errors are tagged transient vs permanent via the storage variants of
/// [`A2AError`](crate::error::A2AError); the pipeline treats both as
/// failure-to-persist and distinguishes them only for diagnostics.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Save or overwrite a task. Atomic per task.
    async fn save(&self, task: Task) -> A2AResult<()>;

    /// Retrieve a task by id. `None` when absent.
    async fn get(&self, task_id: &str) -> A2AResult<Option<Task>>;

    /// Delete a task by id. Silently succeeds when absent.
    async fn delete(&self, task_id: &str) -> A2AResult<()>;

    /// List tasks matching the filter, in stable (insertion) order, with
    /// token pagination.
    async fn list(&self, params: &ListTasksParams) -> A2AResult<ListTasksResponse>;
}

/// In-memory task store backed by a `HashMap`.
///
/// Suitable for development, testing, and single-process deployments.
/// All data is lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<String, Task>>>,
    /// Insertion order for deterministic listing and pagination.
    insertion_order: Arc<RwLock<Vec<String>>>,
}

impl InMemoryTaskStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save(&self, task: Task) -> A2AResult<()> {
        let task_id = task.id.clone();
        let mut tasks = self.tasks.write().await;
        let is_new = !tasks.contains_key(&task_id);
        tasks.insert(task_id.clone(), task);

        if is_new {
            self.insertion_order.write().await.push(task_id.clone());
        }

        debug!(task_id = %task_id, is_new, "Task saved");
        Ok(())
    }

    async fn get(&self, task_id: &str) -> A2AResult<Option<Task>> {
        let tasks = self.tasks.read().await;
        let task = tasks.get(task_id).cloned();
        debug!(task_id = %task_id, found = task.is_some(), "Task lookup");
        Ok(task)
    }

    async fn delete(&self, task_id: &str) -> A2AResult<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.remove(task_id).is_some() {
            self.insertion_order.write().await.retain(|id| id != task_id);
            debug!(task_id = %task_id, "Task deleted");
        } else {
            warn!(task_id = %task_id, "Attempted to delete non-existent task");
        }
        Ok(())
    }

    async fn list(&self, params: &ListTasksParams) -> A2AResult<ListTasksResponse> {
        let tasks = self.tasks.read().await;
        let order = self.insertion_order.read().await;

        // page_token is the last task id of the previous page.
        let start_idx = match params.page_token.as_deref() {
            Some(token) => match order.iter().position(|id| id == token) {
                Some(pos) => pos + 1,
                None => {
                    warn!(page_token = %token, "Unknown page token — starting from the beginning");
                    0
                }
            },
            None => 0,
        };

        let cutoff = params
            .status_timestamp_after
            .as_deref()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok());

        let page_size = params.page_size.unwrap_or(usize::MAX);
        let mut selected = Vec::new();
        let mut has_more = false;

        for id in order.iter().skip(start_idx) {
            let Some(task) = tasks.get(id) else {
                continue;
            };

            if let Some(ref ctx_id) = params.context_id {
                if task.context_id != *ctx_id {
                    continue;
                }
            }
            if let Some(state) = params.status {
                if task.status.state != state {
                    continue;
                }
            }
            if let Some(cutoff) = cutoff {
                let after = task
                    .status
                    .timestamp
                    .as_deref()
                    .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
                    .map(|t| t > cutoff)
                    .unwrap_or(false);
                if !after {
                    continue;
                }
            }

            if selected.len() == page_size {
                has_more = true;
                break;
            }

            let mut task = task.clone();
            if params.include_artifacts == Some(false) {
                task.artifacts = None;
            }
            task = apply_history_length(task, params.history_length);
            selected.push(task);
        }

        let next_page_token = if has_more {
            selected.last().map(|t| t.id.clone())
        } else {
            None
        };

        debug!(
            count = selected.len(),
            has_more,
            "Listed tasks"
        );

        Ok(ListTasksResponse {
            tasks: selected,
            next_page_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TaskState, TaskStatus};

    fn task(id: &str, ctx: &str, state: TaskState) -> Task {
        let mut t = Task::submitted(id, ctx);
        t.status = TaskStatus::new(state);
        t
    }

    #[tokio::test]
    async fn save_get_delete_roundtrip() {
        let store = InMemoryTaskStore::new();
        store.save(task("t1", "c1", TaskState::Submitted)).await.unwrap();

        assert!(store.get("t1").await.unwrap().is_some());
        store.delete("t1").await.unwrap();
        assert!(store.get("t1").await.unwrap().is_none());
        // Deleting again is a no-op.
        store.delete("t1").await.unwrap();
    }

    #[tokio::test]
    async fn save_overwrites() {
        let store = InMemoryTaskStore::new();
        store.save(task("t1", "c1", TaskState::Submitted)).await.unwrap();
        store.save(task("t1", "c1", TaskState::Working)).await.unwrap();

        let stored = store.get("t1").await.unwrap().unwrap();
        assert_eq!(stored.status.state, TaskState::Working);
    }

    #[tokio::test]
    async fn list_filters_by_context_and_state() {
        let store = InMemoryTaskStore::new();
        store.save(task("t1", "c1", TaskState::Working)).await.unwrap();
        store.save(task("t2", "c2", TaskState::Working)).await.unwrap();
        store.save(task("t3", "c1", TaskState::Completed)).await.unwrap();

        let result = store
            .list(&ListTasksParams {
                context_id: Some("c1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(result.tasks.len(), 2);

        let result = store
            .list(&ListTasksParams {
                context_id: Some("c1".to_string()),
                status: Some(TaskState::Completed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(result.tasks.len(), 1);
        assert_eq!(result.tasks[0].id, "t3");
    }

    #[tokio::test]
    async fn list_paginates_with_token() {
        let store = InMemoryTaskStore::new();
        for i in 0..5 {
            store
                .save(task(&format!("t{}", i), "c1", TaskState::Working))
                .await
                .unwrap();
        }

        let page1 = store
            .list(&ListTasksParams {
                page_size: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page1.tasks.len(), 2);
        assert_eq!(page1.next_page_token.as_deref(), Some("t1"));

        let page2 = store
            .list(&ListTasksParams {
                page_size: Some(2),
                page_token: page1.next_page_token,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page2.tasks[0].id, "t2");

        let page3 = store
            .list(&ListTasksParams {
                page_size: Some(2),
                page_token: page2.next_page_token,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page3.tasks.len(), 1);
        assert!(page3.next_page_token.is_none());
    }

    #[tokio::test]
    async fn list_filters_by_status_timestamp() {
        let store = InMemoryTaskStore::new();

        let mut old = task("t-old", "c1", TaskState::Working);
        old.status.timestamp = Some("2026-01-01T00:00:00Z".to_string());
        store.save(old).await.unwrap();

        let mut new = task("t-new", "c1", TaskState::Working);
        new.status.timestamp = Some("2026-06-01T00:00:00Z".to_string());
        store.save(new).await.unwrap();

        let result = store
            .list(&ListTasksParams {
                status_timestamp_after: Some("2026-03-01T00:00:00Z".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(result.tasks.len(), 1);
        assert_eq!(result.tasks[0].id, "t-new");
    }

    #[tokio::test]
    async fn list_can_exclude_artifacts_and_cap_history() {
        let store = InMemoryTaskStore::new();
        let mut t = task("t1", "c1", TaskState::Working);
        t.artifacts = Some(vec![crate::types::Artifact {
            artifact_id: "a1".to_string(),
            name: None,
            description: None,
            parts: vec![crate::types::Part::text("x")],
            metadata: None,
            extensions: None,
        }]);
        t.history = Some(
            (0..5)
                .map(|i| crate::types::Message::user(format!("m{}", i), "hi"))
                .collect(),
        );
        store.save(t).await.unwrap();

        let result = store
            .list(&ListTasksParams {
                include_artifacts: Some(false),
                history_length: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        let returned = &result.tasks[0];
        assert!(returned.artifacts.is_none());
        assert_eq!(returned.history.as_ref().unwrap().len(), 2);

        // The stored task is untouched.
        let stored = store.get("t1").await.unwrap().unwrap();
        assert!(stored.artifacts.is_some());
        assert_eq!(stored.history.unwrap().len(), 5);
    }
}
