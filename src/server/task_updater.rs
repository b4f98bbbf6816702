//! Helper for publishing task state transitions into a [`MainQueue`].
//!
//! Enforces the task state machine locally: once a terminal state
//! (completed, failed, canceled, rejected) has been published, further
//! status updates are rejected. Artifact updates carry no such guard.

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{A2AError, A2AResult};
use crate::types::{
    Artifact, Event, Message, Part, Role, TaskArtifactUpdateEvent, TaskState, TaskStatus,
    TaskStatusUpdateEvent,
};

use super::event_queue::MainQueue;

/// Publishes status and artifact events for one task.
///
/// Safe to share across tasks via `Arc<TaskUpdater>`; the terminal flag is
/// mutex-protected.
pub struct TaskUpdater {
    queue: MainQueue,
    task_id: String,
    context_id: String,
    terminal_reached: Mutex<bool>,
}

impl TaskUpdater {
    /// Create an updater for the given task and context ids.
    pub fn new(queue: MainQueue, task_id: String, context_id: String) -> Self {
        Self {
            queue,
            task_id,
            context_id,
            terminal_reached: Mutex::new(false),
        }
    }

    /// Whether a terminal status has been published.
    pub async fn is_terminal(&self) -> bool {
        *self.terminal_reached.lock().await
    }

    /// Publish a status update.
    ///
    /// Final states force `final = true` regardless of the argument. A
    /// missing timestamp is filled with the current UTC time.
    pub async fn update_status(
        &self,
        state: TaskState,
        message: Option<Message>,
        r#final: bool,
        metadata: Option<serde_json::Value>,
    ) -> A2AResult<()> {
        let is_terminal = state.is_final();
        let is_final = is_terminal || r#final;

        {
            let mut reached = self.terminal_reached.lock().await;
            if *reached {
                warn!(
                    task_id = %self.task_id,
                    requested_state = %state,
                    "Status update after terminal state rejected"
                );
                return Err(A2AError::invalid_params(format!(
                    "Task {} has already reached a terminal state — cannot transition to {}",
                    self.task_id, state
                )));
            }
            if is_terminal {
                *reached = true;
            }
        }

        let event = Event::StatusUpdate(TaskStatusUpdateEvent {
            task_id: self.task_id.clone(),
            context_id: self.context_id.clone(),
            kind: "status-update".to_string(),
            status: TaskStatus {
                state,
                message,
                timestamp: Some(Utc::now().to_rfc3339()),
            },
            r#final: is_final,
            metadata,
        });

        self.queue.enqueue_event(event).await?;

        debug!(
            task_id = %self.task_id,
            state = %state,
            terminal = is_terminal,
            "Status update published"
        );

        Ok(())
    }

    /// Publish an artifact update. An artifact id is generated when not
    /// provided.
    pub async fn add_artifact(
        &self,
        parts: Vec<Part>,
        artifact_id: Option<String>,
        name: Option<String>,
        append: Option<bool>,
        last_chunk: Option<bool>,
    ) -> A2AResult<()> {
        let artifact_id = artifact_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let event = Event::ArtifactUpdate(TaskArtifactUpdateEvent {
            task_id: self.task_id.clone(),
            context_id: self.context_id.clone(),
            kind: "artifact-update".to_string(),
            artifact: Artifact {
                artifact_id: artifact_id.clone(),
                name,
                description: None,
                parts,
                metadata: None,
                extensions: None,
            },
            append,
            last_chunk,
            metadata: None,
        });

        self.queue.enqueue_event(event).await?;

        debug!(
            task_id = %self.task_id,
            artifact_id = %artifact_id,
            "Artifact update published"
        );

        Ok(())
    }

    // ---- Common transitions ----

    /// Transition to `submitted`.
    pub async fn submit(&self, message: Option<Message>) -> A2AResult<()> {
        self.update_status(TaskState::Submitted, message, false, None)
            .await
    }

    /// Transition to `working`.
    pub async fn start_work(&self, message: Option<Message>) -> A2AResult<()> {
        self.update_status(TaskState::Working, message, false, None)
            .await
    }

    /// Transition to `completed`. Terminal.
    pub async fn complete(&self, message: Option<Message>) -> A2AResult<()> {
        self.update_status(TaskState::Completed, message, true, None)
            .await
    }

    /// Transition to `failed`. Terminal.
    pub async fn failed(&self, message: Option<Message>) -> A2AResult<()> {
        self.update_status(TaskState::Failed, message, true, None)
            .await
    }

    /// Transition to `canceled`. Terminal.
    pub async fn cancel(&self, message: Option<Message>) -> A2AResult<()> {
        self.update_status(TaskState::Canceled, message, true, None)
            .await
    }

    /// Transition to `rejected`. Terminal.
    pub async fn reject(&self, message: Option<Message>) -> A2AResult<()> {
        self.update_status(TaskState::Rejected, message, true, None)
            .await
    }

    /// Transition to `input-required`. Interrupting, not terminal.
    pub async fn requires_input(&self, message: Option<Message>, r#final: bool) -> A2AResult<()> {
        self.update_status(TaskState::InputRequired, message, r#final, None)
            .await
    }

    /// Transition to `auth-required`. Interrupting, not terminal.
    pub async fn requires_auth(&self, message: Option<Message>, r#final: bool) -> A2AResult<()> {
        self.update_status(TaskState::AuthRequired, message, r#final, None)
            .await
    }

    // ---- Text shorthands ----

    /// `working` with a text status message.
    pub async fn start_work_with_text(&self, text: &str) -> A2AResult<()> {
        let message = self.new_agent_message(vec![Part::text(text)]);
        self.start_work(Some(message)).await
    }

    /// `completed` with a text status message.
    pub async fn complete_with_text(&self, text: &str) -> A2AResult<()> {
        let message = self.new_agent_message(vec![Part::text(text)]);
        self.complete(Some(message)).await
    }

    /// `failed` with a text status message.
    pub async fn failed_with_text(&self, text: &str) -> A2AResult<()> {
        let message = self.new_agent_message(vec![Part::text(text)]);
        self.failed(Some(message)).await
    }

    /// Build an agent message bound to this task (without publishing it).
    pub fn new_agent_message(&self, parts: Vec<Part>) -> Message {
        Message {
            message_id: Uuid::new_v4().to_string(),
            role: Role::Agent,
            kind: "message".to_string(),
            parts,
            context_id: Some(self.context_id.clone()),
            task_id: Some(self.task_id.clone()),
            metadata: None,
            extensions: None,
            reference_task_ids: None,
        }
    }

    /// The task id this updater publishes for.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// The context id this updater publishes for.
    pub fn context_id(&self) -> &str {
        &self.context_id
    }
}
