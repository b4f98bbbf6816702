//! The agent executor trait — the integration point for agent logic —
//! and the request context handed to it.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::A2AResult;
use crate::types::{Message, MessageSendConfiguration, MessageSendParams, Part, Task};

use super::call_context::ServerCallContext;
use super::event_queue::MainQueue;
use super::task_store::TaskStore;

/// Context for one agent execution.
///
/// Carries the task identifiers, the incoming message, the existing task
/// state (if any), request configuration, and the per-call server context.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this task.
    pub task_id: String,

    /// Conversation context identifier — groups related tasks.
    pub context_id: String,

    /// The incoming user message. `None` for cancel requests.
    pub message: Option<Message>,

    /// The existing task when this continues a previous request.
    pub task: Option<Task>,

    /// Configuration from the client request.
    pub configuration: Option<MessageSendConfiguration>,

    /// Tasks referenced via `reference_task_ids` in the message.
    pub related_tasks: Vec<Task>,

    /// Metadata from the client request.
    pub metadata: Option<Value>,

    /// Per-call server context (user, extensions, cancellation).
    pub call_context: Option<ServerCallContext>,
}

impl RequestContext {
    /// All text content of the user message, joined by `delimiter`.
    /// Empty when there is no message or no text parts.
    pub fn get_user_input(&self, delimiter: &str) -> String {
        let Some(ref message) = self.message else {
            return String::new();
        };

        message
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(delimiter)
    }

    /// Whether the caller has requested cancellation of this execution.
    pub fn is_cancellation_requested(&self) -> bool {
        self.call_context
            .as_ref()
            .map(|ctx| ctx.cancellation.is_fired())
            .unwrap_or(false)
    }

    /// Attach a related task to this context.
    pub fn attach_related_task(&mut self, task: Task) {
        self.related_tasks.push(task);
    }

    /// Mark an extension as activated; it is indicated back to the client.
    pub fn add_activated_extension(&mut self, uri: String) {
        if let Some(ref mut ctx) = self.call_context {
            ctx.activate_extension(uri);
        }
    }

    /// Extensions the client requested to activate.
    pub fn requested_extensions(&self) -> HashSet<String> {
        self.call_context
            .as_ref()
            .map(|ctx| ctx.requested_extensions.clone())
            .unwrap_or_default()
    }
}

/// Builds a [`RequestContext`] from request parameters.
#[async_trait]
pub trait RequestContextBuilder: Send + Sync {
    /// Build a context for an execution or cancellation.
    async fn build(
        &self,
        params: Option<&MessageSendParams>,
        task_id: Option<&str>,
        context_id: Option<&str>,
        task: Option<&Task>,
        call_context: Option<ServerCallContext>,
    ) -> A2AResult<RequestContext>;
}

/// Standard [`RequestContextBuilder`] that can resolve referenced tasks
/// from a [`TaskStore`].
pub struct SimpleRequestContextBuilder {
    task_store: Option<Arc<dyn TaskStore>>,
    populate_referred_tasks: bool,
}

impl SimpleRequestContextBuilder {
    /// With `populate_referred_tasks`, tasks named in the message's
    /// `reference_task_ids` are loaded into `related_tasks`.
    pub fn new(task_store: Option<Arc<dyn TaskStore>>, populate_referred_tasks: bool) -> Self {
        Self {
            task_store,
            populate_referred_tasks,
        }
    }
}

impl Default for SimpleRequestContextBuilder {
    fn default() -> Self {
        Self::new(None, false)
    }
}

#[async_trait]
impl RequestContextBuilder for SimpleRequestContextBuilder {
    async fn build(
        &self,
        params: Option<&MessageSendParams>,
        task_id: Option<&str>,
        context_id: Option<&str>,
        task: Option<&Task>,
        call_context: Option<ServerCallContext>,
    ) -> A2AResult<RequestContext> {
        let mut related_tasks = Vec::new();

        if self.populate_referred_tasks {
            if let (Some(store), Some(params)) = (&self.task_store, params) {
                if let Some(ref ref_ids) = params.message.reference_task_ids {
                    for ref_id in ref_ids {
                        if let Some(t) = store.get(ref_id).await? {
                            related_tasks.push(t);
                        }
                    }
                }
            }
        }

        let resolved_task_id = task_id
            .map(String::from)
            .or_else(|| params.and_then(|p| p.message.task_id.clone()))
            .or_else(|| task.map(|t| t.id.clone()))
            .unwrap_or_default();

        let resolved_context_id = context_id
            .map(String::from)
            .or_else(|| params.and_then(|p| p.message.context_id.clone()))
            .or_else(|| task.map(|t| t.context_id.clone()))
            .unwrap_or_default();

        Ok(RequestContext {
            task_id: resolved_task_id,
            context_id: resolved_context_id,
            message: params.map(|p| p.message.clone()),
            task: task.cloned(),
            configuration: params.and_then(|p| p.configuration.clone()),
            related_tasks,
            metadata: params.and_then(|p| p.metadata.clone()),
            call_context,
        })
    }
}

/// Core trait for agent logic.
///
/// The runtime calls [`execute`](AgentExecutor::execute) for each new
/// message and [`cancel`](AgentExecutor::cancel) when cancellation is
/// requested. Agents publish their progress — status updates, artifacts,
/// snapshots, messages — into the task's [`MainQueue`], usually through a
/// [`TaskUpdater`](super::task_updater::TaskUpdater).
///
/// Long-running agents should check
/// [`RequestContext::is_cancellation_requested`] between emissions and
/// wind down with a `canceled` status update when it turns true.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Run the agent for a request. Returns once the agent is done or has
    /// yielded control (e.g. entered `input-required`).
    async fn execute(&self, context: RequestContext, queue: MainQueue) -> A2AResult<()>;

    /// Request cancellation of an ongoing task. The agent is expected to
    /// publish a `canceled` status update to the queue.
    async fn cancel(&self, context: RequestContext, queue: MainQueue) -> A2AResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::task_store::InMemoryTaskStore;
    use crate::types::MessageSendParams;

    #[tokio::test]
    async fn builder_resolves_ids_from_message() {
        let builder = SimpleRequestContextBuilder::default();
        let mut message = Message::user("m1", "hello");
        message.task_id = Some("t1".to_string());
        message.context_id = Some("c1".to_string());

        let params = MessageSendParams {
            message,
            configuration: None,
            metadata: None,
        };

        let ctx = builder
            .build(Some(&params), None, None, None, None)
            .await
            .unwrap();
        assert_eq!(ctx.task_id, "t1");
        assert_eq!(ctx.context_id, "c1");
    }

    #[tokio::test]
    async fn builder_populates_referred_tasks() {
        let store = Arc::new(InMemoryTaskStore::new());
        use crate::server::task_store::TaskStore as _;
        store.save(Task::submitted("ref-1", "c1")).await.unwrap();

        let builder = SimpleRequestContextBuilder::new(Some(store), true);
        let mut message = Message::user("m1", "hello");
        message.reference_task_ids = Some(vec!["ref-1".to_string(), "missing".to_string()]);

        let params = MessageSendParams {
            message,
            configuration: None,
            metadata: None,
        };

        let ctx = builder
            .build(Some(&params), Some("t1"), Some("c1"), None, None)
            .await
            .unwrap();
        assert_eq!(ctx.related_tasks.len(), 1);
        assert_eq!(ctx.related_tasks[0].id, "ref-1");
    }

    #[test]
    fn get_user_input_joins_text_parts() {
        let mut message = Message::user("m1", "one");
        message.parts.push(Part::data(serde_json::json!({"k": 1})));
        message.parts.push(Part::text("two"));

        let ctx = RequestContext {
            task_id: "t1".to_string(),
            context_id: "c1".to_string(),
            message: Some(message),
            task: None,
            configuration: None,
            related_tasks: Vec::new(),
            metadata: None,
            call_context: None,
        };
        assert_eq!(ctx.get_user_input("\n"), "one\ntwo");
    }
}
