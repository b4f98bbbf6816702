//! Request handling — the transport-independent logical surface.
//!
//! [`RequestHandler`] is the uniform contract every wire adapter
//! (JSON-RPC, REST, gRPC) dispatches into. [`DefaultRequestHandler`] is
//! the standard implementation: it validates the call context, admits or
//! resolves the task, launches the agent executor against the task's
//! [`MainQueue`](super::event_queue::MainQueue), and serves responses
//! either as a blocking snapshot or as an [`EventStream`] backed by a
//! freshly tapped child queue.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{A2AError, A2AResult};
use crate::types::{
    AgentCard, DeleteTaskPushNotificationConfigParams, Event, GetTaskPushNotificationConfigParams,
    ListTaskPushNotificationConfigParams, ListTasksParams, ListTasksResponse, Message,
    MessageSendParams, SendMessageResponse, Task, TaskIdParams, TaskPushNotificationConfig,
    TaskQueryParams, TaskState,
};
use crate::utils::{apply_history_length, required_extensions, SUPPORTED_PROTOCOL_VERSIONS};

use super::agent_executor::{AgentExecutor, RequestContextBuilder, SimpleRequestContextBuilder};
use super::call_context::{CancellationSignal, ServerCallContext};
use super::event_queue::{ChildQueue, DequeueOutcome};
use super::push_config::PushNotificationConfigStore;
use super::queue_manager::QueueManager;
use super::streaming::{event_stream, EventStream};
use super::task_store::TaskStore;

/// Poll interval for blocking consumption.
const CONSUME_POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Bounded wait for the canceled status after signaling cancellation.
const CANCEL_WAIT: Duration = Duration::from_secs(5);

/// The transport-independent request surface.
///
/// Every method receives the per-call [`ServerCallContext`]; adapters
/// populate it from wire headers and fire its cancellation signal on
/// client disconnect.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// `message/send` — blocking: returns the task snapshot (or a direct
    /// message) once the task reaches a terminal or interrupting state.
    async fn on_message_send(
        &self,
        params: MessageSendParams,
        ctx: ServerCallContext,
    ) -> A2AResult<SendMessageResponse>;

    /// `message/stream` — returns a live event stream for the task.
    async fn on_message_send_stream(
        &self,
        params: MessageSendParams,
        ctx: ServerCallContext,
    ) -> A2AResult<EventStream>;

    /// `tasks/get`.
    async fn on_get_task(
        &self,
        params: TaskQueryParams,
        ctx: ServerCallContext,
    ) -> A2AResult<Task>;

    /// `tasks/list`.
    async fn on_list_tasks(
        &self,
        params: ListTasksParams,
        ctx: ServerCallContext,
    ) -> A2AResult<ListTasksResponse>;

    /// `tasks/cancel`.
    async fn on_cancel_task(&self, params: TaskIdParams, ctx: ServerCallContext)
        -> A2AResult<Task>;

    /// `tasks/subscribe` — join the live event feed of an existing task.
    /// No replay: only future events.
    async fn on_subscribe_to_task(
        &self,
        params: TaskIdParams,
        ctx: ServerCallContext,
    ) -> A2AResult<EventStream>;

    /// `tasks/resubscribe` — rejoin after a disconnect. Same semantics as
    /// subscribe.
    async fn on_resubscribe_to_task(
        &self,
        params: TaskIdParams,
        ctx: ServerCallContext,
    ) -> A2AResult<EventStream> {
        self.on_subscribe_to_task(params, ctx).await
    }

    /// `tasks/pushNotificationConfig/set`.
    async fn on_set_task_push_notification_config(
        &self,
        params: TaskPushNotificationConfig,
        ctx: ServerCallContext,
    ) -> A2AResult<TaskPushNotificationConfig>;

    /// `tasks/pushNotificationConfig/get`.
    async fn on_get_task_push_notification_config(
        &self,
        params: GetTaskPushNotificationConfigParams,
        ctx: ServerCallContext,
    ) -> A2AResult<TaskPushNotificationConfig>;

    /// `tasks/pushNotificationConfig/list`.
    async fn on_list_task_push_notification_config(
        &self,
        params: ListTaskPushNotificationConfigParams,
        ctx: ServerCallContext,
    ) -> A2AResult<Vec<TaskPushNotificationConfig>>;

    /// `tasks/pushNotificationConfig/delete`.
    async fn on_delete_task_push_notification_config(
        &self,
        params: DeleteTaskPushNotificationConfigParams,
        ctx: ServerCallContext,
    ) -> A2AResult<()>;

    /// `agent/authenticatedExtendedCard`.
    async fn on_get_extended_card(&self, ctx: ServerCallContext) -> A2AResult<AgentCard>;
}

/// A live agent execution tracked for cancellation.
struct RunningAgent {
    /// Fired to ask the executor to wind down.
    cancellation: CancellationSignal,
}

/// Standard [`RequestHandler`] implementation.
pub struct DefaultRequestHandler {
    executor: Arc<dyn AgentExecutor>,
    task_store: Arc<dyn TaskStore>,
    queue_manager: Arc<dyn QueueManager>,
    push_config_store: Option<Arc<dyn PushNotificationConfigStore>>,
    context_builder: Arc<dyn RequestContextBuilder>,
    card: AgentCard,
    extended_card: Option<AgentCard>,
    running_agents: Arc<Mutex<HashMap<String, RunningAgent>>>,
}

impl DefaultRequestHandler {
    /// Wire a handler from its collaborators.
    pub fn new(
        executor: Arc<dyn AgentExecutor>,
        task_store: Arc<dyn TaskStore>,
        queue_manager: Arc<dyn QueueManager>,
        card: AgentCard,
    ) -> Self {
        let context_builder = Arc::new(SimpleRequestContextBuilder::new(
            Some(Arc::clone(&task_store)),
            true,
        ));
        Self {
            executor,
            task_store,
            queue_manager,
            push_config_store: None,
            context_builder,
            card,
            extended_card: None,
            running_agents: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Enable push-notification config CRUD.
    pub fn with_push_config_store(mut self, store: Arc<dyn PushNotificationConfigStore>) -> Self {
        self.push_config_store = Some(store);
        self
    }

    /// Install an authenticated extended card.
    pub fn with_extended_card(mut self, card: AgentCard) -> Self {
        self.extended_card = Some(card);
        self
    }

    /// Replace the request-context builder.
    pub fn with_context_builder(mut self, builder: Arc<dyn RequestContextBuilder>) -> Self {
        self.context_builder = builder;
        self
    }

    /// Validate protocol version and required extensions for a call.
    fn validate_call(&self, ctx: &ServerCallContext) -> A2AResult<()> {
        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&ctx.protocol_version.as_str()) {
            return Err(A2AError::VersionNotSupported {
                version: ctx.protocol_version.clone(),
            });
        }

        for uri in required_extensions(&self.card) {
            if !ctx.requested_extensions.contains(uri) {
                return Err(A2AError::ExtensionSupportRequired {
                    uri: uri.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Resolve or create the task a message addresses.
    ///
    /// A message naming an existing task continues it: its new message is
    /// appended to history (demoting any current status message first).
    /// A message naming an unknown task is rejected; a message naming no
    /// task creates a fresh `submitted` one.
    async fn admit(&self, params: &MessageSendParams) -> A2AResult<Task> {
        if let Some(ref task_id) = params.message.task_id {
            let Some(task) = self.task_store.get(task_id).await? else {
                return Err(A2AError::task_not_found(format!(
                    "Task {} was specified but does not exist",
                    task_id
                )));
            };

            if task.status.state.is_final() {
                return Err(A2AError::invalid_params(format!(
                    "Task {} is in terminal state: {}",
                    task_id, task.status.state
                )));
            }

            let mut task = task;
            if let Some(status_msg) = task.status.message.take() {
                task.history.get_or_insert_with(Vec::new).push(status_msg);
            }
            task.history
                .get_or_insert_with(Vec::new)
                .push(params.message.clone());
            self.task_store.save(task.clone()).await?;
            return Ok(task);
        }

        let task_id = Uuid::new_v4().to_string();
        let context_id = params
            .message
            .context_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut task = Task::submitted(task_id, context_id);
        task.status = crate::types::TaskStatus::now(TaskState::Submitted);
        task.history = Some(vec![params.message.clone()]);
        task.metadata = params.metadata.clone();

        self.task_store.save(task.clone()).await?;
        info!(task_id = %task.id, "New task created");
        Ok(task)
    }

    /// Persist a request-scoped push config, when one was sent.
    async fn store_push_config_if_requested(
        &self,
        task_id: &str,
        params: &MessageSendParams,
    ) -> A2AResult<()> {
        let Some(config) = params
            .configuration
            .as_ref()
            .and_then(|c| c.push_notification_config.clone())
        else {
            return Ok(());
        };

        let Some(store) = &self.push_config_store else {
            return Err(A2AError::push_notification_not_supported(
                "no push notification config store is configured",
            ));
        };

        store.set_info(task_id, config).await?;
        Ok(())
    }

    /// Launch the executor against the task's main queue; its cancellation
    /// signal is tracked for `tasks/cancel`.
    async fn launch_executor(
        &self,
        params: &MessageSendParams,
        task: &Task,
        ctx: &ServerCallContext,
    ) -> A2AResult<JoinHandle<()>> {
        let queue = self
            .queue_manager
            .get(&task.id)
            .await
            .ok_or_else(|| A2AError::internal("task queue vanished before executor launch"))?;

        let mut exec_ctx = ctx.clone();
        exec_ctx.cancellation = CancellationSignal::new();
        let cancellation = exec_ctx.cancellation.clone();

        let context = self
            .context_builder
            .build(
                Some(params),
                Some(&task.id),
                Some(&task.context_id),
                Some(task),
                Some(exec_ctx),
            )
            .await?;

        {
            let mut running = self.running_agents.lock().await;
            running.insert(task.id.clone(), RunningAgent { cancellation });
        }

        let executor = Arc::clone(&self.executor);
        let running_agents = Arc::clone(&self.running_agents);
        let task_id = task.id.clone();
        let context_id = task.context_id.clone();

        let handle = tokio::spawn(async move {
            if let Err(err) = executor.execute(context, queue.clone()).await {
                error!(task_id = %task_id, error = %err, "Agent execution failed");

                let failed = Event::StatusUpdate(crate::types::TaskStatusUpdateEvent {
                    task_id: task_id.clone(),
                    context_id,
                    kind: "status-update".to_string(),
                    status: crate::types::TaskStatus {
                        state: TaskState::Failed,
                        message: Some(Message::agent(
                            Uuid::new_v4().to_string(),
                            format!("Agent execution failed: {}", err),
                        )),
                        timestamp: Some(chrono::Utc::now().to_rfc3339()),
                    },
                    r#final: true,
                    metadata: None,
                });
                if let Err(err) = queue.enqueue_event(failed).await {
                    error!(task_id = %task_id, error = %err, "Failed to publish failure status");
                }
            }
            running_agents.lock().await.remove(&task_id);
        });

        Ok(handle)
    }

    /// Consume from a child queue until the task terminates or interrupts.
    ///
    /// Returns a direct agent message when one arrives (it ends the
    /// exchange); otherwise `None`, and the caller reads the canonical
    /// task from the store. With `first_event_only` (non-blocking send),
    /// returns after the first observed event.
    async fn consume_until_settled(
        &self,
        task_id: &str,
        child: &mut ChildQueue,
        first_event_only: bool,
        executor_handle: &JoinHandle<()>,
    ) -> A2AResult<Option<Message>> {
        loop {
            match child.dequeue(CONSUME_POLL_TIMEOUT).await {
                DequeueOutcome::Item(item) => {
                    match item.event {
                        Event::Message(message) => return Ok(Some(message)),
                        Event::StatusUpdate(ref update) => {
                            if update.r#final || update.status.state.is_interrupting() {
                                return Ok(None);
                            }
                        }
                        Event::Task(ref snapshot) => {
                            if snapshot.status.state.is_final() {
                                return Ok(None);
                            }
                        }
                        Event::ArtifactUpdate(_) | Event::InternalError(_) => {}
                    }
                    if first_event_only {
                        return Ok(None);
                    }
                }
                DequeueOutcome::Timeout => {
                    // A finished executor with nothing buffered means no
                    // further events are coming for this exchange.
                    if executor_handle.is_finished() && child.size() == 0 {
                        warn!(task_id = %task_id, "Executor finished without a settling event");
                        return Ok(None);
                    }
                }
                DequeueOutcome::Closed => return Ok(None),
            }
        }
    }

    fn require_push_store(&self) -> A2AResult<&Arc<dyn PushNotificationConfigStore>> {
        if self.card.capabilities.push_notifications != Some(true) {
            return Err(A2AError::push_notification_not_supported(
                "agent does not advertise push notification support",
            ));
        }
        self.push_config_store.as_ref().ok_or_else(|| {
            A2AError::push_notification_not_supported(
                "no push notification config store is configured",
            )
        })
    }

    async fn require_task(&self, task_id: &str) -> A2AResult<Task> {
        self.task_store
            .get(task_id)
            .await?
            .ok_or_else(|| A2AError::task_not_found(task_id.to_string()))
    }
}

#[async_trait]
impl RequestHandler for DefaultRequestHandler {
    async fn on_message_send(
        &self,
        params: MessageSendParams,
        ctx: ServerCallContext,
    ) -> A2AResult<SendMessageResponse> {
        self.validate_call(&ctx)?;
        let task = self.admit(&params).await?;
        self.store_push_config_if_requested(&task.id, &params).await?;

        let mut child = self.queue_manager.create_or_tap(&task.id).await;
        let handle = self.launch_executor(&params, &task, &ctx).await?;

        let blocking = params
            .configuration
            .as_ref()
            .and_then(|c| c.blocking)
            .unwrap_or(true);

        let direct_message = self
            .consume_until_settled(&task.id, &mut child, !blocking, &handle)
            .await?;
        child.close(false, true);

        if let Some(message) = direct_message {
            return Ok(SendMessageResponse::Message(message));
        }

        let task = self.require_task(&task.id).await?;
        let history_length = params.configuration.as_ref().and_then(|c| c.history_length);
        Ok(SendMessageResponse::Task(apply_history_length(
            task,
            history_length,
        )))
    }

    async fn on_message_send_stream(
        &self,
        params: MessageSendParams,
        ctx: ServerCallContext,
    ) -> A2AResult<EventStream> {
        self.validate_call(&ctx)?;
        let task = self.admit(&params).await?;
        self.store_push_config_if_requested(&task.id, &params).await?;

        let child = self.queue_manager.create_or_tap(&task.id).await;
        let _handle = self.launch_executor(&params, &task, &ctx).await?;

        debug!(task_id = %task.id, "Streaming send attached");
        Ok(event_stream(child))
    }

    async fn on_get_task(
        &self,
        params: TaskQueryParams,
        ctx: ServerCallContext,
    ) -> A2AResult<Task> {
        self.validate_call(&ctx)?;
        let task = self.require_task(&params.id).await?;
        Ok(apply_history_length(task, params.history_length))
    }

    async fn on_list_tasks(
        &self,
        params: ListTasksParams,
        ctx: ServerCallContext,
    ) -> A2AResult<ListTasksResponse> {
        self.validate_call(&ctx)?;
        self.task_store.list(&params).await
    }

    async fn on_cancel_task(
        &self,
        params: TaskIdParams,
        ctx: ServerCallContext,
    ) -> A2AResult<Task> {
        self.validate_call(&ctx)?;
        let task = self.require_task(&params.id).await?;

        // Cancel from a final state is rejected without side effects.
        if task.status.state.is_final() {
            return Err(A2AError::task_not_cancelable(format!(
                "Task {} is in terminal state: {}",
                task.id, task.status.state
            )));
        }

        let mut child = self.queue_manager.create_or_tap(&task.id).await;
        let queue = self
            .queue_manager
            .get(&task.id)
            .await
            .ok_or_else(|| A2AError::internal("task queue vanished during cancel"))?;

        // Signal the running executor, then invoke its cancel entry point.
        {
            let running = self.running_agents.lock().await;
            if let Some(agent) = running.get(&task.id) {
                agent.cancellation.fire();
            }
        }

        let context = self
            .context_builder
            .build(
                None,
                Some(&task.id),
                Some(&task.context_id),
                Some(&task),
                Some(ctx),
            )
            .await?;
        self.executor.cancel(context, queue).await?;

        // Bounded wait for the canceled status to land; on expiry, return
        // whatever the canonical record says.
        let deadline = Instant::now() + CANCEL_WAIT;
        loop {
            match child.dequeue(CONSUME_POLL_TIMEOUT).await {
                DequeueOutcome::Item(item) => {
                    if let Event::StatusUpdate(ref update) = item.event {
                        if update.status.state.is_final() {
                            break;
                        }
                    }
                }
                DequeueOutcome::Closed => break,
                DequeueOutcome::Timeout => {}
            }
            if Instant::now() >= deadline {
                warn!(task_id = %task.id, "Cancel wait expired — returning canonical state");
                break;
            }
        }
        child.close(false, true);

        self.require_task(&params.id).await
    }

    async fn on_subscribe_to_task(
        &self,
        params: TaskIdParams,
        ctx: ServerCallContext,
    ) -> A2AResult<EventStream> {
        self.validate_call(&ctx)?;

        if let Some(queue) = self.queue_manager.get(&params.id).await {
            debug!(task_id = %params.id, "Subscriber tapped live queue");
            return Ok(event_stream(queue.tap()));
        }

        // No live queue: the task must at least exist, and a finalized
        // task has no future events to stream.
        let task = self.require_task(&params.id).await?;
        if task.status.state.is_final() {
            return Err(A2AError::invalid_params(format!(
                "Task {} is in terminal state: {} — nothing to subscribe to",
                task.id, task.status.state
            )));
        }

        let child = self.queue_manager.create_or_tap(&params.id).await;
        Ok(event_stream(child))
    }

    async fn on_set_task_push_notification_config(
        &self,
        params: TaskPushNotificationConfig,
        ctx: ServerCallContext,
    ) -> A2AResult<TaskPushNotificationConfig> {
        self.validate_call(&ctx)?;
        let store = self.require_push_store()?;
        self.require_task(&params.task_id).await?;
        store
            .set_info(&params.task_id, params.push_notification_config)
            .await
    }

    async fn on_get_task_push_notification_config(
        &self,
        params: GetTaskPushNotificationConfigParams,
        ctx: ServerCallContext,
    ) -> A2AResult<TaskPushNotificationConfig> {
        self.validate_call(&ctx)?;
        let store = self.require_push_store()?;
        self.require_task(&params.id).await?;
        store
            .get_info(&params.id, params.push_notification_config_id.as_deref())
            .await?
            .ok_or_else(|| {
                A2AError::task_not_found(format!(
                    "no push notification config for task {}",
                    params.id
                ))
            })
    }

    async fn on_list_task_push_notification_config(
        &self,
        params: ListTaskPushNotificationConfigParams,
        ctx: ServerCallContext,
    ) -> A2AResult<Vec<TaskPushNotificationConfig>> {
        self.validate_call(&ctx)?;
        let store = self.require_push_store()?;
        self.require_task(&params.id).await?;
        store.list_info(&params.id).await
    }

    async fn on_delete_task_push_notification_config(
        &self,
        params: DeleteTaskPushNotificationConfigParams,
        ctx: ServerCallContext,
    ) -> A2AResult<()> {
        self.validate_call(&ctx)?;
        let store = self.require_push_store()?;
        self.require_task(&params.id).await?;
        store
            .delete_info(&params.id, &params.push_notification_config_id)
            .await?;
        Ok(())
    }

    async fn on_get_extended_card(&self, ctx: ServerCallContext) -> A2AResult<AgentCard> {
        self.validate_call(&ctx)?;
        let card = self.extended_card.as_ref().ok_or_else(|| {
            A2AError::extended_card_not_configured("no extended card is installed")
        })?;
        if !ctx.user.authenticated {
            return Err(A2AError::Authentication {
                message: "extended card requires an authenticated caller".to_string(),
            });
        }
        Ok(card.clone())
    }
}
