//! Transport-agnostic A2A client.
//!
//! Consolidates blocking vs streaming semantics behind one call surface:
//! a send is served over the streaming binding when both the client
//! configuration and the agent card allow it, and silently falls back to
//! the blocking binding otherwise. `resubscribe` has no blocking
//! equivalent and errors when streaming is unavailable.
//!
//! Every streamed event is folded through a per-stream [`TaskMirror`]
//! before reaching consumers, so consumers never observe partial task
//! state. Stream-level failures go to the configured error handler; the
//! stream itself keeps running until the transport closes it.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, warn};

use crate::error::{A2AError, A2AResult};
use crate::types::{
    AgentCard, DeleteTaskPushNotificationConfigParams, GetTaskPushNotificationConfigParams,
    ListTaskPushNotificationConfigParams, ListTasksParams, ListTasksResponse, Message,
    MessageSendParams, Role, SendMessageResponse, Task, TaskIdParams, TaskPushNotificationConfig,
    TaskQueryParams,
};
use crate::utils::create_text_message;

use super::card_resolver::CardResolver;
use super::mirror::{ClientEvent, TaskMirror};
use super::transport::{ClientTransport, JsonRpcTransport};

/// Observer invoked for every folded stream event.
pub type EventConsumer = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

/// Handler for stream-level errors (transport hiccups, undecodable
/// frames). The stream continues unless the transport closes it.
pub type StreamErrorHandler = Arc<dyn Fn(&A2AError) + Send + Sync>;

/// Client-side behavior switches.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Ask for streaming when the agent supports it.
    pub streaming: bool,

    /// History cap requested on send responses.
    pub history_length: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            streaming: true,
            history_length: None,
        }
    }
}

/// Transport-agnostic client for A2A agents.
pub struct Client {
    transport: Box<dyn ClientTransport>,
    config: ClientConfig,
    agent_card: Option<AgentCard>,
    consumers: Vec<EventConsumer>,
    error_handler: Option<StreamErrorHandler>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("agent_card", &self.agent_card.as_ref().map(|c| &c.name))
            .field("consumers", &self.consumers.len())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Resolve the agent card at `base_url` and connect over JSON-RPC.
    pub async fn from_url(base_url: &str) -> A2AResult<Self> {
        let card = CardResolver::new().resolve(base_url).await?;
        Self::from_card(card)
    }

    /// Connect using an already-resolved card.
    pub fn from_card(card: AgentCard) -> A2AResult<Self> {
        let url = CardResolver::jsonrpc_url(&card).ok_or_else(|| {
            A2AError::Transport(format!(
                "agent card for '{}' declares no JSONRPC interface",
                card.name
            ))
        })?;
        let transport = JsonRpcTransport::new(url);
        Ok(Self {
            transport: Box::new(transport),
            config: ClientConfig::default(),
            agent_card: Some(card),
            consumers: Vec::new(),
            error_handler: None,
        })
    }

    /// Connect with a custom transport (REST, a preconfigured JSON-RPC
    /// binding, or a test double).
    pub fn with_transport(transport: Box<dyn ClientTransport>) -> Self {
        Self {
            transport,
            config: ClientConfig::default(),
            agent_card: None,
            consumers: Vec::new(),
            error_handler: None,
        }
    }

    /// Replace the client configuration.
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Provide the agent card when the transport was built directly.
    pub fn with_card(mut self, card: AgentCard) -> Self {
        self.agent_card = Some(card);
        self
    }

    /// Register a consumer for folded stream events.
    pub fn add_consumer(&mut self, consumer: EventConsumer) {
        self.consumers.push(consumer);
    }

    /// Register the stream error handler.
    pub fn set_error_handler(&mut self, handler: StreamErrorHandler) {
        self.error_handler = Some(handler);
    }

    /// The cached agent card.
    pub fn card(&self) -> Option<&AgentCard> {
        self.agent_card.as_ref()
    }

    /// Refresh the cached card from the server, upgrading to the
    /// authenticated extended card when the agent offers one.
    pub async fn refresh_card(&mut self) -> A2AResult<&AgentCard> {
        let supports_extended = self
            .agent_card
            .as_ref()
            .and_then(|c| c.supports_authenticated_extended_card)
            .unwrap_or(false);

        if supports_extended {
            let extended = self.transport.get_extended_card().await?;
            debug!(card = %extended.name, "Upgraded to authenticated extended card");
            self.agent_card = Some(extended);
        }

        self.agent_card
            .as_ref()
            .ok_or_else(|| A2AError::Transport("no agent card available".to_string()))
    }

    fn streaming_available(&self) -> bool {
        let server_side = self
            .agent_card
            .as_ref()
            .and_then(|c| c.capabilities.streaming)
            .unwrap_or(false);
        self.config.streaming && server_side
    }

    fn dispatch(&self, consumers: &[EventConsumer], view: &ClientEvent) {
        for consumer in &self.consumers {
            consumer(view);
        }
        for consumer in consumers {
            consumer(view);
        }
    }

    fn report_error(&self, err: &A2AError) {
        if let Some(handler) = &self.error_handler {
            handler(err);
        } else {
            warn!(error = %err, "Stream error (no handler registered)");
        }
    }

    // ──────────────────────────────────────────────────
    // Logical method surface
    // ──────────────────────────────────────────────────

    /// Send a message. Streams when possible (folding events through the
    /// mirror and dispatching to consumers), falls back to the blocking
    /// binding otherwise. Returns the terminal task or direct message.
    pub async fn send_message(&self, params: MessageSendParams) -> A2AResult<SendMessageResponse> {
        self.send_message_with_consumers(params, &[]).await
    }

    /// [`send_message`](Self::send_message) with per-call consumers that
    /// run after the registered ones.
    pub async fn send_message_with_consumers(
        &self,
        mut params: MessageSendParams,
        consumers: &[EventConsumer],
    ) -> A2AResult<SendMessageResponse> {
        if let Some(history_length) = self.config.history_length {
            params
                .configuration
                .get_or_insert_with(Default::default)
                .history_length = Some(history_length);
        }

        if !self.streaming_available() {
            return self.transport.send_message(params).await;
        }

        let mut stream = self.transport.send_message_stream(params).await?;
        let mut mirror = TaskMirror::new();
        let mut direct_message: Option<Message> = None;

        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    let is_final = event.is_final();
                    let view = mirror.apply(event);
                    self.dispatch(consumers, &view);

                    if let crate::types::Event::Message(ref message) = view.event {
                        if message.role == Role::Agent {
                            direct_message = Some(message.clone());
                        }
                    }
                    if is_final {
                        break;
                    }
                }
                Err(err) => self.report_error(&err),
            }
        }

        if let Some(message) = direct_message {
            return Ok(SendMessageResponse::Message(message));
        }
        match mirror.task() {
            Some(task) => Ok(SendMessageResponse::Task(task.clone())),
            None => Err(A2AError::invalid_agent_response(
                "stream ended without a task or message",
            )),
        }
    }

    /// Rejoin the event feed of an existing task. Errors when streaming
    /// is unavailable on either side — there is no blocking fallback.
    ///
    /// The returned stream yields folded [`ClientEvent`]s; no replay.
    pub async fn resubscribe(
        &self,
        task_id: &str,
    ) -> A2AResult<impl futures::Stream<Item = A2AResult<ClientEvent>>> {
        if !self.streaming_available() {
            return Err(A2AError::unsupported_operation(
                "resubscribe requires streaming support on both sides",
            ));
        }

        // Seed the mirror so folded views reflect state accrued before
        // the reconnect.
        let seed = self
            .transport
            .get_task(TaskQueryParams {
                id: task_id.to_string(),
                history_length: None,
                metadata: None,
            })
            .await
            .ok();

        let stream = self
            .transport
            .resubscribe(TaskIdParams {
                id: task_id.to_string(),
                metadata: None,
            })
            .await?;

        let mut mirror = match seed {
            Some(task) => TaskMirror::seeded(task),
            None => TaskMirror::new(),
        };

        Ok(stream.map(move |item| item.map(|event| mirror.apply(event))))
    }

    /// `tasks/get`.
    pub async fn get_task(&self, params: TaskQueryParams) -> A2AResult<Task> {
        self.transport.get_task(params).await
    }

    /// `tasks/list`.
    pub async fn list_tasks(&self, params: ListTasksParams) -> A2AResult<ListTasksResponse> {
        self.transport.list_tasks(params).await
    }

    /// `tasks/cancel`.
    pub async fn cancel_task(&self, task_id: &str) -> A2AResult<Task> {
        self.transport
            .cancel_task(TaskIdParams {
                id: task_id.to_string(),
                metadata: None,
            })
            .await
    }

    /// `tasks/pushNotificationConfig/set`.
    pub async fn set_push_config(
        &self,
        params: TaskPushNotificationConfig,
    ) -> A2AResult<TaskPushNotificationConfig> {
        self.transport.set_push_config(params).await
    }

    /// `tasks/pushNotificationConfig/get`.
    pub async fn get_push_config(
        &self,
        params: GetTaskPushNotificationConfigParams,
    ) -> A2AResult<TaskPushNotificationConfig> {
        self.transport.get_push_config(params).await
    }

    /// `tasks/pushNotificationConfig/list`.
    pub async fn list_push_configs(
        &self,
        task_id: &str,
    ) -> A2AResult<Vec<TaskPushNotificationConfig>> {
        self.transport
            .list_push_configs(ListTaskPushNotificationConfigParams {
                id: task_id.to_string(),
            })
            .await
    }

    /// `tasks/pushNotificationConfig/delete`.
    pub async fn delete_push_config(&self, task_id: &str, config_id: &str) -> A2AResult<()> {
        self.transport
            .delete_push_config(DeleteTaskPushNotificationConfigParams {
                id: task_id.to_string(),
                push_notification_config_id: config_id.to_string(),
            })
            .await
    }

    /// Release transport resources.
    pub async fn close(self) -> A2AResult<()> {
        self.transport.close().await
    }

    // ──────────────────────────────────────────────────
    // Convenience helpers
    // ──────────────────────────────────────────────────

    /// Send a plain text message.
    pub async fn send_text(&self, text: &str) -> A2AResult<SendMessageResponse> {
        self.send_message(MessageSendParams {
            message: create_text_message(Role::User, text),
            configuration: None,
            metadata: None,
        })
        .await
    }

    /// Send a plain text message within an existing context.
    pub async fn send_text_in_context(
        &self,
        text: &str,
        context_id: &str,
    ) -> A2AResult<SendMessageResponse> {
        let mut message = create_text_message(Role::User, text);
        message.context_id = Some(context_id.to_string());
        self.send_message(MessageSendParams {
            message,
            configuration: None,
            metadata: None,
        })
        .await
    }

    /// Fetch a task by id.
    pub async fn get_task_by_id(
        &self,
        task_id: &str,
        history_length: Option<usize>,
    ) -> A2AResult<Task> {
        self.get_task(TaskQueryParams {
            id: task_id.to_string(),
            history_length,
            metadata: None,
        })
        .await
    }
}
