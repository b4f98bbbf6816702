//! Client transport abstraction and the JSON-RPC binding.
//!
//! [`ClientTransport`] is the uniform logical surface (the same methods
//! the server's request handler exposes); [`JsonRpcTransport`] speaks
//! JSON-RPC 2.0 over HTTP POST with SSE streaming. The REST binding lives
//! in [`rest_transport`](super::rest_transport).

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{A2AError, A2AResult};
use crate::types::{
    AgentCard, DeleteTaskPushNotificationConfigParams, GetTaskPushNotificationConfigParams,
    JsonRpcId, JsonRpcRequest, JsonRpcResponse, ListTaskPushNotificationConfigParams,
    ListTasksParams, ListTasksResponse, MessageSendParams, SendMessageResponse, Task, TaskIdParams,
    TaskPushNotificationConfig, TaskQueryParams,
};
use crate::utils::constants::methods;

use super::interceptor::{ClientCallContext, ClientCallInterceptor};
use super::sse::SseStream;

/// A boxed stream of inbound events, as produced by a streaming method.
pub type ClientEventStream =
    Pin<Box<dyn Stream<Item = crate::error::A2AResult<crate::types::Event>> + Send>>;

/// The uniform logical surface a wire binding must provide.
#[async_trait]
pub trait ClientTransport: Send + Sync {
    /// `message/send` — blocking.
    async fn send_message(&self, params: MessageSendParams) -> A2AResult<SendMessageResponse>;

    /// `message/stream` — live event stream.
    async fn send_message_stream(&self, params: MessageSendParams)
        -> A2AResult<ClientEventStream>;

    /// `tasks/get`.
    async fn get_task(&self, params: TaskQueryParams) -> A2AResult<Task>;

    /// `tasks/list`.
    async fn list_tasks(&self, params: ListTasksParams) -> A2AResult<ListTasksResponse>;

    /// `tasks/cancel`.
    async fn cancel_task(&self, params: TaskIdParams) -> A2AResult<Task>;

    /// `tasks/resubscribe` — rejoin an existing task's event feed.
    async fn resubscribe(&self, params: TaskIdParams) -> A2AResult<ClientEventStream>;

    /// `tasks/pushNotificationConfig/set`.
    async fn set_push_config(
        &self,
        params: TaskPushNotificationConfig,
    ) -> A2AResult<TaskPushNotificationConfig>;

    /// `tasks/pushNotificationConfig/get`.
    async fn get_push_config(
        &self,
        params: GetTaskPushNotificationConfigParams,
    ) -> A2AResult<TaskPushNotificationConfig>;

    /// `tasks/pushNotificationConfig/list`.
    async fn list_push_configs(
        &self,
        params: ListTaskPushNotificationConfigParams,
    ) -> A2AResult<Vec<TaskPushNotificationConfig>>;

    /// `tasks/pushNotificationConfig/delete`.
    async fn delete_push_config(
        &self,
        params: DeleteTaskPushNotificationConfigParams,
    ) -> A2AResult<()>;

    /// `agent/authenticatedExtendedCard`.
    async fn get_extended_card(&self) -> A2AResult<AgentCard>;

    /// Release held resources. Default: no-op.
    async fn close(&self) -> A2AResult<()> {
        Ok(())
    }
}

/// Configuration shared by the HTTP transports.
#[derive(Clone, Default)]
pub struct TransportConfig {
    /// Request timeout for unary calls. Streams are unbounded.
    pub timeout: Option<Duration>,
    /// Per-call context template (headers, extensions, version).
    pub call_context: ClientCallContext,
    /// Interceptors applied, in order, to every call.
    pub interceptors: Vec<Arc<dyn ClientCallInterceptor>>,
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("timeout", &self.timeout)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

/// Run the interceptor chain for one call.
pub(crate) fn run_interceptors(
    interceptors: &[Arc<dyn ClientCallInterceptor>],
    method: &str,
    payload: &mut serde_json::Value,
    template: &ClientCallContext,
) -> A2AResult<ClientCallContext> {
    let mut ctx = template.clone();
    for interceptor in interceptors {
        interceptor.intercept(method, payload, &mut ctx)?;
    }
    Ok(ctx)
}

pub(crate) fn apply_headers(
    mut request: reqwest::RequestBuilder,
    ctx: &ClientCallContext,
) -> reqwest::RequestBuilder {
    let mut headers = HeaderMap::new();
    for (name, value) in ctx.wire_headers() {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            headers.insert(name, value);
        }
    }
    request = request.headers(headers);
    request
}

pub(crate) fn map_send_error(err: reqwest::Error) -> A2AError {
    if err.is_timeout() {
        A2AError::Timeout(format!("request timed out: {err}"))
    } else if err.is_connect() {
        A2AError::Transport(format!("connection failed: {err}"))
    } else {
        A2AError::Transport(format!("HTTP request failed: {err}"))
    }
}

/// JSON-RPC 2.0 over HTTP transport.
#[derive(Debug, Clone)]
pub struct JsonRpcTransport {
    client: reqwest::Client,
    url: String,
    config: Arc<TransportConfig>,
}

impl JsonRpcTransport {
    /// Transport targeting the given JSON-RPC endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_config(url, TransportConfig::default())
    }

    /// Transport with explicit configuration.
    pub fn with_config(url: impl Into<String>, config: TransportConfig) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            url: url.into(),
            config: Arc::new(config),
        }
    }

    /// The endpoint this transport posts to.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<P: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        params: &P,
    ) -> A2AResult<T> {
        let response = self.post(method, params, false).await?;
        let rpc: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| A2AError::Transport(format!("failed to read JSON-RPC response: {e}")))?;
        parse_result(rpc)
    }

    async fn call_stream<P: Serialize>(
        &self,
        method: &str,
        params: &P,
    ) -> A2AResult<ClientEventStream> {
        let response = self.post(method, params, true).await?;
        Ok(Box::pin(SseStream::from_response(response)))
    }

    async fn post<P: Serialize>(
        &self,
        method: &str,
        params: &P,
        streaming: bool,
    ) -> A2AResult<reqwest::Response> {
        let mut payload = serde_json::to_value(params)
            .map_err(|e| A2AError::Transport(format!("failed to serialize params: {e}")))?;

        let ctx = run_interceptors(
            &self.config.interceptors,
            method,
            &mut payload,
            &self.config.call_context,
        )?;

        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(JsonRpcId::String(Uuid::new_v4().to_string())),
            method: method.to_string(),
            params: Some(payload),
        };

        let mut builder = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&request);
        if streaming {
            builder = builder.header("Accept", "text/event-stream");
        }
        builder = apply_headers(builder, &ctx);

        let response = builder.send().await.map_err(map_send_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(A2AError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Extract a typed `result` from a JSON-RPC response.
pub(crate) fn parse_result<T: DeserializeOwned>(response: JsonRpcResponse) -> A2AResult<T> {
    if let Some(error) = response.error {
        return Err(A2AError::JsonRpc {
            code: error.code,
            message: error.message,
            data: error.data,
        });
    }

    let result = response.result.ok_or_else(|| {
        A2AError::Transport("JSON-RPC response has neither 'result' nor 'error'".to_string())
    })?;

    serde_json::from_value(result)
        .map_err(|e| A2AError::Transport(format!("failed to deserialize result: {e}")))
}

#[async_trait]
impl ClientTransport for JsonRpcTransport {
    async fn send_message(&self, params: MessageSendParams) -> A2AResult<SendMessageResponse> {
        self.call(methods::MESSAGE_SEND, &params).await
    }

    async fn send_message_stream(
        &self,
        params: MessageSendParams,
    ) -> A2AResult<ClientEventStream> {
        self.call_stream(methods::MESSAGE_STREAM, &params).await
    }

    async fn get_task(&self, params: TaskQueryParams) -> A2AResult<Task> {
        self.call(methods::TASKS_GET, &params).await
    }

    async fn list_tasks(&self, params: ListTasksParams) -> A2AResult<ListTasksResponse> {
        self.call(methods::TASKS_LIST, &params).await
    }

    async fn cancel_task(&self, params: TaskIdParams) -> A2AResult<Task> {
        self.call(methods::TASKS_CANCEL, &params).await
    }

    async fn resubscribe(&self, params: TaskIdParams) -> A2AResult<ClientEventStream> {
        self.call_stream(methods::TASKS_RESUBSCRIBE, &params).await
    }

    async fn set_push_config(
        &self,
        params: TaskPushNotificationConfig,
    ) -> A2AResult<TaskPushNotificationConfig> {
        self.call(methods::PUSH_CONFIG_SET, &params).await
    }

    async fn get_push_config(
        &self,
        params: GetTaskPushNotificationConfigParams,
    ) -> A2AResult<TaskPushNotificationConfig> {
        self.call(methods::PUSH_CONFIG_GET, &params).await
    }

    async fn list_push_configs(
        &self,
        params: ListTaskPushNotificationConfigParams,
    ) -> A2AResult<Vec<TaskPushNotificationConfig>> {
        self.call(methods::PUSH_CONFIG_LIST, &params).await
    }

    async fn delete_push_config(
        &self,
        params: DeleteTaskPushNotificationConfigParams,
    ) -> A2AResult<()> {
        // `null` result decodes to unit.
        self.call(methods::PUSH_CONFIG_DELETE, &params).await
    }

    async fn get_extended_card(&self) -> A2AResult<AgentCard> {
        self.call(methods::EXTENDED_CARD, &serde_json::json!({})).await
    }
}
