//! REST/JSON client binding over the `/v1` path scheme.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{A2AError, A2AResult};
use crate::types::{
    AgentCard, DeleteTaskPushNotificationConfigParams, GetTaskPushNotificationConfigParams,
    ListTaskPushNotificationConfigParams, ListTasksParams, ListTasksResponse, MessageSendParams,
    SendMessageResponse, Task, TaskIdParams, TaskPushNotificationConfig, TaskQueryParams,
};

use super::interceptor::ClientCallContext;
use super::sse::SseStream;
use super::transport::{
    apply_headers, map_send_error, run_interceptors, ClientEventStream, ClientTransport,
    TransportConfig,
};

/// REST/JSON over HTTP transport.
#[derive(Debug, Clone)]
pub struct RestTransport {
    client: reqwest::Client,
    base_url: String,
    config: Arc<TransportConfig>,
}

impl RestTransport {
    /// Transport rooted at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_config(base_url, TransportConfig::default())
    }

    /// Transport with explicit configuration.
    pub fn with_config(base_url: impl Into<String>, config: TransportConfig) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().unwrap_or_else(|_| reqwest::Client::new());
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client,
            base_url,
            config: Arc::new(config),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn intercept(
        &self,
        method: &str,
        payload: &mut serde_json::Value,
    ) -> A2AResult<ClientCallContext> {
        run_interceptors(
            &self.config.interceptors,
            method,
            payload,
            &self.config.call_context,
        )
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        ctx: &ClientCallContext,
    ) -> A2AResult<reqwest::Response> {
        let response = apply_headers(builder, ctx)
            .send()
            .await
            .map_err(map_send_error)?;

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

    async fn post_json<P: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        params: &P,
    ) -> A2AResult<T> {
        let mut payload = serde_json::to_value(params)
            .map_err(|e| A2AError::Transport(format!("failed to serialize params: {e}")))?;
        let ctx = self.intercept(method, &mut payload)?;

        let builder = self
            .client
            .post(self.url(path))
            .header("Content-Type", "application/json")
            .json(&payload);
        let response = self.send(builder, &ctx).await?;
        response
            .json()
            .await
            .map_err(|e| A2AError::Transport(format!("failed to read response: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, method: &str, path: &str) -> A2AResult<T> {
        let mut payload = serde_json::Value::Null;
        let ctx = self.intercept(method, &mut payload)?;
        let response = self.send(self.client.get(self.url(path)), &ctx).await?;
        response
            .json()
            .await
            .map_err(|e| A2AError::Transport(format!("failed to read response: {e}")))
    }
}

#[async_trait]
impl ClientTransport for RestTransport {
    async fn send_message(&self, params: MessageSendParams) -> A2AResult<SendMessageResponse> {
        self.post_json("message/send", "/v1/message:send", &params)
            .await
    }

    async fn send_message_stream(
        &self,
        params: MessageSendParams,
    ) -> A2AResult<ClientEventStream> {
        let mut payload = serde_json::to_value(&params)
            .map_err(|e| A2AError::Transport(format!("failed to serialize params: {e}")))?;
        let ctx = self.intercept("message/stream", &mut payload)?;

        let builder = self
            .client
            .post(self.url("/v1/message:stream"))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&payload);
        let response = self.send(builder, &ctx).await?;
        Ok(Box::pin(SseStream::from_response(response)))
    }

    async fn get_task(&self, params: TaskQueryParams) -> A2AResult<Task> {
        let mut path = format!("/v1/tasks/{}", params.id);
        if let Some(length) = params.history_length {
            path.push_str(&format!("?historyLength={}", length));
        }
        self.get_json("tasks/get", &path).await
    }

    async fn list_tasks(&self, params: ListTasksParams) -> A2AResult<ListTasksResponse> {
        let mut query: Vec<String> = Vec::new();
        if let Some(ref v) = params.context_id {
            query.push(format!("contextId={}", v));
        }
        if let Some(v) = params.status {
            query.push(format!("status={}", v));
        }
        if let Some(v) = params.page_size {
            query.push(format!("pageSize={}", v));
        }
        if let Some(ref v) = params.page_token {
            query.push(format!("pageToken={}", v));
        }
        if let Some(v) = params.history_length {
            query.push(format!("historyLength={}", v));
        }
        if let Some(ref v) = params.status_timestamp_after {
            query.push(format!("statusTimestampAfter={}", v));
        }
        if let Some(v) = params.include_artifacts {
            query.push(format!("includeArtifacts={}", v));
        }

        let path = if query.is_empty() {
            "/v1/tasks".to_string()
        } else {
            format!("/v1/tasks?{}", query.join("&"))
        };
        self.get_json("tasks/list", &path).await
    }

    async fn cancel_task(&self, params: TaskIdParams) -> A2AResult<Task> {
        let path = format!("/v1/tasks/{}:cancel", params.id);
        self.post_json("tasks/cancel", &path, &serde_json::json!({}))
            .await
    }

    async fn resubscribe(&self, params: TaskIdParams) -> A2AResult<ClientEventStream> {
        let mut payload = serde_json::Value::Null;
        let ctx = self.intercept("tasks/resubscribe", &mut payload)?;

        let builder = self
            .client
            .post(self.url(&format!("/v1/tasks/{}:subscribe", params.id)))
            .header("Accept", "text/event-stream");
        let response = self.send(builder, &ctx).await?;
        Ok(Box::pin(SseStream::from_response(response)))
    }

    async fn set_push_config(
        &self,
        params: TaskPushNotificationConfig,
    ) -> A2AResult<TaskPushNotificationConfig> {
        let path = format!("/v1/tasks/{}/pushNotificationConfigs", params.task_id);
        self.post_json(
            "tasks/pushNotificationConfig/set",
            &path,
            &params.push_notification_config,
        )
        .await
    }

    async fn get_push_config(
        &self,
        params: GetTaskPushNotificationConfigParams,
    ) -> A2AResult<TaskPushNotificationConfig> {
        let config_id = params.push_notification_config_id.ok_or_else(|| {
            A2AError::invalid_params("push notification config id is required")
        })?;
        let path = format!(
            "/v1/tasks/{}/pushNotificationConfigs/{}",
            params.id, config_id
        );
        self.get_json("tasks/pushNotificationConfig/get", &path).await
    }

    async fn list_push_configs(
        &self,
        params: ListTaskPushNotificationConfigParams,
    ) -> A2AResult<Vec<TaskPushNotificationConfig>> {
        let path = format!("/v1/tasks/{}/pushNotificationConfigs", params.id);
        self.get_json("tasks/pushNotificationConfig/list", &path)
            .await
    }

    async fn delete_push_config(
        &self,
        params: DeleteTaskPushNotificationConfigParams,
    ) -> A2AResult<()> {
        let mut payload = serde_json::Value::Null;
        let ctx = self.intercept("tasks/pushNotificationConfig/delete", &mut payload)?;
        let path = format!(
            "/v1/tasks/{}/pushNotificationConfigs/{}",
            params.id, params.push_notification_config_id
        );
        self.send(self.client.delete(self.url(&path)), &ctx).await?;
        Ok(())
    }

    async fn get_extended_card(&self) -> A2AResult<AgentCard> {
        self.get_json("agent/authenticatedExtendedCard", "/v1/extended-card")
            .await
    }
}
