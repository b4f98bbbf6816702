//! REST/JSON binding — axum routes mirroring the logical method surface.
//!
//! Path scheme:
//! - `GET  /v1/card`, `GET /v1/extended-card`
//! - `POST /v1/message:send`, `POST /v1/message:stream` (SSE)
//! - `GET  /v1/tasks` (filter query), `GET /v1/tasks/{id}`
//! - `POST /v1/tasks/{id}:cancel`, `POST /v1/tasks/{id}:subscribe` (SSE)
//! - `POST|GET /v1/tasks/{id}/pushNotificationConfigs`
//! - `GET|DELETE /v1/tasks/{id}/pushNotificationConfigs/{configId}`
//!
//! Errors map onto HTTP statuses via
//! [`A2AError::http_status`](crate::error::A2AError::http_status):
//! 400 invalid request, 404 missing, 409 not cancelable, 415 bad content
//! type, 422 invalid params, 500 internal, 501 unsupported, 502 invalid
//! agent response.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::stream::Stream;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, error};

use crate::error::A2AError;
use crate::types::{
    AgentCard, DeleteTaskPushNotificationConfigParams, GetTaskPushNotificationConfigParams,
    ListTaskPushNotificationConfigParams, ListTasksParams, MessageSendParams, PushNotificationConfig,
    TaskIdParams, TaskPushNotificationConfig, TaskQueryParams, TaskState,
};

use super::jsonrpc::call_context_from_headers;
use super::request_handler::RequestHandler;
use super::streaming::EventStream;

struct AppState {
    handler: Arc<dyn RequestHandler>,
    agent_card: AgentCard,
}

/// Build an axum `Router` serving the A2A REST binding.
pub fn rest_router(handler: Arc<dyn RequestHandler>, agent_card: AgentCard) -> Router {
    let state = Arc::new(AppState {
        handler,
        agent_card,
    });

    Router::new()
        .route("/v1/card", get(get_card))
        .route("/v1/extended-card", get(get_extended_card))
        .route("/v1/message:send", post(message_send))
        .route("/v1/message:stream", post(message_stream))
        .route("/v1/tasks", get(list_tasks))
        // The path segment carries either a bare id (GET) or an
        // `{id}:action` suffix (POST); actions are dispatched manually.
        .route("/v1/tasks/{id}", get(get_task).post(task_action))
        .route(
            "/v1/tasks/{id}/pushNotificationConfigs",
            get(list_push_configs).post(create_push_config),
        )
        .route(
            "/v1/tasks/{id}/pushNotificationConfigs/{config_id}",
            get(get_push_config).delete(delete_push_config),
        )
        .with_state(state)
}

/// Error payload: `{"code": <jsonrpc code>, "message": "..."}`.
fn error_response(err: A2AError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = serde_json::json!({
        "code": err.code(),
        "message": err.to_string(),
    });
    (status, Json(body)).into_response()
}

fn ok_json<T: serde::Serialize>(value: &T) -> Response {
    match serde_json::to_value(value) {
        Ok(json) => Json(json).into_response(),
        Err(err) => error_response(A2AError::internal(err.to_string())),
    }
}

fn sse_response(stream: EventStream) -> Response {
    Sse::new(raw_frames(stream))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// REST streams carry the bare event JSON per frame (no RPC envelope).
fn raw_frames(stream: EventStream) -> impl Stream<Item = Result<SseEvent, Infallible>> {
    stream.map(|event| {
        let json = serde_json::to_string(&event).unwrap_or_else(|err| {
            error!(error = %err, "Failed to serialize stream event");
            "{}".to_string()
        });
        Ok(SseEvent::default().data(json))
    })
}

async fn get_card(State(state): State<Arc<AppState>>) -> Response {
    Json(&state.agent_card).into_response()
}

async fn get_extended_card(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let ctx = call_context_from_headers(&headers);
    match state.handler.on_get_extended_card(ctx).await {
        Ok(card) => ok_json(&card),
        Err(err) => error_response(err),
    }
}

async fn message_send(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(params): Json<MessageSendParams>,
) -> Response {
    let ctx = call_context_from_headers(&headers);
    match state.handler.on_message_send(params, ctx).await {
        Ok(response) => ok_json(&response),
        Err(err) => error_response(err),
    }
}

async fn message_stream(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(params): Json<MessageSendParams>,
) -> Response {
    if state.agent_card.capabilities.streaming != Some(true) {
        return error_response(A2AError::unsupported_operation(
            "streaming is not supported by this agent",
        ));
    }
    let ctx = call_context_from_headers(&headers);
    match state.handler.on_message_send_stream(params, ctx).await {
        Ok(stream) => sse_response(stream),
        Err(err) => error_response(err),
    }
}

/// Filter query for `GET /v1/tasks`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTasksQuery {
    context_id: Option<String>,
    status: Option<TaskState>,
    page_size: Option<usize>,
    page_token: Option<String>,
    history_length: Option<usize>,
    status_timestamp_after: Option<String>,
    include_artifacts: Option<bool>,
}

async fn list_tasks(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListTasksQuery>,
) -> Response {
    let ctx = call_context_from_headers(&headers);
    let params = ListTasksParams {
        context_id: query.context_id,
        status: query.status,
        page_size: query.page_size,
        page_token: query.page_token,
        history_length: query.history_length,
        status_timestamp_after: query.status_timestamp_after,
        include_artifacts: query.include_artifacts,
    };
    match state.handler.on_list_tasks(params, ctx).await {
        Ok(response) => ok_json(&response),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetTaskQuery {
    history_length: Option<usize>,
}

async fn get_task(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<GetTaskQuery>,
) -> Response {
    let ctx = call_context_from_headers(&headers);
    let params = TaskQueryParams {
        id,
        history_length: query.history_length,
        metadata: None,
    };
    match state.handler.on_get_task(params, ctx).await {
        Ok(task) => ok_json(&task),
        Err(err) => error_response(err),
    }
}

/// Dispatch `POST /v1/tasks/{id}:cancel` and `POST /v1/tasks/{id}:subscribe`.
async fn task_action(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id_and_action): Path<String>,
) -> Response {
    let ctx = call_context_from_headers(&headers);
    let Some((id, action)) = id_and_action.rsplit_once(':') else {
        return error_response(A2AError::method_not_found(format!(
            "POST /v1/tasks/{} has no action suffix",
            id_and_action
        )));
    };

    let params = TaskIdParams {
        id: id.to_string(),
        metadata: None,
    };

    debug!(task_id = %id, action = %action, "Task action");
    match action {
        "cancel" => match state.handler.on_cancel_task(params, ctx).await {
            Ok(task) => ok_json(&task),
            Err(err) => error_response(err),
        },
        "subscribe" => match state.handler.on_subscribe_to_task(params, ctx).await {
            Ok(stream) => sse_response(stream),
            Err(err) => error_response(err),
        },
        other => error_response(A2AError::method_not_found(format!(
            "unknown task action '{}'",
            other
        ))),
    }
}

async fn create_push_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(config): Json<PushNotificationConfig>,
) -> Response {
    let ctx = call_context_from_headers(&headers);
    let params = TaskPushNotificationConfig {
        task_id: id,
        push_notification_config: config,
    };
    match state
        .handler
        .on_set_task_push_notification_config(params, ctx)
        .await
    {
        Ok(stored) => match serde_json::to_value(&stored) {
            Ok(json) => (StatusCode::CREATED, Json(json)).into_response(),
            Err(err) => error_response(A2AError::internal(err.to_string())),
        },
        Err(err) => error_response(err),
    }
}

async fn list_push_configs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let ctx = call_context_from_headers(&headers);
    let params = ListTaskPushNotificationConfigParams { id };
    match state
        .handler
        .on_list_task_push_notification_config(params, ctx)
        .await
    {
        Ok(configs) => ok_json(&configs),
        Err(err) => error_response(err),
    }
}

async fn get_push_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((id, config_id)): Path<(String, String)>,
) -> Response {
    let ctx = call_context_from_headers(&headers);
    let params = GetTaskPushNotificationConfigParams {
        id,
        push_notification_config_id: Some(config_id),
    };
    match state
        .handler
        .on_get_task_push_notification_config(params, ctx)
        .await
    {
        Ok(config) => ok_json(&config),
        Err(err) => error_response(err),
    }
}

async fn delete_push_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((id, config_id)): Path<(String, String)>,
) -> Response {
    let ctx = call_context_from_headers(&headers);
    let params = DeleteTaskPushNotificationConfigParams {
        id,
        push_notification_config_id: config_id,
    };
    match state
        .handler
        .on_delete_task_push_notification_config(params, ctx)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}
