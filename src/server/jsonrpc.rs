//! JSON-RPC 2.0 over HTTP — axum routes for the A2A method surface.
//!
//! - `POST /a2a` — JSON-RPC dispatch for every logical method
//! - `GET /.well-known/agent-card.json` — agent card discovery
//! - `GET /.well-known/agent.json` — deprecated card path, still served
//!
//! Streaming methods answer with Server-Sent Events: each pipeline event
//! is wrapped in a JSON-RPC success envelope and written as one
//! `data: <json>` frame; the channel closes after the final event.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::stream::Stream;
use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{self, A2AError};
use crate::types::{AgentCard, JsonRpcError, JsonRpcId};
use crate::utils::constants::{
    AGENT_CARD_WELL_KNOWN_PATH, DEFAULT_PROTOCOL_VERSION, DEFAULT_RPC_PATH, EXTENSIONS_HEADER,
    PREV_AGENT_CARD_WELL_KNOWN_PATH, VERSION_HEADER,
};
use crate::utils::extensions::get_requested_extensions;
use crate::utils::constants::methods;

use super::call_context::ServerCallContext;
use super::request_handler::RequestHandler;
use super::streaming::EventStream;

/// Shared state for the JSON-RPC routes.
struct AppState {
    handler: Arc<dyn RequestHandler>,
    agent_card: AgentCard,
}

/// Build an axum `Router` serving the A2A JSON-RPC binding.
pub fn jsonrpc_router(handler: Arc<dyn RequestHandler>, agent_card: AgentCard) -> Router {
    let state = Arc::new(AppState {
        handler,
        agent_card,
    });

    Router::new()
        .route(AGENT_CARD_WELL_KNOWN_PATH, get(handle_agent_card))
        .route(PREV_AGENT_CARD_WELL_KNOWN_PATH, get(handle_agent_card_deprecated))
        .route(DEFAULT_RPC_PATH, post(handle_jsonrpc))
        .with_state(state)
}

async fn handle_agent_card(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(&state.agent_card).into_response()
}

async fn handle_agent_card_deprecated(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    warn!(
        "Deprecated agent card path '{}' accessed — use '{}'",
        PREV_AGENT_CARD_WELL_KNOWN_PATH, AGENT_CARD_WELL_KNOWN_PATH
    );
    Json(&state.agent_card).into_response()
}

/// Build the per-call context from wire headers.
pub(crate) fn call_context_from_headers(headers: &HeaderMap) -> ServerCallContext {
    let requested_extensions = get_requested_extensions(
        headers
            .get_all(EXTENSIONS_HEADER)
            .iter()
            .filter_map(|v| v.to_str().ok()),
    );

    let protocol_version = headers
        .get(VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_PROTOCOL_VERSION)
        .to_string();

    ServerCallContext::new()
        .with_requested_extensions(requested_extensions)
        .with_protocol_version(protocol_version)
}

/// Inbound JSON-RPC envelope.
#[derive(Debug, serde::Deserialize)]
struct RpcRequest {
    jsonrpc: String,
    #[serde(default)]
    id: Option<JsonRpcId>,
    method: String,
    #[serde(default)]
    params: Value,
}

/// Outbound JSON-RPC envelope.
#[derive(Debug, serde::Serialize)]
struct RpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<JsonRpcId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

impl RpcResponse {
    fn success(id: Option<JsonRpcId>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn from_error(id: Option<JsonRpcId>, err: A2AError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(err.into()),
        }
    }
}

async fn handle_jsonrpc(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RpcRequest>,
) -> Response {
    if request.jsonrpc != "2.0" {
        return Json(RpcResponse::from_error(
            request.id,
            A2AError::invalid_request("JSON-RPC version must be \"2.0\""),
        ))
        .into_response();
    }

    let ctx = call_context_from_headers(&headers);
    debug!(method = %request.method, "JSON-RPC request received");

    match request.method.as_str() {
        methods::MESSAGE_SEND => {
            unary(request.id, request.params, |params| {
                state.handler.on_message_send(params, ctx)
            })
            .await
        }
        methods::MESSAGE_STREAM => {
            if state.agent_card.capabilities.streaming != Some(true) {
                return Json(RpcResponse::from_error(
                    request.id,
                    A2AError::unsupported_operation("streaming is not supported by this agent"),
                ))
                .into_response();
            }
            streaming(request.id, request.params, |params| {
                state.handler.on_message_send_stream(params, ctx)
            })
            .await
        }
        methods::TASKS_GET => {
            unary(request.id, request.params, |params| {
                state.handler.on_get_task(params, ctx)
            })
            .await
        }
        methods::TASKS_LIST => {
            unary(request.id, request.params, |params| {
                state.handler.on_list_tasks(params, ctx)
            })
            .await
        }
        methods::TASKS_CANCEL => {
            unary(request.id, request.params, |params| {
                state.handler.on_cancel_task(params, ctx)
            })
            .await
        }
        methods::TASKS_SUBSCRIBE => {
            streaming(request.id, request.params, |params| {
                state.handler.on_subscribe_to_task(params, ctx)
            })
            .await
        }
        methods::TASKS_RESUBSCRIBE => {
            streaming(request.id, request.params, |params| {
                state.handler.on_resubscribe_to_task(params, ctx)
            })
            .await
        }
        methods::PUSH_CONFIG_SET => {
            unary(request.id, request.params, |params| {
                state
                    .handler
                    .on_set_task_push_notification_config(params, ctx)
            })
            .await
        }
        methods::PUSH_CONFIG_GET => {
            unary(request.id, request.params, |params| {
                state
                    .handler
                    .on_get_task_push_notification_config(params, ctx)
            })
            .await
        }
        methods::PUSH_CONFIG_LIST => {
            unary(request.id, request.params, |params| {
                state
                    .handler
                    .on_list_task_push_notification_config(params, ctx)
            })
            .await
        }
        methods::PUSH_CONFIG_DELETE => {
            unary(request.id, request.params, |params| {
                state
                    .handler
                    .on_delete_task_push_notification_config(params, ctx)
            })
            .await
        }
        methods::EXTENDED_CARD => match state.handler.on_get_extended_card(ctx).await {
            Ok(card) => respond_with(request.id, &card),
            Err(err) => Json(RpcResponse::from_error(request.id, err)).into_response(),
        },
        method => {
            warn!(method = %method, "Unknown JSON-RPC method");
            Json(RpcResponse::from_error(
                request.id,
                A2AError::method_not_found(method.to_string()),
            ))
            .into_response()
        }
    }
}

/// Decode params, run a unary handler, encode the result.
async fn unary<P, T, F, Fut>(id: Option<JsonRpcId>, params: Value, run: F) -> Response
where
    P: serde::de::DeserializeOwned,
    T: serde::Serialize,
    F: FnOnce(P) -> Fut,
    Fut: std::future::Future<Output = Result<T, A2AError>>,
{
    let params: P = match serde_json::from_value(params) {
        Ok(params) => params,
        Err(err) => {
            return Json(RpcResponse::from_error(
                id,
                A2AError::invalid_params(err.to_string()),
            ))
            .into_response();
        }
    };

    match run(params).await {
        Ok(result) => respond_with(id, &result),
        Err(err) => Json(RpcResponse::from_error(id, err)).into_response(),
    }
}

fn respond_with<T: serde::Serialize>(id: Option<JsonRpcId>, result: &T) -> Response {
    match serde_json::to_value(result) {
        Ok(value) => Json(RpcResponse::success(id, value)).into_response(),
        Err(err) => {
            error!(error = %err, "Failed to serialize response");
            Json(RpcResponse::from_error(
                id,
                A2AError::internal(err.to_string()),
            ))
            .into_response()
        }
    }
}

/// Decode params, run a streaming handler, answer with SSE.
async fn streaming<P, F, Fut>(id: Option<JsonRpcId>, params: Value, run: F) -> Response
where
    P: serde::de::DeserializeOwned,
    F: FnOnce(P) -> Fut,
    Fut: std::future::Future<Output = Result<EventStream, A2AError>>,
{
    let params: P = match serde_json::from_value(params) {
        Ok(params) => params,
        Err(err) => {
            return Json(RpcResponse::from_error(
                id,
                A2AError::invalid_params(err.to_string()),
            ))
            .into_response();
        }
    };

    match run(params).await {
        Ok(stream) => Sse::new(sse_frames(id, stream))
            .keep_alive(KeepAlive::default())
            .into_response(),
        Err(err) => Json(RpcResponse::from_error(id, err)).into_response(),
    }
}

/// Wrap each pipeline event in a JSON-RPC success envelope and emit it as
/// one SSE frame. The transport write-completion implicitly grants the
/// next poll of the underlying stream.
fn sse_frames(
    request_id: Option<JsonRpcId>,
    stream: EventStream,
) -> impl Stream<Item = Result<SseEvent, Infallible>> {
    stream.map(move |event| {
        let envelope = match serde_json::to_value(&event) {
            Ok(value) => RpcResponse::success(request_id.clone(), value),
            Err(err) => {
                error!(error = %err, "Failed to serialize stream event");
                RpcResponse::from_error(
                    request_id.clone(),
                    A2AError::internal(err.to_string()),
                )
            }
        };
        let json = serde_json::to_string(&envelope)
            .unwrap_or_else(|_| format!("{{\"jsonrpc\":\"2.0\",\"error\":{{\"code\":{},\"message\":\"serialization failed\"}}}}", error::INTERNAL_ERROR));
        Ok(SseEvent::default().data(json))
    })
}
