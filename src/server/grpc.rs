//! gRPC binding — tonic service over the [`RequestHandler`] surface.
//!
//! Enabled by the non-default `grpc` cargo feature (proto compilation
//! needs `protoc` on the build host). Server-streaming methods carry the
//! same event stream the SSE bindings serve; tonic tears the stream down
//! on client disconnect, which drops the child queue like any other
//! subscriber.

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tonic::{Request, Response, Status};
use tracing::debug;

use crate::error::A2AError;
use crate::types;
use crate::utils::constants::{DEFAULT_PROTOCOL_VERSION, EXTENSIONS_HEADER, VERSION_HEADER};
use crate::utils::extensions::get_requested_extensions;

use super::call_context::ServerCallContext;
use super::request_handler::RequestHandler;

/// Generated protobuf types and service glue.
#[allow(missing_docs)]
pub mod proto {
    tonic::include_proto!("a2a.v1");
}

use proto::agent_service_server::AgentService;

/// Re-export of the generated server wrapper, ready for
/// `tonic::transport::Server::add_service`.
pub use proto::agent_service_server::AgentServiceServer;

type EventProtoStream =
    Pin<Box<dyn Stream<Item = Result<proto::StreamResponse, Status>> + Send + 'static>>;

/// The A2A gRPC service.
pub struct GrpcService {
    handler: Arc<dyn RequestHandler>,
    agent_card: types::AgentCard,
}

impl GrpcService {
    /// Wrap a request handler for gRPC serving.
    pub fn new(handler: Arc<dyn RequestHandler>, agent_card: types::AgentCard) -> Self {
        Self {
            handler,
            agent_card,
        }
    }

    /// Wrap into the generated tonic service.
    pub fn into_server(self) -> AgentServiceServer<Self> {
        AgentServiceServer::new(self)
    }

    fn context<T>(request: &Request<T>) -> ServerCallContext {
        let metadata = request.metadata();

        let requested_extensions = get_requested_extensions(
            metadata
                .get_all(EXTENSIONS_HEADER.to_ascii_lowercase().as_str())
                .iter()
                .filter_map(|v| v.to_str().ok()),
        );

        let protocol_version = metadata
            .get(VERSION_HEADER.to_ascii_lowercase().as_str())
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_PROTOCOL_VERSION)
            .to_string();

        ServerCallContext::new()
            .with_requested_extensions(requested_extensions)
            .with_protocol_version(protocol_version)
    }
}

/// Map the error taxonomy onto gRPC status codes.
fn to_status(err: A2AError) -> Status {
    let message = err.to_string();
    match err {
        A2AError::InvalidRequest { .. }
        | A2AError::InvalidParams { .. }
        | A2AError::ContentTypeNotSupported { .. } => Status::invalid_argument(message),
        A2AError::MethodNotFound { .. } | A2AError::TaskNotFound { .. } => {
            Status::not_found(message)
        }
        A2AError::TaskNotCancelable { .. }
        | A2AError::ExtendedCardNotConfigured { .. }
        | A2AError::ExtensionSupportRequired { .. } => Status::failed_precondition(message),
        A2AError::PushNotificationNotSupported { .. }
        | A2AError::UnsupportedOperation { .. }
        | A2AError::VersionNotSupported { .. } => Status::unimplemented(message),
        A2AError::Authentication { .. } => Status::unauthenticated(message),
        A2AError::Authorization { .. } => Status::permission_denied(message),
        _ => Status::internal(message),
    }
}

fn event_stream_to_proto(stream: super::streaming::EventStream) -> EventProtoStream {
    Box::pin(stream.map(|event| Ok(proto::StreamResponse::from(event))))
}

#[tonic::async_trait]
impl AgentService for GrpcService {
    type SendStreamingMessageStream = EventProtoStream;
    type TaskSubscriptionStream = EventProtoStream;

    async fn send_message(
        &self,
        request: Request<proto::SendMessageRequest>,
    ) -> Result<Response<proto::SendMessageResponse>, Status> {
        let ctx = Self::context(&request);
        let params = types::MessageSendParams::try_from(request.into_inner())
            .map_err(to_status)?;

        let response = self
            .handler
            .on_message_send(params, ctx)
            .await
            .map_err(to_status)?;
        Ok(Response::new(response.into()))
    }

    async fn send_streaming_message(
        &self,
        request: Request<proto::SendMessageRequest>,
    ) -> Result<Response<Self::SendStreamingMessageStream>, Status> {
        if self.agent_card.capabilities.streaming != Some(true) {
            return Err(Status::unimplemented(
                "streaming is not supported by this agent",
            ));
        }
        let ctx = Self::context(&request);
        let params = types::MessageSendParams::try_from(request.into_inner())
            .map_err(to_status)?;

        let stream = self
            .handler
            .on_message_send_stream(params, ctx)
            .await
            .map_err(to_status)?;
        debug!("gRPC streaming send attached");
        Ok(Response::new(event_stream_to_proto(stream)))
    }

    async fn get_task(
        &self,
        request: Request<proto::GetTaskRequest>,
    ) -> Result<Response<proto::Task>, Status> {
        let ctx = Self::context(&request);
        let inner = request.into_inner();
        let params = types::TaskQueryParams {
            id: inner.id,
            history_length: positive(inner.history_length),
            metadata: None,
        };

        let task = self
            .handler
            .on_get_task(params, ctx)
            .await
            .map_err(to_status)?;
        Ok(Response::new(task.into()))
    }

    async fn list_tasks(
        &self,
        request: Request<proto::ListTasksRequest>,
    ) -> Result<Response<proto::ListTasksResponse>, Status> {
        let ctx = Self::context(&request);
        let inner = request.into_inner();
        let params = types::ListTasksParams {
            context_id: non_empty(inner.context_id),
            status: task_state_from_proto(inner.status),
            page_size: positive(inner.page_size),
            page_token: non_empty(inner.page_token),
            history_length: positive(inner.history_length),
            status_timestamp_after: non_empty(inner.status_timestamp_after),
            include_artifacts: Some(inner.include_artifacts),
        };

        let response = self
            .handler
            .on_list_tasks(params, ctx)
            .await
            .map_err(to_status)?;
        Ok(Response::new(proto::ListTasksResponse {
            tasks: response.tasks.into_iter().map(Into::into).collect(),
            next_page_token: response.next_page_token.unwrap_or_default(),
        }))
    }

    async fn cancel_task(
        &self,
        request: Request<proto::CancelTaskRequest>,
    ) -> Result<Response<proto::Task>, Status> {
        let ctx = Self::context(&request);
        let params = types::TaskIdParams {
            id: request.into_inner().id,
            metadata: None,
        };

        let task = self
            .handler
            .on_cancel_task(params, ctx)
            .await
            .map_err(to_status)?;
        Ok(Response::new(task.into()))
    }

    async fn task_subscription(
        &self,
        request: Request<proto::TaskSubscriptionRequest>,
    ) -> Result<Response<Self::TaskSubscriptionStream>, Status> {
        let ctx = Self::context(&request);
        let params = types::TaskIdParams {
            id: request.into_inner().id,
            metadata: None,
        };

        let stream = self
            .handler
            .on_subscribe_to_task(params, ctx)
            .await
            .map_err(to_status)?;
        Ok(Response::new(event_stream_to_proto(stream)))
    }

    async fn create_task_push_notification_config(
        &self,
        request: Request<proto::CreateTaskPushNotificationConfigRequest>,
    ) -> Result<Response<proto::TaskPushNotificationConfig>, Status> {
        let ctx = Self::context(&request);
        let inner = request.into_inner();
        let config = inner
            .config
            .ok_or_else(|| Status::invalid_argument("missing config"))?;

        let params = types::TaskPushNotificationConfig {
            task_id: inner.task_id,
            push_notification_config: config.into(),
        };

        let stored = self
            .handler
            .on_set_task_push_notification_config(params, ctx)
            .await
            .map_err(to_status)?;
        Ok(Response::new(stored.into()))
    }

    async fn get_task_push_notification_config(
        &self,
        request: Request<proto::GetTaskPushNotificationConfigRequest>,
    ) -> Result<Response<proto::TaskPushNotificationConfig>, Status> {
        let ctx = Self::context(&request);
        let inner = request.into_inner();
        let params = types::GetTaskPushNotificationConfigParams {
            id: inner.task_id,
            push_notification_config_id: non_empty(inner.config_id),
        };

        let config = self
            .handler
            .on_get_task_push_notification_config(params, ctx)
            .await
            .map_err(to_status)?;
        Ok(Response::new(config.into()))
    }

    async fn list_task_push_notification_config(
        &self,
        request: Request<proto::ListTaskPushNotificationConfigRequest>,
    ) -> Result<Response<proto::ListTaskPushNotificationConfigResponse>, Status> {
        let ctx = Self::context(&request);
        let params = types::ListTaskPushNotificationConfigParams {
            id: request.into_inner().task_id,
        };

        let configs = self
            .handler
            .on_list_task_push_notification_config(params, ctx)
            .await
            .map_err(to_status)?;
        Ok(Response::new(proto::ListTaskPushNotificationConfigResponse {
            configs: configs.into_iter().map(Into::into).collect(),
        }))
    }

    async fn delete_task_push_notification_config(
        &self,
        request: Request<proto::DeleteTaskPushNotificationConfigRequest>,
    ) -> Result<Response<()>, Status> {
        let ctx = Self::context(&request);
        let inner = request.into_inner();
        let params = types::DeleteTaskPushNotificationConfigParams {
            id: inner.task_id,
            push_notification_config_id: inner.config_id,
        };

        self.handler
            .on_delete_task_push_notification_config(params, ctx)
            .await
            .map_err(to_status)?;
        Ok(Response::new(()))
    }

    async fn get_agent_card(
        &self,
        _request: Request<proto::GetAgentCardRequest>,
    ) -> Result<Response<proto::AgentCard>, Status> {
        Ok(Response::new(card_to_proto(&self.agent_card)))
    }

    async fn get_extended_agent_card(
        &self,
        request: Request<proto::GetAgentCardRequest>,
    ) -> Result<Response<proto::AgentCard>, Status> {
        let ctx = Self::context(&request);
        let card = self
            .handler
            .on_get_extended_card(ctx)
            .await
            .map_err(to_status)?;
        Ok(Response::new(card_to_proto(&card)))
    }
}

// ---------------------------------------------------------------------------
// Conversions: JSON data model <-> proto
// ---------------------------------------------------------------------------

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn positive(n: i32) -> Option<usize> {
    usize::try_from(n).ok().filter(|n| *n > 0)
}

fn task_state_from_proto(value: i32) -> Option<types::TaskState> {
    match proto::TaskState::try_from(value).ok()? {
        proto::TaskState::Unspecified => None,
        proto::TaskState::Submitted => Some(types::TaskState::Submitted),
        proto::TaskState::Working => Some(types::TaskState::Working),
        proto::TaskState::Completed => Some(types::TaskState::Completed),
        proto::TaskState::Failed => Some(types::TaskState::Failed),
        proto::TaskState::Canceled => Some(types::TaskState::Canceled),
        proto::TaskState::InputRequired => Some(types::TaskState::InputRequired),
        proto::TaskState::Rejected => Some(types::TaskState::Rejected),
        proto::TaskState::AuthRequired => Some(types::TaskState::AuthRequired),
        proto::TaskState::Unknown => Some(types::TaskState::Unknown),
    }
}

fn task_state_to_proto(state: types::TaskState) -> proto::TaskState {
    match state {
        types::TaskState::Submitted => proto::TaskState::Submitted,
        types::TaskState::Working => proto::TaskState::Working,
        types::TaskState::Completed => proto::TaskState::Completed,
        types::TaskState::Failed => proto::TaskState::Failed,
        types::TaskState::Canceled => proto::TaskState::Canceled,
        types::TaskState::InputRequired => proto::TaskState::InputRequired,
        types::TaskState::Rejected => proto::TaskState::Rejected,
        types::TaskState::AuthRequired => proto::TaskState::AuthRequired,
        types::TaskState::Unknown => proto::TaskState::Unknown,
    }
}

fn json_to_struct(value: &serde_json::Value) -> Option<prost_types::Struct> {
    let map = value.as_object()?;
    Some(prost_types::Struct {
        fields: map
            .iter()
            .map(|(k, v)| (k.clone(), json_to_proto_value(v)))
            .collect(),
    })
}

fn json_to_proto_value(value: &serde_json::Value) -> prost_types::Value {
    use prost_types::value::Kind;
    let kind = match value {
        serde_json::Value::Null => Kind::NullValue(0),
        serde_json::Value::Bool(b) => Kind::BoolValue(*b),
        serde_json::Value::Number(n) => Kind::NumberValue(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => Kind::StringValue(s.clone()),
        serde_json::Value::Array(items) => Kind::ListValue(prost_types::ListValue {
            values: items.iter().map(json_to_proto_value).collect(),
        }),
        serde_json::Value::Object(map) => Kind::StructValue(prost_types::Struct {
            fields: map
                .iter()
                .map(|(k, v)| (k.clone(), json_to_proto_value(v)))
                .collect(),
        }),
    };
    prost_types::Value { kind: Some(kind) }
}

fn struct_to_json(value: &prost_types::Struct) -> serde_json::Value {
    serde_json::Value::Object(
        value
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), proto_value_to_json(v)))
            .collect(),
    )
}

fn proto_value_to_json(value: &prost_types::Value) -> serde_json::Value {
    use prost_types::value::Kind;
    match &value.kind {
        None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(*b),
        Some(Kind::NumberValue(n)) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s.clone()),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.iter().map(proto_value_to_json).collect())
        }
        Some(Kind::StructValue(s)) => struct_to_json(s),
    }
}

impl From<types::Part> for proto::Part {
    fn from(part: types::Part) -> Self {
        use proto::part::Part as ProtoPart;
        let part = match part {
            types::Part::Text { text, .. } => ProtoPart::Text(text),
            types::Part::Data { data, .. } => {
                ProtoPart::Data(json_to_struct(&data).unwrap_or_default())
            }
            types::Part::File { file, .. } => {
                let (content, mime_type, name) = match file {
                    types::FileContent::Uri(f) => (
                        proto::file_content::Content::Uri(f.uri),
                        f.mime_type,
                        f.name,
                    ),
                    types::FileContent::Bytes(f) => (
                        proto::file_content::Content::BytesBase64(f.bytes),
                        f.mime_type,
                        f.name,
                    ),
                };
                ProtoPart::File(proto::FileContent {
                    content: Some(content),
                    mime_type: mime_type.unwrap_or_default(),
                    name: name.unwrap_or_default(),
                })
            }
        };
        proto::Part { part: Some(part) }
    }
}

impl From<proto::Part> for types::Part {
    fn from(part: proto::Part) -> Self {
        use proto::part::Part as ProtoPart;
        match part.part {
            Some(ProtoPart::Text(text)) => types::Part::text(text),
            Some(ProtoPart::Data(data)) => types::Part::data(struct_to_json(&data)),
            Some(ProtoPart::File(file)) => {
                let mime_type = non_empty(file.mime_type);
                let name = non_empty(file.name);
                match file.content {
                    Some(proto::file_content::Content::BytesBase64(bytes)) => {
                        types::Part::file_from_bytes(bytes, name, mime_type)
                    }
                    Some(proto::file_content::Content::Uri(uri)) => {
                        types::Part::file_from_uri(uri, name, mime_type)
                    }
                    None => types::Part::text(String::new()),
                }
            }
            None => types::Part::text(String::new()),
        }
    }
}

impl From<types::Message> for proto::Message {
    fn from(message: types::Message) -> Self {
        proto::Message {
            message_id: message.message_id,
            role: match message.role {
                types::Role::User => proto::Role::User as i32,
                types::Role::Agent => proto::Role::Agent as i32,
            },
            parts: message.parts.into_iter().map(Into::into).collect(),
            context_id: message.context_id.unwrap_or_default(),
            task_id: message.task_id.unwrap_or_default(),
            metadata: message.metadata.as_ref().and_then(json_to_struct),
            extensions: message.extensions.unwrap_or_default(),
            reference_task_ids: message.reference_task_ids.unwrap_or_default(),
        }
    }
}

impl From<proto::Message> for types::Message {
    fn from(message: proto::Message) -> Self {
        let role = match proto::Role::try_from(message.role).unwrap_or(proto::Role::Unspecified) {
            proto::Role::Agent => types::Role::Agent,
            _ => types::Role::User,
        };
        types::Message {
            message_id: message.message_id,
            role,
            kind: "message".to_string(),
            parts: message.parts.into_iter().map(Into::into).collect(),
            context_id: non_empty(message.context_id),
            task_id: non_empty(message.task_id),
            metadata: message.metadata.as_ref().map(struct_to_json),
            extensions: if message.extensions.is_empty() {
                None
            } else {
                Some(message.extensions)
            },
            reference_task_ids: if message.reference_task_ids.is_empty() {
                None
            } else {
                Some(message.reference_task_ids)
            },
        }
    }
}

impl From<types::Artifact> for proto::Artifact {
    fn from(artifact: types::Artifact) -> Self {
        proto::Artifact {
            artifact_id: artifact.artifact_id,
            name: artifact.name.unwrap_or_default(),
            description: artifact.description.unwrap_or_default(),
            parts: artifact.parts.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<types::TaskStatus> for proto::TaskStatus {
    fn from(status: types::TaskStatus) -> Self {
        proto::TaskStatus {
            state: task_state_to_proto(status.state) as i32,
            message: status.message.map(Into::into),
            timestamp: status.timestamp.unwrap_or_default(),
        }
    }
}

impl From<types::Task> for proto::Task {
    fn from(task: types::Task) -> Self {
        proto::Task {
            id: task.id,
            context_id: task.context_id,
            status: Some(task.status.into()),
            artifacts: task
                .artifacts
                .unwrap_or_default()
                .into_iter()
                .map(Into::into)
                .collect(),
            history: task
                .history
                .unwrap_or_default()
                .into_iter()
                .map(Into::into)
                .collect(),
            metadata: task.metadata.as_ref().and_then(json_to_struct),
        }
    }
}

impl From<types::Event> for proto::StreamResponse {
    fn from(event: types::Event) -> Self {
        use proto::stream_response::Event as ProtoEvent;
        let event = match event {
            types::Event::Task(task) => ProtoEvent::Task(task.into()),
            types::Event::Message(message) => ProtoEvent::Message(message.into()),
            types::Event::StatusUpdate(update) => {
                ProtoEvent::StatusUpdate(proto::TaskStatusUpdateEvent {
                    task_id: update.task_id,
                    context_id: update.context_id,
                    status: Some(update.status.into()),
                    r#final: update.r#final,
                    metadata: update.metadata.as_ref().and_then(json_to_struct),
                })
            }
            types::Event::ArtifactUpdate(update) => {
                ProtoEvent::ArtifactUpdate(proto::TaskArtifactUpdateEvent {
                    task_id: update.task_id,
                    context_id: update.context_id,
                    artifact: Some(update.artifact.into()),
                    append: update.append.unwrap_or(false),
                    last_chunk: update.last_chunk.unwrap_or(false),
                    metadata: update.metadata.as_ref().and_then(json_to_struct),
                })
            }
            types::Event::InternalError(error) => {
                ProtoEvent::InternalError(proto::InternalErrorEvent {
                    task_id: error.task_id.unwrap_or_default(),
                    context_id: error.context_id.unwrap_or_default(),
                    message: error.message,
                })
            }
        };
        proto::StreamResponse { event: Some(event) }
    }
}

impl From<types::SendMessageResponse> for proto::SendMessageResponse {
    fn from(response: types::SendMessageResponse) -> Self {
        use proto::send_message_response::Result as ProtoResult;
        let result = match response {
            types::SendMessageResponse::Task(task) => ProtoResult::Task(task.into()),
            types::SendMessageResponse::Message(message) => ProtoResult::Message(message.into()),
        };
        proto::SendMessageResponse {
            result: Some(result),
        }
    }
}

impl TryFrom<proto::SendMessageRequest> for types::MessageSendParams {
    type Error = A2AError;

    fn try_from(request: proto::SendMessageRequest) -> Result<Self, Self::Error> {
        let message = request
            .message
            .ok_or_else(|| A2AError::invalid_params("missing message"))?;

        let configuration = request.configuration.map(|config| {
            types::MessageSendConfiguration {
                accepted_output_modes: if config.accepted_output_modes.is_empty() {
                    None
                } else {
                    Some(config.accepted_output_modes)
                },
                push_notification_config: config.push_notification_config.map(Into::into),
                history_length: positive(config.history_length),
                blocking: Some(config.blocking),
            }
        });

        Ok(types::MessageSendParams {
            message: message.into(),
            configuration,
            metadata: request.metadata.as_ref().map(struct_to_json),
        })
    }
}

impl From<proto::PushNotificationConfig> for types::PushNotificationConfig {
    fn from(config: proto::PushNotificationConfig) -> Self {
        types::PushNotificationConfig {
            id: non_empty(config.id),
            url: config.url,
            token: non_empty(config.token),
            authentication: None,
        }
    }
}

impl From<types::TaskPushNotificationConfig> for proto::TaskPushNotificationConfig {
    fn from(config: types::TaskPushNotificationConfig) -> Self {
        proto::TaskPushNotificationConfig {
            task_id: config.task_id,
            push_notification_config: Some(proto::PushNotificationConfig {
                id: config.push_notification_config.id.unwrap_or_default(),
                url: config.push_notification_config.url,
                token: config.push_notification_config.token.unwrap_or_default(),
            }),
        }
    }
}

fn card_to_proto(card: &types::AgentCard) -> proto::AgentCard {
    proto::AgentCard {
        name: card.name.clone(),
        description: card.description.clone(),
        version: card.version.clone(),
        url: card.url.clone(),
        streaming: card.capabilities.streaming.unwrap_or(false),
        push_notifications: card.capabilities.push_notifications.unwrap_or(false),
        protocol_version: card.protocol_version.clone().unwrap_or_default(),
        preferred_transport: card
            .preferred_transport
            .clone()
            .unwrap_or_else(|| "GRPC".to_string()),
    }
}
