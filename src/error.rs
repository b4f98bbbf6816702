//! Error taxonomy — JSON-RPC error codes, A2A-specific errors, storage
//! errors, and the mappings each transport applies.
//!
//! Every error kind has a stable JSON-RPC code, an HTTP status for the REST
//! binding, and (under the `grpc` feature) a gRPC status code. Storage
//! errors carry the `task_id` context when available.

use crate::types::JsonRpcError;

// ---------------------------------------------------------------------------
// Standard JSON-RPC 2.0 error codes
// ---------------------------------------------------------------------------

/// Invalid JSON was received by the server.
pub const PARSE_ERROR: i64 = -32700;

/// The JSON sent is not a valid Request object.
pub const INVALID_REQUEST: i64 = -32600;

/// The method does not exist / is not available.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Invalid method parameter(s).
pub const INVALID_PARAMS: i64 = -32602;

/// Internal JSON-RPC error.
pub const INTERNAL_ERROR: i64 = -32603;

// ---------------------------------------------------------------------------
// A2A-specific error codes
// ---------------------------------------------------------------------------

/// The requested task was not found.
pub const TASK_NOT_FOUND: i64 = -32001;

/// The task cannot be canceled in its current state.
pub const TASK_NOT_CANCELABLE: i64 = -32002;

/// Push notifications are not supported by this agent.
pub const PUSH_NOTIFICATION_NOT_SUPPORTED: i64 = -32003;

/// The requested operation is not supported.
pub const UNSUPPORTED_OPERATION: i64 = -32004;

/// The content type is not supported.
pub const CONTENT_TYPE_NOT_SUPPORTED: i64 = -32005;

/// The agent returned an invalid response.
pub const INVALID_AGENT_RESPONSE: i64 = -32006;

/// Authenticated extended card is not configured.
pub const EXTENDED_CARD_NOT_CONFIGURED: i64 = -32007;

/// The client did not request an extension the agent requires.
pub const EXTENSION_SUPPORT_REQUIRED: i64 = -32008;

/// The requested protocol version is not supported.
pub const VERSION_NOT_SUPPORTED: i64 = -32009;

// ---------------------------------------------------------------------------
// A2AError
// ---------------------------------------------------------------------------

/// Unified error type for the runtime: protocol errors, storage errors,
/// and client/transport-side failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum A2AError {
    // -- Protocol errors (map to JSON-RPC error codes) --
    /// Invalid JSON payload (code -32700).
    #[error("Parse error: {message}")]
    JsonParse {
        /// Human-readable error message.
        message: String,
    },

    /// Request payload validation error (code -32600).
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Human-readable error message.
        message: String,
    },

    /// Method not found (code -32601).
    #[error("Method not found: {message}")]
    MethodNotFound {
        /// Human-readable error message.
        message: String,
    },

    /// Invalid parameters (code -32602).
    #[error("Invalid params: {message}")]
    InvalidParams {
        /// Human-readable error message.
        message: String,
    },

    /// Internal error (code -32603).
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
    },

    /// Task not found (code -32001).
    #[error("Task not found: {message}")]
    TaskNotFound {
        /// Human-readable error message.
        message: String,
    },

    /// Task cannot be canceled from its current state (code -32002).
    #[error("Task not cancelable: {message}")]
    TaskNotCancelable {
        /// Human-readable error message.
        message: String,
    },

    /// Push notifications not supported (code -32003).
    #[error("Push notification not supported: {message}")]
    PushNotificationNotSupported {
        /// Human-readable error message.
        message: String,
    },

    /// Operation not supported (code -32004).
    #[error("Unsupported operation: {message}")]
    UnsupportedOperation {
        /// Human-readable error message.
        message: String,
    },

    /// Content type not supported (code -32005).
    #[error("Content type not supported: {message}")]
    ContentTypeNotSupported {
        /// Human-readable error message.
        message: String,
    },

    /// The agent produced a response the runtime could not interpret
    /// (code -32006).
    #[error("Invalid agent response: {message}")]
    InvalidAgentResponse {
        /// Human-readable error message.
        message: String,
    },

    /// Authenticated extended card not configured (code -32007).
    #[error("Extended card not configured: {message}")]
    ExtendedCardNotConfigured {
        /// Human-readable error message.
        message: String,
    },

    /// A required protocol extension was not requested (code -32008).
    #[error("Extension support required: {uri}")]
    ExtensionSupportRequired {
        /// URI of the required extension.
        uri: String,
    },

    /// The requested protocol version is not supported (code -32009).
    #[error("Version not supported: {version}")]
    VersionNotSupported {
        /// The version the client asked for.
        version: String,
    },

    /// The caller is not authenticated.
    #[error("Authentication required: {message}")]
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// The caller is authenticated but not allowed.
    #[error("Not authorized: {message}")]
    Authorization {
        /// Human-readable error message.
        message: String,
    },

    // -- Storage errors --
    /// The task store failed to persist or load a task. `transient`
    /// distinguishes retryable failures for operator diagnostics; the
    /// pipeline treats both as failure-to-persist.
    #[error("Task persistence error{}: {message}", fmt_task_ctx(.task_id))]
    TaskPersistence {
        /// Task the operation concerned, when known.
        task_id: Option<String>,
        /// Human-readable error message.
        message: String,
        /// Whether retrying could succeed.
        transient: bool,
    },

    /// A task could not be encoded/decoded for storage.
    #[error("Task serialization error{}: {message}", fmt_task_ctx(.task_id))]
    TaskSerialization {
        /// Task the operation concerned, when known.
        task_id: Option<String>,
        /// Human-readable error message.
        message: String,
    },

    // -- Client/transport-side errors (no A2A code of their own) --
    /// Transport-level error (connection failed, request failed, …).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request or stream timed out.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// HTTP error with status code and response body.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// A JSON-RPC error response received from the remote agent.
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },
}

fn fmt_task_ctx(task_id: &Option<String>) -> String {
    match task_id {
        Some(id) => format!(" (task {})", id),
        None => String::new(),
    }
}

/// Convenience result type for A2A operations.
pub type A2AResult<T> = Result<T, A2AError>;

impl A2AError {
    /// Create a `JsonParse` error.
    pub fn json_parse(message: impl Into<String>) -> Self {
        Self::JsonParse {
            message: message.into(),
        }
    }

    /// Create an `InvalidRequest` error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a `MethodNotFound` error.
    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self::MethodNotFound {
            message: message.into(),
        }
    }

    /// Create an `InvalidParams` error.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }

    /// Create an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a `TaskNotFound` error.
    pub fn task_not_found(message: impl Into<String>) -> Self {
        Self::TaskNotFound {
            message: message.into(),
        }
    }

    /// Create a `TaskNotCancelable` error.
    pub fn task_not_cancelable(message: impl Into<String>) -> Self {
        Self::TaskNotCancelable {
            message: message.into(),
        }
    }

    /// Create a `PushNotificationNotSupported` error.
    pub fn push_notification_not_supported(message: impl Into<String>) -> Self {
        Self::PushNotificationNotSupported {
            message: message.into(),
        }
    }

    /// Create an `UnsupportedOperation` error.
    pub fn unsupported_operation(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            message: message.into(),
        }
    }

    /// Create a `ContentTypeNotSupported` error.
    pub fn content_type_not_supported(message: impl Into<String>) -> Self {
        Self::ContentTypeNotSupported {
            message: message.into(),
        }
    }

    /// Create an `InvalidAgentResponse` error.
    pub fn invalid_agent_response(message: impl Into<String>) -> Self {
        Self::InvalidAgentResponse {
            message: message.into(),
        }
    }

    /// Create an `ExtendedCardNotConfigured` error.
    pub fn extended_card_not_configured(message: impl Into<String>) -> Self {
        Self::ExtendedCardNotConfigured {
            message: message.into(),
        }
    }

    /// Create a transient `TaskPersistence` error.
    pub fn persistence_transient(task_id: Option<&str>, message: impl Into<String>) -> Self {
        Self::TaskPersistence {
            task_id: task_id.map(String::from),
            message: message.into(),
            transient: true,
        }
    }

    /// Create a permanent `TaskPersistence` error.
    pub fn persistence_permanent(task_id: Option<&str>, message: impl Into<String>) -> Self {
        Self::TaskPersistence {
            task_id: task_id.map(String::from),
            message: message.into(),
            transient: false,
        }
    }

    /// Returns the JSON-RPC error code for this error.
    ///
    /// Storage and transport errors do not have protocol codes of their
    /// own and map to -32603 (internal error).
    pub fn code(&self) -> i64 {
        match self {
            A2AError::JsonParse { .. } => PARSE_ERROR,
            A2AError::InvalidRequest { .. } => INVALID_REQUEST,
            A2AError::MethodNotFound { .. } => METHOD_NOT_FOUND,
            A2AError::InvalidParams { .. } => INVALID_PARAMS,
            A2AError::Internal { .. } => INTERNAL_ERROR,
            A2AError::TaskNotFound { .. } => TASK_NOT_FOUND,
            A2AError::TaskNotCancelable { .. } => TASK_NOT_CANCELABLE,
            A2AError::PushNotificationNotSupported { .. } => PUSH_NOTIFICATION_NOT_SUPPORTED,
            A2AError::UnsupportedOperation { .. } => UNSUPPORTED_OPERATION,
            A2AError::ContentTypeNotSupported { .. } => CONTENT_TYPE_NOT_SUPPORTED,
            A2AError::InvalidAgentResponse { .. } => INVALID_AGENT_RESPONSE,
            A2AError::ExtendedCardNotConfigured { .. } => EXTENDED_CARD_NOT_CONFIGURED,
            A2AError::ExtensionSupportRequired { .. } => EXTENSION_SUPPORT_REQUIRED,
            A2AError::VersionNotSupported { .. } => VERSION_NOT_SUPPORTED,
            A2AError::Authentication { .. } | A2AError::Authorization { .. } => INVALID_REQUEST,
            A2AError::TaskPersistence { .. }
            | A2AError::TaskSerialization { .. }
            | A2AError::Transport(_)
            | A2AError::Timeout(_)
            | A2AError::Http { .. } => INTERNAL_ERROR,
            A2AError::JsonRpc { code, .. } => *code,
        }
    }

    /// Returns the HTTP status code the REST binding uses for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            A2AError::InvalidRequest { .. } | A2AError::JsonParse { .. } => 400,
            A2AError::ExtensionSupportRequired { .. } => 400,
            A2AError::Authentication { .. } => 401,
            A2AError::Authorization { .. } => 403,
            A2AError::MethodNotFound { .. } | A2AError::TaskNotFound { .. } => 404,
            A2AError::TaskNotCancelable { .. } => 409,
            A2AError::ContentTypeNotSupported { .. } => 415,
            A2AError::InvalidParams { .. } => 422,
            A2AError::UnsupportedOperation { .. }
            | A2AError::PushNotificationNotSupported { .. }
            | A2AError::ExtendedCardNotConfigured { .. }
            | A2AError::VersionNotSupported { .. } => 501,
            A2AError::InvalidAgentResponse { .. } => 502,
            A2AError::Internal { .. }
            | A2AError::TaskPersistence { .. }
            | A2AError::TaskSerialization { .. }
            | A2AError::Transport(_)
            | A2AError::Timeout(_)
            | A2AError::Http { .. }
            | A2AError::JsonRpc { .. } => 500,
        }
    }
}

impl From<A2AError> for JsonRpcError {
    fn from(err: A2AError) -> Self {
        let code = err.code();
        let message = err.to_string();
        let data = match &err {
            A2AError::JsonRpc { data, .. } => data.clone(),
            _ => None,
        };
        JsonRpcError {
            code,
            message,
            data,
        }
    }
}

impl From<serde_json::Error> for A2AError {
    fn from(err: serde_json::Error) -> Self {
        A2AError::JsonParse {
            message: err.to_string(),
        }
    }
}
