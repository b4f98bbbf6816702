//! Well-known paths, header names, method names, and protocol versions.

/// The well-known path for the agent card.
pub const AGENT_CARD_WELL_KNOWN_PATH: &str = "/.well-known/agent-card.json";

/// The previous well-known agent card path (deprecated, still served).
pub const PREV_AGENT_CARD_WELL_KNOWN_PATH: &str = "/.well-known/agent.json";

/// The default JSON-RPC endpoint path.
pub const DEFAULT_RPC_PATH: &str = "/a2a";

/// Header carrying the comma-separated list of requested extensions.
pub const EXTENSIONS_HEADER: &str = "X-A2A-Extensions";

/// Header selecting the protocol version.
pub const VERSION_HEADER: &str = "X-A2A-Version";

/// Header carrying the configured token on outbound push notifications.
pub const NOTIFICATION_TOKEN_HEADER: &str = "X-A2A-Notification-Token";

/// Protocol version assumed when the client sends no version header.
pub const DEFAULT_PROTOCOL_VERSION: &str = "0.3.0";

/// Protocol versions this runtime accepts.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["0.3.0", "0.3"];

/// JSON-RPC method names.
pub mod methods {
    /// `message/send`
    pub const MESSAGE_SEND: &str = "message/send";
    /// `message/stream`
    pub const MESSAGE_STREAM: &str = "message/stream";
    /// `tasks/get`
    pub const TASKS_GET: &str = "tasks/get";
    /// `tasks/list`
    pub const TASKS_LIST: &str = "tasks/list";
    /// `tasks/cancel`
    pub const TASKS_CANCEL: &str = "tasks/cancel";
    /// `tasks/subscribe`
    pub const TASKS_SUBSCRIBE: &str = "tasks/subscribe";
    /// `tasks/resubscribe`
    pub const TASKS_RESUBSCRIBE: &str = "tasks/resubscribe";
    /// `tasks/pushNotificationConfig/set`
    pub const PUSH_CONFIG_SET: &str = "tasks/pushNotificationConfig/set";
    /// `tasks/pushNotificationConfig/get`
    pub const PUSH_CONFIG_GET: &str = "tasks/pushNotificationConfig/get";
    /// `tasks/pushNotificationConfig/list`
    pub const PUSH_CONFIG_LIST: &str = "tasks/pushNotificationConfig/list";
    /// `tasks/pushNotificationConfig/delete`
    pub const PUSH_CONFIG_DELETE: &str = "tasks/pushNotificationConfig/delete";
    /// `agent/authenticatedExtendedCard`
    pub const EXTENDED_CARD: &str = "agent/authenticatedExtendedCard";
}
