//! Server runtime: the event pipeline and the transport bindings.
//!
//! The moving parts, bottom-up:
//!
//! - [`TaskStore`] / [`InMemoryTaskStore`] — canonical task persistence
//! - [`PushNotificationConfigStore`] + [`PushNotificationSender`] —
//!   webhook configuration and fire-and-forget delivery
//! - [`MainQueue`] / [`ChildQueue`] — per-task event bus with fan-out,
//!   backpressure, and reference-counted lifetime
//! - [`MainEventBus`] + [`EventBusProcessor`] — the process-wide ordering
//!   funnel enforcing persist-before-visibility
//! - [`QueueManager`] / [`InMemoryQueueManager`] — task id → queue registry
//! - [`AgentExecutor`] — your agent logic, fed a [`RequestContext`] and a
//!   queue (usually via [`TaskUpdater`])
//! - [`RequestHandler`] / [`DefaultRequestHandler`] — the logical method
//!   surface all transports dispatch into
//! - [`jsonrpc_router`] / [`rest_router`] (and `grpc` behind its feature
//!   flag) — the wire bindings
//!
//! Use [`ServerBuilder`](crate::builders::ServerBuilder) to wire the
//! whole pipeline in one go.

pub mod agent_executor;
pub mod call_context;
pub mod event_bus;
pub mod event_queue;
pub mod jsonrpc;
pub mod push_config;
pub mod push_sender;
pub mod queue_manager;
pub mod request_handler;
pub mod rest;
pub mod streaming;
pub mod task_store;
pub mod task_updater;

#[cfg(feature = "grpc")]
pub mod grpc;

pub use agent_executor::{
    AgentExecutor, RequestContext, RequestContextBuilder, SimpleRequestContextBuilder,
};
pub use call_context::{CancellationSignal, ServerCallContext, User};
pub use event_bus::{
    BusEnvelope, EventBusProcessor, FinalizedTasks, MainEventBus, DEFAULT_BUS_CAPACITY,
};
pub use event_queue::{
    ChildQueue, DequeueOutcome, EnqueueHook, EventQueueItem, MainQueue, MainQueueConfig,
    TaskStateProvider, DEFAULT_QUEUE_CAPACITY,
};
pub use jsonrpc::jsonrpc_router;
pub use push_config::{InMemoryPushNotificationConfigStore, PushNotificationConfigStore};
pub use push_sender::{HttpPushSender, PushNotificationSender};
pub use queue_manager::{InMemoryQueueManager, NoTaskQueue, QueueManager};
pub use request_handler::{DefaultRequestHandler, RequestHandler};
pub use rest::rest_router;
pub use streaming::{event_stream, EventStream};
pub use task_store::{InMemoryTaskStore, TaskStore};
pub use task_updater::TaskUpdater;
