//! # a2a-runtime — an Agent-to-Agent (A2A) runtime for Rust
//!
//! A server-side event pipeline coordinating long-running agent tasks —
//! persistence, ordered fan-out of event streams, backpressure,
//! resubscription — plus a transport-agnostic client/server contract
//! served over JSON-RPC 2.0, REST/JSON, and (behind the `grpc` feature)
//! gRPC.
//!
//! ## The pipeline
//!
//! Every task gets its own event bus (a [`server::MainQueue`]); agent
//! executors write into it, subscribers tap [`server::ChildQueue`]s off
//! it. All writes funnel through one process-wide
//! [`server::MainEventBus`] drained by a single processor that folds each
//! event into the canonical task record, saves it, dispatches push
//! notifications, and only then fans the event out — so anything a
//! subscriber observes has already been persisted (or substituted with a
//! synthetic internal-error event when persistence failed).
//!
//! ```text
//! executor ─▶ MainQueue ─▶ MainEventBus ─▶ processor ─▶ ChildQueues ─▶ transports
//!                                            │
//!                                   TaskStore + push webhooks
//! ```
//!
//! ## Quick start: server
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use a2a_runtime::builders::{AgentCardBuilder, ServerBuilder};
//! use a2a_runtime::server::{AgentExecutor, MainQueue, RequestContext, TaskUpdater};
//! use a2a_runtime::error::A2AResult;
//! use async_trait::async_trait;
//!
//! struct EchoAgent;
//!
//! #[async_trait]
//! impl AgentExecutor for EchoAgent {
//!     async fn execute(&self, ctx: RequestContext, queue: MainQueue) -> A2AResult<()> {
//!         let updater = TaskUpdater::new(queue, ctx.task_id.clone(), ctx.context_id.clone());
//!         updater.start_work(None).await?;
//!         let reply = format!("Echo: {}", ctx.get_user_input("\n"));
//!         updater.complete_with_text(&reply).await
//!     }
//!
//!     async fn cancel(&self, ctx: RequestContext, queue: MainQueue) -> A2AResult<()> {
//!         let updater = TaskUpdater::new(queue, ctx.task_id, ctx.context_id);
//!         updater.cancel(None).await
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let card = AgentCardBuilder::new("Echo Agent", "Echoes messages", "1.0.0")
//!         .with_jsonrpc_interface("http://localhost:7420/a2a")
//!         .with_streaming(true)
//!         .build();
//!
//!     let server = ServerBuilder::new(Arc::new(EchoAgent), card).build();
//!     let app = server.into_router();
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:7420").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Quick start: client
//!
//! ```rust,ignore
//! use a2a_runtime::client::Client;
//! use a2a_runtime::types::SendMessageResponse;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::from_url("http://localhost:7420").await?;
//! match client.send_text("hello").await? {
//!     SendMessageResponse::Task(task) => println!("{}: {}", task.id, task.status.state),
//!     SendMessageResponse::Message(msg) => println!("direct reply: {:?}", msg),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `client` | yes     | HTTP client bindings (reqwest + SSE) |
//! | `server` | yes     | Event pipeline + axum JSON-RPC/REST bindings |
//! | `grpc`   | no      | tonic gRPC binding (needs `protoc` to build) |
//! | `full`   | no      | `client` + `server` |

#![warn(missing_docs)]

pub mod builders;
pub mod error;
pub mod folding;
pub mod types;
pub mod utils;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "server")]
pub mod server;

/// Re-exports of the most commonly used items.
pub mod prelude {
    pub use crate::types::{
        AgentCapabilities, AgentCard, AgentSkill, Artifact, Event, Message, MessageSendParams,
        Part, Role, SendMessageResponse, Task, TaskArtifactUpdateEvent, TaskState, TaskStatus,
        TaskStatusUpdateEvent,
    };

    pub use crate::error::{A2AError, A2AResult};

    pub use crate::builders::AgentCardBuilder;

    #[cfg(feature = "client")]
    pub use crate::builders::ClientBuilder;

    #[cfg(feature = "client")]
    pub use crate::client::{Client, ClientConfig, ClientEvent};

    #[cfg(feature = "server")]
    pub use crate::builders::{A2AServer, ServerBuilder};

    #[cfg(feature = "server")]
    pub use crate::server::{
        AgentExecutor, ChildQueue, DefaultRequestHandler, MainQueue, RequestContext,
        RequestHandler, ServerCallContext, TaskStore, TaskUpdater,
    };
}

pub use error::{A2AError, A2AResult};
