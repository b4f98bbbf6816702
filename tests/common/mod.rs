//! Shared fixtures for integration tests: scripted agents, a failing
//! task store, and a real HTTP test server.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use a2a_runtime::builders::{A2AServer, AgentCardBuilder, ServerBuilder};
use a2a_runtime::error::{A2AError, A2AResult};
use a2a_runtime::server::{
    AgentExecutor, MainQueue, RequestContext, TaskStore, TaskUpdater,
};
use a2a_runtime::types::{AgentCard, ListTasksParams, ListTasksResponse, Part, Task};

/// Echoes the user's text back and completes.
pub struct EchoAgent;

#[async_trait]
impl AgentExecutor for EchoAgent {
    async fn execute(&self, context: RequestContext, queue: MainQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(
            queue,
            context.task_id.clone(),
            context.context_id.clone(),
        );
        updater.start_work(None).await?;

        let input = context.get_user_input("\n");
        let reply = if input.is_empty() {
            "Echo: (no text)".to_string()
        } else {
            format!("Echo: {}", input)
        };
        updater.complete_with_text(&reply).await
    }

    async fn cancel(&self, context: RequestContext, queue: MainQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(queue, context.task_id, context.context_id);
        updater.cancel(None).await
    }
}

/// Emits artifact chunks "A", "B", "C" (append) then completes.
pub struct ChunkingAgent;

#[async_trait]
impl AgentExecutor for ChunkingAgent {
    async fn execute(&self, context: RequestContext, queue: MainQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(
            queue,
            context.task_id.clone(),
            context.context_id.clone(),
        );
        updater.start_work(None).await?;

        for (i, chunk) in ["A", "B", "C"].iter().enumerate() {
            updater
                .add_artifact(
                    vec![Part::text(*chunk)],
                    Some("a1".to_string()),
                    Some("chunks".to_string()),
                    Some(i > 0),
                    Some(i == 2),
                )
                .await?;
        }
        updater.complete(None).await
    }

    async fn cancel(&self, context: RequestContext, queue: MainQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(queue, context.task_id, context.context_id);
        updater.cancel(None).await
    }
}

/// Starts working, then idles until cancellation is requested.
pub struct HangingAgent;

#[async_trait]
impl AgentExecutor for HangingAgent {
    async fn execute(&self, context: RequestContext, queue: MainQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(
            queue,
            context.task_id.clone(),
            context.context_id.clone(),
        );
        updater.start_work(None).await?;

        // Idle until asked to stop; the cancel entry point publishes the
        // terminal status.
        for _ in 0..600 {
            if context.is_cancellation_requested() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok(())
    }

    async fn cancel(&self, context: RequestContext, queue: MainQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(queue, context.task_id, context.context_id);
        updater.cancel(None).await
    }
}

/// Emits `working`, then waits for the gate before completing. Lets a
/// test control exactly when the terminal event lands.
pub struct GatedAgent {
    pub gate: Arc<tokio::sync::Notify>,
}

#[async_trait]
impl AgentExecutor for GatedAgent {
    async fn execute(&self, context: RequestContext, queue: MainQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(
            queue,
            context.task_id.clone(),
            context.context_id.clone(),
        );
        updater.start_work(None).await?;
        self.gate.notified().await;
        updater.complete(None).await
    }

    async fn cancel(&self, context: RequestContext, queue: MainQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(queue, context.task_id, context.context_id);
        updater.cancel(None).await
    }
}

/// Always errs from `execute`; the runtime turns that into a failed task.
pub struct FailingAgent;

#[async_trait]
impl AgentExecutor for FailingAgent {
    async fn execute(&self, _context: RequestContext, _queue: MainQueue) -> A2AResult<()> {
        Err(A2AError::internal("agent blew up"))
    }

    async fn cancel(&self, _context: RequestContext, _queue: MainQueue) -> A2AResult<()> {
        Ok(())
    }
}

/// Task store decorator that fails every save listed in `fail_on`
/// (1-based save ordinal).
pub struct FlakyTaskStore<S> {
    inner: S,
    saves: AtomicUsize,
    fail_on: Vec<usize>,
}

impl<S> FlakyTaskStore<S> {
    pub fn new(inner: S, fail_on: Vec<usize>) -> Self {
        Self {
            inner,
            saves: AtomicUsize::new(0),
            fail_on,
        }
    }
}

#[async_trait]
impl<S: TaskStore> TaskStore for FlakyTaskStore<S> {
    async fn save(&self, task: Task) -> A2AResult<()> {
        let ordinal = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on.contains(&ordinal) {
            return Err(A2AError::persistence_transient(
                Some(&task.id),
                "injected save failure",
            ));
        }
        self.inner.save(task).await
    }

    async fn get(&self, task_id: &str) -> A2AResult<Option<Task>> {
        self.inner.get(task_id).await
    }

    async fn delete(&self, task_id: &str) -> A2AResult<()> {
        self.inner.delete(task_id).await
    }

    async fn list(&self, params: &ListTasksParams) -> A2AResult<ListTasksResponse> {
        self.inner.list(params).await
    }
}

/// Standard test card: streaming + push notifications on.
pub fn test_card(url: &str) -> AgentCard {
    AgentCardBuilder::new("Test Agent", "An agent under test", "0.0.1")
        .with_jsonrpc_interface(format!("{}/a2a", url))
        .with_streaming(true)
        .with_push_notifications(true)
        .with_skill("echo", "Echo", "Echoes text", vec!["test".to_string()])
        .build()
}

/// Build a wired server for the given executor.
pub fn test_server(executor: Arc<dyn AgentExecutor>) -> A2AServer {
    ServerBuilder::new(executor, test_card("http://localhost")).build()
}

/// Spin up a real HTTP server; returns its base URL.
pub async fn start_test_server(executor: Arc<dyn AgentExecutor>) -> (String, tokio::task::JoinHandle<()>) {
    let server = test_server(executor);
    let app = server.into_router();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    (format!("http://{}", addr), handle)
}

/// JSON-RPC `message/send` body with a single text part.
pub fn message_send_request(id: i64, text: &str) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "message/send",
        "params": {
            "message": {
                "messageId": format!("m-{}", id),
                "role": "user",
                "kind": "message",
                "parts": [{"kind": "text", "text": text}]
            }
        }
    })
}
