//! Request-handler behavior: blocking send, cancellation, subscription,
//! validation, push-config CRUD, and the extended card.

mod common;

use std::sync::Arc;

use futures::StreamExt;

use a2a_runtime::builders::ServerBuilder;
use a2a_runtime::error::A2AError;
use a2a_runtime::server::{ServerCallContext, User};
use a2a_runtime::types::{
    Event, GetTaskPushNotificationConfigParams, ListTaskPushNotificationConfigParams, Message,
    MessageSendConfiguration, MessageSendParams, PushNotificationConfig, SendMessageResponse,
    TaskIdParams, TaskPushNotificationConfig, TaskQueryParams, TaskState,
};
use common::{test_card, test_server, ChunkingAgent, EchoAgent, FailingAgent, GatedAgent, HangingAgent};

fn text_params(text: &str) -> MessageSendParams {
    MessageSendParams {
        message: Message::user(format!("m-{}", uuid_suffix()), text),
        configuration: None,
        metadata: None,
    }
}

fn uuid_suffix() -> String {
    use std::sync::atomic::{AtomicUsize, Ordering};
    static N: AtomicUsize = AtomicUsize::new(0);
    format!("{}", N.fetch_add(1, Ordering::Relaxed))
}

/// A blocking send runs the agent to completion and returns the final
/// snapshot; the canonical record agrees.
#[tokio::test]
async fn blocking_send_returns_completed_task() {
    let server = test_server(Arc::new(EchoAgent));
    let handler = server.handler();

    let response = handler
        .on_message_send(text_params("hi"), ServerCallContext::new())
        .await
        .unwrap();

    let task = match response {
        SendMessageResponse::Task(task) => task,
        other => panic!("expected task, got {:?}", other),
    };
    assert_eq!(task.status.state, TaskState::Completed);

    // The echo lands in the final status message; the user message is in
    // history; superseded status messages are in history, not duplicated.
    let status_text = task
        .status
        .message
        .as_ref()
        .map(|m| a2a_runtime::utils::message_text(m, " "))
        .unwrap_or_default();
    assert!(status_text.contains("Echo: hi"), "got: {}", status_text);

    let history = task.history.as_ref().unwrap();
    assert!(history.iter().any(|m| m.role == a2a_runtime::types::Role::User));

    let canonical = handler
        .on_get_task(
            TaskQueryParams {
                id: task.id.clone(),
                history_length: None,
                metadata: None,
            },
            ServerCallContext::new(),
        )
        .await
        .unwrap();
    assert_eq!(canonical.status.state, TaskState::Completed);
}

/// Appended artifact chunks concatenate in order.
#[tokio::test]
async fn artifact_chunks_concatenate() {
    let server = test_server(Arc::new(ChunkingAgent));
    let handler = server.handler();

    let response = handler
        .on_message_send(text_params("chunk it"), ServerCallContext::new())
        .await
        .unwrap();

    let task = match response {
        SendMessageResponse::Task(task) => task,
        other => panic!("expected task, got {:?}", other),
    };
    let artifact = task.artifact("a1").expect("artifact a1");
    assert_eq!(a2a_runtime::utils::artifact_text(artifact), "ABC");
}

/// A failing executor produces a failed task, not a hung request.
#[tokio::test]
async fn failing_agent_yields_failed_task() {
    let server = test_server(Arc::new(FailingAgent));
    let handler = server.handler();

    let response = handler
        .on_message_send(text_params("boom"), ServerCallContext::new())
        .await
        .unwrap();

    match response {
        SendMessageResponse::Task(task) => {
            assert_eq!(task.status.state, TaskState::Failed);
        }
        other => panic!("expected task, got {:?}", other),
    }
}

/// Non-blocking send returns promptly with a non-final snapshot.
#[tokio::test]
async fn non_blocking_send_returns_early() {
    let gate = Arc::new(tokio::sync::Notify::new());
    let server = test_server(Arc::new(GatedAgent {
        gate: Arc::clone(&gate),
    }));
    let handler = server.handler();

    let mut params = text_params("later");
    params.configuration = Some(MessageSendConfiguration {
        blocking: Some(false),
        ..Default::default()
    });

    let response = tokio::time::timeout(
        std::time::Duration::from_secs(2),
        handler.on_message_send(params, ServerCallContext::new()),
    )
    .await
    .expect("non-blocking send must not wait for the gate")
    .unwrap();

    match response {
        SendMessageResponse::Task(task) => {
            assert!(!task.status.state.is_final());
        }
        other => panic!("expected task, got {:?}", other),
    }

    gate.notify_one();
}

/// Cancel in flight: the handler signals the executor, the canceled
/// status lands, and open streams complete.
#[tokio::test]
async fn cancel_in_flight_task() {
    let server = test_server(Arc::new(HangingAgent));
    let handler = server.handler();

    let mut stream = handler
        .on_message_send_stream(text_params("work forever"), ServerCallContext::new())
        .await
        .unwrap();

    // First event: working.
    let first = stream.next().await.expect("working event");
    let task_id = first.task_id().expect("task id").to_string();

    let canceled = handler
        .on_cancel_task(
            TaskIdParams {
                id: task_id.clone(),
                metadata: None,
            },
            ServerCallContext::new(),
        )
        .await
        .unwrap();
    assert_eq!(canceled.status.state, TaskState::Canceled);

    // The open stream observes the terminal event and completes.
    let mut saw_canceled = false;
    while let Some(event) = stream.next().await {
        if let Event::StatusUpdate(ref update) = event {
            if update.status.state == TaskState::Canceled {
                saw_canceled = true;
            }
        }
    }
    assert!(saw_canceled, "stream should deliver the canceled update");
}

/// Cancel from a final state fails with TaskNotCancelable and leaves
/// the record untouched.
#[tokio::test]
async fn cancel_is_rejected_from_final_state() {
    let server = test_server(Arc::new(EchoAgent));
    let handler = server.handler();

    let response = handler
        .on_message_send(text_params("done quickly"), ServerCallContext::new())
        .await
        .unwrap();
    let task = match response {
        SendMessageResponse::Task(task) => task,
        other => panic!("expected task, got {:?}", other),
    };

    let err = handler
        .on_cancel_task(
            TaskIdParams {
                id: task.id.clone(),
                metadata: None,
            },
            ServerCallContext::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, A2AError::TaskNotCancelable { .. }));

    let unchanged = handler
        .on_get_task(
            TaskQueryParams {
                id: task.id,
                history_length: None,
                metadata: None,
            },
            ServerCallContext::new(),
        )
        .await
        .unwrap();
    assert_eq!(unchanged.status.state, TaskState::Completed);
}

#[tokio::test]
async fn cancel_unknown_task_is_not_found() {
    let server = test_server(Arc::new(EchoAgent));
    let err = server
        .handler()
        .on_cancel_task(
            TaskIdParams {
                id: "missing".to_string(),
                metadata: None,
            },
            ServerCallContext::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, A2AError::TaskNotFound { .. }));
}

#[tokio::test]
async fn subscribe_unknown_task_is_not_found() {
    let server = test_server(Arc::new(EchoAgent));
    let err = match server
        .handler()
        .on_subscribe_to_task(
            TaskIdParams {
                id: "missing".to_string(),
                metadata: None,
            },
            ServerCallContext::new(),
        )
        .await
    {
        Err(e) => e,
        Ok(_) => panic!("expected error"),
    };
    assert!(matches!(err, A2AError::TaskNotFound { .. }));
}

/// A resubscriber joining mid-task sees only subsequent events, and
/// the stream completes when the task finalizes.
#[tokio::test]
async fn resubscribe_after_disconnect() {
    let gate = Arc::new(tokio::sync::Notify::new());
    let server = test_server(Arc::new(GatedAgent {
        gate: Arc::clone(&gate),
    }));
    let handler = server.handler();

    let mut stream = handler
        .on_message_send_stream(text_params("stream me"), ServerCallContext::new())
        .await
        .unwrap();

    // Observe WORKING, then "disconnect".
    let first = stream.next().await.expect("working event");
    let task_id = first.task_id().unwrap().to_string();
    drop(stream);

    // Rejoin before the task finalizes.
    let mut rejoined = handler
        .on_resubscribe_to_task(
            TaskIdParams {
                id: task_id.clone(),
                metadata: None,
            },
            ServerCallContext::new(),
        )
        .await
        .unwrap();

    gate.notify_one();

    let mut events = Vec::new();
    while let Some(event) = rejoined.next().await {
        events.push(event);
    }

    // No replay of WORKING; the terminal COMPLETED arrives.
    assert!(events.iter().all(|e| match e {
        Event::StatusUpdate(update) => update.status.state != TaskState::Working,
        _ => true,
    }));
    assert!(events.iter().any(|e| e.is_final()));
}

#[tokio::test]
async fn unsupported_protocol_version_is_rejected() {
    let server = test_server(Arc::new(EchoAgent));
    let ctx = ServerCallContext::new().with_protocol_version("9.9");

    let err = server
        .handler()
        .on_message_send(text_params("hi"), ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, A2AError::VersionNotSupported { .. }));
}

#[tokio::test]
async fn required_extension_must_be_requested() {
    let card = a2a_runtime::builders::AgentCardBuilder::new("Strict", "Needs ext", "1.0")
        .with_jsonrpc_interface("http://localhost/a2a")
        .with_streaming(true)
        .with_extension("urn:example:required", None, true)
        .build();
    let server = ServerBuilder::new(Arc::new(EchoAgent), card).build();
    let handler = server.handler();

    let err = handler
        .on_message_send(text_params("hi"), ServerCallContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, A2AError::ExtensionSupportRequired { .. }));

    let ctx = ServerCallContext::new().with_requested_extensions(
        ["urn:example:required".to_string()].into_iter().collect(),
    );
    handler
        .on_message_send(text_params("hi"), ctx)
        .await
        .unwrap();
}

#[tokio::test]
async fn get_task_trims_history() {
    let server = test_server(Arc::new(EchoAgent));
    let handler = server.handler();

    let response = handler
        .on_message_send(text_params("trim me"), ServerCallContext::new())
        .await
        .unwrap();
    let task_id = match response {
        SendMessageResponse::Task(task) => task.id,
        other => panic!("expected task, got {:?}", other),
    };

    let trimmed = handler
        .on_get_task(
            TaskQueryParams {
                id: task_id,
                history_length: Some(1),
                metadata: None,
            },
            ServerCallContext::new(),
        )
        .await
        .unwrap();
    assert!(trimmed.history.map(|h| h.len()).unwrap_or(0) <= 1);
}

#[tokio::test]
async fn push_config_crud_roundtrip() {
    let server = test_server(Arc::new(EchoAgent));
    let handler = server.handler();

    // Need an existing task first.
    let response = handler
        .on_message_send(text_params("make a task"), ServerCallContext::new())
        .await
        .unwrap();
    let task_id = match response {
        SendMessageResponse::Task(task) => task.id,
        other => panic!("expected task, got {:?}", other),
    };

    let stored = handler
        .on_set_task_push_notification_config(
            TaskPushNotificationConfig {
                task_id: task_id.clone(),
                push_notification_config: PushNotificationConfig {
                    id: Some("hook-1".to_string()),
                    url: "https://example.com/hook".to_string(),
                    token: Some("secret".to_string()),
                    authentication: None,
                },
            },
            ServerCallContext::new(),
        )
        .await
        .unwrap();
    assert_eq!(
        stored.push_notification_config.id.as_deref(),
        Some("hook-1")
    );

    let fetched = handler
        .on_get_task_push_notification_config(
            GetTaskPushNotificationConfigParams {
                id: task_id.clone(),
                push_notification_config_id: Some("hook-1".to_string()),
            },
            ServerCallContext::new(),
        )
        .await
        .unwrap();
    assert_eq!(
        fetched.push_notification_config.url,
        "https://example.com/hook"
    );

    let listed = handler
        .on_list_task_push_notification_config(
            ListTaskPushNotificationConfigParams { id: task_id.clone() },
            ServerCallContext::new(),
        )
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    handler
        .on_delete_task_push_notification_config(
            a2a_runtime::types::DeleteTaskPushNotificationConfigParams {
                id: task_id.clone(),
                push_notification_config_id: "hook-1".to_string(),
            },
            ServerCallContext::new(),
        )
        .await
        .unwrap();

    let listed = handler
        .on_list_task_push_notification_config(
            ListTaskPushNotificationConfigParams { id: task_id },
            ServerCallContext::new(),
        )
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn extended_card_requires_configuration_and_auth() {
    // Not configured.
    let server = test_server(Arc::new(EchoAgent));
    let err = server
        .handler()
        .on_get_extended_card(ServerCallContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, A2AError::ExtendedCardNotConfigured { .. }));

    // Configured, but the caller is anonymous.
    let extended = test_card("http://localhost");
    let server = ServerBuilder::new(Arc::new(EchoAgent), test_card("http://localhost"))
        .with_extended_card(extended.clone())
        .build();
    let err = server
        .handler()
        .on_get_extended_card(ServerCallContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, A2AError::Authentication { .. }));

    // Authenticated caller gets the card.
    let ctx = ServerCallContext::new().with_user(User::authenticated("alice"));
    let card = server.handler().on_get_extended_card(ctx).await.unwrap();
    assert_eq!(card.name, extended.name);
}
