//! Wire-format round-trips: serialize then deserialize yields an equal
//! object, and the JSON shapes match the protocol conventions.

use a2a_runtime::builders::AgentCardBuilder;
use a2a_runtime::types::*;

fn sample_message() -> Message {
    let mut message = Message::user("m1", "hello");
    message.context_id = Some("c1".to_string());
    message.task_id = Some("t1".to_string());
    message.parts.push(Part::data(serde_json::json!({"k": 1})));
    message.parts.push(Part::file_from_uri(
        "https://example.com/f.pdf",
        Some("f.pdf".to_string()),
        Some("application/pdf".to_string()),
    ));
    message
}

fn sample_task() -> Task {
    let mut task = Task::submitted("t1", "c1");
    task.status = TaskStatus {
        state: TaskState::Working,
        message: Some(Message::agent("m2", "working on it")),
        timestamp: Some("2026-05-01T12:00:00+00:00".to_string()),
    };
    task.history = Some(vec![sample_message()]);
    task.artifacts = Some(vec![Artifact {
        artifact_id: "a1".to_string(),
        name: Some("result".to_string()),
        description: None,
        parts: vec![Part::text("data")],
        metadata: Some(serde_json::json!({"n": 1})),
        extensions: None,
    }]);
    task.metadata = Some(serde_json::json!({"origin": "test"}));
    task
}

#[test]
fn task_round_trip() {
    let task = sample_task();
    let json = serde_json::to_string(&task).unwrap();
    let back: Task = serde_json::from_str(&json).unwrap();
    assert_eq!(back, task);
}

#[test]
fn message_round_trip() {
    let message = sample_message();
    let json = serde_json::to_string(&message).unwrap();
    let back: Message = serde_json::from_str(&json).unwrap();
    assert_eq!(back, message);
}

#[test]
fn agent_card_round_trip() {
    let card = AgentCardBuilder::new("Agent", "Does things", "2.0.0")
        .with_jsonrpc_interface("http://localhost/a2a")
        .with_rest_interface("http://localhost/v1")
        .with_streaming(true)
        .with_push_notifications(true)
        .with_extension("urn:example:ext", Some("an ext".to_string()), false)
        .with_skill("s1", "Skill", "A skill", vec!["tag".to_string()])
        .with_provider("Example Org", "https://example.org")
        .build();

    let json = serde_json::to_string(&card).unwrap();
    let back: AgentCard = serde_json::from_str(&json).unwrap();
    assert_eq!(back, card);
}

#[test]
fn event_kinds_round_trip() {
    let events = vec![
        Event::Task(sample_task()),
        Event::Message(sample_message()),
        Event::StatusUpdate(TaskStatusUpdateEvent {
            task_id: "t1".to_string(),
            context_id: "c1".to_string(),
            kind: "status-update".to_string(),
            status: TaskStatus::new(TaskState::InputRequired),
            r#final: false,
            metadata: Some(serde_json::json!({"x": true})),
        }),
        Event::ArtifactUpdate(TaskArtifactUpdateEvent {
            task_id: "t1".to_string(),
            context_id: "c1".to_string(),
            kind: "artifact-update".to_string(),
            artifact: Artifact {
                artifact_id: "a1".to_string(),
                name: None,
                description: None,
                parts: vec![Part::text("chunk")],
                metadata: None,
                extensions: None,
            },
            append: Some(true),
            last_chunk: Some(false),
            metadata: None,
        }),
    ];

    for event in events {
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}

#[test]
fn json_field_names_are_camel_case() {
    let task = sample_task();
    let json = serde_json::to_value(&task).unwrap();

    assert!(json.get("contextId").is_some());
    assert!(json.get("context_id").is_none());
    assert_eq!(json["kind"], "task");
    assert_eq!(json["status"]["state"], "working");

    let update = TaskStatusUpdateEvent {
        task_id: "t1".to_string(),
        context_id: "c1".to_string(),
        kind: "status-update".to_string(),
        status: TaskStatus::new(TaskState::AuthRequired),
        r#final: true,
        metadata: None,
    };
    let json = serde_json::to_value(&update).unwrap();
    assert!(json.get("taskId").is_some());
    assert_eq!(json["final"], true);
    assert_eq!(json["status"]["state"], "auth-required");
}

#[test]
fn push_config_round_trip() {
    let config = TaskPushNotificationConfig {
        task_id: "t1".to_string(),
        push_notification_config: PushNotificationConfig {
            id: Some("cfg".to_string()),
            url: "https://example.com/hook".to_string(),
            token: Some("tok".to_string()),
            authentication: Some(PushNotificationAuthenticationInfo {
                schemes: vec!["Bearer".to_string()],
                credentials: None,
            }),
        },
    };

    let json = serde_json::to_value(&config).unwrap();
    assert!(json.get("pushNotificationConfig").is_some());
    let back: TaskPushNotificationConfig = serde_json::from_value(json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn send_message_params_accepts_minimal_json() {
    let json = serde_json::json!({
        "message": {
            "messageId": "m1",
            "role": "user",
            "kind": "message",
            "parts": [{"kind": "text", "text": "hi"}]
        }
    });
    let params: MessageSendParams = serde_json::from_value(json).unwrap();
    assert_eq!(params.message.message_id, "m1");
    assert!(params.configuration.is_none());
}

#[test]
fn kind_defaults_when_absent() {
    // Peers that omit the discriminator on nested objects still decode.
    let json = serde_json::json!({
        "id": "t1",
        "contextId": "c1",
        "status": {"state": "submitted"}
    });
    let task: Task = serde_json::from_value(json).unwrap();
    assert_eq!(task.kind, "task");
}
