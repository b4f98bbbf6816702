//! Client behavior with a scripted transport: blocking fallback,
//! streaming with the folding mirror, consumer dispatch, and the
//! resubscribe capability check.

mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;

use a2a_runtime::client::{Client, ClientConfig, ClientEventStream, ClientTransport};
use a2a_runtime::error::{A2AError, A2AResult};
use a2a_runtime::types::{
    AgentCapabilities, AgentCard, DeleteTaskPushNotificationConfigParams, Event,
    GetTaskPushNotificationConfigParams, ListTaskPushNotificationConfigParams, ListTasksParams,
    ListTasksResponse, Message, MessageSendParams, SendMessageResponse, Task, TaskIdParams,
    TaskPushNotificationConfig, TaskQueryParams, TaskState, TaskStatus, TaskStatusUpdateEvent,
};

fn status_event(task_id: &str, state: TaskState, r#final: bool) -> Event {
    Event::StatusUpdate(TaskStatusUpdateEvent {
        task_id: task_id.to_string(),
        context_id: "c1".to_string(),
        kind: "status-update".to_string(),
        status: TaskStatus::new(state),
        r#final,
        metadata: None,
    })
}

fn card(streaming: bool) -> AgentCard {
    AgentCard {
        name: "scripted".to_string(),
        description: "scripted".to_string(),
        version: "0".to_string(),
        url: "http://localhost/a2a".to_string(),
        capabilities: AgentCapabilities {
            streaming: Some(streaming),
            push_notifications: None,
            extensions: None,
        },
        supported_interfaces: vec![],
        provider: None,
        documentation_url: None,
        default_input_modes: vec![],
        default_output_modes: vec![],
        skills: vec![],
        preferred_transport: None,
        protocol_version: None,
        supports_authenticated_extended_card: None,
    }
}

/// Scripted transport: records which entry points were called and plays
/// back canned responses.
#[derive(Default)]
struct ScriptedTransport {
    calls: Arc<Mutex<Vec<&'static str>>>,
    stream_events: Vec<Event>,
}

impl ScriptedTransport {
    fn with_stream(events: Vec<Event>) -> Self {
        Self {
            calls: Arc::default(),
            stream_events: events,
        }
    }

    fn calls(&self) -> Arc<Mutex<Vec<&'static str>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ClientTransport for ScriptedTransport {
    async fn send_message(&self, _params: MessageSendParams) -> A2AResult<SendMessageResponse> {
        self.calls.lock().unwrap().push("send_message");
        let mut task = Task::submitted("t1", "c1");
        task.status = TaskStatus::new(TaskState::Completed);
        Ok(SendMessageResponse::Task(task))
    }

    async fn send_message_stream(
        &self,
        _params: MessageSendParams,
    ) -> A2AResult<ClientEventStream> {
        self.calls.lock().unwrap().push("send_message_stream");
        let events: Vec<A2AResult<Event>> =
            self.stream_events.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(events)))
    }

    async fn get_task(&self, params: TaskQueryParams) -> A2AResult<Task> {
        self.calls.lock().unwrap().push("get_task");
        Ok(Task::submitted(params.id, "c1"))
    }

    async fn list_tasks(&self, _params: ListTasksParams) -> A2AResult<ListTasksResponse> {
        Ok(ListTasksResponse {
            tasks: vec![],
            next_page_token: None,
        })
    }

    async fn cancel_task(&self, params: TaskIdParams) -> A2AResult<Task> {
        let mut task = Task::submitted(params.id, "c1");
        task.status = TaskStatus::new(TaskState::Canceled);
        Ok(task)
    }

    async fn resubscribe(&self, _params: TaskIdParams) -> A2AResult<ClientEventStream> {
        self.calls.lock().unwrap().push("resubscribe");
        let events: Vec<A2AResult<Event>> =
            self.stream_events.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(events)))
    }

    async fn set_push_config(
        &self,
        params: TaskPushNotificationConfig,
    ) -> A2AResult<TaskPushNotificationConfig> {
        Ok(params)
    }

    async fn get_push_config(
        &self,
        _params: GetTaskPushNotificationConfigParams,
    ) -> A2AResult<TaskPushNotificationConfig> {
        Err(A2AError::task_not_found("none"))
    }

    async fn list_push_configs(
        &self,
        _params: ListTaskPushNotificationConfigParams,
    ) -> A2AResult<Vec<TaskPushNotificationConfig>> {
        Ok(vec![])
    }

    async fn delete_push_config(
        &self,
        _params: DeleteTaskPushNotificationConfigParams,
    ) -> A2AResult<()> {
        Ok(())
    }

    async fn get_extended_card(&self) -> A2AResult<AgentCard> {
        self.calls.lock().unwrap().push("get_extended_card");
        let mut c = card(true);
        c.name = "extended".to_string();
        Ok(c)
    }
}

fn text_params(text: &str) -> MessageSendParams {
    MessageSendParams {
        message: Message::user("m1", text),
        configuration: None,
        metadata: None,
    }
}

#[tokio::test]
async fn send_falls_back_to_blocking_without_streaming_capability() {
    let transport = ScriptedTransport::default();
    let calls = transport.calls();
    let client = Client::with_transport(Box::new(transport)).with_card(card(false));

    let response = client.send_message(text_params("hi")).await.unwrap();
    assert!(matches!(response, SendMessageResponse::Task(_)));
    assert_eq!(calls.lock().unwrap().as_slice(), ["send_message"]);
}

#[tokio::test]
async fn send_falls_back_when_client_config_disables_streaming() {
    let transport = ScriptedTransport::default();
    let calls = transport.calls();
    let client = Client::with_transport(Box::new(transport))
        .with_card(card(true))
        .with_config(ClientConfig {
            streaming: false,
            history_length: None,
        });

    client.send_message(text_params("hi")).await.unwrap();
    assert_eq!(calls.lock().unwrap().as_slice(), ["send_message"]);
}

#[tokio::test]
async fn streaming_send_folds_and_dispatches_to_consumers() {
    let transport = ScriptedTransport::with_stream(vec![
        Event::Task(Task::submitted("t1", "c1")),
        status_event("t1", TaskState::Working, false),
        status_event("t1", TaskState::Completed, true),
    ]);
    let calls = transport.calls();

    let mut client = Client::with_transport(Box::new(transport)).with_card(card(true));

    // Every consumer-visible event carries the current folded task.
    let seen: Arc<Mutex<Vec<(String, TaskState)>>> = Arc::default();
    let seen_clone = Arc::clone(&seen);
    client.add_consumer(Arc::new(move |view| {
        let task = view.task.as_ref().expect("folded task");
        let kind = match &view.event {
            Event::Task(_) => "task",
            Event::StatusUpdate(_) => "status-update",
            _ => "other",
        };
        seen_clone
            .lock()
            .unwrap()
            .push((kind.to_string(), task.status.state));
    }));

    let response = client.send_message(text_params("hi")).await.unwrap();

    assert_eq!(calls.lock().unwrap().as_slice(), ["send_message_stream"]);
    match response {
        SendMessageResponse::Task(task) => {
            assert_eq!(task.status.state, TaskState::Completed)
        }
        other => panic!("expected task, got {:?}", other),
    }

    let observed = seen.lock().unwrap();
    assert_eq!(
        observed.as_slice(),
        [
            ("task".to_string(), TaskState::Submitted),
            ("status-update".to_string(), TaskState::Working),
            ("status-update".to_string(), TaskState::Completed),
        ]
    );
}

#[tokio::test]
async fn direct_agent_message_ends_the_exchange() {
    let transport = ScriptedTransport::with_stream(vec![Event::Message(Message::agent(
        "m-reply", "direct answer",
    ))]);
    let client = Client::with_transport(Box::new(transport)).with_card(card(true));

    let response = client.send_message(text_params("quick question")).await.unwrap();
    match response {
        SendMessageResponse::Message(message) => {
            assert_eq!(message.message_id, "m-reply")
        }
        other => panic!("expected message, got {:?}", other),
    }
}

#[tokio::test]
async fn resubscribe_requires_streaming() {
    let transport = ScriptedTransport::default();
    let client = Client::with_transport(Box::new(transport)).with_card(card(false));

    let err = client.resubscribe("t1").await.err().expect("must fail");
    assert!(matches!(err, A2AError::UnsupportedOperation { .. }));
}

#[tokio::test]
async fn resubscribe_folds_subsequent_events() {
    let transport = ScriptedTransport::with_stream(vec![
        status_event("t1", TaskState::Working, false),
        status_event("t1", TaskState::Completed, true),
    ]);
    let client = Client::with_transport(Box::new(transport)).with_card(card(true));

    let stream = client.resubscribe("t1").await.unwrap();
    let views: Vec<_> = stream.collect().await;
    assert_eq!(views.len(), 2);

    let last = views.last().unwrap().as_ref().unwrap();
    assert_eq!(
        last.task.as_ref().unwrap().status.state,
        TaskState::Completed
    );
}

#[tokio::test]
async fn refresh_card_upgrades_to_extended() {
    let transport = ScriptedTransport::default();
    let calls = transport.calls();

    let mut base = card(true);
    base.supports_authenticated_extended_card = Some(true);

    let mut client = Client::with_transport(Box::new(transport)).with_card(base);
    let upgraded = client.refresh_card().await.unwrap();
    assert_eq!(upgraded.name, "extended");
    assert_eq!(calls.lock().unwrap().as_slice(), ["get_extended_card"]);
}

#[tokio::test]
async fn refresh_card_keeps_plain_card() {
    let transport = ScriptedTransport::default();
    let calls = transport.calls();

    let mut client = Client::with_transport(Box::new(transport)).with_card(card(true));
    let kept = client.refresh_card().await.unwrap();
    assert_eq!(kept.name, "scripted");
    assert!(calls.lock().unwrap().is_empty());
}
