//! Pipeline-level properties: persist-before-visibility, per-task FIFO,
//! backpressure, fan-out isolation, failure substitution, and the
//! fan-out behavior behind streaming sends and resubscribes.

mod common;

use std::sync::Arc;
use std::time::Duration;

use a2a_runtime::server::{
    DequeueOutcome, EventBusProcessor, InMemoryTaskStore, MainEventBus, MainQueue,
    MainQueueConfig, TaskStore,
};
use a2a_runtime::types::{
    Event, Message, TaskState, TaskStatus, TaskStatusUpdateEvent,
};
use common::FlakyTaskStore;

fn status_event(task_id: &str, seq: usize, state: TaskState, r#final: bool) -> Event {
    Event::StatusUpdate(TaskStatusUpdateEvent {
        task_id: task_id.to_string(),
        context_id: "c1".to_string(),
        kind: "status-update".to_string(),
        status: TaskStatus {
            state,
            message: Some(Message::agent(format!("m{}", seq), format!("step {}", seq))),
            timestamp: None,
        },
        r#final,
        metadata: None,
    })
}

fn pipeline_with_store(
    store: Arc<dyn TaskStore>,
    capacity: usize,
) -> (MainQueue, tokio::task::JoinHandle<()>) {
    let (bus, rx) = MainEventBus::channel(256);
    let processor = EventBusProcessor::new(store);
    let provider = processor.finalized_tasks();
    let handle = processor.spawn(rx);
    let queue = MainQueue::new(MainQueueConfig {
        task_id: "t1".to_string(),
        capacity,
        bus,
        state_provider: Some(provider),
        enqueue_hook: None,
        on_close: None,
    });
    (queue, handle)
}

/// For every event a child observes, the store save was attempted
/// first — the folded record is already visible through the store.
#[tokio::test]
async fn persist_before_visibility() {
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let (queue, _handle) = pipeline_with_store(Arc::clone(&store), 32);
    let mut child = queue.tap();

    for seq in 0..5 {
        queue
            .enqueue_event(status_event("t1", seq, TaskState::Working, false))
            .await
            .unwrap();
    }

    for seq in 0..5 {
        match child.dequeue(Duration::from_millis(500)).await {
            DequeueOutcome::Item(item) => {
                // The persisted record already reflects this event: the
                // status message of event `seq` is the current one.
                let task = store.get("t1").await.unwrap().unwrap();
                let visible = match item.event {
                    Event::StatusUpdate(update) => update.status.message.unwrap().message_id,
                    other => panic!("unexpected event {:?}", other),
                };
                let persisted_ids: Vec<String> = std::iter::once(
                    task.status.message.as_ref().unwrap().message_id.clone(),
                )
                .chain(
                    task.history
                        .unwrap_or_default()
                        .into_iter()
                        .map(|m| m.message_id),
                )
                .collect();
                assert!(
                    persisted_ids.contains(&visible),
                    "event m{} visible before persistence: {:?}",
                    seq,
                    persisted_ids
                );
            }
            other => panic!("expected item, got {:?}", other),
        }
    }
}

/// The sequence a child consumes equals the enqueue order.
#[tokio::test]
async fn per_task_fifo_order() {
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let (queue, _handle) = pipeline_with_store(store, 64);
    let mut child = queue.tap();

    for seq in 0..20 {
        queue
            .enqueue_event(status_event("t1", seq, TaskState::Working, false))
            .await
            .unwrap();
    }

    for seq in 0..20 {
        match child.dequeue(Duration::from_millis(500)).await {
            DequeueOutcome::Item(item) => match item.event {
                Event::StatusUpdate(update) => {
                    assert_eq!(
                        update.status.message.unwrap().message_id,
                        format!("m{}", seq)
                    );
                }
                other => panic!("unexpected event {:?}", other),
            },
            other => panic!("expected item {}, got {:?}", seq, other),
        }
    }
}

/// With capacity N and a stalled processor, the N+1th enqueue blocks
/// until a permit is released.
#[tokio::test]
async fn backpressure_blocks_at_capacity() {
    // No processor yet: permits are never released.
    let (bus, rx) = MainEventBus::channel(256);
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let queue = MainQueue::new(MainQueueConfig {
        task_id: "t1".to_string(),
        capacity: 3,
        bus,
        state_provider: None,
        enqueue_hook: None,
        on_close: None,
    });

    for seq in 0..3 {
        queue
            .enqueue_event(status_event("t1", seq, TaskState::Working, false))
            .await
            .unwrap();
    }

    let blocked = tokio::time::timeout(
        Duration::from_millis(100),
        queue.enqueue_event(status_event("t1", 3, TaskState::Working, false)),
    )
    .await;
    assert!(blocked.is_err(), "enqueue should block at capacity");

    // Start the processor; permits flow back and the enqueue completes.
    let _handle = EventBusProcessor::new(store).spawn(rx);
    tokio::time::timeout(
        Duration::from_secs(1),
        queue.enqueue_event(status_event("t1", 3, TaskState::Working, false)),
    )
    .await
    .expect("enqueue should unblock once permits are released")
    .unwrap();
}

/// A subscriber tapping mid-stream sees only subsequent events.
#[tokio::test]
async fn late_subscriber_sees_no_replay() {
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let (queue, _handle) = pipeline_with_store(store, 32);

    let mut early = queue.tap();

    queue
        .enqueue_event(status_event("t1", 0, TaskState::Working, false))
        .await
        .unwrap();

    // Wait until the early subscriber observed WORKING, so the tap below
    // is strictly after that event's distribution.
    match early.dequeue(Duration::from_millis(500)).await {
        DequeueOutcome::Item(_) => {}
        other => panic!("expected working event, got {:?}", other),
    }

    let mut late = queue.tap();

    queue
        .enqueue_event(status_event("t1", 1, TaskState::Completed, true))
        .await
        .unwrap();

    // Early sees COMPLETED; late sees COMPLETED but never WORKING.
    match early.dequeue(Duration::from_millis(500)).await {
        DequeueOutcome::Item(item) => assert!(item.event.is_final()),
        other => panic!("expected completed on early, got {:?}", other),
    }
    match late.dequeue(Duration::from_millis(500)).await {
        DequeueOutcome::Item(item) => match item.event {
            Event::StatusUpdate(update) => {
                assert_eq!(update.status.state, TaskState::Completed)
            }
            other => panic!("unexpected event {:?}", other),
        },
        other => panic!("expected completed on late, got {:?}", other),
    }
}

/// A failed save is substituted with an internal-error event in
/// place; surrounding events flow normally and the store reflects only
/// the successful folds.
#[tokio::test]
async fn persist_failure_substitutes_internal_error() {
    // Save #2 fails (save #1 is the first event's fold).
    let store: Arc<dyn TaskStore> = Arc::new(FlakyTaskStore::new(
        InMemoryTaskStore::new(),
        vec![2],
    ));
    let (queue, _handle) = pipeline_with_store(Arc::clone(&store), 32);
    let mut child = queue.tap();

    for seq in 0..3 {
        let state = if seq == 2 {
            TaskState::Completed
        } else {
            TaskState::Working
        };
        queue
            .enqueue_event(status_event("t1", seq, state, seq == 2))
            .await
            .unwrap();
    }

    // Event 0: normal.
    match child.dequeue(Duration::from_millis(500)).await {
        DequeueOutcome::Item(item) => assert!(matches!(item.event, Event::StatusUpdate(_))),
        other => panic!("expected first event, got {:?}", other),
    }

    // Event 1: substituted.
    match child.dequeue(Duration::from_millis(500)).await {
        DequeueOutcome::Item(item) => match item.event {
            Event::InternalError(err) => {
                assert_eq!(err.task_id.as_deref(), Some("t1"));
                assert!(err.message.contains("Failed to persist"));
            }
            other => panic!("expected internal error, got {:?}", other),
        },
        other => panic!("expected substituted event, got {:?}", other),
    }

    // Event 2: normal again.
    match child.dequeue(Duration::from_millis(500)).await {
        DequeueOutcome::Item(item) => assert!(item.event.is_final()),
        other => panic!("expected final event, got {:?}", other),
    }

    // The store reflects folds 0 and 2 only: current message is m2 and
    // m1 never made it into history.
    let task = store.get("t1").await.unwrap().unwrap();
    assert_eq!(task.status.state, TaskState::Completed);
    assert_eq!(task.status.message.as_ref().unwrap().message_id, "m2");
    let history_ids: Vec<String> = task
        .history
        .unwrap_or_default()
        .into_iter()
        .map(|m| m.message_id)
        .collect();
    assert!(history_ids.contains(&"m0".to_string()));
    assert!(!history_ids.contains(&"m1".to_string()));
}

/// Fan-out isolation across tasks of the single processor: events from
/// two queues interleave without blocking each other.
#[tokio::test]
async fn two_tasks_share_one_processor() {
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let (bus, rx) = MainEventBus::channel(256);
    let _handle = EventBusProcessor::new(Arc::clone(&store)).spawn(rx);

    let make_queue = |task_id: &str| {
        MainQueue::new(MainQueueConfig {
            task_id: task_id.to_string(),
            capacity: 16,
            bus: bus.clone(),
            state_provider: None,
            enqueue_hook: None,
            on_close: None,
        })
    };

    let queue_a = make_queue("task-a");
    let queue_b = make_queue("task-b");
    let mut child_a = queue_a.tap();
    let mut child_b = queue_b.tap();

    queue_a
        .enqueue_event(status_event("task-a", 0, TaskState::Working, false))
        .await
        .unwrap();
    queue_b
        .enqueue_event(status_event("task-b", 0, TaskState::Working, false))
        .await
        .unwrap();

    for (child, task_id) in [(&mut child_a, "task-a"), (&mut child_b, "task-b")] {
        match child.dequeue(Duration::from_millis(500)).await {
            DequeueOutcome::Item(item) => assert_eq!(item.event.task_id(), Some(task_id)),
            other => panic!("expected event for {}, got {:?}", task_id, other),
        }
    }

    assert!(store.get("task-a").await.unwrap().is_some());
    assert!(store.get("task-b").await.unwrap().is_some());
}
