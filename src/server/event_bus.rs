//! The process-wide event bus and its single ordering processor.
//!
//! Every [`MainQueue`](super::event_queue::MainQueue) submits into one FIFO
//! channel, regardless of how many tasks are in flight. A single consumer
//! drains it, which makes two guarantees trivial:
//!
//! - **persist-before-visibility** — each event is folded into the task
//!   record and saved (or the save is at least attempted) before any
//!   subscriber can observe it; a failed save is substituted with a
//!   synthetic internal-error event so ordering holds and subscribers stay
//!   attached
//! - a process-wide total order of persistence and push-notification
//!   dispatch
//!
//! Per-task parallelism is unnecessary here: each agent executor already
//! runs concurrently with other tasks' executors — only the persistence
//! funnel is serialized.
//!
//! The bus and processor are deliberate process-wide singletons: construct
//! them at startup, tear them down at shutdown.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::{A2AError, A2AResult};
use crate::folding;
use crate::types::{Event, Task};

use super::event_queue::{EventQueueItem, MainQueue, TaskStateProvider};
use super::push_sender::PushNotificationSender;
use super::task_store::TaskStore;

/// Default bus channel capacity.
pub const DEFAULT_BUS_CAPACITY: usize = 4096;

/// One unit of work on the bus: the task, the queue to fan out through,
/// and the event item itself.
pub struct BusEnvelope {
    /// The task the item belongs to.
    pub task_id: String,
    /// The queue the item was enqueued on; fan-out and the permit release
    /// go back through it.
    pub queue: MainQueue,
    /// The wrapped event.
    pub item: EventQueueItem,
}

/// Submission handle to the process-wide bus. Cloneable; all clones feed
/// the same channel.
#[derive(Clone)]
pub struct MainEventBus {
    tx: mpsc::Sender<BusEnvelope>,
}

impl MainEventBus {
    /// Create a bus and the receiving end for its processor.
    pub fn channel(capacity: usize) -> (MainEventBus, mpsc::Receiver<BusEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity);
        (MainEventBus { tx }, rx)
    }

    /// Submit an item. Blocks when the bus is full.
    pub async fn submit(
        &self,
        task_id: String,
        queue: MainQueue,
        item: EventQueueItem,
    ) -> A2AResult<()> {
        self.tx
            .send(BusEnvelope {
                task_id,
                queue,
                item,
            })
            .await
            .map_err(|_| A2AError::internal("main event bus is shut down"))
    }
}

impl std::fmt::Debug for MainEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainEventBus").finish_non_exhaustive()
    }
}

/// Set of task ids the processor has observed a final event for.
///
/// Doubles as the standard [`TaskStateProvider`]: queues consult it when
/// their last child closes.
#[derive(Debug, Default)]
pub struct FinalizedTasks {
    set: RwLock<HashSet<String>>,
}

impl FinalizedTasks {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a task is finalized.
    pub fn mark(&self, task_id: &str) {
        self.set
            .write()
            .expect("finalized set lock poisoned")
            .insert(task_id.to_string());
    }
}

impl TaskStateProvider for FinalizedTasks {
    fn is_finalized(&self, task_id: &str) -> bool {
        self.set
            .read()
            .expect("finalized set lock poisoned")
            .contains(task_id)
    }
}

/// Observability callback fired for every distributed event.
pub type EventObserver = Arc<dyn Fn(&str, &Event) + Send + Sync>;

/// Callback fired when a task's final event has been distributed.
pub type TaskFinalizedObserver = Arc<dyn Fn(&str) + Send + Sync>;

/// The single consumer of the [`MainEventBus`].
pub struct EventBusProcessor {
    task_store: Arc<dyn TaskStore>,
    push_sender: Option<Arc<dyn PushNotificationSender>>,
    finalized: Arc<FinalizedTasks>,
    on_event: Option<EventObserver>,
    on_task_finalized: Option<TaskFinalizedObserver>,
}

impl EventBusProcessor {
    /// Build a processor persisting through `task_store`.
    pub fn new(task_store: Arc<dyn TaskStore>) -> Self {
        Self {
            task_store,
            push_sender: None,
            finalized: Arc::new(FinalizedTasks::new()),
            on_event: None,
            on_task_finalized: None,
        }
    }

    /// Dispatch push notifications after each successful persist.
    pub fn with_push_sender(mut self, sender: Arc<dyn PushNotificationSender>) -> Self {
        self.push_sender = Some(sender);
        self
    }

    /// Observe every distributed event (test observability hook).
    pub fn with_event_observer(mut self, observer: EventObserver) -> Self {
        self.on_event = Some(observer);
        self
    }

    /// Observe task finalization.
    pub fn with_task_finalized_observer(mut self, observer: TaskFinalizedObserver) -> Self {
        self.on_task_finalized = Some(observer);
        self
    }

    /// The finalized-task set this processor maintains. Hand it to queue
    /// construction as the [`TaskStateProvider`].
    pub fn finalized_tasks(&self) -> Arc<FinalizedTasks> {
        Arc::clone(&self.finalized)
    }

    /// Spawn the single consumer loop.
    pub fn spawn(self, rx: mpsc::Receiver<BusEnvelope>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    /// Drain the bus until every sender is gone. One iteration per item:
    /// persist, push, fan out, observe, release the producer's permit.
    /// Failures never escape the loop.
    pub async fn run(self, mut rx: mpsc::Receiver<BusEnvelope>) {
        debug!("Event bus processor started");
        while let Some(envelope) = rx.recv().await {
            self.process(envelope).await;
        }
        debug!("Event bus processor stopped — bus closed");
    }

    async fn process(&self, envelope: BusEnvelope) {
        let BusEnvelope {
            task_id,
            queue,
            item,
        } = envelope;

        let event = item.event;
        let to_distribute = if folding::is_persistable(&event) {
            match self.persist(&task_id, &event).await {
                Ok(persisted) => {
                    if let (Some(sender), Some(task)) = (&self.push_sender, persisted) {
                        // Push delivery is asynchronous and must never
                        // stall the pipeline.
                        let sender = Arc::clone(sender);
                        tokio::spawn(async move {
                            sender.send_notification(&task).await;
                        });
                    }
                    event
                }
                Err(err) => {
                    error!(
                        task_id = %task_id,
                        error = %err,
                        "Failed to persist event — substituting internal error"
                    );
                    Event::internal_error(&event, format!("Failed to persist: {}", err))
                }
            }
        } else {
            event
        };

        // Mark finalization before fan-out: a subscriber may consume the
        // final event and release its child before this loop iteration
        // ends, and the queue's last-child check must already see the
        // task as finalized.
        let is_final = to_distribute.is_final();
        if is_final {
            self.finalized.mark(&task_id);
        }

        queue.distribute_to_children(&to_distribute);

        if let Some(observer) = &self.on_event {
            observer(&task_id, &to_distribute);
        }

        if is_final {
            if let Some(observer) = &self.on_task_finalized {
                observer(&task_id);
            }
        }

        // Balance the acquire done at enqueue time — always, even when
        // persistence failed.
        queue.release_permit();
    }

    /// Fold the event into the stored task and save it. Returns the
    /// persisted task (for push dispatch), or `None` when the event does
    /// not touch the record.
    async fn persist(&self, task_id: &str, event: &Event) -> A2AResult<Option<Task>> {
        let prior = self.task_store.get(task_id).await?;
        match folding::fold(prior, event) {
            Some(task) => {
                self.task_store.save(task.clone()).await?;
                Ok(Some(task))
            }
            None => {
                warn!(task_id = %task_id, "Persistable event folded to nothing");
                Ok(None)
            }
        }
    }
}
