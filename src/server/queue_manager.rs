//! Registry mapping task ids to their main queues.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use tracing::debug;

use super::event_bus::MainEventBus;
use super::event_queue::{
    ChildQueue, EnqueueHook, MainQueue, MainQueueConfig, TaskStateProvider,
    DEFAULT_QUEUE_CAPACITY,
};

/// No queue exists for the given task.
#[derive(Debug, Clone, thiserror::Error)]
#[error("No queue exists for this task")]
pub struct NoTaskQueue;

/// Manages per-task [`MainQueue`] lifecycles.
#[async_trait]
pub trait QueueManager: Send + Sync {
    /// Create the task's queue if absent, then tap it. The returned child
    /// sees only events enqueued after this call.
    async fn create_or_tap(&self, task_id: &str) -> ChildQueue;

    /// The task's queue without tapping it (enqueue-only callers).
    async fn get(&self, task_id: &str) -> Option<MainQueue>;

    /// Tap the task's queue. `None` when no queue exists.
    async fn tap(&self, task_id: &str) -> Option<ChildQueue>;

    /// Detach the task's queue from the registry and close it.
    async fn close(&self, task_id: &str) -> Result<(), NoTaskQueue>;
}

type QueueMap = Mutex<HashMap<String, MainQueue>>;

/// In-memory queue registry.
///
/// Suitable for single-process deployments: all interactions for a given
/// task id must reach this process. Queues remove themselves from the map
/// when they die (last child gone on a finalized task), via the
/// close callback installed at construction.
pub struct InMemoryQueueManager {
    queues: Arc<QueueMap>,
    bus: MainEventBus,
    capacity: usize,
    state_provider: Option<Arc<dyn TaskStateProvider>>,
    enqueue_hook: Option<Arc<dyn EnqueueHook>>,
}

impl InMemoryQueueManager {
    /// Build a manager whose queues submit into `bus`.
    pub fn new(bus: MainEventBus) -> Self {
        Self {
            queues: Arc::new(Mutex::new(HashMap::new())),
            bus,
            capacity: DEFAULT_QUEUE_CAPACITY,
            state_provider: None,
            enqueue_hook: None,
        }
    }

    /// Override the per-queue capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Install the finalization oracle handed to every queue.
    pub fn with_state_provider(mut self, provider: Arc<dyn TaskStateProvider>) -> Self {
        self.state_provider = Some(provider);
        self
    }

    /// Install a replication hook handed to every queue.
    pub fn with_enqueue_hook(mut self, hook: Arc<dyn EnqueueHook>) -> Self {
        self.enqueue_hook = Some(hook);
        self
    }

    /// Number of live queues.
    pub fn queue_count(&self) -> usize {
        self.queues.lock().expect("queue map lock poisoned").len()
    }

    fn build_queue(&self, task_id: &str) -> MainQueue {
        // The close callback must not keep the map alive: a queue holds the
        // callback, the map holds the queue.
        let map: Weak<QueueMap> = Arc::downgrade(&self.queues);
        let on_close = Box::new(move |task_id: &str| {
            if let Some(map) = map.upgrade() {
                map.lock().expect("queue map lock poisoned").remove(task_id);
            }
        });

        MainQueue::new(MainQueueConfig {
            task_id: task_id.to_string(),
            capacity: self.capacity,
            bus: self.bus.clone(),
            state_provider: self.state_provider.clone(),
            enqueue_hook: self.enqueue_hook.clone(),
            on_close: Some(on_close),
        })
    }
}

#[async_trait]
impl QueueManager for InMemoryQueueManager {
    async fn create_or_tap(&self, task_id: &str) -> ChildQueue {
        // Build outside the lock, insert-if-absent. If the insert loses a
        // race, the fresh queue is discarded and the winner is tapped.
        let fresh = self.build_queue(task_id);

        let queue = {
            let mut queues = self.queues.lock().expect("queue map lock poisoned");
            match queues.get(task_id) {
                Some(winner) => winner.clone(),
                None => {
                    debug!(task_id = %task_id, "Created main queue");
                    queues.insert(task_id.to_string(), fresh.clone());
                    fresh
                }
            }
        };

        queue.tap()
    }

    async fn get(&self, task_id: &str) -> Option<MainQueue> {
        self.queues
            .lock()
            .expect("queue map lock poisoned")
            .get(task_id)
            .cloned()
    }

    async fn tap(&self, task_id: &str) -> Option<ChildQueue> {
        self.get(task_id).await.map(|queue| queue.tap())
    }

    async fn close(&self, task_id: &str) -> Result<(), NoTaskQueue> {
        let queue = self
            .queues
            .lock()
            .expect("queue map lock poisoned")
            .remove(task_id)
            .ok_or(NoTaskQueue)?;
        queue.close(false);
        Ok(())
    }
}
