//! Per-task event queues: the `MainQueue` write surface and its
//! `ChildQueue` subscriber taps.
//!
//! Every task gets one [`MainQueue`]. Producers (the agent executor, the
//! task updater, replication hooks) enqueue into it; all writes funnel
//! through the process-wide [`MainEventBus`](super::event_bus::MainEventBus)
//! so that a single consumer can persist each event before any subscriber
//! sees it. After persistence the bus processor calls
//! [`MainQueue::distribute_to_children`], which fans the event out to every
//! current [`ChildQueue`].
//!
//! Backpressure: `enqueue_item` acquires a permit from a semaphore sized to
//! the queue capacity and *forgets* it; the bus processor returns exactly
//! one permit per processed item. A producer that outruns the processor by
//! `capacity` items blocks.
//!
//! Lifecycle: a MainQueue stays alive while it has children, or while its
//! task is not finalized (late resubscribes must find it). The last child
//! closing triggers a [`TaskStateProvider`] consultation; only a finalized
//! task lets the queue die.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{debug, warn};

use crate::error::{A2AError, A2AResult};
use crate::types::Event;

use super::event_bus::MainEventBus;

/// Default per-queue capacity (maximum un-processed items per task).
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// How long `await_poller_start` waits for the first subscriber poll.
pub const POLLER_START_TIMEOUT: Duration = Duration::from_secs(10);

/// An event wrapped with its provenance: `replicated` marks items that
/// arrived via an external replication hook rather than a local producer.
#[derive(Debug, Clone)]
pub struct EventQueueItem {
    /// The wrapped event.
    pub event: Event,
    /// Whether this item was delivered by a replication hook.
    pub replicated: bool,
}

impl EventQueueItem {
    /// Wrap a locally-produced event.
    pub fn local(event: Event) -> Self {
        EventQueueItem {
            event,
            replicated: false,
        }
    }

    /// Wrap an event received from a replication hook.
    pub fn replicated(event: Event) -> Self {
        EventQueueItem {
            event,
            replicated: true,
        }
    }
}

/// Result of a [`ChildQueue::dequeue`] call.
#[derive(Debug)]
pub enum DequeueOutcome {
    /// An item was dequeued.
    Item(EventQueueItem),
    /// No item arrived within the timeout; the queue remains open.
    Timeout,
    /// The queue is closed and drained; no more items will arrive.
    Closed,
}

/// Reports whether a task has reached a final state. Consulted when the
/// last child of a queue closes, to decide whether the queue may die.
pub trait TaskStateProvider: Send + Sync {
    /// Whether the task has been finalized.
    fn is_finalized(&self, task_id: &str) -> bool;
}

/// Hook invoked after every local enqueue, e.g. to replicate events to
/// another process.
pub trait EnqueueHook: Send + Sync {
    /// Observe an item that was just submitted to the bus.
    fn on_enqueue(&self, task_id: &str, item: &EventQueueItem);
}

/// Internal per-child record held by the parent. The parent owns children
/// strongly; a [`ChildQueue`] only holds a reference back to its parent
/// for write delegation and close notification.
struct ChildHandle {
    id: u64,
    tx: mpsc::Sender<EventQueueItem>,
    kill: watch::Sender<bool>,
}

struct MainQueueInner {
    task_id: String,
    capacity: usize,
    semaphore: Arc<Semaphore>,
    bus: MainEventBus,
    /// Copy-on-write child set: distribution clones the `Arc` under a
    /// short read lock and iterates without holding it.
    children: RwLock<Arc<Vec<Arc<ChildHandle>>>>,
    closed: AtomicBool,
    next_child_id: AtomicU64,
    state_provider: Option<Arc<dyn TaskStateProvider>>,
    enqueue_hook: Option<Arc<dyn EnqueueHook>>,
    /// Invoked once when the queue dies (last child gone + task finalized,
    /// or forced close). Used by the queue manager to drop its map entry.
    on_close: Mutex<Option<Box<dyn FnOnce(&str) + Send>>>,
    poller_started: watch::Sender<bool>,
}

/// Per-task event bus and sole writer surface.
///
/// Cloning is cheap; all clones share the same queue.
#[derive(Clone)]
pub struct MainQueue {
    inner: Arc<MainQueueInner>,
}

/// Configuration for building a [`MainQueue`].
pub struct MainQueueConfig {
    /// The task this queue serves.
    pub task_id: String,
    /// Maximum un-processed items before `enqueue_item` blocks.
    pub capacity: usize,
    /// The process-wide bus all writes are submitted to.
    pub bus: MainEventBus,
    /// Finalization oracle consulted on last-child close.
    pub state_provider: Option<Arc<dyn TaskStateProvider>>,
    /// Optional replication hook.
    pub enqueue_hook: Option<Arc<dyn EnqueueHook>>,
    /// Optional close callback.
    pub on_close: Option<Box<dyn FnOnce(&str) + Send>>,
}

impl MainQueue {
    /// Build a queue from its configuration.
    pub fn new(config: MainQueueConfig) -> Self {
        assert!(config.capacity > 0, "capacity must be greater than 0");
        let (poller_tx, _) = watch::channel(false);
        MainQueue {
            inner: Arc::new(MainQueueInner {
                task_id: config.task_id,
                capacity: config.capacity,
                semaphore: Arc::new(Semaphore::new(config.capacity)),
                bus: config.bus,
                children: RwLock::new(Arc::new(Vec::new())),
                closed: AtomicBool::new(false),
                next_child_id: AtomicU64::new(0),
                state_provider: config.state_provider,
                enqueue_hook: config.enqueue_hook,
                on_close: Mutex::new(config.on_close),
                poller_started: poller_tx,
            }),
        }
    }

    /// The task this queue serves.
    pub fn task_id(&self) -> &str {
        &self.inner.task_id
    }

    /// Enqueue a locally-produced event.
    ///
    /// Never rejects on a closed queue — late replicated events and the
    /// synthetic termination path must still be admitted. Capacity
    /// backpressure applies regardless.
    pub async fn enqueue_event(&self, event: Event) -> A2AResult<()> {
        self.enqueue_item(EventQueueItem::local(event)).await
    }

    /// Enqueue a wrapped item: acquire a capacity permit, submit to the
    /// bus, then run the replication hook. The permit is returned by the
    /// bus processor once the item has been persisted and distributed.
    pub async fn enqueue_item(&self, item: EventQueueItem) -> A2AResult<()> {
        if self.is_closed() {
            debug!(task_id = %self.inner.task_id, "Enqueue on closed queue — admitting anyway");
        }

        let permit = self
            .inner
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| A2AError::internal("event queue semaphore closed"))?;
        permit.forget();

        self.inner
            .bus
            .submit(self.inner.task_id.clone(), self.clone(), item.clone())
            .await?;

        if let Some(hook) = &self.inner.enqueue_hook {
            hook.on_enqueue(&self.inner.task_id, &item);
        }

        Ok(())
    }

    /// Create and register a new subscriber tap. Events enqueued before
    /// the tap are not replayed.
    pub fn tap(&self) -> ChildQueue {
        let id = self.inner.next_child_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let (kill_tx, kill_rx) = watch::channel(false);

        let handle = Arc::new(ChildHandle {
            id,
            tx,
            kill: kill_tx,
        });

        {
            let mut children = self.inner.children.write().expect("children lock poisoned");
            let mut next = Vec::clone(&children);
            next.push(handle);
            *children = Arc::new(next);
        }

        debug!(task_id = %self.inner.task_id, child = id, "Tapped child queue");

        ChildQueue {
            id,
            parent: self.clone(),
            rx,
            kill: kill_rx,
            detached: false,
        }
    }

    /// Deliver an event to every current child. Called only by the bus
    /// processor, after persistence. A child whose local FIFO is full is
    /// closed immediately — slow subscribers cannot stall the others.
    pub fn distribute_to_children(&self, event: &Event) {
        let children = {
            let guard = self.inner.children.read().expect("children lock poisoned");
            Arc::clone(&guard)
        };

        let item = EventQueueItem::local(event.clone());
        let mut overflowed: Vec<u64> = Vec::new();

        for child in children.iter() {
            match child.tx.try_send(item.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        task_id = %self.inner.task_id,
                        child = child.id,
                        "Child queue overflowed — closing it immediately"
                    );
                    overflowed.push(child.id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    overflowed.push(child.id);
                }
            }
        }

        for id in overflowed {
            self.kill_child(id);
        }
    }

    /// Number of in-flight items (enqueued but not yet processed).
    pub fn size(&self) -> usize {
        self.inner.capacity - self.inner.semaphore.available_permits()
    }

    /// Number of currently attached children.
    pub fn child_count(&self) -> usize {
        self.inner.children.read().expect("children lock poisoned").len()
    }

    /// Whether the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Close the queue. Graceful close drops the children's senders so
    /// each child drains its buffered items before observing `Closed`;
    /// immediate close discards buffers.
    pub fn close(&self, immediate: bool) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(task_id = %self.inner.task_id, immediate, "Closing main queue");

        let children = {
            let mut guard = self.inner.children.write().expect("children lock poisoned");
            std::mem::replace(&mut *guard, Arc::new(Vec::new()))
        };

        if immediate {
            for child in children.iter() {
                let _ = child.kill.send(true);
            }
        }
        // Dropping the handles drops the senders; graceful children drain.
        drop(children);

        self.fire_on_close();
    }

    /// Wait up to ten seconds for some subscriber to start polling.
    /// Producers that must not emit into the void call this first.
    pub async fn await_poller_start(&self) -> A2AResult<()> {
        let mut rx = self.inner.poller_started.subscribe();
        if *rx.borrow() {
            return Ok(());
        }
        tokio::time::timeout(POLLER_START_TIMEOUT, async {
            while !*rx.borrow() {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
        .map_err(|_| A2AError::internal("no subscriber started polling within 10s"))
    }

    /// Release one capacity permit. Called exactly once per processed item
    /// by the bus processor — the sole counterpart of the acquire in
    /// `enqueue_item`.
    pub(crate) fn release_permit(&self) {
        self.inner.semaphore.add_permits(1);
    }

    fn mark_poller_started(&self) {
        let _ = self.inner.poller_started.send(true);
    }

    /// Immediately close one child (overflow or force-close path).
    fn kill_child(&self, id: u64) {
        let removed = self.remove_child(id);
        if let Some(child) = removed {
            let _ = child.kill.send(true);
        }
    }

    fn remove_child(&self, id: u64) -> Option<Arc<ChildHandle>> {
        let mut guard = self.inner.children.write().expect("children lock poisoned");
        let mut next = Vec::clone(&guard);
        let pos = next.iter().position(|c| c.id == id)?;
        let child = next.remove(pos);
        *guard = Arc::new(next);
        Some(child)
    }

    /// A child is closing. Immediate closes force-close the whole queue;
    /// otherwise the queue stays open while other children remain, or
    /// while the task is not yet finalized (fire-and-forget producers and
    /// late resubscribers rely on this).
    fn child_closing(&self, id: u64, immediate: bool) {
        let child = self.remove_child(id);
        if let Some(child) = child {
            if immediate {
                let _ = child.kill.send(true);
            }
        }

        if immediate {
            self.close(true);
            return;
        }

        if self.child_count() > 0 {
            return;
        }

        let finalized = self
            .inner
            .state_provider
            .as_ref()
            .map(|p| p.is_finalized(&self.inner.task_id))
            // Without a provider there is no safe way to know the task is
            // done; keep the queue for late subscribers.
            .unwrap_or(false);

        if finalized {
            debug!(task_id = %self.inner.task_id, "Last child closed on finalized task — closing queue");
            self.close(false);
        }
    }

    fn fire_on_close(&self) {
        let callback = self
            .inner
            .on_close
            .lock()
            .expect("on_close lock poisoned")
            .take();
        if let Some(callback) = callback {
            callback(&self.inner.task_id);
        }
    }
}

impl std::fmt::Debug for MainQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainQueue")
            .field("task_id", &self.inner.task_id)
            .field("capacity", &self.inner.capacity)
            .field("children", &self.child_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A per-subscriber view of a [`MainQueue`].
///
/// Reads are local (the parent pushes into this child's FIFO); writes
/// delegate to the parent so every event still flows through the central
/// bus. Dropping a child without closing it notifies the parent, so an
/// abandoned subscriber (e.g. a disconnected SSE client) releases its
/// reference.
pub struct ChildQueue {
    id: u64,
    parent: MainQueue,
    rx: mpsc::Receiver<EventQueueItem>,
    kill: watch::Receiver<bool>,
    detached: bool,
}

impl ChildQueue {
    /// The task this queue serves.
    pub fn task_id(&self) -> &str {
        self.parent.task_id()
    }

    /// Dequeue the next item, waiting up to `timeout`.
    pub async fn dequeue(&mut self, timeout: Duration) -> DequeueOutcome {
        self.parent.mark_poller_started();

        if *self.kill.borrow() {
            return DequeueOutcome::Closed;
        }

        let kill = &mut self.kill;
        let rx = &mut self.rx;

        // Resolves only on an actual kill (immediate close). The sender
        // being dropped is the *graceful* path — buffered items must still
        // drain through `rx` before `recv` reports closure.
        let killed = async move {
            loop {
                if *kill.borrow() {
                    return;
                }
                if kill.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            biased;
            _ = killed => DequeueOutcome::Closed,
            item = rx.recv() => match item {
                Some(item) => DequeueOutcome::Item(item),
                None => DequeueOutcome::Closed,
            },
            _ = tokio::time::sleep(timeout) => DequeueOutcome::Timeout,
        }
    }

    /// Enqueue an event. Writes always go to the parent queue.
    pub async fn enqueue_event(&self, event: Event) -> A2AResult<()> {
        self.parent.enqueue_event(event).await
    }

    /// Number of items buffered locally.
    pub fn size(&self) -> usize {
        self.rx.len()
    }

    /// Close this child. With `notify_parent` the parent re-evaluates its
    /// lifetime (and an `immediate` close force-closes the whole queue).
    pub fn close(mut self, immediate: bool, notify_parent: bool) {
        self.detached = true;
        if immediate {
            self.rx.close();
        }
        if notify_parent {
            self.parent.child_closing(self.id, immediate);
        } else {
            self.parent.remove_child(self.id);
        }
    }
}

impl Drop for ChildQueue {
    fn drop(&mut self) {
        if !self.detached {
            self.parent.child_closing(self.id, false);
        }
    }
}

impl std::fmt::Debug for ChildQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildQueue")
            .field("id", &self.id)
            .field("task_id", &self.parent.task_id())
            .finish()
    }
}
