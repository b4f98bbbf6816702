//! Bridge between child-queue consumption and the reactive streams the
//! transports serve.
//!
//! Stage A of the streaming path: a dequeue loop over a [`ChildQueue`]
//! exposed as a `futures::Stream` of events. Credit accounting is
//! explicit poll-by-poll — the generator only dequeues the next item after
//! the downstream has consumed the previous one, so transport write
//! backpressure propagates all the way to the child FIFO. Stage B (SSE
//! frames, gRPC `on_next`) lives in the transport adapters.
//!
//! Termination and teardown:
//! - a final event (terminal status update, direct message, final task
//!   snapshot) completes the stream and closes the child gracefully
//! - dropping the stream (client disconnect) drops the child, whose
//!   `Drop` notifies the parent queue; reference counting does the rest

use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use tracing::debug;

use crate::types::Event;

use super::event_queue::{ChildQueue, DequeueOutcome};

/// Poll interval for the dequeue loop. Short enough to observe closure
/// promptly, long enough to stay off the scheduler's back.
pub const DEQUEUE_POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// A boxed stream of pipeline events, as handed to transport adapters.
pub type EventStream = Pin<Box<dyn Stream<Item = Event> + Send>>;

/// Turn a child queue into an [`EventStream`].
///
/// The stream yields every event delivered to the child, in order, and
/// completes after a final event or queue closure.
pub fn event_stream(child: ChildQueue) -> EventStream {
    Box::pin(async_stream::stream! {
        let mut child = child;
        loop {
            match child.dequeue(DEQUEUE_POLL_TIMEOUT).await {
                DequeueOutcome::Item(item) => {
                    let is_final = item.event.is_final();
                    yield item.event;
                    if is_final {
                        debug!(task_id = %child.task_id(), "Final event delivered — completing stream");
                        child.close(false, true);
                        break;
                    }
                }
                DequeueOutcome::Timeout => continue,
                DequeueOutcome::Closed => {
                    debug!(task_id = %child.task_id(), "Child queue closed — completing stream");
                    break;
                }
            }
        }
    })
}
