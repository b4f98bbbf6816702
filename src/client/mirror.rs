//! Per-stream task mirror: folds inbound events so consumers always see
//! a current, fully-folded task view.
//!
//! Each active stream gets its own mirror; task state is never shared
//! across streams.

use crate::folding;
use crate::types::{Event, Task};

/// A consumer-facing stream item: the event plus the folded task state
/// after applying it.
#[derive(Debug, Clone)]
pub struct ClientEvent {
    /// The raw event as received.
    pub event: Event,
    /// The task after folding the event. `None` for task-less events
    /// before a task exists.
    pub task: Option<Task>,
}

/// Folding mirror for one stream.
#[derive(Debug, Default)]
pub struct TaskMirror {
    task: Option<Task>,
}

impl TaskMirror {
    /// Empty mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror seeded with a known task (e.g. on resubscribe).
    pub fn seeded(task: Task) -> Self {
        Self { task: Some(task) }
    }

    /// Fold one event and return the consumer-facing view.
    pub fn apply(&mut self, event: Event) -> ClientEvent {
        self.task = folding::fold(self.task.take(), &event);
        ClientEvent {
            event,
            task: self.task.clone(),
        }
    }

    /// The current folded task.
    pub fn task(&self) -> Option<&Task> {
        self.task.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TaskState, TaskStatus, TaskStatusUpdateEvent};

    fn status(state: TaskState, r#final: bool) -> Event {
        Event::StatusUpdate(TaskStatusUpdateEvent {
            task_id: "t1".to_string(),
            context_id: "c1".to_string(),
            kind: "status-update".to_string(),
            status: TaskStatus::new(state),
            r#final,
            metadata: None,
        })
    }

    #[test]
    fn mirror_folds_progressively() {
        let mut mirror = TaskMirror::new();

        let first = mirror.apply(Event::Task(Task::submitted("t1", "c1")));
        assert_eq!(first.task.as_ref().unwrap().status.state, TaskState::Submitted);

        let second = mirror.apply(status(TaskState::Working, false));
        assert_eq!(second.task.as_ref().unwrap().status.state, TaskState::Working);

        let last = mirror.apply(status(TaskState::Completed, true));
        assert_eq!(last.task.as_ref().unwrap().status.state, TaskState::Completed);
    }

    #[test]
    fn seeded_mirror_continues_from_snapshot() {
        let mut seeded = Task::submitted("t1", "c1");
        seeded.status = TaskStatus::new(TaskState::Working);

        let mut mirror = TaskMirror::seeded(seeded);
        let view = mirror.apply(status(TaskState::Completed, true));
        assert_eq!(view.task.unwrap().status.state, TaskState::Completed);
    }
}
