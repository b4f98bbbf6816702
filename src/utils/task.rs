//! Task construction and shaping helpers.

use crate::error::{A2AError, A2AResult};
use crate::types::{Artifact, Message, Part, Task, TaskState, TaskStatus};
use uuid::Uuid;

/// Create a new task from an initial user message.
///
/// Task and context ids are taken from the message when present,
/// generated otherwise. The message becomes the first history entry.
pub fn new_task(request: Message) -> A2AResult<Task> {
    if request.parts.is_empty() {
        return Err(A2AError::invalid_params("Message parts cannot be empty"));
    }
    for part in &request.parts {
        if let Part::Text { text, .. } = part {
            if text.is_empty() {
                return Err(A2AError::invalid_params("Text part content cannot be empty"));
            }
        }
    }

    let task_id = request
        .task_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let context_id = request
        .context_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    Ok(Task {
        id: task_id,
        context_id,
        kind: "task".to_string(),
        status: TaskStatus::now(TaskState::Submitted),
        artifacts: None,
        history: Some(vec![request]),
        metadata: None,
    })
}

/// Build a `completed` task carrying the given artifacts.
pub fn completed_task(
    task_id: impl Into<String>,
    context_id: impl Into<String>,
    artifacts: Vec<Artifact>,
    history: Option<Vec<Message>>,
) -> A2AResult<Task> {
    if artifacts.is_empty() {
        return Err(A2AError::invalid_params(
            "artifacts must be a non-empty list",
        ));
    }

    Ok(Task {
        id: task_id.into(),
        context_id: context_id.into(),
        kind: "task".to_string(),
        status: TaskStatus::now(TaskState::Completed),
        artifacts: Some(artifacts),
        history,
        metadata: None,
    })
}

/// Cap a task's history to its most recent `history_length` messages.
/// `None` or zero leaves the history untouched.
pub fn apply_history_length(mut task: Task, history_length: Option<usize>) -> Task {
    if let Some(length) = history_length {
        if length > 0 {
            if let Some(ref mut history) = task.history {
                let total = history.len();
                if total > length {
                    *history = history.split_off(total - length);
                }
            }
        }
    }
    task
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_uses_message_ids() {
        let mut message = Message::user("m1", "hello");
        message.task_id = Some("t1".to_string());
        message.context_id = Some("c1".to_string());

        let task = new_task(message).unwrap();
        assert_eq!(task.id, "t1");
        assert_eq!(task.context_id, "c1");
        assert_eq!(task.status.state, TaskState::Submitted);
        assert_eq!(task.history.unwrap().len(), 1);
    }

    #[test]
    fn new_task_generates_missing_ids() {
        let task = new_task(Message::user("m1", "hello")).unwrap();
        assert!(!task.id.is_empty());
        assert!(!task.context_id.is_empty());
    }

    #[test]
    fn new_task_rejects_empty_parts() {
        let mut message = Message::user("m1", "x");
        message.parts.clear();
        assert!(new_task(message).is_err());

        let empty_text = Message::user("m2", "");
        assert!(new_task(empty_text).is_err());
    }

    #[test]
    fn completed_task_requires_artifacts() {
        assert!(completed_task("t1", "c1", vec![], None).is_err());
    }

    #[test]
    fn apply_history_length_keeps_tail() {
        let mut task = Task::submitted("t1", "c1");
        task.history = Some(
            (0..10)
                .map(|i| Message::user(format!("m{}", i), "hi"))
                .collect(),
        );

        let trimmed = apply_history_length(task.clone(), Some(3));
        let history = trimmed.history.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].message_id, "m7");

        let untouched = apply_history_length(task, None);
        assert_eq!(untouched.history.unwrap().len(), 10);
    }
}
