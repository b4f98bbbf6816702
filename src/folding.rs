//! Event folding — the pure reducer that applies pipeline events to the
//! canonical task record.
//!
//! `fold` is deterministic: the same `(prior, event)` pair always produces
//! the same task. The server's central processor uses it before persisting;
//! the client's streaming mirror uses the same function so consumers always
//! observe a fully-folded task.
//!
//! Folding rules:
//! - **Task snapshot** — adopt it; keep the prior history if the snapshot
//!   has none; merge metadata (snapshot keys win on conflict).
//! - **Status update** — demote the prior `status.message` into history,
//!   then replace the status wholesale. A status update for an unknown
//!   task creates a `submitted` skeleton first.
//! - **Artifact update** — append a new artifact, replace an existing one,
//!   or concatenate parts when `append` is set. `last_chunk` is
//!   informational only.
//! - **Message** / **internal error** — leave the task untouched.

use crate::types::{Artifact, Event, Message, Task, TaskArtifactUpdateEvent, TaskStatusUpdateEvent};
use tracing::debug;

/// Apply one event to the prior task state, producing the next state.
///
/// Returns `None` when there is no task to speak of: a bare `Message` or
/// internal-error event with no prior task.
pub fn fold(prior: Option<Task>, event: &Event) -> Option<Task> {
    match event {
        Event::Task(snapshot) => Some(adopt_snapshot(prior, snapshot)),
        Event::StatusUpdate(update) => Some(apply_status_update(prior, update)),
        Event::ArtifactUpdate(update) => Some(apply_artifact_update(prior, update)),
        Event::Message(_) | Event::InternalError(_) => prior,
    }
}

/// Whether folding this event would change the persisted task record.
pub fn is_persistable(event: &Event) -> bool {
    matches!(
        event,
        Event::Task(_) | Event::StatusUpdate(_) | Event::ArtifactUpdate(_)
    )
}

fn adopt_snapshot(prior: Option<Task>, snapshot: &Task) -> Task {
    let mut task = snapshot.clone();

    if let Some(prior) = prior {
        if task.history.is_none() {
            task.history = prior.history;
        }
        task.metadata = merge_metadata(prior.metadata, task.metadata);
    }

    task
}

fn apply_status_update(prior: Option<Task>, update: &TaskStatusUpdateEvent) -> Task {
    let mut task = prior.unwrap_or_else(|| {
        debug!(
            task_id = %update.task_id,
            context_id = %update.context_id,
            "Status update for unknown task — creating skeleton"
        );
        Task::submitted(update.task_id.clone(), update.context_id.clone())
    });

    // Demote the superseded status message before replacing the status.
    if let Some(prior_msg) = task.status.message.take() {
        push_history(&mut task, prior_msg);
    }

    task.metadata = merge_metadata(task.metadata.take(), update.metadata.clone());
    task.status = update.status.clone();
    task
}

fn apply_artifact_update(prior: Option<Task>, update: &TaskArtifactUpdateEvent) -> Task {
    let mut task = prior.unwrap_or_else(|| {
        debug!(
            task_id = %update.task_id,
            context_id = %update.context_id,
            "Artifact update for unknown task — creating skeleton"
        );
        Task::submitted(update.task_id.clone(), update.context_id.clone())
    });

    merge_artifact(&mut task, &update.artifact, update.append.unwrap_or(false));
    task
}

/// Merge an artifact into the task's artifact list.
///
/// Lookup is by `artifact_id`. Append concatenates parts; otherwise the
/// artifact is replaced wholesale (or added when new). Appending to an
/// artifact that does not exist yet adds it — the first chunk of a
/// chunked artifact may itself carry `append = true`.
pub fn merge_artifact(task: &mut Task, incoming: &Artifact, append: bool) {
    let artifacts = task.artifacts.get_or_insert_with(Vec::new);
    let existing = artifacts
        .iter()
        .position(|a| a.artifact_id == incoming.artifact_id);

    match (existing, append) {
        (Some(idx), true) => {
            debug!(
                artifact_id = %incoming.artifact_id,
                task_id = %task.id,
                added_parts = incoming.parts.len(),
                "Appending parts to artifact"
            );
            artifacts[idx].parts.extend(incoming.parts.iter().cloned());
        }
        (Some(idx), false) => {
            debug!(
                artifact_id = %incoming.artifact_id,
                task_id = %task.id,
                "Replacing artifact"
            );
            artifacts[idx] = incoming.clone();
        }
        (None, _) => {
            debug!(
                artifact_id = %incoming.artifact_id,
                task_id = %task.id,
                "Adding new artifact"
            );
            artifacts.push(incoming.clone());
        }
    }
}

fn push_history(task: &mut Task, message: Message) {
    task.history.get_or_insert_with(Vec::new).push(message);
}

/// Merge metadata objects; `incoming` keys override `base` on conflict.
/// Non-object values are replaced wholesale.
pub fn merge_metadata(
    base: Option<serde_json::Value>,
    incoming: Option<serde_json::Value>,
) -> Option<serde_json::Value> {
    match (base, incoming) {
        (base, None) => base,
        (None, incoming) => incoming,
        (Some(mut base), Some(incoming)) => {
            match (base.as_object_mut(), incoming.as_object()) {
                (Some(base_obj), Some(incoming_obj)) => {
                    for (k, v) in incoming_obj {
                        base_obj.insert(k.clone(), v.clone());
                    }
                    Some(base)
                }
                _ => Some(incoming),
            }
        }
    }
}
