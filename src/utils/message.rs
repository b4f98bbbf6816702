//! Message construction and text extraction helpers.

use crate::types::{Message, Part, Role};
use uuid::Uuid;

/// Build a message with a generated id and a single text part.
pub fn create_text_message(role: Role, content: &str) -> Message {
    Message {
        message_id: Uuid::new_v4().to_string(),
        role,
        kind: "message".to_string(),
        parts: vec![Part::text(content)],
        context_id: None,
        task_id: None,
        metadata: None,
        extensions: None,
        reference_task_ids: None,
    }
}

/// All text content of a message, joined by `delimiter`.
pub fn message_text(message: &Message, delimiter: &str) -> String {
    message
        .parts
        .iter()
        .filter_map(|part| match part {
            Part::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(delimiter)
}
