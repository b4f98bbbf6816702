//! Artifact construction helpers.

use crate::types::{Artifact, Part};
use uuid::Uuid;

/// Build a text artifact with a generated id.
pub fn new_text_artifact(
    name: impl Into<String>,
    text: impl Into<String>,
    description: Option<String>,
) -> Artifact {
    Artifact {
        artifact_id: Uuid::new_v4().to_string(),
        name: Some(name.into()),
        description,
        parts: vec![Part::text(text)],
        metadata: None,
        extensions: None,
    }
}

/// Build a structured-data artifact with a generated id.
pub fn new_data_artifact(
    name: impl Into<String>,
    data: serde_json::Value,
    description: Option<String>,
) -> Artifact {
    Artifact {
        artifact_id: Uuid::new_v4().to_string(),
        name: Some(name.into()),
        description,
        parts: vec![Part::data(data)],
        metadata: None,
        extensions: None,
    }
}

/// Concatenated text of all text parts of an artifact.
pub fn artifact_text(artifact: &Artifact) -> String {
    artifact
        .parts
        .iter()
        .filter_map(|part| match part {
            Part::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_artifact_has_one_text_part() {
        let artifact = new_text_artifact("report", "body", None);
        assert_eq!(artifact.parts.len(), 1);
        assert_eq!(artifact_text(&artifact), "body");
    }

    #[test]
    fn artifact_text_concatenates() {
        let mut artifact = new_text_artifact("report", "A", None);
        artifact.parts.push(Part::text("B"));
        artifact.parts.push(Part::data(serde_json::json!(1)));
        artifact.parts.push(Part::text("C"));
        assert_eq!(artifact_text(&artifact), "ABC");
    }
}
