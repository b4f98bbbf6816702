//! Protocol extension negotiation helpers.

use crate::types::{AgentCard, AgentExtension};
use std::collections::HashSet;

/// Parse requested extensions from header values.
///
/// Handles comma-separated lists as they occur in HTTP headers; strips
/// whitespace and drops empty entries.
pub fn get_requested_extensions<I, S>(values: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .flat_map(|v| {
            v.as_ref()
                .split(',')
                .map(|s| s.trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Find an extension declared in an agent card by URI.
pub fn find_extension_by_uri<'a>(card: &'a AgentCard, uri: &str) -> Option<&'a AgentExtension> {
    card.capabilities
        .extensions
        .as_ref()?
        .iter()
        .find(|ext| ext.uri == uri)
}

/// URIs of the extensions a card declares as required.
pub fn required_extensions(card: &AgentCard) -> Vec<&str> {
    card.capabilities
        .extensions
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter(|ext| ext.required == Some(true))
        .map(|ext| ext.uri.as_str())
        .collect()
}
