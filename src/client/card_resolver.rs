//! Agent card discovery from the well-known endpoints.

use crate::error::{A2AError, A2AResult};
use crate::types::AgentCard;
use crate::utils::constants::{AGENT_CARD_WELL_KNOWN_PATH, PREV_AGENT_CARD_WELL_KNOWN_PATH};
use tracing::debug;

/// Fetches agent cards from `/.well-known/agent-card.json`, falling back
/// to the deprecated `/.well-known/agent.json`.
#[derive(Debug, Clone, Default)]
pub struct CardResolver {
    client: reqwest::Client,
}

impl CardResolver {
    /// Resolver with a fresh HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver sharing an existing HTTP client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Resolve the card served under `base_url`.
    pub async fn resolve(&self, base_url: &str) -> A2AResult<AgentCard> {
        let base = base_url.trim_end_matches('/');

        for path in [AGENT_CARD_WELL_KNOWN_PATH, PREV_AGENT_CARD_WELL_KNOWN_PATH] {
            let url = format!("{}{}", base, path);
            debug!(url = %url, "Fetching agent card");

            let response = match self.client.get(&url).send().await {
                Ok(response) => response,
                Err(err) => {
                    debug!(url = %url, error = %err, "Card fetch failed");
                    continue;
                }
            };

            if !response.status().is_success() {
                continue;
            }

            return response.json::<AgentCard>().await.map_err(|e| {
                A2AError::Transport(format!("failed to parse agent card from {}: {}", url, e))
            });
        }

        Err(A2AError::Transport(format!(
            "no agent card found under {}",
            base_url
        )))
    }

    /// The JSON-RPC endpoint URL declared by a card, when one exists.
    pub fn jsonrpc_url(card: &AgentCard) -> Option<&str> {
        card.supported_interfaces
            .iter()
            .find(|i| i.transport.eq_ignore_ascii_case("JSONRPC"))
            .map(|i| i.url.as_str())
            .or_else(|| {
                let prefers_jsonrpc = card
                    .preferred_transport
                    .as_deref()
                    .map(|t| t.eq_ignore_ascii_case("JSONRPC"))
                    .unwrap_or(true);
                prefers_jsonrpc.then_some(card.url.as_str())
            })
    }

    /// The REST base URL declared by a card, when one exists.
    pub fn rest_url(card: &AgentCard) -> Option<&str> {
        card.supported_interfaces
            .iter()
            .find(|i| i.transport.eq_ignore_ascii_case("HTTP+JSON"))
            .map(|i| i.url.as_str())
    }
}
