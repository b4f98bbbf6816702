//! Server-Sent Events parsing for streaming responses.
//!
//! Parses `data:` lines from an HTTP response body into typed [`Event`]s.
//! Handles both raw event frames (the REST binding) and JSON-RPC-wrapped
//! frames (the JSON-RPC binding), where the `result` field carries the
//! event.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use tokio::sync::mpsc;

use crate::error::{A2AError, A2AResult};
use crate::types::Event;

/// A stream of typed A2A events read from an SSE response.
pub struct SseStream {
    receiver: mpsc::Receiver<A2AResult<Event>>,
    /// Keeps the parsing task alive for the lifetime of the stream.
    _task: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for SseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseStream").finish_non_exhaustive()
    }
}

impl SseStream {
    /// Spawn a parser over a raw `reqwest::Response` body.
    pub(crate) fn from_response(response: reqwest::Response) -> Self {
        let (tx, rx) = mpsc::channel(64);

        let task = tokio::spawn(async move {
            if let Err(err) = parse_sse_body(response, &tx).await {
                let _ = tx.send(Err(err)).await;
            }
        });

        Self {
            receiver: rx,
            _task: task,
        }
    }

    /// Next event, or `None` when the server closed the stream.
    pub async fn next(&mut self) -> Option<A2AResult<Event>> {
        self.receiver.recv().await
    }
}

impl Stream for SseStream {
    type Item = A2AResult<Event>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

async fn parse_sse_body(
    response: reqwest::Response,
    tx: &mpsc::Sender<A2AResult<Event>>,
) -> A2AResult<()> {
    use futures::StreamExt;

    let mut body = response.bytes_stream();
    let mut buffer = String::new();

    while let Some(chunk) = body.next().await {
        let chunk =
            chunk.map_err(|e| A2AError::Transport(format!("error reading SSE stream: {e}")))?;
        let text = std::str::from_utf8(&chunk)
            .map_err(|e| A2AError::Transport(format!("invalid UTF-8 in SSE stream: {e}")))?;
        buffer.push_str(text);

        while let Some(newline) = buffer.find('\n') {
            let line = buffer[..newline].trim_end_matches('\r').to_string();
            buffer.drain(..=newline);

            match parse_sse_line(&line) {
                Ok(Some(event)) => {
                    if tx.send(Ok(event)).await.is_err() {
                        // Receiver gone — stop parsing.
                        return Ok(());
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    if tx.send(Err(err)).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    if !buffer.trim().is_empty() {
        if let Some(event) = parse_sse_line(buffer.trim())? {
            let _ = tx.send(Ok(event)).await;
        }
    }

    Ok(())
}

/// Parse one SSE line. `data:` lines yield events; comments, blank lines,
/// and non-data fields yield `None`.
fn parse_sse_line(line: &str) -> A2AResult<Option<Event>> {
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }

    let Some(data) = line.strip_prefix("data:") else {
        // event:, id:, retry: fields carry no payload we act on.
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| A2AError::Transport(format!("failed to parse SSE data: {e}")))?;

    // JSON-RPC wrapped frames carry the event in `result`.
    let event_value = if value.get("jsonrpc").is_some() {
        if let Some(error) = value.get("error") {
            let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string();
            return Err(A2AError::JsonRpc {
                code,
                message,
                data: error.get("data").cloned(),
            });
        }
        value.get("result").cloned().ok_or_else(|| {
            A2AError::Transport("JSON-RPC SSE frame has neither result nor error".to_string())
        })?
    } else {
        value
    };

    let event: Event = serde_json::from_value(event_value)
        .map_err(|e| A2AError::Transport(format!("failed to parse SSE event: {e}")))?;
    Ok(Some(event))
}
