//! Client-side call interception: per-call context plus payload and
//! header rewriting applied by every transport before a request leaves
//! the process.

use std::collections::HashMap;

use crate::error::A2AResult;
use crate::utils::constants::{DEFAULT_PROTOCOL_VERSION, EXTENSIONS_HEADER, VERSION_HEADER};

/// Per-call client context: outbound headers, requested extensions, and
/// the protocol version to speak.
#[derive(Debug, Clone)]
pub struct ClientCallContext {
    /// Extra headers for this call.
    pub headers: HashMap<String, String>,

    /// Extensions to request (`X-A2A-Extensions`).
    pub extensions: Vec<String>,

    /// Protocol version to request (`X-A2A-Version`).
    pub protocol_version: String,
}

impl Default for ClientCallContext {
    fn default() -> Self {
        ClientCallContext {
            headers: HashMap::new(),
            extensions: Vec::new(),
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
        }
    }
}

impl ClientCallContext {
    /// Fresh default context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request extensions on this call.
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// The full header map to put on the wire, including the extension
    /// and version headers.
    pub fn wire_headers(&self) -> HashMap<String, String> {
        let mut headers = self.headers.clone();
        if !self.extensions.is_empty() {
            headers.insert(EXTENSIONS_HEADER.to_string(), self.extensions.join(","));
        }
        headers.insert(VERSION_HEADER.to_string(), self.protocol_version.clone());
        headers
    }
}

/// Rewrites a call's payload and headers before it is sent.
///
/// Interceptors run in registration order; each sees the output of the
/// previous one. Typical uses: auth headers, extension negotiation,
/// payload redaction.
pub trait ClientCallInterceptor: Send + Sync {
    /// Rewrite the payload and/or context for the named logical method.
    fn intercept(
        &self,
        method: &str,
        payload: &mut serde_json::Value,
        ctx: &mut ClientCallContext,
    ) -> A2AResult<()>;
}

/// Interceptor adding a static header to every call.
pub struct HeaderInterceptor {
    name: String,
    value: String,
}

impl HeaderInterceptor {
    /// Add `name: value` to every outbound call.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Bearer-token authorization header.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::new("Authorization", format!("Bearer {}", token.into()))
    }
}

impl ClientCallInterceptor for HeaderInterceptor {
    fn intercept(
        &self,
        _method: &str,
        _payload: &mut serde_json::Value,
        ctx: &mut ClientCallContext,
    ) -> A2AResult<()> {
        ctx.headers.insert(self.name.clone(), self.value.clone());
        Ok(())
    }
}
