//! Per-request server-side context: authenticated user, request state,
//! negotiated extensions, protocol version, and a cancellation signal.
//!
//! For unary requests the context lives for the request; for streaming
//! requests it lives for the stream. Transports fire the cancellation
//! signal when the client goes away.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Notify;

use crate::utils::constants::DEFAULT_PROTOCOL_VERSION;

/// The (opaque) authenticated caller.
#[derive(Debug, Clone, Default)]
pub struct User {
    /// Principal name, when authentication produced one.
    pub name: Option<String>,
    /// Whether the caller passed authentication.
    pub authenticated: bool,
}

impl User {
    /// An unauthenticated caller.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An authenticated caller with the given principal name.
    pub fn authenticated(name: impl Into<String>) -> Self {
        User {
            name: Some(name.into()),
            authenticated: true,
        }
    }
}

/// A fire-once cancellation signal shared between a transport and the
/// request handling it spawned.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    inner: Arc<CancellationInner>,
}

#[derive(Debug, Default)]
struct CancellationInner {
    fired: AtomicBool,
    notify: Notify,
}

impl CancellationSignal {
    /// Fresh, unfired signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Idempotent.
    pub fn fire(&self) {
        if !self.inner.fired.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Whether the signal has fired.
    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Wait until the signal fires.
    pub async fn fired(&self) {
        if self.is_fired() {
            return;
        }
        let notified = self.inner.notify.notified();
        if self.is_fired() {
            return;
        }
        notified.await;
    }
}

/// Context accompanying every inbound request.
#[derive(Debug, Clone)]
pub struct ServerCallContext {
    /// The authenticated caller.
    pub user: User,

    /// Arbitrary per-request state.
    pub state: HashMap<String, Value>,

    /// Extensions the client asked to activate (`X-A2A-Extensions`).
    pub requested_extensions: HashSet<String>,

    /// Extensions the handler activated for this request; echoed back to
    /// the client.
    pub activated_extensions: HashSet<String>,

    /// Protocol version the client requested (`X-A2A-Version`).
    pub protocol_version: String,

    /// Fired when the client disconnects or the transport tears down the
    /// stream.
    pub cancellation: CancellationSignal,
}

impl Default for ServerCallContext {
    fn default() -> Self {
        ServerCallContext {
            user: User::anonymous(),
            state: HashMap::new(),
            requested_extensions: HashSet::new(),
            activated_extensions: HashSet::new(),
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            cancellation: CancellationSignal::new(),
        }
    }
}

impl ServerCallContext {
    /// A default context for an anonymous caller.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the authenticated user.
    pub fn with_user(mut self, user: User) -> Self {
        self.user = user;
        self
    }

    /// Set the requested extensions.
    pub fn with_requested_extensions(mut self, extensions: HashSet<String>) -> Self {
        self.requested_extensions = extensions;
        self
    }

    /// Set the requested protocol version.
    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Mark an extension as activated for this request.
    pub fn activate_extension(&mut self, uri: impl Into<String>) {
        self.activated_extensions.insert(uri.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancellation_fires_once_and_wakes_waiters() {
        let signal = CancellationSignal::new();
        assert!(!signal.is_fired());

        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.fired().await })
        };

        signal.fire();
        signal.fire();
        assert!(signal.is_fired());

        tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn fired_returns_immediately_when_already_fired() {
        let signal = CancellationSignal::new();
        signal.fire();
        tokio::time::timeout(Duration::from_millis(50), signal.fired())
            .await
            .expect("should not block");
    }

    #[test]
    fn context_defaults() {
        let ctx = ServerCallContext::new();
        assert!(!ctx.user.authenticated);
        assert_eq!(ctx.protocol_version, DEFAULT_PROTOCOL_VERSION);
        assert!(ctx.requested_extensions.is_empty());
    }
}
