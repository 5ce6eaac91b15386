//! Client configuration
//!
//! Holds the endpoint, the authorization mode, the timeout/backoff policy
//! knobs and the external collaborators. Built through the type-state
//! builder in [`crate::core::builder`].

use crate::auth_headers::AuthMode;
use crate::traits::{
    CredentialsProvider, DiagnosticsSink, Headers, JitteredBackoff, NoOpDiagnostics,
    RequestSigner, RetryStrategy, TokenProvider,
};
use std::sync::Arc;
use std::time::Duration;

/// How long to wait for the connection acknowledgment after sending init
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// How long to wait for a start acknowledgment after sending start
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(15);

/// Keep-alive interval used when the server never negotiates one
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Delay before checking whether the idle socket can be closed
pub const DEFAULT_IDLE_CLOSE_DELAY: Duration = Duration::from_secs(1);

/// Configuration for a [`crate::RealtimeClient`]
pub struct ClientConfig {
    /// Service endpoint (`https://...`); the socket URL is derived from it
    pub(crate) endpoint: String,

    /// Authorization mode used for the handshake and every start message
    pub(crate) auth_mode: AuthMode,

    /// Caller-supplied headers; [`AuthMode::Bearer`] reads its
    /// `Authorization` token from here
    pub(crate) additional_headers: Headers,

    /// Deadline for the init/ack exchange per attempt
    pub(crate) handshake_timeout: Duration,

    /// Deadline for a subscription's start acknowledgment
    pub(crate) ack_timeout: Duration,

    /// Keep-alive fallback when the ack carries no negotiated interval
    pub(crate) default_keepalive: Duration,

    /// Interval of the deferred socket-teardown check
    pub(crate) idle_close_delay: Duration,

    /// Handshake retry policy
    pub(crate) retry: Box<dyn RetryStrategy>,

    /// Signing credential collaborator
    pub(crate) credentials: Option<Arc<dyn CredentialsProvider>>,

    /// Session/identity token collaborator
    pub(crate) tokens: Option<Arc<dyn TokenProvider>>,

    /// External request-signing primitive
    pub(crate) signer: Option<Arc<dyn RequestSigner>>,

    /// Best-effort diagnostic event sink
    pub(crate) diagnostics: Arc<dyn DiagnosticsSink>,
}

impl ClientConfig {
    /// Create a configuration with default policy knobs
    pub fn new(endpoint: String, auth_mode: AuthMode) -> Self {
        Self {
            endpoint,
            auth_mode,
            additional_headers: Headers::new(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            default_keepalive: DEFAULT_KEEPALIVE_INTERVAL,
            idle_close_delay: DEFAULT_IDLE_CLOSE_DELAY,
            retry: Box::new(JitteredBackoff::default()),
            credentials: None,
            tokens: None,
            signer: None,
            diagnostics: Arc::new(NoOpDiagnostics),
        }
    }

    /// Get a reference to the endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Get the configured authorization mode
    pub fn auth_mode(&self) -> &AuthMode {
        &self.auth_mode
    }
}
