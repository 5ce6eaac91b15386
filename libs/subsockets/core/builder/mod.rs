pub mod states;

use crate::auth_headers::AuthMode;
use crate::client::RealtimeClient;
use crate::config::ClientConfig;
use crate::traits::{
    CredentialsProvider, DiagnosticsSink, RequestSigner, RetryStrategy, TokenProvider,
};
use states::*;
use std::sync::Arc;
use std::time::Duration;

/// Type-state builder for [`RealtimeClient`]
///
/// This builder uses Rust's type system to enforce that the required
/// fields (endpoint and auth mode) are set before the client can be built.
pub struct ClientBuilder<E, A>
where
    E: EndpointState,
    A: AuthState,
{
    _state: TypeState<E, A>,
    endpoint: Option<String>,
    auth_mode: Option<AuthMode>,
    config_knobs: Knobs,
}

/// Optional configuration carried through the builder state transitions
#[derive(Default)]
struct Knobs {
    additional_headers: Vec<(String, String)>,
    handshake_timeout: Option<Duration>,
    ack_timeout: Option<Duration>,
    default_keepalive: Option<Duration>,
    idle_close_delay: Option<Duration>,
    retry: Option<Box<dyn RetryStrategy>>,
    credentials: Option<Arc<dyn CredentialsProvider>>,
    tokens: Option<Arc<dyn TokenProvider>>,
    signer: Option<Arc<dyn RequestSigner>>,
    diagnostics: Option<Arc<dyn DiagnosticsSink>>,
}

impl ClientBuilder<NoEndpoint, NoAuthMode> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            endpoint: None,
            auth_mode: None,
            config_knobs: Knobs::default(),
        }
    }
}

impl Default for ClientBuilder<NoEndpoint, NoAuthMode> {
    fn default() -> Self {
        Self::new()
    }
}

// Endpoint setting
impl<A> ClientBuilder<NoEndpoint, A>
where
    A: AuthState,
{
    /// Set the service endpoint the socket URL is derived from
    pub fn endpoint(self, endpoint: impl Into<String>) -> ClientBuilder<HasEndpoint, A> {
        ClientBuilder {
            _state: TypeState::new(),
            endpoint: Some(endpoint.into()),
            auth_mode: self.auth_mode,
            config_knobs: self.config_knobs,
        }
    }
}

// Auth mode setting
impl<E> ClientBuilder<E, NoAuthMode>
where
    E: EndpointState,
{
    /// Set the authorization mode for the handshake and start messages
    pub fn auth(self, mode: AuthMode) -> ClientBuilder<E, HasAuthMode> {
        ClientBuilder {
            _state: TypeState::new(),
            endpoint: self.endpoint,
            auth_mode: Some(mode),
            config_knobs: self.config_knobs,
        }
    }
}

// Optional configuration methods
impl<E, A> ClientBuilder<E, A>
where
    E: EndpointState,
    A: AuthState,
{
    /// Add a caller-supplied header (required: `Authorization` for
    /// [`AuthMode::Bearer`])
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config_knobs
            .additional_headers
            .push((name.into(), value.into()));
        self
    }

    /// Deadline for the init/ack exchange per handshake attempt
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config_knobs.handshake_timeout = Some(timeout);
        self
    }

    /// Deadline for a subscription's start acknowledgment
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.config_knobs.ack_timeout = Some(timeout);
        self
    }

    /// Keep-alive fallback used when the server negotiates no interval
    pub fn default_keepalive(mut self, interval: Duration) -> Self {
        self.config_knobs.default_keepalive = Some(interval);
        self
    }

    /// Interval of the deferred idle-socket close check
    pub fn idle_close_delay(mut self, delay: Duration) -> Self {
        self.config_knobs.idle_close_delay = Some(delay);
        self
    }

    /// Override the handshake retry strategy
    pub fn retry_strategy(mut self, strategy: impl RetryStrategy + 'static) -> Self {
        self.config_knobs.retry = Some(Box::new(strategy));
        self
    }

    /// Install the signing-credential collaborator
    pub fn credentials(mut self, provider: impl CredentialsProvider + 'static) -> Self {
        self.config_knobs.credentials = Some(Arc::new(provider));
        self
    }

    /// Install the session/identity token collaborator
    pub fn tokens(mut self, provider: impl TokenProvider + 'static) -> Self {
        self.config_knobs.tokens = Some(Arc::new(provider));
        self
    }

    /// Install the external request-signing primitive
    pub fn signer(mut self, signer: impl RequestSigner + 'static) -> Self {
        self.config_knobs.signer = Some(Arc::new(signer));
        self
    }

    /// Install a diagnostic event sink
    pub fn diagnostics(mut self, sink: impl DiagnosticsSink + 'static) -> Self {
        self.config_knobs.diagnostics = Some(Arc::new(sink));
        self
    }
}

// Build method - only available when all required fields are set
impl ClientBuilder<HasEndpoint, HasAuthMode> {
    /// Build the client
    pub fn build(self) -> RealtimeClient {
        let endpoint = self.endpoint.unwrap_or_default();
        let auth_mode = self.auth_mode.unwrap_or(AuthMode::Bearer);
        let knobs = self.config_knobs;

        let mut config = ClientConfig::new(endpoint, auth_mode);
        for (name, value) in knobs.additional_headers {
            config.additional_headers.insert(name, value);
        }
        if let Some(timeout) = knobs.handshake_timeout {
            config.handshake_timeout = timeout;
        }
        if let Some(timeout) = knobs.ack_timeout {
            config.ack_timeout = timeout;
        }
        if let Some(interval) = knobs.default_keepalive {
            config.default_keepalive = interval;
        }
        if let Some(delay) = knobs.idle_close_delay {
            config.idle_close_delay = delay;
        }
        if let Some(retry) = knobs.retry {
            config.retry = retry;
        }
        config.credentials = knobs.credentials;
        config.tokens = knobs.tokens;
        config.signer = knobs.signer;
        if let Some(diagnostics) = knobs.diagnostics {
            config.diagnostics = diagnostics;
        }

        RealtimeClient::new(config)
    }
}
