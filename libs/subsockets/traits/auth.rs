use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Header set attached to the connection handshake and to start messages
pub type Headers = HashMap<String, String>;

/// A set of credentials usable by the request-signing collaborator
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Trait for supplying signing credentials
///
/// The provider may refresh or fetch credentials however it likes; the
/// client only asks whether a usable set currently exists.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    /// Current credentials, or `None` if the store cannot supply any
    async fn credentials(&self) -> Option<Credentials>;
}

/// Trait for supplying session / identity tokens
///
/// Covers both the managed-user-pool session and the federated / OpenID
/// lookups. Each method returns `None` when that source has nothing.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current user-pool session token
    async fn session_token(&self) -> Option<String>;

    /// Token from the federated-session cache, if one is present
    async fn federated_token(&self) -> Option<String>;

    /// Token from the authenticated-user lookup (OpenID fallback)
    async fn user_token(&self) -> Option<String>;
}

/// A request to be signed by the external signing primitive
#[derive(Debug, Clone)]
pub struct SigningRequest {
    pub method: &'static str,
    pub url: String,
    pub body: String,
    pub service: String,
    pub region: String,
    pub credentials: Credentials,
}

/// Trait for the external request-signing primitive
///
/// Turns a request plus credentials into a cryptographically signed header
/// set. The signing algorithm itself is out of scope for this crate.
#[async_trait]
pub trait RequestSigner: Send + Sync {
    /// Sign the request, returning the headers to attach
    async fn sign(&self, request: SigningRequest) -> Result<Headers>;
}
