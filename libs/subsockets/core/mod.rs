//! Core client machinery
//!
//! The connection manager, the subscription registry, the keep-alive
//! monitor, the wire protocol and the authorization header strategies.

pub mod auth_headers;
pub mod builder;
pub mod client;
pub mod config;
pub mod connection;
pub mod endpoint;
pub mod keepalive;
pub mod protocol;
pub mod registry;

// Re-export main types
pub use auth_headers::AuthMode;
pub use builder::{states, ClientBuilder};
pub use client::RealtimeClient;
pub use config::ClientConfig;
pub use connection::Status;
pub use protocol::{ClientMessage, ServerMessage};
pub use registry::SubscriptionState;

// Re-export traits for convenience
pub use crate::traits::*;

/// Create a new realtime client builder
///
/// This is a convenience function for starting the builder pattern.
///
/// # Example
/// ```ignore
/// let client = subsockets::builder()
///     .endpoint("https://api.example.com/events")
///     .auth(AuthMode::ApiKey { key })
///     .build();
/// ```
pub fn builder() -> ClientBuilder<states::NoEndpoint, states::NoAuthMode> {
    ClientBuilder::new()
}
