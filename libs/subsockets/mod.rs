//! # SubSockets
//!
//! A multiplexed realtime subscription client over a single persistent
//! WebSocket connection.
//!
//! ## Features
//!
//! - **One socket, many subscriptions**: an arbitrary number of independent
//!   subscriptions share one physical connection
//! - **Coalesced handshake**: concurrent subscribers joining while the
//!   connection is being established all observe one handshake attempt
//! - **Jittered retry**: the handshake is retried with capped exponential
//!   backoff; auth-class rejections abort immediately
//! - **Pluggable authorization**: API key, user-pool token, OpenID token,
//!   request signing, or a caller-supplied bearer token
//! - **Keep-alive liveness**: a server-negotiated liveness deadline detects
//!   half-open connections the transport never reports as closed

pub mod core;
pub mod traits;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use crate::core::{
    auth_headers, client, config, connection, endpoint, keepalive, protocol, registry,
    auth_headers::AuthMode,
    builder::{states, ClientBuilder},
    client::RealtimeClient,
    config::ClientConfig,
    connection::Status,
    protocol::{ClientMessage, ServerMessage},
    registry::SubscriptionState,
};

// Convenience builder entry point (module and function share the name)
pub use crate::core::builder;

/// Type alias for Result with RealtimeError
pub type Result<T> = std::result::Result<T, traits::RealtimeError>;
