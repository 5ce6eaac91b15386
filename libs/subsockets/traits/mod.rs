//! # SubSockets Traits
//!
//! Core traits and types for the SubSockets subscription client.
//!
//! This module provides the fundamental abstractions used throughout
//! the crate:
//!
//! - **SubscriptionObserver**: per-subscription consumer sink
//! - **CredentialsProvider / TokenProvider / RequestSigner**: authorization
//!   collaborators consumed by the header strategy
//! - **DiagnosticsSink**: best-effort diagnostic notifications
//! - **RetryStrategy**: handshake retry behavior

pub mod auth;
pub mod backoff;
pub mod diagnostics;
pub mod error;
pub mod observer;

// Re-export commonly used types
pub use auth::{Credentials, CredentialsProvider, Headers, RequestSigner, SigningRequest, TokenProvider};
pub use backoff::{FixedDelay, JitteredBackoff, RetryStrategy};
pub use diagnostics::{DiagnosticsSink, NoOpDiagnostics};
pub use error::{
    classify_connection_error, AuthError, ErrorEntry, RealtimeError, Result, NON_RETRYABLE_CODES,
};
pub use observer::SubscriptionObserver;
