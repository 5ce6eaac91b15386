//! Connection URL derivation
//!
//! The socket URL is derived from the configured endpoint by rewriting the
//! scheme to the socket protocol and encoding, as base64 query parameters,
//! the JSON header set from the auth strategy and a JSON payload (an empty
//! object for the initial handshake).

use crate::error::{RealtimeError, Result};
use crate::traits::Headers;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Payload value encoded into the handshake URL
pub const HANDSHAKE_PAYLOAD: &str = "{}";

/// Rewrite the endpoint scheme to the socket protocol
///
/// `https` becomes `wss` and `http` becomes `ws`; anything else is rejected.
pub fn socket_scheme(endpoint: &str) -> Result<String> {
    if let Some(rest) = endpoint.strip_prefix("https://") {
        Ok(format!("wss://{}", rest))
    } else if let Some(rest) = endpoint.strip_prefix("http://") {
        Ok(format!("ws://{}", rest))
    } else if endpoint.starts_with("wss://") || endpoint.starts_with("ws://") {
        Ok(endpoint.to_string())
    } else {
        Err(RealtimeError::InvalidState(format!(
            "endpoint has no recognizable scheme: {}",
            endpoint
        )))
    }
}

/// Extract the host portion of an endpoint URL
///
/// Used by the auth strategies, which all stamp a `host` header.
pub fn host_of(endpoint: &str) -> Result<String> {
    let without_scheme = endpoint
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(endpoint);
    let host = without_scheme
        .split(['/', '?'])
        .next()
        .unwrap_or_default();
    if host.is_empty() {
        return Err(RealtimeError::InvalidState(format!(
            "endpoint has no host: {}",
            endpoint
        )));
    }
    Ok(host.to_string())
}

/// Build the full connection URL for the handshake
///
/// # Arguments
/// * `endpoint` - the configured service endpoint (`https://...`)
/// * `headers` - the auth strategy's header set for the handshake
pub fn connection_url(endpoint: &str, headers: &Headers) -> Result<String> {
    let base = socket_scheme(endpoint)?;
    // a bare authority needs an explicit root path, or the upgrade
    // request-target would start with `?` and be rejected
    let base = match base.split_once("://") {
        Some((_, rest)) if !rest.contains('/') => format!("{}/", base),
        _ => base,
    };
    let header_b64 = STANDARD.encode(serde_json::to_vec(headers)?);
    let payload_b64 = STANDARD.encode(HANDSHAKE_PAYLOAD.as_bytes());
    Ok(format!(
        "{}?header={}&payload={}",
        base, header_b64, payload_b64
    ))
}
