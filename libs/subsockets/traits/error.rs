use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Server-supplied error codes that must never be retried.
///
/// These are the authentication / authorization / bad-request class codes;
/// a handshake rejected with one of them aborts the retry loop immediately.
pub const NON_RETRYABLE_CODES: [u64; 3] = [400, 401, 403];

/// Main error type for subsockets
#[derive(Error, Debug, Clone)]
pub enum RealtimeError {
    /// Connection or handshake failure, classified for the retry loop
    #[error("connection failed: {message}")]
    Connect { message: String, retryable: bool },

    /// No start acknowledgment arrived before the deadline
    #[error("subscription {0} timed out waiting for a start acknowledgment")]
    AckTimeout(String),

    /// Server-reported subscription failure, carries the raw payload
    #[error("subscription {id} failed")]
    Subscription { id: String, payload: Value },

    /// Authorization header construction failed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The server went silent past the negotiated keep-alive interval
    #[error("keep-alive expired: no liveness signal from the server")]
    LivenessExpired,

    /// Wire message could not be encoded or decoded
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Operation attempted against the wrong connection/registry state
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Authorization strategy errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Mode name not in the supported set
    #[error("unsupported authorization mode: {0}")]
    UnsupportedMode(String),

    /// The credential collaborator could not supply credentials
    #[error("no credentials available")]
    NoCredentials,

    /// Bearer mode requires a caller-supplied Authorization header
    #[error("missing bearer token in the outgoing header set")]
    MissingToken,
}

impl RealtimeError {
    /// Whether an enclosing retry loop may retry after this failure.
    ///
    /// Only failures classified non-retryable (auth errors, server codes in
    /// [`NON_RETRYABLE_CODES`]) abort retries; generic transport errors, ack
    /// timeouts and unclassified server errors flow back into the backoff
    /// loop.
    pub fn is_retryable(&self) -> bool {
        match self {
            RealtimeError::Connect { retryable, .. } => *retryable,
            RealtimeError::Auth(_) => false,
            RealtimeError::LivenessExpired => false,
            _ => true,
        }
    }
}

impl From<serde_json::Error> for RealtimeError {
    fn from(e: serde_json::Error) -> Self {
        RealtimeError::Protocol(e.to_string())
    }
}

/// One entry of a consumer-facing error list
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ErrorEntry {
    #[serde(rename = "errorType", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(rename = "errorCode", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorEntry {
    /// Build the single-element error list delivered to a consumer.
    ///
    /// Consumer-facing errors are always one descriptive entry, independent
    /// of whether the trigger was local (timeout) or server-sent.
    pub fn list_from(error: &RealtimeError) -> Vec<ErrorEntry> {
        let entry = match error {
            RealtimeError::Subscription { payload, .. } => ErrorEntry {
                error_type: payload
                    .get("errors")
                    .and_then(|e| e.get(0))
                    .and_then(|e| e.get("errorType"))
                    .and_then(Value::as_str)
                    .map(str::to_owned),
                error_code: payload
                    .get("errors")
                    .and_then(|e| e.get(0))
                    .and_then(|e| e.get("errorCode"))
                    .and_then(Value::as_u64),
                message: Some(error.to_string()),
            },
            RealtimeError::AckTimeout(_) => ErrorEntry {
                error_type: Some("Timeout".to_string()),
                error_code: None,
                message: Some(error.to_string()),
            },
            other => ErrorEntry {
                error_type: None,
                error_code: None,
                message: Some(other.to_string()),
            },
        };
        vec![entry]
    }
}

/// Classify a connection-level error payload from the server.
///
/// The payload shape is `{ errors: [{ errorType, errorCode }] }`; any code
/// from the fixed non-retryable set makes the whole failure non-retryable.
pub fn classify_connection_error(payload: Option<&Value>) -> RealtimeError {
    let entries: Vec<ErrorEntry> = payload
        .and_then(|p| p.get("errors"))
        .and_then(|e| serde_json::from_value(e.clone()).ok())
        .unwrap_or_default();

    let retryable = !entries
        .iter()
        .any(|e| e.error_code.map_or(false, |c| NON_RETRYABLE_CODES.contains(&c)));

    let message = entries
        .first()
        .and_then(|e| e.error_type.clone().or_else(|| e.message.clone()))
        .unwrap_or_else(|| "connection rejected by server".to_string());

    RealtimeError::Connect { message, retryable }
}

/// Result type for subsockets operations
pub type Result<T> = std::result::Result<T, RealtimeError>;
