use serde_json::Value;

/// Fire-and-forget sink for best-effort diagnostic notifications
///
/// The client emits connection and subscription state changes here. Errors
/// are never surfaced back; an implementation that drops everything is
/// perfectly valid.
pub trait DiagnosticsSink: Send + Sync {
    /// Emit one diagnostic event
    ///
    /// # Arguments
    /// * `category` - event family, e.g. `"connection"` or `"subscription"`
    /// * `payload` - structured event data
    /// * `message` - human-readable summary
    fn emit(&self, category: &str, payload: Value, message: &str);
}

/// A no-op sink that discards every event
pub struct NoOpDiagnostics;

impl DiagnosticsSink for NoOpDiagnostics {
    fn emit(&self, _category: &str, _payload: Value, _message: &str) {}
}
