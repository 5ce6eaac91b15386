use crate::error::ErrorEntry;
use serde_json::Value;

/// Consumer sink for one subscription
///
/// A subscription delivers data, at most one terminal error list, and a
/// completion signal through this trait. The registry owns the handle
/// exclusively for the life of the record; callbacks are invoked outside
/// the registry lock and must not block.
pub trait SubscriptionObserver: Send + Sync {
    /// A data message correlated to this subscription arrived
    fn on_data(&self, data: Value);

    /// The subscription failed; `errors` is always a single-entry list
    fn on_error(&self, errors: Vec<ErrorEntry>);

    /// No more values will come
    fn on_complete(&self);
}
