//! Subscription registry and per-record lifecycle
//!
//! One record per active subscription id, keyed by the caller-supplied id
//! that correlates every protocol message. All mutations serialize through
//! one mutex, observer callbacks run after the lock is released, and every
//! lookup treats an absent record as an already-concluded event.

use crate::error::{RealtimeError, Result};
use crate::traits::SubscriptionObserver;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

/// Lifecycle state of one subscription record
///
/// There is no failed state: a terminal failure delivers the error and
/// removes the record, so only live subscriptions hold the socket open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Start sent (or about to be sent), acknowledgment outstanding
    Pending,
    /// Start acknowledged; data may flow
    Connected,
}

/// One record per active subscription
pub(crate) struct SubscriptionRecord {
    pub observer: Arc<dyn SubscriptionObserver>,
    pub query: String,
    pub variables: Value,
    pub state: SubscriptionState,
    /// Fired once when the record leaves Pending for Connected
    pub ready_waiter: Option<oneshot::Sender<()>>,
    /// Fired once when the record is concluded without ever connecting
    pub failed_waiter: Option<oneshot::Sender<()>>,
    /// Ack-deadline timer; aborted when the ack or a failure arrives first
    pub ack_timer: Option<JoinHandle<()>>,
}

impl SubscriptionRecord {
    fn conclude_waiters(&mut self, ready: bool) {
        if ready {
            if let Some(waiter) = self.ready_waiter.take() {
                let _ = waiter.send(());
            }
            self.failed_waiter = None;
        } else {
            if let Some(waiter) = self.failed_waiter.take() {
                let _ = waiter.send(());
            }
            self.ready_waiter = None;
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.ack_timer.take() {
            timer.abort();
        }
    }
}

/// What an unsubscribe call should do next, decided under the lock
pub(crate) enum UnsubscribePlan {
    /// No record (or another unsubscribe already owns it): nothing to do
    Absent,
    /// Record is Pending: wait for either waiter before proceeding
    Wait {
        ready: oneshot::Receiver<()>,
        failed: oneshot::Receiver<()>,
    },
    /// Record is Connected: a stop message must be sent
    SendStop,
}

/// Keyed store of subscription records
///
/// The single mutation gateway: timer-driven and message-driven transitions
/// both route through these methods, so a timer firing after the relevant
/// event has already occurred is a guaranteed no-op rather than a race.
#[derive(Default)]
pub(crate) struct Registry {
    records: Mutex<HashMap<String, SubscriptionRecord>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new Pending record
    ///
    /// Duplicate ids are rejected: silently replacing the record would
    /// orphan the previous observer.
    pub fn insert_pending(
        &self,
        id: &str,
        observer: Arc<dyn SubscriptionObserver>,
        query: String,
        variables: Value,
    ) -> Result<()> {
        let mut records = self.records.lock();
        if records.contains_key(id) {
            return Err(RealtimeError::InvalidState(format!(
                "subscription id already registered: {}",
                id
            )));
        }
        records.insert(
            id.to_string(),
            SubscriptionRecord {
                observer,
                query,
                variables,
                state: SubscriptionState::Pending,
                ready_waiter: None,
                failed_waiter: None,
                ack_timer: None,
            },
        );
        Ok(())
    }

    /// Store the ack-deadline timer handle for a Pending record
    ///
    /// If the record vanished (or already resolved) between the send and
    /// this call, the timer is aborted on the spot.
    pub fn set_ack_timer(&self, id: &str, timer: JoinHandle<()>) {
        let mut records = self.records.lock();
        match records.get_mut(id) {
            Some(record) if record.state == SubscriptionState::Pending => {
                record.cancel_timer();
                record.ack_timer = Some(timer);
            }
            _ => timer.abort(),
        }
    }

    /// Start-acknowledgment arrived: Pending becomes Connected
    ///
    /// Returns `false` when the ack targeted an absent or non-Pending
    /// record, which is silently dropped by the caller.
    pub fn mark_connected(&self, id: &str) -> bool {
        let mut records = self.records.lock();
        match records.get_mut(id) {
            Some(record) if record.state == SubscriptionState::Pending => {
                record.state = SubscriptionState::Connected;
                record.cancel_timer();
                record.conclude_waiters(true);
                true
            }
            _ => false,
        }
    }

    /// Terminal failure for one record, from any trigger
    ///
    /// Removes the record, fires the failed waiter and hands the observer
    /// back so the caller can deliver the error outside the lock. Returns
    /// `None` if the record is absent (already concluded).
    pub fn fail(&self, id: &str) -> Option<Arc<dyn SubscriptionObserver>> {
        self.remove(id)
    }

    /// Ack-deadline expiry: concludes the record only if still Pending
    pub fn fail_if_pending(&self, id: &str) -> Option<Arc<dyn SubscriptionObserver>> {
        let mut records = self.records.lock();
        match records.get(id) {
            Some(record) if record.state == SubscriptionState::Pending => {}
            _ => return None,
        }
        records.remove(id).map(|mut record| {
            record.cancel_timer();
            record.conclude_waiters(false);
            record.observer
        })
    }

    /// Observer handle for a data delivery, regardless of record state
    pub fn observer_for(&self, id: &str) -> Option<Arc<dyn SubscriptionObserver>> {
        let records = self.records.lock();
        records.get(id).map(|record| Arc::clone(&record.observer))
    }

    /// The subscription body needed to build a start message
    pub fn start_body(&self, id: &str) -> Option<(String, Value)> {
        let records = self.records.lock();
        records
            .get(id)
            .map(|record| (record.query.clone(), record.variables.clone()))
    }

    /// Decide how an unsubscribe call must proceed
    ///
    /// For a Pending record this installs the ready/failed waiter pair; at
    /// most one of each may ever be set, so a record whose slots are already
    /// occupied is treated as owned by an earlier unsubscribe.
    pub fn begin_unsubscribe(&self, id: &str) -> UnsubscribePlan {
        let mut records = self.records.lock();
        let record = match records.get_mut(id) {
            Some(record) => record,
            None => return UnsubscribePlan::Absent,
        };
        match record.state {
            SubscriptionState::Connected => UnsubscribePlan::SendStop,
            SubscriptionState::Pending => {
                if record.ready_waiter.is_some() || record.failed_waiter.is_some() {
                    debug!("unsubscribe already in flight for {}", id);
                    return UnsubscribePlan::Absent;
                }
                let (ready_tx, ready_rx) = oneshot::channel();
                let (failed_tx, failed_rx) = oneshot::channel();
                record.ready_waiter = Some(ready_tx);
                record.failed_waiter = Some(failed_tx);
                UnsubscribePlan::Wait {
                    ready: ready_rx,
                    failed: failed_rx,
                }
            }
        }
    }

    /// Whether the record is currently Connected (post-wait recheck)
    pub fn is_connected(&self, id: &str) -> bool {
        let records = self.records.lock();
        records
            .get(id)
            .map_or(false, |record| record.state == SubscriptionState::Connected)
    }

    /// Remove one record, cancelling its timer
    pub fn remove(&self, id: &str) -> Option<Arc<dyn SubscriptionObserver>> {
        let mut records = self.records.lock();
        records.remove(id).map(|mut record| {
            record.cancel_timer();
            record.conclude_waiters(false);
            record.observer
        })
    }

    /// Drain every record for a forced global disconnect
    ///
    /// Cancels timers and fires failed waiters; the caller delivers the
    /// terminal error to each returned observer outside the lock.
    pub fn drain(&self) -> Vec<(String, Arc<dyn SubscriptionObserver>)> {
        let mut records = self.records.lock();
        records
            .drain()
            .map(|(id, mut record)| {
                record.cancel_timer();
                record.conclude_waiters(false);
                (id, record.observer)
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[cfg(test)]
    pub fn state_of(&self, id: &str) -> Option<SubscriptionState> {
        self.records.lock().get(id).map(|record| record.state)
    }
}
