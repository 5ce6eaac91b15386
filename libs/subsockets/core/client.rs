//! Realtime subscription client
//!
//! The public facade: registers subscriptions, joins or triggers the shared
//! handshake, sends the authenticated start/stop messages and coordinates
//! unsubscribe races against in-flight connects. One client owns one
//! physical socket; any number of subscriptions multiplex over it.

use crate::auth_headers::build_headers;
use crate::config::ClientConfig;
use crate::connection::{self, ConnectionManager, Status};
use crate::error::{ErrorEntry, RealtimeError, Result};
use crate::protocol::{ClientMessage, StartExtensions, StartPayload};
use crate::registry::{Registry, UnsubscribePlan};
use crate::traits::SubscriptionObserver;
use serde_json::{json, Value};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared state behind every client handle and background task
pub(crate) struct ClientInner {
    pub config: ClientConfig,
    pub registry: Registry,
    pub conn: ConnectionManager,
    /// Outbound messages enqueued but not yet written; the idle-close check
    /// waits for this to drain before closing the socket
    pub pending_sends: AtomicUsize,
}

/// Multiplexed realtime subscription client
///
/// Cheap to clone; all clones share the same socket and registry.
///
/// # Example
/// ```ignore
/// let client = subsockets::builder()
///     .endpoint("https://api.example.com/events")
///     .auth(AuthMode::ApiKey { key: api_key })
///     .build();
///
/// client.subscribe("s1", "{onCreate}", json!({}), observer).await?;
/// // ... data flows to the observer ...
/// client.unsubscribe("s1").await?;
/// ```
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<ClientInner>,
}

impl RealtimeClient {
    /// Create a client from configuration
    ///
    /// This is called by the builder's `build()` method; use
    /// `subsockets::builder()` to create a client.
    pub(crate) fn new(config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                registry: Registry::new(),
                conn: ConnectionManager::new(),
                pending_sends: AtomicUsize::new(0),
            }),
        }
    }

    /// Register a subscription and send its start message
    ///
    /// The id is the caller-chosen correlation key for every protocol
    /// message of this subscription and must be unique among live records.
    /// Connection and authorization failures are delivered to the observer
    /// as a terminal error (plus completion) and also returned here; they
    /// never affect unrelated subscriptions.
    pub async fn subscribe(
        &self,
        id: impl Into<String>,
        query: impl Into<String>,
        variables: Value,
        observer: Arc<dyn SubscriptionObserver>,
    ) -> Result<()> {
        let id = id.into();
        self.inner
            .registry
            .insert_pending(&id, observer, query.into(), variables)?;
        debug!("registered subscription {}", id);

        if let Err(e) = self.start_subscription(&id).await {
            warn!("subscription {} failed to start: {}", id, e);
            if let Some(observer) = self.inner.registry.fail(&id) {
                observer.on_error(ErrorEntry::list_from(&e));
                observer.on_complete();
            }
            self.schedule_idle_close();
            return Err(e);
        }
        Ok(())
    }

    async fn start_subscription(&self, id: &str) -> Result<()> {
        connection::ensure_connected(&self.inner).await?;

        // the record may have been concluded while the handshake ran
        let (query, variables) = match self.inner.registry.start_body(id) {
            Some(body) => body,
            None => {
                debug!("subscription {} concluded before start was sent", id);
                return Ok(());
            }
        };

        let data = serde_json::to_string(&json!({ "query": query, "variables": variables }))?;
        let authorization = build_headers(&self.inner.config, &data).await?;

        connection::send(
            &self.inner,
            ClientMessage::Start {
                id: id.to_string(),
                payload: StartPayload {
                    data,
                    extensions: StartExtensions { authorization },
                },
            },
        )?;

        let timer = {
            let inner = Arc::clone(&self.inner);
            let id = id.to_string();
            let deadline = self.inner.config.ack_timeout;
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                if let Some(observer) = inner.registry.fail_if_pending(&id) {
                    warn!("subscription {} timed out waiting for start_ack", id);
                    let err = RealtimeError::AckTimeout(id.clone());
                    observer.on_error(ErrorEntry::list_from(&err));
                    observer.on_complete();
                    connection::schedule_idle_close(&inner);
                }
            })
        };
        self.inner.registry.set_ack_timer(id, timer);
        Ok(())
    }

    /// Tear down one subscription
    ///
    /// A no-op for unknown ids. A Pending record is first allowed to resolve
    /// (so a stop is never sent for a subscription the server has not yet
    /// acknowledged, and a record whose start is still in flight is never
    /// dropped); a Connected record gets a stop message. Once the registry
    /// is empty a deferred check closes the idle socket.
    pub async fn unsubscribe(&self, id: &str) -> Result<()> {
        let plan = self.inner.registry.begin_unsubscribe(id);

        let send_stop = match plan {
            UnsubscribePlan::Absent => return Ok(()),
            UnsubscribePlan::SendStop => true,
            UnsubscribePlan::Wait { ready, failed } => {
                debug!("unsubscribe {} waiting for pending record to resolve", id);
                tokio::select! {
                    _ = ready => {}
                    _ = failed => {}
                }
                // the waiter only signals the transition; recheck the state
                self.inner.registry.is_connected(id)
            }
        };

        if send_stop {
            if let Err(e) = connection::send(
                &self.inner,
                ClientMessage::Stop { id: id.to_string() },
            ) {
                warn!("could not send stop for {}: {}", id, e);
            }
        }

        self.inner.registry.remove(id);
        info!("subscription {} removed", id);
        self.schedule_idle_close();
        Ok(())
    }

    /// Force-close the connection, terminating every live subscription
    ///
    /// Each remaining observer receives one terminal error and completion,
    /// exactly as on a liveness failure.
    pub fn disconnect(&self) {
        let epoch = self.inner.conn.state.lock().epoch;
        connection::force_disconnect(
            &self.inner,
            epoch,
            RealtimeError::Connect {
                message: "connection closed by client".to_string(),
                retryable: false,
            },
        );
    }

    /// Whether the shared connection is currently ready
    pub fn is_connected(&self) -> bool {
        self.inner.conn.status() == Status::Ready
    }

    /// Number of live subscription records (any state)
    pub fn active_subscriptions(&self) -> usize {
        self.inner.registry.len()
    }

    fn schedule_idle_close(&self) {
        connection::schedule_idle_close(&self.inner);
    }
}
