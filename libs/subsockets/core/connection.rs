//! Socket connection manager
//!
//! Owns the one physical socket. Drives the connect → init → ack handshake,
//! retries it under the jittered backoff policy, and coalesces every
//! concurrent caller onto the single in-flight attempt: exactly one
//! physical connection attempt exists at any time, and no handshake message
//! is ever sent twice concurrently.

use crate::auth_headers::build_headers;
use crate::client::ClientInner;
use crate::endpoint::{connection_url, HANDSHAKE_PAYLOAD};
use crate::error::{classify_connection_error, ErrorEntry, RealtimeError, Result};
use crate::keepalive::KeepAliveState;
use crate::protocol::{ClientMessage, ServerMessage};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Decrement the outbound-send counter without wrapping past zero
fn dec_pending(inner: &ClientInner) {
    let _ = inner
        .pending_sends
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1));
}

/// Connection status; sends are guarded by `Ready`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Closed,
    Connecting,
    Ready,
}

/// Commands accepted by the socket task
#[derive(Debug)]
pub(crate) enum WireCommand {
    Send(ClientMessage),
    Close,
}

pub(crate) struct ConnState {
    pub status: Status,
    /// Coalesced waiters for "connection became ready"
    pub waiters: Vec<oneshot::Sender<Result<()>>>,
    /// Outbound channel into the socket task, present while Ready
    pub sender: Option<mpsc::UnboundedSender<WireCommand>>,
    /// Liveness monitor of the current connection, present while Ready
    pub keepalive: Option<Arc<KeepAliveState>>,
    /// Bumped on every teardown so stale tasks and timers no-op
    pub epoch: u64,
}

/// Exclusive owner of the physical socket and its status flag
pub(crate) struct ConnectionManager {
    pub state: Mutex<ConnState>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ConnState {
                status: Status::Closed,
                waiters: Vec::new(),
                sender: None,
                keepalive: None,
                epoch: 0,
            }),
        }
    }

    pub fn status(&self) -> Status {
        self.state.lock().status
    }
}

/// Ensure the shared connection is ready, joining any in-flight handshake
///
/// Idempotent and safely callable concurrently: all concurrent callers
/// observe the outcome of a single handshake attempt.
pub(crate) async fn ensure_connected(inner: &Arc<ClientInner>) -> Result<()> {
    let waiter = {
        let mut state = inner.conn.state.lock();
        match state.status {
            Status::Ready => return Ok(()),
            Status::Connecting => {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                rx
            }
            Status::Closed => {
                state.status = Status::Connecting;
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                let epoch = state.epoch;
                tokio::spawn(drive_handshake(Arc::clone(inner), epoch));
                rx
            }
        }
    };

    waiter.await.unwrap_or_else(|_| {
        Err(RealtimeError::Connect {
            message: "connection attempt was abandoned".to_string(),
            retryable: true,
        })
    })
}

/// Enqueue a protocol message, guarded by `status == Ready`
pub(crate) fn send(inner: &ClientInner, message: ClientMessage) -> Result<()> {
    let state = inner.conn.state.lock();
    match (&state.status, &state.sender) {
        (Status::Ready, Some(sender)) => {
            inner.pending_sends.fetch_add(1, Ordering::AcqRel);
            sender.send(WireCommand::Send(message)).map_err(|_| {
                dec_pending(inner);
                RealtimeError::InvalidState("socket task is gone".to_string())
            })
        }
        _ => Err(RealtimeError::InvalidState(
            "connection is not ready".to_string(),
        )),
    }
}

/// Run the handshake under the retry policy and settle all waiters
async fn drive_handshake(inner: Arc<ClientInner>, epoch: u64) {
    let mut attempt = 0;
    let terminal = loop {
        {
            let state = inner.conn.state.lock();
            if state.epoch != epoch || state.status != Status::Connecting {
                debug!("handshake abandoned: connection was torn down while retrying");
                return;
            }
        }

        match try_handshake(&inner).await {
            Ok((stream, keepalive_interval)) => {
                establish(&inner, epoch, stream, keepalive_interval);
                return;
            }
            Err(e) if e.is_retryable() => match inner.config.retry.next_delay(attempt) {
                Some(delay) => {
                    warn!(
                        "handshake attempt {} failed ({}), retrying in {:?}",
                        attempt + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => break e,
            },
            Err(e) => {
                error!("handshake failed with non-retryable error: {}", e);
                break e;
            }
        }
    };

    let waiters = {
        let mut state = inner.conn.state.lock();
        if state.epoch != epoch {
            return;
        }
        state.status = Status::Closed;
        std::mem::take(&mut state.waiters)
    };
    for waiter in waiters {
        let _ = waiter.send(Err(terminal.clone()));
    }
}

/// One connect + init/ack exchange
///
/// Returns the open stream and the keep-alive interval to arm, either
/// server-negotiated or the configured fallback.
async fn try_handshake(inner: &Arc<ClientInner>) -> Result<(WsStream, Duration)> {
    let headers = build_headers(&inner.config, HANDSHAKE_PAYLOAD).await?;
    let url = connection_url(&inner.config.endpoint, &headers)?;

    let (mut stream, _) = connect_async(&url).await.map_err(|e| RealtimeError::Connect {
        message: format!("transport connect failed: {}", e),
        retryable: true,
    })?;

    let init = serde_json::to_string(&ClientMessage::ConnectionInit)?;
    stream
        .send(Message::Text(init))
        .await
        .map_err(|e| RealtimeError::Connect {
            message: format!("failed to send connection_init: {}", e),
            retryable: true,
        })?;

    let wait_for_ack = async {
        while let Some(message) = stream.next().await {
            let message = message.map_err(|e| RealtimeError::Connect {
                message: format!("socket error during handshake: {}", e),
                retryable: true,
            })?;
            let text = match message {
                Message::Text(text) => text,
                _ => continue,
            };
            match serde_json::from_str::<ServerMessage>(&text) {
                Ok(ServerMessage::ConnectionAck { payload }) => {
                    let negotiated = payload
                        .and_then(|p| p.connection_timeout_ms)
                        .map(Duration::from_millis)
                        .unwrap_or(inner.config.default_keepalive);
                    return Ok(negotiated);
                }
                Ok(ServerMessage::ConnectionError { payload }) => {
                    return Err(classify_connection_error(payload.as_ref()));
                }
                Ok(other) => {
                    debug!("ignoring pre-ack message: {:?}", other);
                }
                Err(e) => {
                    debug!("unparseable pre-ack message: {}", e);
                }
            }
        }
        Err(RealtimeError::Connect {
            message: "socket closed during handshake".to_string(),
            retryable: true,
        })
    };

    let keepalive_interval =
        match tokio::time::timeout(inner.config.handshake_timeout, wait_for_ack).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(RealtimeError::Connect {
                    message: "timed out waiting for connection_ack".to_string(),
                    retryable: true,
                })
            }
        };

    Ok((stream, keepalive_interval))
}

/// Transition to Ready: install the socket task, the keep-alive monitor and
/// resolve every coalesced waiter
fn establish(inner: &Arc<ClientInner>, epoch: u64, stream: WsStream, keepalive_interval: Duration) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let keepalive = Arc::new(KeepAliveState::new(keepalive_interval));

    let waiters = {
        let mut state = inner.conn.state.lock();
        if state.epoch != epoch || state.status != Status::Connecting {
            // torn down while the ack was in flight; discard the new socket
            debug!("discarding freshly established connection after teardown");
            return;
        }
        state.status = Status::Ready;
        state.sender = Some(cmd_tx);
        state.keepalive = Some(Arc::clone(&keepalive));
        inner.pending_sends.store(0, Ordering::Release);
        std::mem::take(&mut state.waiters)
    };

    info!(
        "connection ready (keep-alive interval {:?})",
        keepalive_interval
    );
    tokio::spawn(socket_task(Arc::clone(inner), stream, cmd_rx, epoch));
    tokio::spawn(monitor_task(Arc::clone(inner), keepalive, epoch));

    for waiter in waiters {
        let _ = waiter.send(Ok(()));
    }

    inner.config.diagnostics.emit(
        "connection",
        json!({ "status": "ready" }),
        "Connection established",
    );
}

/// Watch the keep-alive deadline; expiry forces a full disconnect
async fn monitor_task(inner: Arc<ClientInner>, keepalive: Arc<KeepAliveState>, epoch: u64) {
    if keepalive.expired().await {
        warn!(
            "no keep-alive within {:?}, closing connection",
            keepalive.interval()
        );
        force_disconnect(&inner, epoch, RealtimeError::LivenessExpired);
    }
}

/// Steady-state socket task: drains outbound commands and routes inbound
/// messages until the connection dies or is closed
async fn socket_task(
    inner: Arc<ClientInner>,
    stream: WsStream,
    mut cmd_rx: mpsc::UnboundedReceiver<WireCommand>,
    epoch: u64,
) {
    let (mut write, mut read) = stream.split();

    let failure = loop {
        tokio::select! {
            command = cmd_rx.recv() => match command {
                Some(WireCommand::Send(message)) => {
                    let outcome = match serde_json::to_string(&message) {
                        Ok(text) => write.send(Message::Text(text)).await,
                        Err(e) => {
                            error!("failed to encode outbound message: {}", e);
                            dec_pending(&inner);
                            continue;
                        }
                    };
                    dec_pending(&inner);
                    if let Err(e) = outcome {
                        break Some(RealtimeError::Connect {
                            message: format!("socket write failed: {}", e),
                            retryable: true,
                        });
                    }
                }
                Some(WireCommand::Close) | None => {
                    debug!("closing socket");
                    let _ = write.close().await;
                    break None;
                }
            },
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => route_message(&inner, epoch, &text),
                Some(Ok(Message::Close(_))) | None => {
                    break Some(RealtimeError::Connect {
                        message: "server closed the connection".to_string(),
                        retryable: true,
                    });
                }
                Some(Ok(_)) => {} // transport-level ping/pong/binary frames
                Some(Err(e)) => {
                    break Some(RealtimeError::Connect {
                        message: format!("socket error: {}", e),
                        retryable: true,
                    });
                }
            }
        }
    };

    if let Some(err) = failure {
        error!("connection lost: {}", err);
        force_disconnect(&inner, epoch, err);
    }
}

/// Demultiplex one inbound message
///
/// Every inbound message carries the subscription id it targets (absent for
/// connection-level messages); absence of the record is an already-concluded
/// event and the message is silently dropped.
fn route_message(inner: &Arc<ClientInner>, epoch: u64, text: &str) {
    let message = match serde_json::from_str::<ServerMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            debug!("unparseable server message: {}", e);
            return;
        }
    };

    match message {
        ServerMessage::KeepAlive => {
            let state = inner.conn.state.lock();
            if let Some(keepalive) = &state.keepalive {
                keepalive.signal();
            }
        }
        ServerMessage::StartAck { id } => {
            if inner.registry.mark_connected(&id) {
                debug!("subscription {} connected", id);
                inner.config.diagnostics.emit(
                    "subscription",
                    json!({ "id": id, "status": "connected" }),
                    "Subscription acknowledged",
                );
            } else {
                debug!("dropping start_ack for unknown subscription {}", id);
            }
        }
        ServerMessage::Data { id, payload } => {
            match inner.registry.observer_for(&id) {
                Some(observer) => observer.on_data(payload),
                None => debug!("dropping data for unknown subscription {}", id),
            }
        }
        ServerMessage::Error {
            id: Some(id),
            payload,
        } => {
            let err = RealtimeError::Subscription {
                id: id.clone(),
                payload: payload.unwrap_or_default(),
            };
            if let Some(observer) = inner.registry.fail(&id) {
                observer.on_error(ErrorEntry::list_from(&err));
                observer.on_complete();
                schedule_idle_close(inner);
            } else {
                debug!("dropping error for unknown subscription {}", id);
            }
        }
        ServerMessage::Error { id: None, payload }
        | ServerMessage::ConnectionError { payload } => {
            let err = classify_connection_error(payload.as_ref());
            error!("connection-level error from server: {}", err);
            force_disconnect(inner, epoch, err);
        }
        ServerMessage::ConnectionAck { .. } => {
            debug!("ignoring connection_ack outside handshake");
        }
    }
}

/// Tear the connection down and terminate every registered subscription
///
/// Safe to call from any disconnect path; the epoch guard makes duplicate
/// calls and stale callers a no-op. This is the only event that terminates
/// every active subscription simultaneously.
pub(crate) fn force_disconnect(inner: &Arc<ClientInner>, epoch: u64, reason: RealtimeError) {
    let (sender, keepalive, waiters) = {
        let mut state = inner.conn.state.lock();
        if state.epoch != epoch {
            return;
        }
        state.epoch += 1;
        state.status = Status::Closed;
        (
            state.sender.take(),
            state.keepalive.take(),
            std::mem::take(&mut state.waiters),
        )
    };

    inner.pending_sends.store(0, Ordering::Release);
    if let Some(keepalive) = keepalive {
        keepalive.disarm();
    }
    if let Some(sender) = sender {
        let _ = sender.send(WireCommand::Close);
    }
    for waiter in waiters {
        let _ = waiter.send(Err(reason.clone()));
    }

    let victims = inner.registry.drain();
    let errors = ErrorEntry::list_from(&reason);
    for (id, observer) in victims {
        debug!("terminating subscription {}: {}", id, reason);
        observer.on_error(errors.clone());
        observer.on_complete();
    }

    inner.config.diagnostics.emit(
        "connection",
        json!({ "status": "closed", "reason": reason.to_string() }),
        "Connection closed",
    );
}

/// Queue the deferred idle-socket check against the current epoch
///
/// Spawned after every record removal, from the unsubscribe path and from
/// terminal failure deliveries alike.
pub(crate) fn schedule_idle_close(inner: &Arc<ClientInner>) {
    let epoch = inner.conn.state.lock().epoch;
    tokio::spawn(idle_close_task(Arc::clone(inner), epoch));
}

/// Close the socket once the registry stays empty and outbound data drained
///
/// Scheduled after each record removal; a new subscription arriving in the
/// interim re-populates the registry and cancels the close.
pub(crate) async fn idle_close_task(inner: Arc<ClientInner>, epoch: u64) {
    loop {
        tokio::time::sleep(inner.config.idle_close_delay).await;

        let mut state = inner.conn.state.lock();
        if state.epoch != epoch || state.status != Status::Ready {
            return;
        }
        if !inner.registry.is_empty() {
            return;
        }
        if inner.pending_sends.load(Ordering::Acquire) != 0 {
            // outbound data still draining, check again shortly
            drop(state);
            continue;
        }

        state.status = Status::Closed;
        state.epoch += 1;
        let sender = state.sender.take();
        let keepalive = state.keepalive.take();
        drop(state);

        info!("no subscriptions left, closing idle connection");
        if let Some(keepalive) = keepalive {
            keepalive.disarm();
        }
        if let Some(sender) = sender {
            let _ = sender.send(WireCommand::Close);
        }
        inner.config.diagnostics.emit(
            "connection",
            json!({ "status": "closed", "reason": "idle" }),
            "Connection closed",
        );
        return;
    }
}
