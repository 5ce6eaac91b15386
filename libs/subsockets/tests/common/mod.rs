//! Common test utilities for SubSockets integration tests
//!
//! Provides a scriptable mock server speaking the subscription protocol,
//! plus an observer that records everything delivered to it.

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use subsockets::{ErrorEntry, SubscriptionObserver};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Initialize test logging (controlled by RUST_LOG)
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Scripted behavior of the mock server
#[derive(Clone)]
pub struct ServerBehavior {
    /// Respond to connection_init with connection_ack
    pub ack_connection: bool,
    /// connectionTimeoutMs carried in the ack payload
    pub connection_timeout_ms: Option<u64>,
    /// Reject connection_init with a connection_error carrying this code
    pub reject_code: Option<u64>,
    /// Drop this many TCP connections before letting one through
    pub drop_first_connects: usize,
    /// Respond to start with start_ack
    pub ack_starts: bool,
    /// Delay before the start_ack is sent
    pub start_ack_delay: Option<Duration>,
    /// Send periodic ka messages
    pub keepalive_every: Option<Duration>,
}

impl Default for ServerBehavior {
    fn default() -> Self {
        Self {
            ack_connection: true,
            connection_timeout_ms: None,
            reject_code: None,
            drop_first_connects: 0,
            ack_starts: true,
            start_ack_delay: None,
            keepalive_every: None,
        }
    }
}

/// A mock realtime endpoint for testing
pub struct MockRealtimeServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    connects: Arc<AtomicUsize>,
    open: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<Value>>>,
    clients: Arc<Mutex<Vec<mpsc::UnboundedSender<Message>>>>,
}

impl MockRealtimeServer {
    /// Create and start a new mock server with the given behavior
    pub async fn start(behavior: ServerBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let connects = Arc::new(AtomicUsize::new(0));
        let open = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(Mutex::new(Vec::new()));
        let clients = Arc::new(Mutex::new(Vec::new()));
        let drops_left = Arc::new(AtomicUsize::new(behavior.drop_first_connects));

        {
            let shutdown = Arc::clone(&shutdown);
            let connects = Arc::clone(&connects);
            let open = Arc::clone(&open);
            let received = Arc::clone(&received);
            let clients = Arc::clone(&clients);

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        result = listener.accept() => {
                            let (stream, _) = match result {
                                Ok(accepted) => accepted,
                                Err(_) => break,
                            };
                            connects.fetch_add(1, Ordering::SeqCst);
                            if drops_left
                                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
                                .is_ok()
                            {
                                // scripted transport failure
                                drop(stream);
                                continue;
                            }
                            tokio::spawn(Self::handle_connection(
                                stream,
                                behavior.clone(),
                                Arc::clone(&open),
                                Arc::clone(&received),
                                Arc::clone(&clients),
                            ));
                        }
                        _ = shutdown.notified() => break,
                    }
                }
            });
        }

        Self {
            addr,
            shutdown,
            connects,
            open,
            received,
            clients,
        }
    }

    async fn handle_connection(
        stream: TcpStream,
        behavior: ServerBehavior,
        open: Arc<AtomicUsize>,
        received: Arc<Mutex<Vec<Value>>>,
        clients: Arc<Mutex<Vec<mpsc::UnboundedSender<Message>>>>,
    ) {
        let ws = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(_) => return,
        };
        open.fetch_add(1, Ordering::SeqCst);

        let (mut write, mut read) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        clients.lock().push(tx.clone());

        if let Some(every) = behavior.keepalive_every {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(every);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if tx.send(Message::Text(json!({"type": "ka"}).to_string())).is_err() {
                        break;
                    }
                }
            });
        }

        loop {
            tokio::select! {
                outbound = rx.recv() => match outbound {
                    Some(msg) => {
                        if write.send(msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                inbound = read.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let value: Value = match serde_json::from_str(&text) {
                            Ok(value) => value,
                            Err(_) => continue,
                        };
                        received.lock().push(value.clone());
                        Self::respond(&behavior, &value, &tx);
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }

        open.fetch_sub(1, Ordering::SeqCst);
    }

    fn respond(behavior: &ServerBehavior, message: &Value, tx: &mpsc::UnboundedSender<Message>) {
        match message["type"].as_str() {
            Some("connection_init") => {
                if let Some(code) = behavior.reject_code {
                    let error = json!({
                        "type": "connection_error",
                        "payload": { "errors": [{
                            "errorType": "ConnectionRejected",
                            "errorCode": code,
                        }]},
                    });
                    let _ = tx.send(Message::Text(error.to_string()));
                } else if behavior.ack_connection {
                    let ack = match behavior.connection_timeout_ms {
                        Some(ms) => json!({
                            "type": "connection_ack",
                            "payload": { "connectionTimeoutMs": ms },
                        }),
                        None => json!({ "type": "connection_ack" }),
                    };
                    let _ = tx.send(Message::Text(ack.to_string()));
                }
            }
            Some("start") if behavior.ack_starts => {
                let ack = json!({ "type": "start_ack", "id": message["id"] });
                match behavior.start_ack_delay {
                    Some(delay) => {
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            let _ = tx.send(Message::Text(ack.to_string()));
                        });
                    }
                    None => {
                        let _ = tx.send(Message::Text(ack.to_string()));
                    }
                }
            }
            _ => {}
        }
    }

    /// Endpoint URL for this server (the client rewrites the scheme)
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Total TCP connection attempts seen
    pub fn connect_attempts(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Currently open protocol connections
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// All protocol messages received, in arrival order
    #[allow(dead_code)]
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().clone()
    }

    /// Received messages of one protocol type
    pub fn received_of_type(&self, message_type: &str) -> Vec<Value> {
        self.received
            .lock()
            .iter()
            .filter(|m| m["type"] == message_type)
            .cloned()
            .collect()
    }

    /// Push a message to every live connection
    pub fn broadcast(&self, message: Value) {
        for tx in self.clients.lock().iter() {
            let _ = tx.send(Message::Text(message.to_string()));
        }
    }

    /// Shutdown the server
    #[allow(dead_code)]
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockRealtimeServer {
    fn drop(&mut self) {
        self.shutdown.notify_waiters();
    }
}

/// Everything a subscription delivered to its consumer
#[derive(Debug)]
pub enum ObserverEvent {
    Data(Value),
    Error(Vec<ErrorEntry>),
    Complete,
}

/// Observer that records deliveries for assertions
pub struct TestObserver {
    events: Mutex<Vec<ObserverEvent>>,
}

impl TestObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn data(&self) -> Vec<Value> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ObserverEvent::Data(value) => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<Vec<ErrorEntry>> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ObserverEvent::Error(errors) => Some(errors.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn completed(&self) -> bool {
        self.events
            .lock()
            .iter()
            .any(|e| matches!(e, ObserverEvent::Complete))
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl SubscriptionObserver for TestObserver {
    fn on_data(&self, data: Value) {
        self.events.lock().push(ObserverEvent::Data(data));
    }

    fn on_error(&self, errors: Vec<ErrorEntry>) {
        self.events.lock().push(ObserverEvent::Error(errors));
    }

    fn on_complete(&self) {
        self.events.lock().push(ObserverEvent::Complete);
    }
}
