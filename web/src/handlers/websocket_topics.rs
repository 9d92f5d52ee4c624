//! Topic-based WebSocket transport for live queue updates.
//!
//! [`TopicBroadcaster`] is the in-process publish/subscribe transport: the
//! queue publishes to a resource's topic and every socket subscribed to that
//! topic receives the update.
//!
//! # Architecture
//!
//! ```text
//! Client                 Socket handler                 Topics
//!   │                          │                          │
//!   ├─ Connect ───────────────>│                          │
//!   ├─ Subscribe ["E1"] ──────>│── subscribe("queue:E1") ─>│
//!   │<─ Subscribed ────────────┤                          │
//!   │                          │<── update (queue:E1) ────┤
//!   │<─ queue_update ──────────┤                          │
//!   │                          │<── update (queue:E2) ────┤
//!   │                          ├─ not subscribed, dropped │
//! ```
//!
//! # Message Protocol
//!
//! **Client → Server:**
//! ```json
//! { "type": "subscribe", "resources": ["E1", "E2"] }
//! { "type": "unsubscribe", "resources": ["E2"] }
//! { "type": "ping" }
//! ```
//!
//! **Server → Client:**
//! ```json
//! { "type": "subscribed", "resources": ["E1", "E2"] }
//! { "type": "queue_update", "topic": "queue:E1", "resource_id": "E1",
//!   "waiting_count": 3, "processing_count": 1, "change": "joined",
//!   "timestamp": "2025-01-01T00:00:00Z" }
//! { "type": "pong" }
//! { "type": "error", "message": "..." }
//! ```
//!
//! # Connection Limits
//!
//! At most [`AppState::max_ws_connections`] sockets are open at once; further
//! upgrade requests get 503 Service Unavailable. Each connection may hold
//! [`MAX_SUBSCRIPTIONS_PER_CONNECTION`] topics, named at most
//! [`MAX_RESOURCES_PER_MESSAGE`] at a time. A topic is released as soon as
//! its last subscriber unsubscribes or disconnects.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket, rejection::WebSocketUpgradeRejection},
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use turnstile_core::{PublishError, QueueNotification, QueuePublisher, ResourceId};

/// Per-topic channel capacity.
const TOPIC_CAPACITY: usize = 1000;

/// Per-connection outbound buffer.
const OUTBOUND_BUFFER: usize = 64;

/// Most resources one subscribe message may name.
pub const MAX_RESOURCES_PER_MESSAGE: usize = 50;

/// Most topics one connection may subscribe to.
pub const MAX_SUBSCRIPTIONS_PER_CONNECTION: usize = 100;

/// Type alias for the channels map to reduce complexity.
type ChannelsMap<A> = Arc<RwLock<HashMap<String, broadcast::Sender<(String, A)>>>>;

/// Topic broadcaster for multi-channel WebSocket communication.
///
/// Each topic has its own broadcast channel, created on first subscription
/// and pruned once its last receiver is released or a publish finds nobody
/// listening.
///
/// # Type Parameters
///
/// - `A`: Payload type
///
/// # Example
///
/// ```ignore
/// let broadcaster = TopicBroadcaster::<QueueNotification>::new();
///
/// let mut rx = broadcaster.subscribe("queue:E1").await;
/// broadcaster.send("queue:E1", notification).await;
/// let (topic, notification) = rx.recv().await?;
/// ```
pub struct TopicBroadcaster<A>
where
    A: Clone + Send + 'static,
{
    /// Map of topic name → broadcast channel
    channels: ChannelsMap<A>,
}

impl<A> TopicBroadcaster<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Create a new topic broadcaster.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Send a payload to every current subscriber of a topic.
    ///
    /// Returns how many subscribers received it. A topic with no
    /// subscribers left is removed.
    pub async fn send(&self, topic: impl Into<String>, payload: A) -> usize {
        let topic = topic.into();

        let delivered = {
            let channels = self.channels.read().await;
            let Some(sender) = channels.get(&topic) else {
                return 0;
            };
            sender.send((topic.clone(), payload)).ok()
        };

        if let Some(count) = delivered {
            return count;
        }

        let mut channels = self.channels.write().await;
        // A subscriber may have arrived since the read lock was released
        if channels
            .get(&topic)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&topic);
            debug!(topic = %topic, "Pruned topic with no subscribers");
        }
        0
    }

    /// Subscribe to a specific topic.
    ///
    /// Returns a receiver that will get all payloads sent to this topic.
    pub async fn subscribe(&self, topic: impl Into<String>) -> broadcast::Receiver<(String, A)> {
        let topic = topic.into();
        let mut channels = self.channels.write().await;

        channels
            .entry(topic)
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Remove a topic once nobody is subscribed to it.
    ///
    /// Returns whether the topic was removed. A topic that still has
    /// receivers is left alone.
    pub async fn release(&self, topic: &str) -> bool {
        let mut channels = self.channels.write().await;
        let idle = channels
            .get(topic)
            .is_some_and(|sender| sender.receiver_count() == 0);
        if idle {
            channels.remove(topic);
            debug!(topic = %topic, "Released topic with no subscribers");
        }
        idle
    }

    /// Get count of active topics.
    pub async fn topic_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

impl<A> Default for TopicBroadcaster<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for TopicBroadcaster<A>
where
    A: Clone + Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
        }
    }
}

impl QueuePublisher for TopicBroadcaster<QueueNotification> {
    fn publish(
        &self,
        topic: &str,
        notification: &QueueNotification,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>> {
        let topic = topic.to_string();
        let notification = notification.clone();
        Box::pin(async move {
            // Nobody listening is not a delivery failure
            self.send(topic, notification).await;
            Ok(())
        })
    }
}

/// WebSocket message from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start receiving updates for these resources
    Subscribe {
        /// Resource ids
        resources: Vec<String>,
    },
    /// Stop receiving updates for these resources
    Unsubscribe {
        /// Resource ids
        resources: Vec<String>,
    },
    /// Keep-alive
    Ping,
}

/// WebSocket message from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Subscription confirmed
    Subscribed {
        /// Resource ids now subscribed
        resources: Vec<String>,
    },
    /// Unsubscription confirmed
    Unsubscribed {
        /// Resource ids no longer subscribed
        resources: Vec<String>,
    },
    /// A subscribed resource's queue changed
    QueueUpdate {
        /// Topic the update arrived on
        topic: String,
        /// Queue summary
        #[serde(flatten)]
        update: QueueNotification,
    },
    /// Keep-alive response
    Pong,
    /// Error message
    Error {
        /// Error description
        message: String,
    },
}

/// Holds one slot of the connection cap until dropped.
struct ConnectionGuard {
    connections: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    fn acquire(connections: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < max).then_some(current + 1)
            })
            .ok()?;
        Some(Self {
            connections: Arc::clone(connections),
        })
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.connections.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Live queue updates over WebSocket.
///
/// # Endpoint
///
/// ```text
/// GET /ws/queue
/// ```
///
/// Returns 503 Service Unavailable when the connection cap is reached.
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn queue_updates(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(guard) = ConnectionGuard::acquire(&state.ws_connections, state.max_ws_connections)
    else {
        warn!(
            max_connections = state.max_ws_connections,
            "WebSocket connection limit exceeded"
        );
        return AppError::unavailable("Too many concurrent connections. Please try again later.")
            .into_response();
    };

    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| handle_socket(socket, state, guard)),
        Err(rejection) => rejection.into_response(),
    }
}

/// Forwarding tasks for one connection, keyed by topic.
struct Subscriptions {
    state: AppState,
    outbound: mpsc::Sender<ServerMessage>,
    forwarders: HashMap<String, JoinHandle<()>>,
}

impl Subscriptions {
    fn new(state: AppState, outbound: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            state,
            outbound,
            forwarders: HashMap::new(),
        }
    }

    async fn handle(&mut self, message: ClientMessage) -> Vec<ServerMessage> {
        match message {
            ClientMessage::Subscribe { resources } => self.subscribe(resources).await,
            ClientMessage::Unsubscribe { resources } => self.unsubscribe(resources).await,
            ClientMessage::Ping => vec![ServerMessage::Pong],
        }
    }

    async fn subscribe(&mut self, resources: Vec<String>) -> Vec<ServerMessage> {
        if resources.len() > MAX_RESOURCES_PER_MESSAGE {
            return vec![ServerMessage::Error {
                message: format!(
                    "At most {MAX_RESOURCES_PER_MESSAGE} resources per subscribe message"
                ),
            }];
        }

        let mut replies = Vec::new();
        let mut subscribed = Vec::new();

        for raw in resources {
            let resource_id = match ResourceId::new(raw) {
                Ok(id) => id,
                Err(e) => {
                    replies.push(ServerMessage::Error {
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            let topic = self.state.manager.notifier().topic(&resource_id);

            if !self.forwarders.contains_key(&topic) {
                if self.forwarders.len() >= MAX_SUBSCRIPTIONS_PER_CONNECTION {
                    replies.push(ServerMessage::Error {
                        message: format!(
                            "Subscription limit of {MAX_SUBSCRIPTIONS_PER_CONNECTION} reached, \
                             {resource_id} not subscribed"
                        ),
                    });
                    continue;
                }
                let receiver = self.state.broadcaster.subscribe(topic.clone()).await;
                let forwarder = tokio::spawn(forward(receiver, self.outbound.clone()));
                self.forwarders.insert(topic.clone(), forwarder);
                debug!(topic = %topic, "Subscribed to topic");
            }
            subscribed.push(resource_id.to_string());
        }

        if !subscribed.is_empty() {
            replies.insert(0, ServerMessage::Subscribed {
                resources: subscribed,
            });
        }
        replies
    }

    async fn unsubscribe(&mut self, resources: Vec<String>) -> Vec<ServerMessage> {
        let mut unsubscribed = Vec::new();

        for raw in resources {
            let Ok(resource_id) = ResourceId::new(raw) else {
                continue;
            };
            let topic = self.state.manager.notifier().topic(&resource_id);
            if let Some(forwarder) = self.forwarders.remove(&topic) {
                release_topic(&self.state.broadcaster, &topic, forwarder).await;
                debug!(topic = %topic, "Unsubscribed from topic");
            }
            unsubscribed.push(resource_id.to_string());
        }

        vec![ServerMessage::Unsubscribed {
            resources: unsubscribed,
        }]
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        let forwarders: Vec<_> = self.forwarders.drain().collect();
        for (_, forwarder) in &forwarders {
            forwarder.abort();
        }

        // Without a runtime the whole broadcaster is going away anyway
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let broadcaster = self.state.broadcaster.clone();
        runtime.spawn(async move {
            for (topic, forwarder) in forwarders {
                release_topic(&broadcaster, &topic, forwarder).await;
            }
        });
    }
}

/// Stop a forwarder and drop its topic if it was the last receiver.
///
/// The receiver lives inside the forwarder, so the topic is only released
/// after the aborted task has been torn down.
async fn release_topic(
    broadcaster: &TopicBroadcaster<QueueNotification>,
    topic: &str,
    forwarder: JoinHandle<()>,
) {
    forwarder.abort();
    let _ = forwarder.await;
    broadcaster.release(topic).await;
}

/// Relay one topic's updates into a connection's outbound queue.
async fn forward(
    mut receiver: broadcast::Receiver<(String, QueueNotification)>,
    outbound: mpsc::Sender<ServerMessage>,
) {
    loop {
        match receiver.recv().await {
            Ok((topic, update)) => {
                if outbound
                    .send(ServerMessage::QueueUpdate { topic, update })
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Client lagging, skipped queue updates");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Handle WebSocket connection lifecycle with topic subscriptions.
async fn handle_socket(socket: WebSocket, state: AppState, _guard: ConnectionGuard) {
    info!(
        connections = state.ws_connections.load(Ordering::Relaxed),
        "WebSocket connection established"
    );

    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_BUFFER);

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize WebSocket message");
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                // Client disconnected
                break;
            }
        }
    });

    let mut subscriptions = Subscriptions::new(state, outbound_tx.clone());
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let replies = match msg {
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(message) => subscriptions.handle(message).await,
                    Err(e) => {
                        debug!(error = %e, "Failed to parse WebSocket message");
                        vec![ServerMessage::Error {
                            message: format!("Invalid message: {e}"),
                        }]
                    }
                },
                Message::Close(_) => {
                    debug!("Client requested close");
                    break;
                }
                Message::Binary(_) => vec![ServerMessage::Error {
                    message: "Binary messages are not supported".to_string(),
                }],
                Message::Ping(_) | Message::Pong(_) => continue,
            };

            for reply in replies {
                if outbound_tx.send(reply).await.is_err() {
                    return;
                }
            }
        }
    });

    // Wait for either task to complete (connection closed)
    tokio::select! {
        _ = (&mut send_task) => {
            debug!("Send task completed, aborting receive task");
            recv_task.abort();
        },
        _ = (&mut recv_task) => {
            debug!("Receive task completed, aborting send task");
            send_task.abort();
        },
    }

    info!("WebSocket connection closed");
}
