//! Live scene fan-out to WebSocket viewers.
//!
//! The broadcaster owns subscriber membership and the last published
//! payload under one short-lived lock. Delivery is a non-blocking try-send
//! into a bounded per-subscriber channel; a full channel means the viewer
//! cannot keep up and gets disconnected; the simulator is the
//! authoritative clock and a stalled viewer may never slow it.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use outpost_core::Scene;

use crate::state::AppState;

/// Per-subscriber buffered frames before the drop-slow policy kicks in.
const SUBSCRIBER_BUFFER: usize = 8;

pub struct SceneBroadcaster {
    inner: Mutex<Inner>,
}

struct Inner {
    next_id: u64,
    subscribers: HashMap<u64, mpsc::Sender<String>>,
    last_payload: Option<String>,
}

pub struct Subscription {
    pub id: u64,
    pub rx: mpsc::Receiver<String>,
}

impl SceneBroadcaster {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 0,
                subscribers: HashMap::new(),
                last_payload: None,
            }),
        }
    }

    /// Register a subscriber. The last published payload (or the caller's
    /// fallback when nothing has been published yet) is queued immediately
    /// so late joiners render the current scene without waiting a tick.
    pub fn subscribe(&self, fallback: Option<String>) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let (id, initial) = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.insert(id, tx.clone());
            (id, inner.last_payload.clone().or(fallback))
        };
        if let Some(payload) = initial {
            // Fresh channel with capacity 8; this cannot fail.
            let _ = tx.try_send(payload);
        }
        Subscription { id, rx }
    }

    /// Store the payload as `last_payload` and enqueue it to every
    /// subscriber. Sends never happen under the membership lock.
    pub fn publish(&self, payload: String) {
        let targets: Vec<(u64, mpsc::Sender<String>)> = {
            let mut inner = self.inner.lock();
            inner.last_payload = Some(payload.clone());
            inner
                .subscribers
                .iter()
                .map(|(id, tx)| (*id, tx.clone()))
                .collect()
        };

        for (id, tx) in targets {
            if tx.try_send(payload.clone()).is_err() {
                tracing::debug!(subscriber = id, "disconnecting slow scene subscriber");
                self.unsubscribe(id);
            }
        }
    }

    pub fn publish_scene(&self, scene: &Scene) {
        match serde_json::to_string(scene) {
            Ok(payload) => self.publish(payload),
            Err(err) => tracing::error!("scene serialization failed: {err}"),
        }
    }

    /// Remove a subscriber, closing its channel. Safe to call twice.
    pub fn unsubscribe(&self, id: u64) {
        self.inner.lock().subscribers.remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Tear down every subscriber. Their channels close, which ends the
    /// writer tasks, which close the underlying connections.
    pub fn stop(&self) {
        self.inner.lock().subscribers.clear();
    }
}

impl Default for SceneBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// WebSocket bridge
// ---------------------------------------------------------------------------

pub async fn scene_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        let fallback = serde_json::to_string(&state.game.scene()).ok();
        let subscription = state.broadcaster.subscribe(fallback);
        drive_subscriber(socket, state.broadcaster.clone(), subscription).await;
    })
}

/// One writer task draining the channel into the socket and one read loop
/// whose only job is to notice the peer going away. Either side ending
/// unsubscribes, which closes the channel, which lets the other side
/// finish.
async fn drive_subscriber(
    socket: WebSocket,
    broadcaster: Arc<SceneBroadcaster>,
    subscription: Subscription,
) {
    let Subscription { id, mut rx } = subscription;
    let (mut sink, mut stream) = socket.split();

    let writer_broadcaster = broadcaster.clone();
    let writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sink.send(Message::Text(payload.into())).await.is_err() {
                writer_broadcaster.unsubscribe(id);
                return;
            }
        }
        // Channel closed: we were dropped as a subscriber. Tell the peer.
        let _ = sink.send(Message::Close(None)).await;
    });

    while let Some(frame) = stream.next().await {
        if frame.is_err() {
            break;
        }
    }

    broadcaster.unsubscribe(id);
    let _ = writer.await;
}
