// src/ws.rs
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use crossbeam_channel::Sender;
use futures::{SinkExt, StreamExt};
use log::{info, warn};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use warp::Filter;

use crate::codec;
use crate::event_loop::BridgeEvent;
use crate::router::{DeliveryChannel, SharedChannel};

/// Frame kind the web client treats as "load this URL".
pub const KIND_NAVIGATE: &str = "NAVIGATE";

/// Fans envelopes out to every connected client.
pub struct WsChannel {
    tx: broadcast::Sender<String>,
}

impl WsChannel {
    pub fn new(tx: broadcast::Sender<String>) -> Self {
        Self { tx }
    }
}

impl DeliveryChannel for WsChannel {
    fn deliver(&self, encoded: &str) {
        // An error only means nobody is listening right now
        let _ = self.tx.send(encoded.to_string());
    }

    fn navigate(&self, url: &str) {
        let mut payload = Map::new();
        payload.insert("url".into(), Value::String(url.to_string()));
        let _ = self.tx.send(codec::encode(KIND_NAVIGATE, &payload));
    }
}

/// Counts connected clients and turns the first arrival and last departure into
/// surface lifecycle events. The count and the events it triggers are updated
/// under one lock, so the bridge loop sees them in counter order.
pub struct SurfaceClients {
    count: Mutex<usize>,
    events: Sender<BridgeEvent>,
    ws_tx: broadcast::Sender<String>,
}

impl SurfaceClients {
    pub fn new(events: Sender<BridgeEvent>, ws_tx: broadcast::Sender<String>) -> Self {
        Self {
            count: Mutex::new(0),
            events,
            ws_tx,
        }
    }

    /// First client: the surface is attached and in the foreground.
    pub fn connected(&self) {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        *count += 1;
        if *count == 1 {
            let channel: SharedChannel = Arc::new(WsChannel::new(self.ws_tx.clone()));
            let _ = self.events.send(BridgeEvent::SurfaceAttached(channel));
            let _ = self.events.send(BridgeEvent::Foreground);
        }
    }

    /// Last client gone: the surface is backgrounded and detached.
    pub fn disconnected(&self) {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        *count = count.saturating_sub(1);
        if *count == 0 {
            let _ = self.events.send(BridgeEvent::Background);
            let _ = self.events.send(BridgeEvent::SurfaceDetached);
        }
    }
}

pub async fn start_server(addr: SocketAddr, events: Sender<BridgeEvent>) {
    // Shared Broadcast Channel for WS Clients
    let (ws_tx, _) = broadcast::channel::<String>(32);
    let clients = Arc::new(SurfaceClients::new(events.clone(), ws_tx.clone()));

    // Matches root path "/"
    let ws_route = warp::path::end()
        .and(warp::ws())
        .map(move |ws: warp::ws::Ws| {
            let events = events.clone();
            let ws_tx = ws_tx.clone();
            let clients = clients.clone();

            ws.on_upgrade(move |socket| handle_connection(socket, events, ws_tx, clients))
        });

    let routes = ws_route.with(warp::cors().allow_any_origin());

    info!("WebSocket server running on ws://{}", addr);
    warp::serve(routes).run(addr).await;
}

async fn handle_connection(
    ws: warp::ws::WebSocket,
    events: Sender<BridgeEvent>,
    ws_tx: broadcast::Sender<String>,
    clients: Arc<SurfaceClients>,
) {
    let (mut client_ws_tx, mut client_ws_rx) = ws.split();
    let mut rx_broadcast = ws_tx.subscribe();

    clients.connected();

    // Spawn task to send Broadcasts -> Client
    let forward = tokio::spawn(async move {
        loop {
            match rx_broadcast.recv().await {
                Ok(msg) => {
                    if client_ws_tx.send(warp::ws::Message::text(msg)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Client lagging, {} message(s) skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Handle incoming messages from Client
    while let Some(result) = client_ws_rx.next().await {
        match result {
            Ok(msg) if msg.is_text() => {
                if let Ok(text) = msg.to_str() {
                    let _ = events.send(BridgeEvent::Inbound(text.to_string()));
                }
            }
            Ok(msg) if msg.is_close() => break,
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error: {}", e);
                break;
            }
        }
    }

    forward.abort();
    clients.disconnected();
}
