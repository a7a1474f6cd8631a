use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use lovenote_types::events::{GatewayCommand, GatewayEvent};
use lovenote_types::models::Role;

use crate::dispatcher::{Dispatcher, should_deliver};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Time allowed between upgrade and the Identify command.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Checks an Identify command. Implemented by the HTTP auth layer so the
/// socket applies exactly the same token + approved-device rules.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str, fingerprint: &str) -> Option<(Uuid, Role)>;
}

/// Handle a single WebSocket connection: Identify, Ready, then relay events.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    verifier: Arc<dyn IdentityVerifier>,
) {
    let (mut sender, mut receiver) = socket.split();

    let (user_id, role) = match wait_for_identify(&mut receiver, verifier.as_ref()).await {
        Some(id) => id,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    info!("{} ({}) connected to gateway", role, user_id);

    let ready = GatewayEvent::Ready { user_id, role };
    if send_event(&mut sender, &ready).await.is_err() {
        return;
    }

    let open = dispatcher.connection_opened();
    info!("Gateway connections: {}", open);

    run_connection_loop(sender, receiver, &dispatcher, user_id, role).await;

    dispatcher.connection_closed();
    info!("{} ({}) disconnected from gateway", role, user_id);
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    dispatcher: &Dispatcher,
    user_id: Uuid,
    role: Role,
) {
    let mut broadcast_rx = dispatcher.subscribe();

    // Own rows are always visible; Subscribe replaces the rest.
    let subscriptions: Arc<std::sync::RwLock<HashSet<Uuid>>> =
        Arc::new(std::sync::RwLock::new(HashSet::from([user_id])));
    let send_subscriptions = subscriptions.clone();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} messages", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    let deliver = match send_subscriptions.read() {
                        Ok(subs) => should_deliver(&event, &subs),
                        Err(_) => false,
                    };
                    if !deliver {
                        continue;
                    }

                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::<u8>::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let recv_subscriptions = subscriptions.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(GatewayCommand::Subscribe { user_ids }) => {
                        info!("{} ({}) subscribing to {} users", role, user_id, user_ids.len());
                        if let Ok(mut subs) = recv_subscriptions.write() {
                            *subs = user_ids.into_iter().collect();
                            subs.insert(user_id);
                        }
                    }
                    Ok(GatewayCommand::Identify { .. }) => {} // Already handled
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            role,
                            user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), ()> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to serialize gateway event: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await.map_err(|_| ())
}

async fn wait_for_identify(
    receiver: &mut SplitStream<WebSocket>,
    verifier: &dyn IdentityVerifier,
) -> Option<(Uuid, Role)> {
    let timeout = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token, fingerprint }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    return verifier.verify(&token, &fingerprint);
                }
            }
        }
        None
    });

    timeout.await.ok().flatten()
}
