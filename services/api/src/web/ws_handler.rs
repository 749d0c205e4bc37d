//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! Each connection owns one `SessionContext` and any number of live feed tasks.
//! Closing the connection is how a browser tab going away is observed.

use crate::web::{
    protocol::{ClientMessage, Feed, ServerMessage},
    state::{AppState, CurrentUser},
    views::snapshot_data,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use onboarding_core::feed::live_feed;
use onboarding_core::session::{SessionContext, SessionSnapshot};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{error, info, warn};

type WsSender = Arc<Mutex<Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>>>;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user))
}

async fn send(ws_sender: &WsSender, message: &ServerMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(message).map_err(axum::Error::new)?;
    ws_sender.lock().await.send(Message::Text(json.into())).await
}

async fn send_error(ws_sender: &WsSender, message: impl Into<String>) {
    let message = ServerMessage::Error {
        message: message.into(),
    };
    if let Err(e) = send(ws_sender, &message).await {
        warn!("Failed to send error message: {:?}", e);
    }
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user: CurrentUser) {
    let (sender, receiver) = socket.split();
    serve_connection(sender, receiver, app_state, user).await;
}

/// Runs one client connection until the client goes away, then shuts its
/// session down.
pub async fn serve_connection<S, R>(
    sender: S,
    mut receiver: R,
    app_state: Arc<AppState>,
    user: CurrentUser,
) where
    S: Sink<Message, Error = axum::Error> + Send + 'static,
    R: Stream<Item = Result<Message, axum::Error>> + Send + Unpin,
{
    info!("New WebSocket connection established for user: {}", user.profile.id);

    let ws_sender: WsSender = Arc::new(Mutex::new(Box::pin(sender)));

    // --- 1. Session Phase ---
    let context = SessionContext::start(
        app_state.auth.clone(),
        app_state.store.clone(),
        user.token.clone(),
    )
    .await;
    let mut session_changes = context.subscribe();
    let mut session_open = true;
    let mut feeds: HashMap<Feed, JoinHandle<()>> = HashMap::new();

    // --- 2. Main Message Loop ---
    loop {
        tokio::select! {
            changed = session_changes.changed(), if session_open => {
                if changed.is_err() {
                    // The resolver has stopped; nothing more will be published.
                    session_open = false;
                    continue;
                }
                let snapshot = session_changes.borrow_and_update().clone();
                if let Some(message) = ServerMessage::session(&snapshot) {
                    if send(&ws_sender, &message).await.is_err() {
                        break;
                    }
                }
                if snapshot == SessionSnapshot::SignedOut {
                    for (_, handle) in feeds.drain() {
                        handle.abort();
                    }
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    handle_text_message(text.as_str(), &app_state, &context, &ws_sender, &mut feeds)
                        .await;
                }
                Some(Ok(Message::Close(_))) => {
                    info!("Client sent close message.");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket receive failed: {:?}", e);
                    break;
                }
                None => {
                    info!("Client disconnected.");
                    break;
                }
            }
        }
    }

    // --- 3. Cleanup ---
    for (_, handle) in feeds.drain() {
        handle.abort();
    }
    context
        .shutdown(app_state.config.sign_out_on_disconnect)
        .await;
    info!("WebSocket connection closed for user: {}", user.profile.id);
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: &str,
    app_state: &Arc<AppState>,
    context: &SessionContext,
    ws_sender: &WsSender,
    feeds: &mut HashMap<Feed, JoinHandle<()>>,
) {
    let client_msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            send_error(ws_sender, "Unrecognised message.").await;
            return;
        }
    };

    match client_msg {
        ClientMessage::Subscribe { feed } => {
            if feeds.get(&feed).is_some_and(|h| !h.is_finished()) {
                return;
            }
            let snapshot = context.ready().await;
            let SessionSnapshot::SignedIn { identity, role } = snapshot else {
                send_error(ws_sender, "Not signed in.").await;
                return;
            };
            if feed.required_role().is_some_and(|required| required != role) {
                warn!("User {} ({}) denied feed {:?}", identity.id, role, feed);
                send_error(ws_sender, "This feed is not available to your role.").await;
                return;
            }

            let collection = feed.collection(identity.id);
            let mut stream = match live_feed(app_state.store.clone(), collection).await {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Failed to watch {}: {:?}", collection, e);
                    send_error(ws_sender, "Failed to subscribe.").await;
                    return;
                }
            };
            info!("User {} subscribed to {:?}", identity.id, feed);

            let ws_sender = ws_sender.clone();
            let task = tokio::spawn(async move {
                while let Some(item) = stream.next().await {
                    let message = match item.map(|s| snapshot_data(&s)) {
                        Ok(Ok(data)) => ServerMessage::Snapshot { feed, data },
                        Ok(Err(e)) => {
                            error!("Failed to serialise {:?} snapshot: {:?}", feed, e);
                            continue;
                        }
                        Err(e) => {
                            error!("Live feed {:?} failed: {:?}", feed, e);
                            ServerMessage::Error {
                                message: "Live updates failed.".to_string(),
                            }
                        }
                    };
                    if send(&ws_sender, &message).await.is_err() {
                        break;
                    }
                }
            });
            feeds.insert(feed, task);
        }
        ClientMessage::Unsubscribe { feed } => {
            if let Some(handle) = feeds.remove(&feed) {
                handle.abort();
                info!("Unsubscribed from {:?}", feed);
            }
        }
        ClientMessage::ResolveRoute { path } => {
            let decision = app_state.guard.guard(&path, &context.current());
            let message = ServerMessage::Route {
                decision: decision.into(),
            };
            if let Err(e) = send(ws_sender, &message).await {
                warn!("Failed to send route decision: {:?}", e);
            }
        }
    }
}
