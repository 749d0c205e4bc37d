//! crates/onboarding_core/src/session.rs
//!
//! The session resolver. One `SessionContext` is owned per connected client:
//! it follows the auth boundary's identity changes for that client's token,
//! looks up the profile behind each identity, and publishes the resulting
//! `{identity, role}` snapshot to whoever holds a receiver.

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::{Identity, Role};
use crate::ports::{AuthService, DocumentStore, IdentityStream, PortError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSnapshot {
    /// No identity event has been processed yet.
    Loading,
    SignedOut,
    SignedIn { identity: Identity, role: Role },
}

impl SessionSnapshot {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionSnapshot::SignedIn { identity, .. } => Some(identity),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            SessionSnapshot::SignedIn { role, .. } => Some(*role),
            _ => None,
        }
    }
}

/// Maps one identity event onto a snapshot.
///
/// A signed-in identity whose profile cannot be read is treated as signed out.
pub async fn resolve(store: &dyn DocumentStore, identity: Option<Identity>) -> SessionSnapshot {
    let Some(identity) = identity else {
        return SessionSnapshot::SignedOut;
    };
    match store.get_profile(identity.id).await {
        Ok(profile) => SessionSnapshot::SignedIn {
            identity,
            role: profile.role,
        },
        Err(PortError::NotFound(_)) => {
            warn!("Identity {} has no profile; treating as signed out", identity.id);
            SessionSnapshot::SignedOut
        }
        Err(e) => {
            warn!("Profile lookup for {} failed: {:?}", identity.id, e);
            SessionSnapshot::SignedOut
        }
    }
}

/// The owned session state for one client.
pub struct SessionContext {
    token: String,
    auth: Arc<dyn AuthService>,
    receiver: watch::Receiver<SessionSnapshot>,
    cancellation_token: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionContext {
    /// Subscribes to identity changes for `token` and starts resolving them.
    pub async fn start(
        auth: Arc<dyn AuthService>,
        store: Arc<dyn DocumentStore>,
        token: String,
    ) -> Self {
        let (sender, receiver) = watch::channel(SessionSnapshot::Loading);
        let cancellation_token = CancellationToken::new();
        let changes = auth.identity_changes(&token).await;

        let task = tokio::spawn(resolve_loop(
            changes,
            store,
            sender,
            cancellation_token.clone(),
        ));

        Self {
            token,
            auth,
            receiver,
            cancellation_token,
            task,
        }
    }

    pub fn current(&self) -> SessionSnapshot {
        self.receiver.borrow().clone()
    }

    /// A receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.receiver.clone()
    }

    /// Waits until the first identity event has been resolved.
    pub async fn ready(&self) -> SessionSnapshot {
        let mut receiver = self.receiver.clone();
        let snapshot = match receiver
            .wait_for(|s| !matches!(s, SessionSnapshot::Loading))
            .await
        {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => SessionSnapshot::SignedOut,
        };
        snapshot
    }

    /// Tears the subscription down. With `sign_out` set the token is also
    /// revoked, so the session does not outlive the client.
    pub async fn shutdown(self, sign_out: bool) {
        self.cancellation_token.cancel();
        if let Err(e) = self.task.await {
            warn!("Session resolver task ended abnormally: {:?}", e);
        }
        if sign_out {
            match self.auth.sign_out(&self.token).await {
                Ok(()) => info!("Signed out session on client disconnect."),
                Err(e) => warn!("Failed to sign out on disconnect: {:?}", e),
            }
        }
    }
}

async fn resolve_loop(
    mut changes: IdentityStream,
    store: Arc<dyn DocumentStore>,
    sender: watch::Sender<SessionSnapshot>,
    cancellation_token: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancellation_token.cancelled() => break,
            event = changes.next() => event,
        };
        let Some(identity) = event else {
            break;
        };
        let snapshot = tokio::select! {
            _ = cancellation_token.cancelled() => break,
            snapshot = resolve(store.as_ref(), identity) => snapshot,
        };
        // Every update replaces the previous state; nobody listening is fine.
        sender.send_replace(snapshot);
    }
}

//=========================================================================================
// Identity-change fan-out shared by the auth adapters
//=========================================================================================

#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub token: String,
    pub identity: Option<Identity>,
}

/// Broadcasts sign-in/sign-out events so per-token identity streams can follow them.
#[derive(Debug, Clone)]
pub struct AuthEventBus {
    sender: broadcast::Sender<AuthEvent>,
}

impl Default for AuthEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl AuthEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, token: &str, identity: Option<Identity>) {
        // No subscribers is not an error.
        let _ = self.sender.send(AuthEvent {
            token: token.to_string(),
            identity,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }
}

/// A stream that yields `current` first and then every event for `token`
/// seen on `receiver`. Subscribe before reading `current` so nothing is missed.
/// The stream ends once the token is signed out.
pub fn identity_stream(
    mut receiver: broadcast::Receiver<AuthEvent>,
    token: &str,
    current: Option<Identity>,
) -> IdentityStream {
    let token = token.to_string();
    Box::pin(async_stream::stream! {
        let signed_out = current.is_none();
        yield current;
        if signed_out {
            return;
        }
        loop {
            match receiver.recv().await {
                Ok(event) if event.token == token => {
                    let ended = event.identity.is_none();
                    yield event.identity;
                    if ended {
                        break;
                    }
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Identity stream lagged by {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
