//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-request caller.

use crate::config::Config;
use onboarding_core::access::EmailPolicy;
use onboarding_core::domain::Profile;
use onboarding_core::ports::{AuthService, DocumentStore, ObjectStorage};
use onboarding_core::routing::RouteGuard;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn AuthService>,
    pub store: Arc<dyn DocumentStore>,
    pub objects: Arc<dyn ObjectStorage>,
    pub config: Arc<Config>,
    pub policy: EmailPolicy,
    pub guard: RouteGuard,
}

impl AppState {
    pub fn new(
        auth: Arc<dyn AuthService>,
        store: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStorage>,
        config: Arc<Config>,
    ) -> Self {
        let policy = EmailPolicy::new(config.allowed_email_domain.clone())
            .with_admins(config.admin_emails.iter());
        let guard = RouteGuard::new(&config.base_path);
        Self {
            auth,
            store,
            objects,
            config,
            policy,
            guard,
        }
    }
}

//=========================================================================================
// CurrentUser (Specific to One Authenticated Request)
//=========================================================================================

/// The signed-in caller, resolved by the auth middleware.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub token: String,
    pub profile: Profile,
}
