//! crates/onboarding_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the portal's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the managed backend that actually stores profiles,
//! modules, submissions and files.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::fmt;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{
    AdminDocument, Answers, AuthSession, Grade, Identity, Module, NewModule, Notification,
    Profile, Role, StudentDocument, Submission, WriteOutcome,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Identity-change notifications for one auth token. `None` means signed out.
pub type IdentityStream = Pin<Box<dyn Stream<Item = Option<Identity>> + Send>>;

/// Change signals for one watched collection. Each item means "re-read me".
pub type ChangeStream = Pin<Box<dyn Stream<Item = PortResult<()>> + Send>>;

//=========================================================================================
// Watched Collections
//=========================================================================================

/// A collection a client can subscribe to for live updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Profiles,
    Modules,
    AdminDocuments,
    Submissions(Uuid),
    StudentDocuments(Uuid),
    Notifications(Uuid),
}

impl Collection {
    /// The key used on change-notification channels, e.g. `modules` or
    /// `notifications:<student id>`.
    pub fn channel_key(&self) -> String {
        match self {
            Collection::Profiles => "profiles".to_string(),
            Collection::Modules => "modules".to_string(),
            Collection::AdminDocuments => "admin_documents".to_string(),
            Collection::Submissions(id) => format!("submissions:{id}"),
            Collection::StudentDocuments(id) => format!("student_documents:{id}"),
            Collection::Notifications(id) => format!("notifications:{id}"),
        }
    }

    /// Parses a channel key back into a collection. Grade changes are
    /// reported against the owning student's submissions.
    pub fn from_channel_key(key: &str) -> Option<Self> {
        match key.split_once(':') {
            None => match key {
                "profiles" => Some(Collection::Profiles),
                "modules" => Some(Collection::Modules),
                "admin_documents" => Some(Collection::AdminDocuments),
                _ => None,
            },
            Some((scope, id)) => {
                let id = Uuid::parse_str(id).ok()?;
                match scope {
                    "submissions" | "grades" => Some(Collection::Submissions(id)),
                    "student_documents" => Some(Collection::StudentDocuments(id)),
                    "notifications" => Some(Collection::Notifications(id)),
                    _ => None,
                }
            }
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.channel_key())
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Registers a new identity. Fails with `Conflict` if the email is taken.
    async fn sign_up(&self, email: &str, password: &str) -> PortResult<Identity>;

    /// Verifies credentials and opens a new auth session.
    async fn sign_in(&self, email: &str, password: &str) -> PortResult<AuthSession>;

    /// Resolves a live, unexpired token. `Unauthorized` otherwise.
    async fn identity_for_token(&self, token: &str) -> PortResult<Identity>;

    async fn sign_out(&self, token: &str) -> PortResult<()>;

    /// Yields the token's current identity once, then again every time it changes.
    async fn identity_changes(&self, token: &str) -> IdentityStream;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    // --- Profiles ---
    async fn get_profile(&self, id: Uuid) -> PortResult<Profile>;

    async fn create_profile(
        &self,
        identity: &Identity,
        name: &str,
        role: Role,
    ) -> PortResult<Profile>;

    async fn list_profiles(&self) -> PortResult<Vec<Profile>>;

    /// Set-union append; re-adding an existing id is a no-op.
    async fn add_completed_module(&self, student_id: Uuid, module_id: Uuid) -> PortResult<()>;

    // --- Modules ---
    /// All modules in creation order.
    async fn list_modules(&self) -> PortResult<Vec<Module>>;

    async fn get_module(&self, id: Uuid) -> PortResult<Module>;

    async fn create_module(&self, module: NewModule) -> PortResult<Module>;

    async fn delete_module(&self, id: Uuid) -> PortResult<()>;

    // --- Submissions and Grades ---
    async fn list_submissions(&self, student_id: Uuid) -> PortResult<Vec<Submission>>;

    async fn get_submission(
        &self,
        student_id: Uuid,
        module_id: Uuid,
    ) -> PortResult<Option<Submission>>;

    /// Insert-if-absent. Returns the existing submission untouched when one exists.
    async fn create_submission(
        &self,
        student_id: Uuid,
        module_id: Uuid,
        answers: Answers,
    ) -> PortResult<(WriteOutcome, Submission)>;

    async fn get_grade(&self, student_id: Uuid, module_id: Uuid) -> PortResult<Option<Grade>>;

    /// Insert-if-absent. Returns the existing grade untouched when one exists.
    async fn create_grade(
        &self,
        student_id: Uuid,
        module_id: Uuid,
        score: &str,
        feedback: Option<&str>,
    ) -> PortResult<(WriteOutcome, Grade)>;

    // --- Documents ---
    async fn create_student_document(
        &self,
        student_id: Uuid,
        title: &str,
        link: &str,
    ) -> PortResult<StudentDocument>;

    async fn list_student_documents(&self, student_id: Uuid) -> PortResult<Vec<StudentDocument>>;

    async fn create_admin_document(
        &self,
        student: &Profile,
        title: &str,
        link: &str,
    ) -> PortResult<AdminDocument>;

    async fn list_admin_documents(&self) -> PortResult<Vec<AdminDocument>>;

    // --- Notifications ---
    async fn create_notification(
        &self,
        student_id: Uuid,
        message: &str,
    ) -> PortResult<Notification>;

    async fn list_notifications(&self, student_id: Uuid) -> PortResult<Vec<Notification>>;

    // --- Realtime ---
    async fn watch(&self, collection: Collection) -> PortResult<ChangeStream>;
}

/// A stored object, identified by its path within the bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHandle {
    pub path: String,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, path: &str, bytes: Bytes, content_type: &str)
        -> PortResult<ObjectHandle>;

    /// A URL the browser can fetch the object from.
    async fn url(&self, handle: &ObjectHandle) -> PortResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_keys_parse_back() {
        let id = Uuid::new_v4();
        for collection in [
            Collection::Profiles,
            Collection::Modules,
            Collection::AdminDocuments,
            Collection::Submissions(id),
            Collection::StudentDocuments(id),
            Collection::Notifications(id),
        ] {
            assert_eq!(
                Collection::from_channel_key(&collection.channel_key()),
                Some(collection)
            );
        }
    }

    #[test]
    fn grade_changes_map_to_submissions() {
        let id = Uuid::new_v4();
        assert_eq!(
            Collection::from_channel_key(&format!("grades:{id}")),
            Some(Collection::Submissions(id))
        );
        assert_eq!(Collection::from_channel_key("grades:not-a-uuid"), None);
        assert_eq!(Collection::from_channel_key("users"), None);
    }
}
