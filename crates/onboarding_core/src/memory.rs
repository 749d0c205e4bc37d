//! crates/onboarding_core/src/memory.rs
//!
//! An in-process implementation of every port. Used for local development
//! when no database is configured, and by the test suites.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::access::{hash_password, verify_password};
use crate::domain::{
    AdminDocument, Answers, AuthSession, Grade, Identity, Module, NewModule, Notification,
    Profile, Role, StudentDocument, Submission, WriteOutcome,
};
use crate::ports::{
    AuthService, ChangeStream, Collection, DocumentStore, IdentityStream, ObjectHandle,
    ObjectStorage, PortError, PortResult,
};
use crate::session::{identity_stream, AuthEventBus};

struct Account {
    identity: Identity,
    hashed_password: String,
}

#[derive(Default)]
struct Tables {
    accounts: HashMap<String, Account>,
    auth_sessions: HashMap<String, (Uuid, chrono::DateTime<Utc>)>,
    profiles: HashMap<Uuid, Profile>,
    modules: Vec<Module>,
    submissions: HashMap<(Uuid, Uuid), Submission>,
    grades: HashMap<(Uuid, Uuid), Grade>,
    student_documents: Vec<StudentDocument>,
    admin_documents: Vec<AdminDocument>,
    notifications: Vec<Notification>,
    objects: HashMap<String, (Bytes, String)>,
}

pub struct InMemoryBackend {
    tables: RwLock<Tables>,
    changes: broadcast::Sender<Collection>,
    auth_events: AuthEventBus,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            tables: RwLock::new(Tables::default()),
            changes,
            auth_events: AuthEventBus::default(),
        }
    }

    fn notify(&self, collection: Collection) {
        let _ = self.changes.send(collection);
    }

    /// Stored bytes and content type for an object path.
    pub async fn object(&self, path: &str) -> Option<(Bytes, String)> {
        self.tables.read().await.objects.get(path).cloned()
    }
}

/// Turns a broadcast receiver into a stream of change signals for one collection.
fn signals_for(mut receiver: broadcast::Receiver<Collection>, collection: Collection) -> ChangeStream {
    Box::pin(async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(changed) if changed == collection => yield Ok(()),
                Ok(_) => continue,
                // Missed signals collapse into one re-read.
                Err(broadcast::error::RecvError::Lagged(_)) => yield Ok(()),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

//=========================================================================================
// `AuthService` Implementation
//=========================================================================================

#[async_trait]
impl AuthService for InMemoryBackend {
    async fn sign_up(&self, email: &str, password: &str) -> PortResult<Identity> {
        let hashed_password = hash_password(password)?;
        let mut tables = self.tables.write().await;
        if tables.accounts.contains_key(email) {
            return Err(PortError::Conflict(format!("{email} is already registered")));
        }
        let identity = Identity {
            id: Uuid::new_v4(),
            email: email.to_string(),
        };
        tables.accounts.insert(
            email.to_string(),
            Account {
                identity: identity.clone(),
                hashed_password,
            },
        );
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        let mut tables = self.tables.write().await;
        let account = tables.accounts.get(email).ok_or(PortError::Unauthorized)?;
        if !verify_password(password, &account.hashed_password)? {
            return Err(PortError::Unauthorized);
        }
        let identity = account.identity.clone();
        let token = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + Duration::days(30);
        tables
            .auth_sessions
            .insert(token.clone(), (identity.id, expires_at));
        drop(tables);

        self.auth_events.publish(&token, Some(identity.clone()));
        Ok(AuthSession {
            token,
            identity,
            expires_at,
        })
    }

    async fn identity_for_token(&self, token: &str) -> PortResult<Identity> {
        let tables = self.tables.read().await;
        let (user_id, expires_at) = tables
            .auth_sessions
            .get(token)
            .ok_or(PortError::Unauthorized)?;
        if *expires_at <= Utc::now() {
            return Err(PortError::Unauthorized);
        }
        tables
            .accounts
            .values()
            .find(|a| a.identity.id == *user_id)
            .map(|a| a.identity.clone())
            .ok_or(PortError::Unauthorized)
    }

    async fn sign_out(&self, token: &str) -> PortResult<()> {
        let removed = self.tables.write().await.auth_sessions.remove(token);
        if removed.is_some() {
            self.auth_events.publish(token, None);
        }
        Ok(())
    }

    async fn identity_changes(&self, token: &str) -> IdentityStream {
        // Subscribe before reading the current identity so no event is missed.
        let receiver = self.auth_events.subscribe();
        let current = self.identity_for_token(token).await.ok();
        identity_stream(receiver, token, current)
    }
}

//=========================================================================================
// `DocumentStore` Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for InMemoryBackend {
    async fn get_profile(&self, id: Uuid) -> PortResult<Profile> {
        self.tables
            .read()
            .await
            .profiles
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Profile {id} not found")))
    }

    async fn create_profile(
        &self,
        identity: &Identity,
        name: &str,
        role: Role,
    ) -> PortResult<Profile> {
        let profile = Profile {
            id: identity.id,
            name: name.to_string(),
            email: identity.email.clone(),
            role,
            completed_modules: BTreeSet::new(),
            created_at: Utc::now(),
        };
        {
            let mut tables = self.tables.write().await;
            if tables.profiles.contains_key(&identity.id) {
                return Err(PortError::Conflict(format!(
                    "Profile {} already exists",
                    identity.id
                )));
            }
            tables.profiles.insert(identity.id, profile.clone());
        }
        self.notify(Collection::Profiles);
        Ok(profile)
    }

    async fn list_profiles(&self) -> PortResult<Vec<Profile>> {
        let mut profiles: Vec<Profile> =
            self.tables.read().await.profiles.values().cloned().collect();
        profiles.sort_by_key(|p| p.created_at);
        Ok(profiles)
    }

    async fn add_completed_module(&self, student_id: Uuid, module_id: Uuid) -> PortResult<()> {
        {
            let mut tables = self.tables.write().await;
            let profile = tables
                .profiles
                .get_mut(&student_id)
                .ok_or_else(|| PortError::NotFound(format!("Profile {student_id} not found")))?;
            profile.completed_modules.insert(module_id);
        }
        self.notify(Collection::Profiles);
        Ok(())
    }

    async fn list_modules(&self) -> PortResult<Vec<Module>> {
        Ok(self.tables.read().await.modules.clone())
    }

    async fn get_module(&self, id: Uuid) -> PortResult<Module> {
        self.tables
            .read()
            .await
            .modules
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Module {id} not found")))
    }

    async fn create_module(&self, module: NewModule) -> PortResult<Module> {
        let module = Module {
            id: Uuid::new_v4(),
            title: module.title,
            description: module.description,
            video: module.video,
            image: module.image,
            mcq: module.mcq,
            essay: module.essay,
            created_at: Utc::now(),
        };
        self.tables.write().await.modules.push(module.clone());
        self.notify(Collection::Modules);
        Ok(module)
    }

    async fn delete_module(&self, id: Uuid) -> PortResult<()> {
        let removed = {
            let mut tables = self.tables.write().await;
            let before = tables.modules.len();
            tables.modules.retain(|m| m.id != id);
            before != tables.modules.len()
        };
        if !removed {
            return Err(PortError::NotFound(format!("Module {id} not found")));
        }
        self.notify(Collection::Modules);
        Ok(())
    }

    async fn list_submissions(&self, student_id: Uuid) -> PortResult<Vec<Submission>> {
        let mut submissions: Vec<Submission> = self
            .tables
            .read()
            .await
            .submissions
            .values()
            .filter(|s| s.student_id == student_id)
            .cloned()
            .collect();
        submissions.sort_by_key(|s| s.submitted_at);
        Ok(submissions)
    }

    async fn get_submission(
        &self,
        student_id: Uuid,
        module_id: Uuid,
    ) -> PortResult<Option<Submission>> {
        Ok(self
            .tables
            .read()
            .await
            .submissions
            .get(&(student_id, module_id))
            .cloned())
    }

    async fn create_submission(
        &self,
        student_id: Uuid,
        module_id: Uuid,
        answers: Answers,
    ) -> PortResult<(WriteOutcome, Submission)> {
        let result = {
            let mut tables = self.tables.write().await;
            match tables.submissions.get(&(student_id, module_id)) {
                Some(existing) => (WriteOutcome::AlreadyExists, existing.clone()),
                None => {
                    let submission = Submission {
                        student_id,
                        module_id,
                        answers,
                        submitted_at: Utc::now(),
                    };
                    tables
                        .submissions
                        .insert((student_id, module_id), submission.clone());
                    (WriteOutcome::Created, submission)
                }
            }
        };
        if result.0 == WriteOutcome::Created {
            self.notify(Collection::Submissions(student_id));
        }
        Ok(result)
    }

    async fn get_grade(&self, student_id: Uuid, module_id: Uuid) -> PortResult<Option<Grade>> {
        Ok(self
            .tables
            .read()
            .await
            .grades
            .get(&(student_id, module_id))
            .cloned())
    }

    async fn create_grade(
        &self,
        student_id: Uuid,
        module_id: Uuid,
        score: &str,
        feedback: Option<&str>,
    ) -> PortResult<(WriteOutcome, Grade)> {
        let result = {
            let mut tables = self.tables.write().await;
            if !tables.submissions.contains_key(&(student_id, module_id)) {
                return Err(PortError::NotFound(format!(
                    "Submission for module {module_id} not found"
                )));
            }
            match tables.grades.get(&(student_id, module_id)) {
                Some(existing) => (WriteOutcome::AlreadyExists, existing.clone()),
                None => {
                    let grade = Grade {
                        score: score.to_string(),
                        feedback: feedback.map(str::to_string),
                        graded_at: Utc::now(),
                    };
                    tables.grades.insert((student_id, module_id), grade.clone());
                    (WriteOutcome::Created, grade)
                }
            }
        };
        if result.0 == WriteOutcome::Created {
            self.notify(Collection::Submissions(student_id));
        }
        Ok(result)
    }

    async fn create_student_document(
        &self,
        student_id: Uuid,
        title: &str,
        link: &str,
    ) -> PortResult<StudentDocument> {
        let document = StudentDocument {
            id: Uuid::new_v4(),
            student_id,
            title: title.to_string(),
            link: link.to_string(),
            uploaded_at: Utc::now(),
        };
        self.tables
            .write()
            .await
            .student_documents
            .push(document.clone());
        self.notify(Collection::StudentDocuments(student_id));
        Ok(document)
    }

    async fn list_student_documents(&self, student_id: Uuid) -> PortResult<Vec<StudentDocument>> {
        Ok(self
            .tables
            .read()
            .await
            .student_documents
            .iter()
            .filter(|d| d.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn create_admin_document(
        &self,
        student: &Profile,
        title: &str,
        link: &str,
    ) -> PortResult<AdminDocument> {
        let document = AdminDocument {
            id: Uuid::new_v4(),
            student_id: student.id,
            student_name: student.name.clone(),
            student_email: student.email.clone(),
            title: title.to_string(),
            link: link.to_string(),
            uploaded_at: Utc::now(),
        };
        self.tables
            .write()
            .await
            .admin_documents
            .push(document.clone());
        self.notify(Collection::AdminDocuments);
        Ok(document)
    }

    async fn list_admin_documents(&self) -> PortResult<Vec<AdminDocument>> {
        Ok(self.tables.read().await.admin_documents.clone())
    }

    async fn create_notification(
        &self,
        student_id: Uuid,
        message: &str,
    ) -> PortResult<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            student_id,
            message: message.to_string(),
            created_at: Utc::now(),
        };
        self.tables
            .write()
            .await
            .notifications
            .push(notification.clone());
        self.notify(Collection::Notifications(student_id));
        Ok(notification)
    }

    async fn list_notifications(&self, student_id: Uuid) -> PortResult<Vec<Notification>> {
        Ok(self
            .tables
            .read()
            .await
            .notifications
            .iter()
            .filter(|n| n.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn watch(&self, collection: Collection) -> PortResult<ChangeStream> {
        Ok(signals_for(self.changes.subscribe(), collection))
    }
}

//=========================================================================================
// `ObjectStorage` Implementation
//=========================================================================================

#[async_trait]
impl ObjectStorage for InMemoryBackend {
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> PortResult<ObjectHandle> {
        self.tables
            .write()
            .await
            .objects
            .insert(path.to_string(), (bytes, content_type.to_string()));
        Ok(ObjectHandle {
            path: path.to_string(),
        })
    }

    async fn url(&self, handle: &ObjectHandle) -> PortResult<String> {
        if !self.tables.read().await.objects.contains_key(&handle.path) {
            return Err(PortError::NotFound(format!("Object {} not found", handle.path)));
        }
        Ok(format!("memory://{}", handle.path))
    }
}
