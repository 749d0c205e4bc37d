//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DocumentStore` and `AuthService` ports from the `core` crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use onboarding_core::access::{hash_password, verify_password};
use onboarding_core::domain::{
    AdminDocument, Answers, AuthSession, Grade, Identity, Mcq, Module, NewModule, Notification,
    Profile, Role, StudentDocument, Submission, WriteOutcome,
};
use onboarding_core::ports::{
    AuthService, ChangeStream, Collection, DocumentStore, IdentityStream, PortError, PortResult,
};
use onboarding_core::session::{identity_stream, AuthEventBus};
use sqlx::postgres::PgListener;
use sqlx::{FromRow, PgPool};
use tracing::{error, info};
use uuid::Uuid;

/// The NOTIFY channel the schema triggers publish collection keys on.
const CHANGES_CHANNEL: &str = "portal_changes";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DocumentStore` and `AuthService` ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
    auth_events: AuthEventBus,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            auth_events: AuthEventBus::default(),
        }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn db_error_code(e: &sqlx::Error) -> Option<String> {
    e.as_database_error()
        .and_then(|d| d.code())
        .map(|c| c.into_owned())
}

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct AccountRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

#[derive(FromRow)]
struct IdentityRecord {
    user_id: Uuid,
    email: String,
}
impl IdentityRecord {
    fn to_domain(self) -> Identity {
        Identity {
            id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct ProfileRecord {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    completed_modules: Vec<Uuid>,
    created_at: DateTime<Utc>,
}
impl ProfileRecord {
    fn to_domain(self) -> PortResult<Profile> {
        let role = self
            .role
            .parse::<Role>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Profile {
            id: self.id,
            name: self.name,
            email: self.email,
            role,
            completed_modules: self.completed_modules.into_iter().collect(),
            created_at: self.created_at,
        })
    }
}

const PROFILE_COLUMNS: &str = "id, name, email, role, completed_modules, created_at";

#[derive(FromRow)]
struct ModuleRecord {
    id: Uuid,
    title: String,
    description: String,
    video: Option<String>,
    image: Option<String>,
    mcq_question: Option<String>,
    mcq_options: Option<Vec<String>>,
    mcq_correct_answer: Option<String>,
    essay: Option<String>,
    created_at: DateTime<Utc>,
}
impl ModuleRecord {
    fn to_domain(self) -> Module {
        let mcq = match (self.mcq_question, self.mcq_options) {
            (Some(question), Some(options)) => {
                <[String; 4]>::try_from(options).ok().map(|options| Mcq {
                    question,
                    options,
                    correct_answer: self.mcq_correct_answer.unwrap_or_default(),
                })
            }
            _ => None,
        };
        Module {
            id: self.id,
            title: self.title,
            description: self.description,
            video: self.video,
            image: self.image,
            mcq,
            essay: self.essay,
            created_at: self.created_at,
        }
    }
}

const MODULE_COLUMNS: &str = "id, title, description, video, image, mcq_question, mcq_options, \
                              mcq_correct_answer, essay, created_at";

#[derive(FromRow)]
struct SubmissionRecord {
    student_id: Uuid,
    module_id: Uuid,
    mcq_answer: Option<String>,
    essay_answer: Option<String>,
    submitted_at: DateTime<Utc>,
}
impl SubmissionRecord {
    fn to_domain(self) -> Submission {
        Submission {
            student_id: self.student_id,
            module_id: self.module_id,
            answers: Answers {
                mcq_answer: self.mcq_answer,
                essay_answer: self.essay_answer,
            },
            submitted_at: self.submitted_at,
        }
    }
}

#[derive(FromRow)]
struct GradeRecord {
    score: String,
    feedback: Option<String>,
    graded_at: DateTime<Utc>,
}
impl GradeRecord {
    fn to_domain(self) -> Grade {
        Grade {
            score: self.score,
            feedback: self.feedback,
            graded_at: self.graded_at,
        }
    }
}

#[derive(FromRow)]
struct StudentDocumentRecord {
    id: Uuid,
    student_id: Uuid,
    title: String,
    link: String,
    uploaded_at: DateTime<Utc>,
}
impl StudentDocumentRecord {
    fn to_domain(self) -> StudentDocument {
        StudentDocument {
            id: self.id,
            student_id: self.student_id,
            title: self.title,
            link: self.link,
            uploaded_at: self.uploaded_at,
        }
    }
}

#[derive(FromRow)]
struct AdminDocumentRecord {
    id: Uuid,
    student_id: Uuid,
    student_name: String,
    student_email: String,
    title: String,
    link: String,
    uploaded_at: DateTime<Utc>,
}
impl AdminDocumentRecord {
    fn to_domain(self) -> AdminDocument {
        AdminDocument {
            id: self.id,
            student_id: self.student_id,
            student_name: self.student_name,
            student_email: self.student_email,
            title: self.title,
            link: self.link,
            uploaded_at: self.uploaded_at,
        }
    }
}

#[derive(FromRow)]
struct NotificationRecord {
    id: Uuid,
    student_id: Uuid,
    message: String,
    created_at: DateTime<Utc>,
}
impl NotificationRecord {
    fn to_domain(self) -> Notification {
        Notification {
            id: self.id,
            student_id: self.student_id,
            message: self.message,
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// `AuthService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthService for DbAdapter {
    async fn sign_up(&self, email: &str, password: &str) -> PortResult<Identity> {
        let hashed_password = hash_password(password)?;
        let record = sqlx::query_as::<_, IdentityRecord>(
            "INSERT INTO accounts (user_id, email, hashed_password) VALUES ($1, $2, $3) \
             RETURNING user_id, email",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(&hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match db_error_code(&e).as_deref() {
            Some(UNIQUE_VIOLATION) => PortError::Conflict(format!("{email} is already registered")),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn sign_in(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        let account = sqlx::query_as::<_, AccountRecord>(
            "SELECT user_id, email, hashed_password FROM accounts WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)?;

        if !verify_password(password, &account.hashed_password)? {
            return Err(PortError::Unauthorized);
        }

        let token = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + Duration::days(30);
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&token)
            .bind(account.user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        let identity = Identity {
            id: account.user_id,
            email: account.email,
        };
        self.auth_events.publish(&token, Some(identity.clone()));
        Ok(AuthSession {
            token,
            identity,
            expires_at,
        })
    }

    async fn identity_for_token(&self, token: &str) -> PortResult<Identity> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            "SELECT a.user_id, a.email FROM auth_sessions s \
             JOIN accounts a ON a.user_id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > now()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)?;
        Ok(record.to_domain())
    }

    async fn sign_out(&self, token: &str) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() > 0 {
            self.auth_events.publish(token, None);
        }
        Ok(())
    }

    async fn identity_changes(&self, token: &str) -> IdentityStream {
        let receiver = self.auth_events.subscribe();
        let current = match self.identity_for_token(token).await {
            Ok(identity) => Some(identity),
            Err(PortError::Unauthorized) => None,
            Err(e) => {
                error!("Failed to resolve auth session: {:?}", e);
                None
            }
        };
        identity_stream(receiver, token, current)
    }
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for DbAdapter {
    async fn get_profile(&self, id: Uuid) -> PortResult<Profile> {
        sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("Profile {} not found", id)))?
        .to_domain()
    }

    async fn create_profile(
        &self,
        identity: &Identity,
        name: &str,
        role: Role,
    ) -> PortResult<Profile> {
        sqlx::query_as::<_, ProfileRecord>(&format!(
            "INSERT INTO profiles (id, name, email, role) VALUES ($1, $2, $3, $4) \
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(identity.id)
        .bind(name)
        .bind(&identity.email)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match db_error_code(&e).as_deref() {
            Some(UNIQUE_VIOLATION) => {
                PortError::Conflict(format!("Profile {} already exists", identity.id))
            }
            _ => unexpected(e),
        })?
        .to_domain()
    }

    async fn list_profiles(&self) -> PortResult<Vec<Profile>> {
        sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(ProfileRecord::to_domain)
        .collect()
    }

    async fn add_completed_module(&self, student_id: Uuid, module_id: Uuid) -> PortResult<()> {
        sqlx::query(
            "UPDATE profiles SET completed_modules = array_append(completed_modules, $2) \
             WHERE id = $1 AND NOT ($2 = ANY(completed_modules))",
        )
        .bind(student_id)
        .bind(module_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        // Zero rows is either "already present" or "no such profile".
        self.get_profile(student_id).await.map(|_| ())
    }

    async fn list_modules(&self) -> PortResult<Vec<Module>> {
        let records = sqlx::query_as::<_, ModuleRecord>(&format!(
            "SELECT {MODULE_COLUMNS} FROM modules ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(ModuleRecord::to_domain).collect())
    }

    async fn get_module(&self, id: Uuid) -> PortResult<Module> {
        let record = sqlx::query_as::<_, ModuleRecord>(&format!(
            "SELECT {MODULE_COLUMNS} FROM modules WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("Module {} not found", id)))?;
        Ok(record.to_domain())
    }

    async fn create_module(&self, module: NewModule) -> PortResult<Module> {
        let (question, options, correct_answer) = match module.mcq {
            Some(mcq) => (
                Some(mcq.question),
                Some(mcq.options.to_vec()),
                Some(mcq.correct_answer),
            ),
            None => (None, None, None),
        };
        let record = sqlx::query_as::<_, ModuleRecord>(&format!(
            "INSERT INTO modules (id, title, description, video, image, mcq_question, \
             mcq_options, mcq_correct_answer, essay) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {MODULE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&module.title)
        .bind(&module.description)
        .bind(&module.video)
        .bind(&module.image)
        .bind(question)
        .bind(options)
        .bind(correct_answer)
        .bind(&module.essay)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        info!("Created module {} ({})", record.id, record.title);
        Ok(record.to_domain())
    }

    async fn delete_module(&self, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM modules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Module {} not found", id)));
        }
        Ok(())
    }

    async fn list_submissions(&self, student_id: Uuid) -> PortResult<Vec<Submission>> {
        let records = sqlx::query_as::<_, SubmissionRecord>(
            "SELECT student_id, module_id, mcq_answer, essay_answer, submitted_at \
             FROM submissions WHERE student_id = $1 ORDER BY submitted_at ASC",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(SubmissionRecord::to_domain).collect())
    }

    async fn get_submission(
        &self,
        student_id: Uuid,
        module_id: Uuid,
    ) -> PortResult<Option<Submission>> {
        let record = sqlx::query_as::<_, SubmissionRecord>(
            "SELECT student_id, module_id, mcq_answer, essay_answer, submitted_at \
             FROM submissions WHERE student_id = $1 AND module_id = $2",
        )
        .bind(student_id)
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(SubmissionRecord::to_domain))
    }

    async fn create_submission(
        &self,
        student_id: Uuid,
        module_id: Uuid,
        answers: Answers,
    ) -> PortResult<(WriteOutcome, Submission)> {
        let inserted = sqlx::query_as::<_, SubmissionRecord>(
            "INSERT INTO submissions (student_id, module_id, mcq_answer, essay_answer) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (student_id, module_id) DO NOTHING \
             RETURNING student_id, module_id, mcq_answer, essay_answer, submitted_at",
        )
        .bind(student_id)
        .bind(module_id)
        .bind(&answers.mcq_answer)
        .bind(&answers.essay_answer)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        match inserted {
            Some(record) => Ok((WriteOutcome::Created, record.to_domain())),
            None => {
                let existing = self
                    .get_submission(student_id, module_id)
                    .await?
                    .ok_or_else(|| {
                        PortError::Unexpected("Submission vanished after conflict".to_string())
                    })?;
                Ok((WriteOutcome::AlreadyExists, existing))
            }
        }
    }

    async fn get_grade(&self, student_id: Uuid, module_id: Uuid) -> PortResult<Option<Grade>> {
        let record = sqlx::query_as::<_, GradeRecord>(
            "SELECT score, feedback, graded_at FROM grades \
             WHERE student_id = $1 AND module_id = $2",
        )
        .bind(student_id)
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(GradeRecord::to_domain))
    }

    async fn create_grade(
        &self,
        student_id: Uuid,
        module_id: Uuid,
        score: &str,
        feedback: Option<&str>,
    ) -> PortResult<(WriteOutcome, Grade)> {
        let inserted = sqlx::query_as::<_, GradeRecord>(
            "INSERT INTO grades (student_id, module_id, score, feedback) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (student_id, module_id) DO NOTHING \
             RETURNING score, feedback, graded_at",
        )
        .bind(student_id)
        .bind(module_id)
        .bind(score)
        .bind(feedback)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match db_error_code(&e).as_deref() {
            Some(FOREIGN_KEY_VIOLATION) => {
                PortError::NotFound(format!("Submission for module {} not found", module_id))
            }
            _ => unexpected(e),
        })?;

        match inserted {
            Some(record) => Ok((WriteOutcome::Created, record.to_domain())),
            None => {
                let existing = self.get_grade(student_id, module_id).await?.ok_or_else(|| {
                    PortError::Unexpected("Grade vanished after conflict".to_string())
                })?;
                Ok((WriteOutcome::AlreadyExists, existing))
            }
        }
    }

    async fn create_student_document(
        &self,
        student_id: Uuid,
        title: &str,
        link: &str,
    ) -> PortResult<StudentDocument> {
        let record = sqlx::query_as::<_, StudentDocumentRecord>(
            "INSERT INTO student_documents (id, student_id, title, link) VALUES ($1, $2, $3, $4) \
             RETURNING id, student_id, title, link, uploaded_at",
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(title)
        .bind(link)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_student_documents(&self, student_id: Uuid) -> PortResult<Vec<StudentDocument>> {
        let records = sqlx::query_as::<_, StudentDocumentRecord>(
            "SELECT id, student_id, title, link, uploaded_at FROM student_documents \
             WHERE student_id = $1 ORDER BY uploaded_at ASC",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records
            .into_iter()
            .map(StudentDocumentRecord::to_domain)
            .collect())
    }

    async fn create_admin_document(
        &self,
        student: &Profile,
        title: &str,
        link: &str,
    ) -> PortResult<AdminDocument> {
        let record = sqlx::query_as::<_, AdminDocumentRecord>(
            "INSERT INTO admin_documents (id, student_id, student_name, student_email, title, link) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, student_id, student_name, student_email, title, link, uploaded_at",
        )
        .bind(Uuid::new_v4())
        .bind(student.id)
        .bind(&student.name)
        .bind(&student.email)
        .bind(title)
        .bind(link)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_admin_documents(&self) -> PortResult<Vec<AdminDocument>> {
        let records = sqlx::query_as::<_, AdminDocumentRecord>(
            "SELECT id, student_id, student_name, student_email, title, link, uploaded_at \
             FROM admin_documents ORDER BY uploaded_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records
            .into_iter()
            .map(AdminDocumentRecord::to_domain)
            .collect())
    }

    async fn create_notification(
        &self,
        student_id: Uuid,
        message: &str,
    ) -> PortResult<Notification> {
        let record = sqlx::query_as::<_, NotificationRecord>(
            "INSERT INTO notifications (id, student_id, message) VALUES ($1, $2, $3) \
             RETURNING id, student_id, message, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(message)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_notifications(&self, student_id: Uuid) -> PortResult<Vec<Notification>> {
        let records = sqlx::query_as::<_, NotificationRecord>(
            "SELECT id, student_id, message, created_at FROM notifications \
             WHERE student_id = $1 ORDER BY created_at ASC",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records
            .into_iter()
            .map(NotificationRecord::to_domain)
            .collect())
    }

    async fn watch(&self, collection: Collection) -> PortResult<ChangeStream> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(unexpected)?;
        listener.listen(CHANGES_CHANNEL).await.map_err(unexpected)?;

        Ok(Box::pin(async_stream::stream! {
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        if Collection::from_channel_key(notification.payload()) == Some(collection) {
                            yield Ok(());
                        }
                    }
                    Err(e) => {
                        error!("Change listener for {} failed: {:?}", collection, e);
                        yield Err(unexpected(e));
                        break;
                    }
                }
            }
        }))
    }
}
