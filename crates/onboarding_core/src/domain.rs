//! crates/onboarding_core/src/domain.rs
//!
//! Defines the pure, core data structures for the portal.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// An authenticated user as seen by the auth boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

/// A browser login session handed out by the auth boundary.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }

    /// The dashboard a user of this role lands on after login.
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::Student => "/student-dashboard",
            Role::Admin => "/admin-dashboard",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// The role-and-identity record associated with one authenticated user.
#[derive(Debug, Clone)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub completed_modules: BTreeSet<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A multiple-choice question attached to a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mcq {
    pub question: String,
    pub options: [String; 4],
    pub correct_answer: String,
}

/// A unit of learning content, optionally bundled with a quiz and/or essay prompt.
#[derive(Debug, Clone)]
pub struct Module {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub video: Option<String>,
    pub image: Option<String>,
    pub mcq: Option<Mcq>,
    pub essay: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The fields an admin supplies when creating a module. The image is already
/// resolved to a retrievable URL at this point.
#[derive(Debug, Clone)]
pub struct NewModule {
    pub title: String,
    pub description: String,
    pub video: Option<String>,
    pub image: Option<String>,
    pub mcq: Option<Mcq>,
    pub essay: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answers {
    pub mcq_answer: Option<String>,
    pub essay_answer: Option<String>,
}

/// A student's recorded answers for one module.
#[derive(Debug, Clone)]
pub struct Submission {
    pub student_id: Uuid,
    pub module_id: Uuid,
    pub answers: Answers,
    pub submitted_at: DateTime<Utc>,
}

/// An admin-authored evaluation of one submission. Write-once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grade {
    pub score: String,
    pub feedback: Option<String>,
    pub graded_at: DateTime<Utc>,
}

/// A submission joined with its (optional) grade.
#[derive(Debug, Clone)]
pub struct GradedSubmission {
    pub submission: Submission,
    pub grade: Option<Grade>,
}

/// A document an admin shared with one student.
#[derive(Debug, Clone)]
pub struct StudentDocument {
    pub id: Uuid,
    pub student_id: Uuid,
    pub title: String,
    pub link: String,
    pub uploaded_at: DateTime<Utc>,
}

/// The admin-facing mirror of a shared document, denormalised with the
/// student's name and email.
#[derive(Debug, Clone)]
pub struct AdminDocument {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub student_email: String,
    pub title: String,
    pub link: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub student_id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a conditional (insert-if-absent) write at the storage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    AlreadyExists,
}
