//! crates/onboarding_core/src/grading.rs
//!
//! The admin-side grading workflow.

use tracing::{info, warn};
use uuid::Uuid;

use crate::directory::display_order_token;
use crate::domain::{Grade, Module, Submission, WriteOutcome};
use crate::ports::{DocumentStore, PortError, PortResult};
use crate::submissions::graded_submissions;

#[derive(Debug, thiserror::Error)]
pub enum GradingError {
    #[error("Enter score to submit")]
    MissingScore,
    #[error("This module has already been graded.")]
    AlreadyGraded(Grade),
    #[error("No submission to grade for this module.")]
    NoSubmission,
    #[error(transparent)]
    Port(#[from] PortError),
}

/// One row of the grading sheet for a student.
#[derive(Debug, Clone)]
pub struct GradingRow {
    pub submission: Submission,
    pub module: Option<Module>,
    pub grade: Option<Grade>,
}

impl GradingRow {
    pub fn label(&self) -> String {
        match &self.module {
            Some(module) => module.title.clone(),
            None => format!("Module ID: {}", self.submission.module_id),
        }
    }
}

/// All of one student's submissions with module metadata and any existing
/// grade, in module display order.
pub async fn grading_sheet(
    store: &dyn DocumentStore,
    student_id: Uuid,
) -> PortResult<Vec<GradingRow>> {
    let mut rows = Vec::new();
    for graded in graded_submissions(store, student_id).await? {
        let module = match store.get_module(graded.submission.module_id).await {
            Ok(module) => Some(module),
            Err(PortError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };
        rows.push(GradingRow {
            submission: graded.submission,
            module,
            grade: graded.grade,
        });
    }
    rows.sort_by_key(|row| {
        row.module
            .as_ref()
            .map(|m| display_order_token(&m.title))
            .unwrap_or(0)
    });
    Ok(rows)
}

/// Writes a grade once, then marks the module completed for the student.
/// A repeat call re-applies the completed entry before reporting the
/// existing grade.
pub async fn grade(
    store: &dyn DocumentStore,
    student_id: Uuid,
    module_id: Uuid,
    score: &str,
    feedback: Option<&str>,
) -> Result<Grade, GradingError> {
    let score = score.trim();
    if score.is_empty() {
        return Err(GradingError::MissingScore);
    }
    let feedback = feedback.map(str::trim).filter(|f| !f.is_empty());

    if let Some(existing) = store.get_grade(student_id, module_id).await? {
        // A grade without its completed entry means an earlier append failed.
        store.add_completed_module(student_id, module_id).await?;
        return Err(GradingError::AlreadyGraded(existing));
    }
    if store.get_submission(student_id, module_id).await?.is_none() {
        return Err(GradingError::NoSubmission);
    }

    let (outcome, grade) = store
        .create_grade(student_id, module_id, score, feedback)
        .await?;
    if outcome == WriteOutcome::AlreadyExists {
        warn!(
            "Concurrent grade for student {} module {} kept the first write",
            student_id, module_id
        );
        store.add_completed_module(student_id, module_id).await?;
        return Err(GradingError::AlreadyGraded(grade));
    }

    store.add_completed_module(student_id, module_id).await?;
    info!("Graded module {} for student {}: {}", module_id, student_id, score);
    Ok(grade)
}
