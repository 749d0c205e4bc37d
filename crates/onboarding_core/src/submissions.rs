//! crates/onboarding_core/src/submissions.rs
//!
//! The per-student submission store: one response per module, joined with
//! its grade for display.

use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::directory::is_unlocked;
use crate::domain::{Answers, GradedSubmission, Submission, WriteOutcome};
use crate::ports::{DocumentStore, PortResult};

#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Created(Submission),
    /// A submission already exists; nothing was written.
    AlreadySubmitted(Submission),
    /// The module is locked for this student (or does not exist); nothing was written.
    Locked,
}

/// Every submission of one student, each joined with its grade.
pub async fn graded_submissions(
    store: &dyn DocumentStore,
    student_id: Uuid,
) -> PortResult<Vec<GradedSubmission>> {
    let submissions = store.list_submissions(student_id).await?;
    let mut graded = Vec::with_capacity(submissions.len());
    for submission in submissions {
        let grade = store.get_grade(student_id, submission.module_id).await?;
        graded.push(GradedSubmission { submission, grade });
    }
    Ok(graded)
}

/// The same join keyed by module id.
pub async fn graded_by_module(
    store: &dyn DocumentStore,
    student_id: Uuid,
) -> PortResult<HashMap<Uuid, GradedSubmission>> {
    Ok(graded_submissions(store, student_id)
        .await?
        .into_iter()
        .map(|g| (g.submission.module_id, g))
        .collect())
}

/// Records a student's answers for a module, at most once.
pub async fn submit(
    store: &dyn DocumentStore,
    student_id: Uuid,
    module_id: Uuid,
    answers: Answers,
) -> PortResult<SubmitOutcome> {
    if let Some(existing) = store.get_submission(student_id, module_id).await? {
        return Ok(SubmitOutcome::AlreadySubmitted(existing));
    }

    let modules = store.list_modules().await?;
    let graded = graded_submissions(store, student_id).await?;
    if !is_unlocked(module_id, modules, &graded) {
        info!("Ignoring submission for locked module {}", module_id);
        return Ok(SubmitOutcome::Locked);
    }

    let (outcome, submission) = store
        .create_submission(student_id, module_id, answers)
        .await?;
    Ok(match outcome {
        WriteOutcome::Created => {
            info!("Student {} submitted module {}", student_id, module_id);
            SubmitOutcome::Created(submission)
        }
        WriteOutcome::AlreadyExists => SubmitOutcome::AlreadySubmitted(submission),
    })
}
