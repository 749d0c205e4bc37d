//! services/api/src/web/student.rs
//!
//! Handlers behind the student dashboard. Every route here runs after
//! `require_auth` and `require_student`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use onboarding_core::directory::student_directory;
use onboarding_core::domain::Answers;
use onboarding_core::notifications;
use onboarding_core::submissions::{graded_submissions, submit, SubmitOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::state::{AppState, CurrentUser};
use crate::web::views::{
    DirectoryEntryView, GradedSubmissionView, NotificationView, ProgressView,
    StudentDocumentView, SubmissionView,
};
use crate::web::{backend_error, HandlerError};

#[derive(Deserialize, ToSchema, Default)]
pub struct SubmitRequest {
    pub mcq_answer: Option<String>,
    pub essay_answer: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SubmitResponse {
    /// `created`, `already_submitted` or `locked`.
    pub outcome: String,
    pub submission: Option<SubmissionView>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// The caller's module list in display order, with lock and grade status.
#[utoipa::path(
    get,
    path = "/student/modules",
    responses((status = 200, description = "Module directory", body = [DirectoryEntryView]))
)]
pub async fn list_modules_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<DirectoryEntryView>>, HandlerError> {
    let store = state.store.as_ref();
    let modules = store
        .list_modules()
        .await
        .map_err(backend_error("Failed to load modules"))?;
    let graded = graded_submissions(store, user.profile.id)
        .await
        .map_err(backend_error("Failed to load submissions"))?;
    Ok(Json(
        student_directory(modules, &graded)
            .iter()
            .map(DirectoryEntryView::from)
            .collect(),
    ))
}

/// Graded submissions over the total number of modules.
#[utoipa::path(
    get,
    path = "/student/progress",
    responses((status = 200, description = "Completion progress", body = ProgressView))
)]
pub async fn progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ProgressView>, HandlerError> {
    let store = state.store.as_ref();
    let total = store
        .list_modules()
        .await
        .map_err(backend_error("Failed to load modules"))?
        .len();
    let graded = graded_submissions(store, user.profile.id)
        .await
        .map_err(backend_error("Failed to load submissions"))?
        .iter()
        .filter(|g| g.grade.is_some())
        .count();
    Ok(Json(ProgressView::new(graded, total)))
}

/// Submit answers for a module. Only the first submission is kept.
#[utoipa::path(
    post,
    path = "/student/modules/{id}/submission",
    params(("id" = Uuid, Path, description = "The module ID.")),
    request_body = SubmitRequest,
    responses(
        (status = 201, description = "Submission recorded", body = SubmitResponse),
        (status = 200, description = "Nothing written: already submitted or module locked", body = SubmitResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn submit_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(module_id): Path<Uuid>,
    Json(req): Json<SubmitRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let answers = Answers {
        mcq_answer: non_blank(req.mcq_answer),
        essay_answer: non_blank(req.essay_answer),
    };
    let outcome = submit(state.store.as_ref(), user.profile.id, module_id, answers)
        .await
        .map_err(backend_error("Failed to submit"))?;

    let (status, outcome, submission) = match outcome {
        SubmitOutcome::Created(s) => (StatusCode::CREATED, "created", Some(s)),
        SubmitOutcome::AlreadySubmitted(s) => (StatusCode::OK, "already_submitted", Some(s)),
        SubmitOutcome::Locked => (StatusCode::OK, "locked", None),
    };
    Ok((
        status,
        Json(SubmitResponse {
            outcome: outcome.to_string(),
            submission: submission.as_ref().map(SubmissionView::from),
        }),
    ))
}

/// The caller's submissions, each with its grade once graded.
#[utoipa::path(
    get,
    path = "/student/submissions",
    responses((status = 200, description = "Submissions", body = [GradedSubmissionView]))
)]
pub async fn list_submissions_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<GradedSubmissionView>>, HandlerError> {
    let graded = graded_submissions(state.store.as_ref(), user.profile.id)
        .await
        .map_err(backend_error("Failed to load submissions"))?;
    Ok(Json(graded.iter().map(GradedSubmissionView::from).collect()))
}

/// Documents shared with the caller.
#[utoipa::path(
    get,
    path = "/student/documents",
    responses((status = 200, description = "Documents", body = [StudentDocumentView]))
)]
pub async fn list_documents_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<StudentDocumentView>>, HandlerError> {
    let documents = state
        .store
        .list_student_documents(user.profile.id)
        .await
        .map_err(backend_error("Failed to load documents"))?;
    Ok(Json(documents.iter().map(StudentDocumentView::from).collect()))
}

/// The caller's notifications, newest first.
#[utoipa::path(
    get,
    path = "/student/notifications",
    responses((status = 200, description = "Notifications", body = [NotificationView]))
)]
pub async fn list_notifications_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<NotificationView>>, HandlerError> {
    let feed = notifications::feed(state.store.as_ref(), user.profile.id)
        .await
        .map_err(backend_error("Failed to load notifications"))?;
    Ok(Json(feed.iter().map(NotificationView::from).collect()))
}
