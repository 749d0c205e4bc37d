//! services/api/src/web/admin.rs
//!
//! Handlers behind the admin dashboard: module authoring, the student roster,
//! grading, document sharing and notifications. Every route here runs after
//! `require_auth` and `require_admin`.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use bytes::Bytes;
use chrono::Utc;
use onboarding_core::directory::order_modules;
use onboarding_core::domain::{Mcq, NewModule, Role};
use onboarding_core::exchange::{self, UploadOutcome};
use onboarding_core::grading::{self, GradingError};
use onboarding_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::state::AppState;
use crate::web::views::{
    AdminDocumentView, GradeView, GradingRowView, ModuleView, NotificationView, RosterEntryView,
    StudentDocumentView,
};
use crate::web::{backend_error, HandlerError};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct GradeRequest {
    pub score: String,
    pub feedback: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct GradeResponse {
    /// `graded` or `already_graded`.
    pub outcome: String,
    pub message: Option<String>,
    pub grade: GradeView,
}

#[derive(Deserialize, ToSchema)]
pub struct DocumentRequest {
    pub title: String,
    pub link: String,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentResponse {
    /// `uploaded` or `skipped`.
    pub outcome: String,
    pub document: Option<StudentDocumentView>,
}

#[derive(Deserialize, ToSchema)]
pub struct NotificationRequest {
    pub message: String,
}

//=========================================================================================
// Roster & Modules
//=========================================================================================

/// Every student with their completion progress.
#[utoipa::path(
    get,
    path = "/admin/students",
    responses((status = 200, description = "Student roster", body = [RosterEntryView]))
)]
pub async fn list_students_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RosterEntryView>>, HandlerError> {
    let total = state
        .store
        .list_modules()
        .await
        .map_err(backend_error("Failed to load modules"))?
        .len();
    let profiles = state
        .store
        .list_profiles()
        .await
        .map_err(backend_error("Failed to load students"))?;
    Ok(Json(
        profiles
            .iter()
            .filter(|p| p.role == Role::Student)
            .map(|p| RosterEntryView::new(p, total))
            .collect(),
    ))
}

/// All modules in display order.
#[utoipa::path(
    get,
    path = "/admin/modules",
    responses((status = 200, description = "Modules", body = [ModuleView]))
)]
pub async fn list_modules_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ModuleView>>, HandlerError> {
    let modules = state
        .store
        .list_modules()
        .await
        .map_err(backend_error("Failed to load modules"))?;
    Ok(Json(order_modules(modules).iter().map(ModuleView::from).collect()))
}

/// Create a module from a multipart form.
///
/// Text parts: `title`, `description`, `video`, `essay`, `mcq_question`,
/// `mcq_option1` to `mcq_option4`, `mcq_correct_answer`. An optional `image`
/// file part is uploaded to object storage.
#[utoipa::path(
    post,
    path = "/admin/modules",
    request_body(content_type = "multipart/form-data", description = "The module form."),
    responses(
        (status = 201, description = "Module created", body = ModuleView),
        (status = 400, description = "Missing title or description"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_module_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut image: Option<(String, String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let file_name = field.file_name().unwrap_or("image").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field.bytes().await.map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("Failed to read image bytes: {}", e),
                )
            })?;
            if !data.is_empty() {
                image = Some((file_name, content_type, data));
            }
        } else {
            let text = field.text().await.map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("Failed to read field {}: {}", name, e),
                )
            })?;
            fields.insert(name, text.trim().to_string());
        }
    }

    let mut take = |name: &str| fields.remove(name).filter(|v| !v.is_empty());
    let (Some(title), Some(description)) = (take("title"), take("description")) else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Title and description are required.".to_string(),
        ));
    };
    let mcq = take("mcq_question").map(|question| Mcq {
        question,
        options: [
            take("mcq_option1").unwrap_or_default(),
            take("mcq_option2").unwrap_or_default(),
            take("mcq_option3").unwrap_or_default(),
            take("mcq_option4").unwrap_or_default(),
        ],
        correct_answer: take("mcq_correct_answer").unwrap_or_default(),
    });
    let video = take("video");
    let essay = take("essay");

    let image = match image {
        Some((file_name, content_type, data)) => {
            let path = format!("moduleImages/{}_{}", Utc::now().timestamp_millis(), file_name);
            let handle = state
                .objects
                .upload(&path, data, &content_type)
                .await
                .map_err(backend_error("Failed to upload image"))?;
            Some(
                state
                    .objects
                    .url(&handle)
                    .await
                    .map_err(backend_error("Failed to upload image"))?,
            )
        }
        None => None,
    };

    let module = state
        .store
        .create_module(NewModule {
            title,
            description,
            video,
            image,
            mcq,
            essay,
        })
        .await
        .map_err(backend_error("Failed to create module"))?;
    Ok((StatusCode::CREATED, Json(ModuleView::from(&module))))
}

/// Delete a module.
#[utoipa::path(
    delete,
    path = "/admin/modules/{id}",
    params(("id" = Uuid, Path, description = "The module ID.")),
    responses(
        (status = 204, description = "Module deleted"),
        (status = 404, description = "No such module")
    )
)]
pub async fn delete_module_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HandlerError> {
    state
        .store
        .delete_module(id)
        .await
        .map_err(backend_error("Failed to delete module"))?;
    info!("Deleted module {}", id);
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Grading
//=========================================================================================

/// One student's submissions with module metadata and existing grades.
#[utoipa::path(
    get,
    path = "/admin/students/{id}/grading",
    params(("id" = Uuid, Path, description = "The student ID.")),
    responses((status = 200, description = "Grading sheet", body = [GradingRowView]))
)]
pub async fn grading_sheet_handler(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<Vec<GradingRowView>>, HandlerError> {
    let rows = grading::grading_sheet(state.store.as_ref(), student_id)
        .await
        .map_err(backend_error("Failed to load grading sheet"))?;
    Ok(Json(rows.iter().map(GradingRowView::from).collect()))
}

/// Grade one submission. A grade is written once and never replaced.
#[utoipa::path(
    post,
    path = "/admin/students/{id}/grades/{module_id}",
    params(
        ("id" = Uuid, Path, description = "The student ID."),
        ("module_id" = Uuid, Path, description = "The module ID.")
    ),
    request_body = GradeRequest,
    responses(
        (status = 201, description = "Grade recorded", body = GradeResponse),
        (status = 400, description = "Enter score to submit"),
        (status = 404, description = "No submission to grade"),
        (status = 409, description = "Already graded; the existing grade is returned", body = GradeResponse)
    )
)]
pub async fn grade_handler(
    State(state): State<Arc<AppState>>,
    Path((student_id, module_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<GradeRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let result = grading::grade(
        state.store.as_ref(),
        student_id,
        module_id,
        &req.score,
        req.feedback.as_deref(),
    )
    .await;

    match result {
        Ok(grade) => Ok((
            StatusCode::CREATED,
            Json(GradeResponse {
                outcome: "graded".to_string(),
                message: None,
                grade: GradeView::from(&grade),
            }),
        )),
        Err(GradingError::AlreadyGraded(existing)) => {
            let grade = GradeView::from(&existing);
            Ok((
                StatusCode::CONFLICT,
                Json(GradeResponse {
                    outcome: "already_graded".to_string(),
                    message: Some(GradingError::AlreadyGraded(existing).to_string()),
                    grade,
                }),
            ))
        }
        Err(GradingError::MissingScore) => Err((
            StatusCode::BAD_REQUEST,
            GradingError::MissingScore.to_string(),
        )),
        Err(GradingError::NoSubmission) => Err((
            StatusCode::NOT_FOUND,
            GradingError::NoSubmission.to_string(),
        )),
        Err(GradingError::Port(e)) => Err(backend_error("Failed to save grade")(e)),
    }
}

//=========================================================================================
// Documents & Notifications
//=========================================================================================

/// Share a document link with a student.
#[utoipa::path(
    post,
    path = "/admin/students/{id}/documents",
    params(("id" = Uuid, Path, description = "The student ID.")),
    request_body = DocumentRequest,
    responses(
        (status = 201, description = "Document shared", body = DocumentResponse),
        (status = 200, description = "Nothing written: empty field or unknown student", body = DocumentResponse)
    )
)]
pub async fn upload_document_handler(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<Uuid>,
    Json(req): Json<DocumentRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let outcome = exchange::upload(state.store.as_ref(), student_id, &req.title, &req.link)
        .await
        .map_err(backend_error("Failed to upload document"))?;
    Ok(match outcome {
        UploadOutcome::Uploaded { document, .. } => (
            StatusCode::CREATED,
            Json(DocumentResponse {
                outcome: "uploaded".to_string(),
                document: Some(StudentDocumentView::from(&document)),
            }),
        ),
        UploadOutcome::Skipped => (
            StatusCode::OK,
            Json(DocumentResponse {
                outcome: "skipped".to_string(),
                document: None,
            }),
        ),
    })
}

/// Every document shared with any student.
#[utoipa::path(
    get,
    path = "/admin/documents",
    responses((status = 200, description = "Admin document index", body = [AdminDocumentView]))
)]
pub async fn list_documents_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AdminDocumentView>>, HandlerError> {
    let documents = state
        .store
        .list_admin_documents()
        .await
        .map_err(backend_error("Failed to load documents"))?;
    Ok(Json(documents.iter().map(AdminDocumentView::from).collect()))
}

/// Post a notification to a student.
#[utoipa::path(
    post,
    path = "/admin/students/{id}/notifications",
    params(("id" = Uuid, Path, description = "The student ID.")),
    request_body = NotificationRequest,
    responses(
        (status = 201, description = "Notification posted", body = NotificationView),
        (status = 400, description = "Empty message"),
        (status = 404, description = "No such student")
    )
)]
pub async fn post_notification_handler(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<Uuid>,
    Json(req): Json<NotificationRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Message is required.".to_string()));
    }
    match state.store.get_profile(student_id).await {
        Ok(profile) if profile.role == Role::Student => {}
        Ok(_) | Err(PortError::NotFound(_)) => {
            return Err((StatusCode::NOT_FOUND, "Student not found".to_string()))
        }
        Err(e) => return Err(backend_error("Failed to load student")(e)),
    }
    let notification = state
        .store
        .create_notification(student_id, message)
        .await
        .map_err(backend_error("Failed to post notification"))?;
    Ok((
        StatusCode::CREATED,
        Json(NotificationView::from(&notification)),
    ))
}
