//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers shared by every role and the master
//! definition for the OpenAPI specification.

use crate::web::{
    admin, auth,
    middleware::session_token,
    state::{AppState, CurrentUser},
    student,
    views::{
        AdminDocumentView, DirectoryEntryView, GradeView, GradedSubmissionView, GradingRowView,
        McqView, ModuleView, NotificationView, ProfileView, ProgressView, RosterEntryView,
        RouteDecisionView, StudentDocumentView, SubmissionView,
    },
    HandlerError,
};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    Extension,
};
use onboarding_core::ports::PortError;
use onboarding_core::session;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        resolve_route_handler,
        me_handler,
        get_module_handler,
        student::list_modules_handler,
        student::progress_handler,
        student::submit_handler,
        student::list_submissions_handler,
        student::list_documents_handler,
        student::list_notifications_handler,
        admin::list_students_handler,
        admin::list_modules_handler,
        admin::create_module_handler,
        admin::delete_module_handler,
        admin::grading_sheet_handler,
        admin::grade_handler,
        admin::upload_document_handler,
        admin::list_documents_handler,
        admin::post_notification_handler,
    ),
    components(
        schemas(
            auth::SignupRequest, auth::LoginRequest, auth::AuthResponse,
            MeResponse, RouteDecisionView, ProfileView, ModuleView, McqView,
            DirectoryEntryView, ProgressView, SubmissionView, GradeView,
            GradedSubmissionView, StudentDocumentView, AdminDocumentView,
            NotificationView, RosterEntryView, GradingRowView,
            student::SubmitRequest, student::SubmitResponse,
            admin::GradeRequest, admin::GradeResponse,
            admin::DocumentRequest, admin::DocumentResponse,
            admin::NotificationRequest,
        )
    ),
    tags(
        (name = "Onboarding Portal API", description = "API endpoints for the student onboarding portal.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ResolveQuery {
    /// The client path to evaluate, including the base path.
    pub path: String,
}

#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    pub profile: ProfileView,
    pub dashboard: String,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Evaluate the route guard for a client path and the caller's session.
///
/// The session cookie is optional; without one the caller is signed out.
#[utoipa::path(
    get,
    path = "/routes/resolve",
    params(ResolveQuery),
    responses(
        (status = 200, description = "The guard's decision", body = RouteDecisionView)
    )
)]
pub async fn resolve_route_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ResolveQuery>,
) -> Json<RouteDecisionView> {
    let identity = match session_token(&headers) {
        Some(token) => match state.auth.identity_for_token(token).await {
            Ok(identity) => Some(identity),
            Err(PortError::Unauthorized) => None,
            Err(e) => {
                error!("Failed to validate auth session: {:?}", e);
                None
            }
        },
        None => None,
    };
    let snapshot = session::resolve(state.store.as_ref(), identity).await;
    Json(state.guard.guard(&query.path, &snapshot).into())
}

/// The caller's profile and dashboard.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "The signed-in profile", body = MeResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Json<MeResponse> {
    Json(MeResponse {
        profile: ProfileView::from(&user.profile),
        dashboard: state.guard.href(user.profile.role.dashboard_path()),
    })
}

/// A single module with its content and questions.
#[utoipa::path(
    get,
    path = "/modules/{id}",
    params(("id" = Uuid, Path, description = "The module ID.")),
    responses(
        (status = 200, description = "The module", body = ModuleView),
        (status = 404, description = "No such module")
    )
)]
pub async fn get_module_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ModuleView>, HandlerError> {
    match state.store.get_module(id).await {
        Ok(module) => Ok(Json(ModuleView::from(&module))),
        Err(PortError::NotFound(_)) => {
            Err((StatusCode::NOT_FOUND, "Module not found".to_string()))
        }
        Err(e) => {
            error!("Failed to load module {}: {:?}", id, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load module".to_string(),
            ))
        }
    }
}
