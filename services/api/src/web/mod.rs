pub mod admin;
pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod student;
pub mod views;
pub mod ws_handler;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use onboarding_core::ports::PortError;
use std::sync::Arc;
use tracing::error;

pub use middleware::{require_admin, require_auth, require_student};
pub use rest::ApiDoc;
pub use state::AppState;
pub use ws_handler::{serve_connection, ws_handler};

/// The error half of every handler result: a status and a user-facing message.
pub type HandlerError = (StatusCode, String);

/// Logs a failed backend call and maps it to a generic response.
pub(crate) fn backend_error(context: &'static str) -> impl FnOnce(PortError) -> HandlerError {
    move |e| {
        error!("{}: {:?}", context, e);
        let status = match e {
            PortError::NotFound(_) => StatusCode::NOT_FOUND,
            PortError::Conflict(_) => StatusCode::CONFLICT,
            PortError::Unauthorized => StatusCode::UNAUTHORIZED,
            PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, context.to_string())
    }
}

/// Builds the API router. CORS, tracing and Swagger are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/routes/resolve", get(rest::resolve_route_handler));

    let student_routes = Router::new()
        .route("/student/modules", get(student::list_modules_handler))
        .route("/student/progress", get(student::progress_handler))
        .route(
            "/student/modules/{id}/submission",
            post(student::submit_handler),
        )
        .route("/student/submissions", get(student::list_submissions_handler))
        .route("/student/documents", get(student::list_documents_handler))
        .route(
            "/student/notifications",
            get(student::list_notifications_handler),
        )
        .route_layer(axum_middleware::from_fn(require_student));

    let admin_routes = Router::new()
        .route("/admin/students", get(admin::list_students_handler))
        .route(
            "/admin/modules",
            get(admin::list_modules_handler).post(admin::create_module_handler),
        )
        .route("/admin/modules/{id}", delete(admin::delete_module_handler))
        .route(
            "/admin/students/{id}/grading",
            get(admin::grading_sheet_handler),
        )
        .route(
            "/admin/students/{id}/grades/{module_id}",
            post(admin::grade_handler),
        )
        .route(
            "/admin/students/{id}/documents",
            post(admin::upload_document_handler),
        )
        .route("/admin/documents", get(admin::list_documents_handler))
        .route(
            "/admin/students/{id}/notifications",
            post(admin::post_notification_handler),
        )
        .route_layer(axum_middleware::from_fn(require_admin));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/me", get(rest::me_handler))
        .route("/modules/{id}", get(rest::get_module_handler))
        .route("/ws", get(ws_handler))
        .merge(student_routes)
        .merge(admin_routes)
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .with_state(app_state)
}
