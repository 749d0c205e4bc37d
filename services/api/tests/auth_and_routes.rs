use axum::http::StatusCode;
use common::{TestApp, ADMIN_EMAIL, PASSWORD};
use onboarding_core::domain::Role;
use onboarding_core::ports::{AuthService, DocumentStore, PortError};
use serde_json::json;

mod common;

async fn resolve(app: &TestApp, path: &str, cookie: Option<&str>) -> serde_json::Value {
    let response = app
        .get(&format!("/routes/resolve?path={path}"), cookie)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    response.body
}

#[tokio::test]
async fn foreign_domains_are_rejected_before_any_backend_call() {
    let app = TestApp::new();

    let signup = app
        .post(
            "/auth/signup",
            None,
            json!({"name": "Eve", "email": "eve@gmail.com", "password": PASSWORD}),
        )
        .await;
    assert_eq!(signup.status, StatusCode::BAD_REQUEST);
    assert_eq!(signup.body, "Only @slu.edu emails are allowed.");

    // Nothing reached the auth backend.
    assert!(matches!(
        app.backend.sign_in("eve@gmail.com", PASSWORD).await,
        Err(PortError::Unauthorized)
    ));

    let login = app
        .post(
            "/auth/login",
            None,
            json!({"email": "eve@slu.edu.evil.com", "password": PASSWORD}),
        )
        .await;
    assert_eq!(login.status, StatusCode::BAD_REQUEST);
    assert_eq!(login.body, "Only @slu.edu emails are allowed.");
}

#[tokio::test]
async fn signup_assigns_the_role_once_and_signs_in() {
    let app = TestApp::new();

    let student = app
        .post(
            "/auth/signup",
            None,
            json!({"name": "Ana", "email": "Ana@SLU.edu", "password": PASSWORD}),
        )
        .await;
    assert_eq!(student.status, StatusCode::CREATED);
    assert_eq!(student.body["role"], "student");
    assert_eq!(student.body["email"], "ana@slu.edu");
    assert_eq!(student.body["redirect"], "/iMATE/student-dashboard");

    let admin = app
        .post(
            "/auth/signup",
            None,
            json!({"name": "Dean", "email": ADMIN_EMAIL, "password": PASSWORD}),
        )
        .await;
    assert_eq!(admin.body["role"], "admin");
    assert_eq!(admin.body["redirect"], "/iMATE/admin-dashboard");

    let cookie = common::session_cookie(&admin.headers);
    let me = app.get("/me", Some(&cookie)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["profile"]["name"], "Dean");
    assert_eq!(me.body["dashboard"], "/iMATE/admin-dashboard");

    let again = app
        .post(
            "/auth/signup",
            None,
            json!({"name": "Ana", "email": "ana@slu.edu", "password": PASSWORD}),
        )
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn signup_requires_name_and_password() {
    let app = TestApp::new();
    let response = app
        .post(
            "/auth/signup",
            None,
            json!({"name": "  ", "email": "ana@slu.edu", "password": PASSWORD}),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body, "Name is required.");
}

#[tokio::test]
async fn login_returns_the_role_dashboard() {
    let app = TestApp::new();
    app.signup("Ana", "ana@slu.edu").await;

    let wrong = app
        .post(
            "/auth/login",
            None,
            json!({"email": "ana@slu.edu", "password": "nope"}),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let login = app
        .post(
            "/auth/login",
            None,
            json!({"email": "ana@slu.edu", "password": PASSWORD}),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.body["redirect"], "/iMATE/student-dashboard");
    let cookie = common::session_cookie(&login.headers);
    assert_eq!(
        resolve(&app, "/iMATE/login", Some(&cookie)).await,
        json!({"kind": "redirect", "to": "/iMATE/student-dashboard"})
    );
}

#[tokio::test]
async fn identity_without_profile_is_treated_as_signed_out() {
    let app = TestApp::new();
    app.backend.sign_up("ghost@slu.edu", PASSWORD).await.unwrap();
    let session = app.backend.sign_in("ghost@slu.edu", PASSWORD).await.unwrap();
    let cookie = format!("session={}", session.token);

    assert_eq!(
        resolve(&app, "/iMATE/student-dashboard", Some(&cookie)).await,
        json!({"kind": "redirect", "to": "/iMATE/login"})
    );
    assert_eq!(
        resolve(&app, "/iMATE/login", Some(&cookie)).await,
        json!({"kind": "render", "view": "login"})
    );
    assert_eq!(app.get("/me", Some(&cookie)).await.status, StatusCode::UNAUTHORIZED);

    let login = app
        .post(
            "/auth/login",
            None,
            json!({"email": "ghost@slu.edu", "password": PASSWORD}),
        )
        .await;
    assert_eq!(login.status, StatusCode::NOT_FOUND);
    assert_eq!(login.body, "User data not found.");
    assert!(login.headers.get("set-cookie").is_none());
}

#[tokio::test]
async fn route_guard_policy_over_http() {
    let app = TestApp::new();
    let student = app.signup("Ana", "ana@slu.edu").await;
    let admin = app.signup("Dean", ADMIN_EMAIL).await;

    assert_eq!(
        resolve(&app, "/iMATE/admin-dashboard", None).await,
        json!({"kind": "redirect", "to": "/iMATE/login"})
    );
    assert_eq!(
        resolve(&app, "/iMATE/", None).await,
        json!({"kind": "redirect", "to": "/iMATE/home"})
    );
    assert_eq!(
        resolve(&app, "/iMATE/nowhere", None).await,
        json!({"kind": "not_found"})
    );
    assert_eq!(
        resolve(&app, "/iMATE/about", Some(&admin)).await,
        json!({"kind": "render", "view": "about"})
    );
    assert_eq!(
        resolve(&app, "/iMATE/modules/abc", Some(&admin)).await,
        json!({"kind": "redirect", "to": "/iMATE/login"})
    );
    assert_eq!(
        resolve(&app, "/iMATE/modules/abc", Some(&student)).await,
        json!({"kind": "render", "view": "module_detail", "module_id": "abc"})
    );
    assert_eq!(
        resolve(&app, "/iMATE/admin-dashboard", Some(&student)).await,
        json!({"kind": "redirect", "to": "/iMATE/login"})
    );
}

#[tokio::test]
async fn role_scoped_routes_are_enforced() {
    let app = TestApp::new();
    let student = app.signup("Ana", "ana@slu.edu").await;
    let admin = app.signup("Dean", ADMIN_EMAIL).await;

    assert_eq!(app.get("/student/modules", None).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        app.get("/admin/students", Some(&student)).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.get("/student/modules", Some(&admin)).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(app.get("/admin/students", Some(&admin)).await.status, StatusCode::OK);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::new();
    let cookie = app.signup("Ana", "ana@slu.edu").await;
    assert_eq!(app.get("/me", Some(&cookie)).await.status, StatusCode::OK);

    let logout = app.post("/auth/logout", Some(&cookie), json!({})).await;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(common::session_cookie(&logout.headers), "session=");
    assert_eq!(app.get("/me", Some(&cookie)).await.status, StatusCode::UNAUTHORIZED);

    let profile = app
        .backend
        .list_profiles()
        .await
        .unwrap()
        .into_iter()
        .find(|p| p.email == "ana@slu.edu")
        .unwrap();
    assert_eq!(profile.role, Role::Student);
}
