#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use onboarding_core::domain::{Module, NewModule};
use onboarding_core::memory::InMemoryBackend;
use onboarding_core::ports::DocumentStore;
use portal_api::config::Config;
use portal_api::web::{self, AppState};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "dean@slu.edu";
pub const PASSWORD: &str = "correct horse";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub backend: Arc<InMemoryBackend>,
}

pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        let vars: HashMap<String, String> =
            [("ADMIN_EMAILS".to_string(), ADMIN_EMAIL.to_string())].into();
        let config = Arc::new(Config::from_vars(vars).unwrap());
        let backend = Arc::new(InMemoryBackend::new());
        let state = Arc::new(AppState::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            config,
        ));
        Self {
            router: web::router(state.clone()),
            state,
            backend,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Response {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        self.send(request(Method::GET, uri, cookie, None)).await
    }

    pub async fn post(&self, uri: &str, cookie: Option<&str>, body: Value) -> Response {
        self.send(request(Method::POST, uri, cookie, Some(body))).await
    }

    /// Signs up through the API and returns the session cookie.
    pub async fn signup(&self, name: &str, email: &str) -> String {
        let response = self
            .post(
                "/auth/signup",
                None,
                json!({"name": name, "email": email, "password": PASSWORD}),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        session_cookie(&response.headers)
    }

    pub async fn module(&self, title: &str) -> Module {
        self.backend
            .create_module(NewModule {
                title: title.to_string(),
                description: format!("About {title}"),
                video: None,
                image: None,
                mcq: None,
                essay: Some("What did you learn?".to_string()),
            })
            .await
            .unwrap()
    }
}

pub fn request(method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Extracts `session=<token>` from a `Set-Cookie` header.
pub fn session_cookie(headers: &HeaderMap) -> String {
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("response sets a cookie");
    set_cookie
        .split(';')
        .next()
        .expect("cookie has a value")
        .to_string()
}

pub fn user_id(profile: &Value) -> String {
    profile["id"].as_str().expect("profile id").to_string()
}
