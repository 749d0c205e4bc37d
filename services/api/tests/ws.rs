use axum::extract::ws::Message;
use axum::http::StatusCode;
use common::{TestApp, ADMIN_EMAIL};
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::{SinkExt, StreamExt};
use onboarding_core::ports::{AuthService, DocumentStore, PortError};
use portal_api::web::{serve_connection, state::CurrentUser};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::task::JoinHandle;

mod common;

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(200);

/// One socket connection driven over in-process channels.
struct Client {
    token: String,
    outgoing: UnboundedSender<Result<Message, axum::Error>>,
    incoming: UnboundedReceiver<Message>,
    connection: JoinHandle<()>,
}

impl Client {
    async fn connect(app: &TestApp, cookie: &str) -> Self {
        let token = cookie.trim_start_matches("session=").to_string();
        let identity = app.backend.identity_for_token(&token).await.unwrap();
        let profile = app.backend.get_profile(identity.id).await.unwrap();

        let (outgoing, server_incoming) = mpsc::unbounded();
        let (server_outgoing, incoming) = mpsc::unbounded::<Message>();
        let connection = tokio::spawn(serve_connection(
            server_outgoing.sink_map_err(axum::Error::new),
            server_incoming,
            app.state.clone(),
            CurrentUser {
                token: token.clone(),
                profile,
            },
        ));
        Self {
            token,
            outgoing,
            incoming,
            connection,
        }
    }

    fn send(&self, message: Value) {
        self.outgoing
            .unbounded_send(Ok(Message::Text(message.to_string().into())))
            .unwrap();
    }

    /// The next server message with the given `type`, skipping any others.
    async fn next_of(&mut self, kind: &str) -> Value {
        let incoming = &mut self.incoming;
        tokio::time::timeout(WAIT, async {
            loop {
                match incoming.next().await {
                    Some(Message::Text(text)) => {
                        let value: Value = serde_json::from_str(text.as_str()).unwrap();
                        if value["type"] == kind {
                            return value;
                        }
                    }
                    Some(_) => {}
                    None => panic!("connection closed while waiting for {kind}"),
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("no {kind} message arrived"))
    }

    /// Everything the server sends until it goes quiet.
    async fn drain(&mut self) -> Vec<Value> {
        let mut messages = Vec::new();
        while let Ok(Some(message)) = tokio::time::timeout(QUIET, self.incoming.next()).await {
            if let Message::Text(text) = message {
                messages.push(serde_json::from_str(text.as_str()).unwrap());
            }
        }
        messages
    }

    /// Drops the client half and waits for the server to finish cleaning up.
    async fn disconnect(self) -> String {
        let Client {
            token,
            outgoing,
            incoming,
            connection,
        } = self;
        drop(outgoing);
        tokio::time::timeout(WAIT, connection).await.unwrap().unwrap();
        drop(incoming);
        token
    }
}

fn snapshots(messages: &[Value], feed: &str) -> usize {
    messages
        .iter()
        .filter(|m| m["type"] == "snapshot" && m["feed"] == feed)
        .count()
}

#[tokio::test]
async fn session_is_announced_on_connect() {
    let app = TestApp::new();
    let cookie = app.signup("Ana", "ana@slu.edu").await;
    let mut client = Client::connect(&app, &cookie).await;

    let session = client.next_of("session").await;
    assert_eq!(session["email"], "ana@slu.edu");
    assert_eq!(session["role"], "student");
}

#[tokio::test]
async fn admin_feeds_are_refused_to_students() {
    let app = TestApp::new();
    let cookie = app.signup("Ana", "ana@slu.edu").await;
    let mut client = Client::connect(&app, &cookie).await;

    client.send(json!({"type": "subscribe", "feed": "students"}));
    let refused = client.next_of("error").await;
    assert_eq!(refused["message"], "This feed is not available to your role.");

    client.send(json!({"type": "subscribe", "feed": "my_notifications"}));
    let snapshot = client.next_of("snapshot").await;
    assert_eq!(snapshot["feed"], "my_notifications");
    assert_eq!(snapshot["data"], json!([]));

    let later = client.drain().await;
    assert_eq!(snapshots(&later, "students"), 0);
}

#[tokio::test]
async fn admins_see_the_roster_change_live() {
    let app = TestApp::new();
    let admin = app.signup("Dean", ADMIN_EMAIL).await;
    app.signup("Ana", "ana@slu.edu").await;
    let mut client = Client::connect(&app, &admin).await;

    client.send(json!({"type": "subscribe", "feed": "students"}));
    let first = client.next_of("snapshot").await;
    assert_eq!(first["data"].as_array().unwrap().len(), 1);
    assert_eq!(first["data"][0]["email"], "ana@slu.edu");

    app.signup("Ben", "ben@slu.edu").await;
    let second = client.next_of("snapshot").await;
    assert_eq!(second["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn subscribing_twice_keeps_a_single_feed() {
    let app = TestApp::new();
    let student = app.signup("Ana", "ana@slu.edu").await;
    let admin = app.signup("Dean", ADMIN_EMAIL).await;
    let me = app.get("/me", Some(&student)).await;
    let student_id = common::user_id(&me.body["profile"]);
    let mut client = Client::connect(&app, &student).await;

    client.send(json!({"type": "subscribe", "feed": "my_notifications"}));
    client.send(json!({"type": "subscribe", "feed": "my_notifications"}));
    assert_eq!(snapshots(&client.drain().await, "my_notifications"), 1);

    app.post(
        &format!("/admin/students/{student_id}/notifications"),
        Some(&admin),
        json!({"message": "Orientation on Monday"}),
    )
    .await;
    let updates = client.drain().await;
    assert_eq!(snapshots(&updates, "my_notifications"), 1);
    let update = updates.iter().find(|m| m["type"] == "snapshot").unwrap();
    assert_eq!(update["data"][0]["message"], "Orientation on Monday");
}

#[tokio::test]
async fn routes_resolve_against_the_socket_session() {
    let app = TestApp::new();
    let cookie = app.signup("Ana", "ana@slu.edu").await;
    let mut client = Client::connect(&app, &cookie).await;
    client.next_of("session").await;

    client.send(json!({"type": "resolve_route", "path": "/iMATE/login"}));
    let route = client.next_of("route").await;
    assert_eq!(
        route["decision"],
        json!({"kind": "redirect", "to": "/iMATE/student-dashboard"})
    );

    client.send(json!({"type": "resolve_route", "path": "/iMATE/admin-dashboard"}));
    let route = client.next_of("route").await;
    assert_eq!(
        route["decision"],
        json!({"kind": "redirect", "to": "/iMATE/login"})
    );
}

#[tokio::test]
async fn signing_out_stops_live_feeds() {
    let app = TestApp::new();
    let student = app.signup("Ana", "ana@slu.edu").await;
    let admin = app.signup("Dean", ADMIN_EMAIL).await;
    let me = app.get("/me", Some(&student)).await;
    let student_id = common::user_id(&me.body["profile"]);
    let mut client = Client::connect(&app, &student).await;
    client.next_of("session").await;

    client.send(json!({"type": "subscribe", "feed": "my_notifications"}));
    client.next_of("snapshot").await;

    let logout = app.post("/auth/logout", Some(&student), json!({})).await;
    assert_eq!(logout.status, StatusCode::OK);
    let session = client.next_of("session").await;
    assert!(session["user_id"].is_null());
    tokio::time::sleep(Duration::from_millis(50)).await;

    app.post(
        &format!("/admin/students/{student_id}/notifications"),
        Some(&admin),
        json!({"message": "Bring your passport"}),
    )
    .await;
    assert_eq!(snapshots(&client.drain().await, "my_notifications"), 0);

    client.send(json!({"type": "subscribe", "feed": "my_notifications"}));
    let refused = client.next_of("error").await;
    assert_eq!(refused["message"], "Not signed in.");
}

#[tokio::test]
async fn disconnecting_signs_the_session_out() {
    let app = TestApp::new();
    let cookie = app.signup("Ana", "ana@slu.edu").await;
    let mut client = Client::connect(&app, &cookie).await;
    client.next_of("session").await;

    let token = client.disconnect().await;
    assert!(matches!(
        app.backend.identity_for_token(&token).await,
        Err(PortError::Unauthorized)
    ));
    assert_eq!(app.get("/me", Some(&cookie)).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_messages_get_an_error_reply() {
    let app = TestApp::new();
    let cookie = app.signup("Ana", "ana@slu.edu").await;
    let mut client = Client::connect(&app, &cookie).await;

    client.send(json!({"type": "shout"}));
    let error = client.next_of("error").await;
    assert_eq!(error["message"], "Unrecognised message.");
}
