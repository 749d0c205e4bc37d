//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for live dashboards and client-side route guarding.

use onboarding_core::domain::Role;
use onboarding_core::ports::Collection;
use onboarding_core::session::SessionSnapshot;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::web::views::RouteDecisionView;

//=========================================================================================
// Live Feeds
//=========================================================================================

/// The live collections a client can subscribe to.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    /// All modules in display order. Any role.
    Modules,
    /// Student profiles. Admin only.
    Students,
    /// The shared-document index. Admin only.
    AdminDocuments,
    /// The caller's submissions and grades. Student only.
    MySubmissions,
    /// Documents shared with the caller. Student only.
    MyDocuments,
    /// The caller's notifications. Student only.
    MyNotifications,
}

impl Feed {
    /// The role a caller needs to subscribe, if any.
    pub fn required_role(&self) -> Option<Role> {
        match self {
            Feed::Modules => None,
            Feed::Students | Feed::AdminDocuments => Some(Role::Admin),
            Feed::MySubmissions | Feed::MyDocuments | Feed::MyNotifications => Some(Role::Student),
        }
    }

    /// The collection this feed watches for the given caller.
    pub fn collection(&self, user_id: Uuid) -> Collection {
        match self {
            Feed::Modules => Collection::Modules,
            Feed::Students => Collection::Profiles,
            Feed::AdminDocuments => Collection::AdminDocuments,
            Feed::MySubmissions => Collection::Submissions(user_id),
            Feed::MyDocuments => Collection::StudentDocuments(user_id),
            Feed::MyNotifications => Collection::Notifications(user_id),
        }
    }
}

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Starts streaming snapshots of a feed. Re-subscribing is a no-op.
    Subscribe { feed: Feed },

    /// Stops streaming a feed.
    Unsubscribe { feed: Feed },

    /// Asks the route guard about a client path under the current session.
    ResolveRoute { path: String },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The resolved session. Sent on connect and on every change; all fields
    /// are null once signed out.
    Session {
        user_id: Option<Uuid>,
        email: Option<String>,
        role: Option<String>,
    },

    /// A full snapshot of a feed, replacing any earlier one.
    Snapshot {
        feed: Feed,
        data: serde_json::Value,
    },

    /// The route guard's answer to a `resolve_route` request.
    Route { decision: RouteDecisionView },

    /// Reports an error to the client, which should display an error message.
    Error { message: String },
}

impl ServerMessage {
    /// `None` while the session is still loading.
    pub fn session(snapshot: &SessionSnapshot) -> Option<Self> {
        match snapshot {
            SessionSnapshot::Loading => None,
            SessionSnapshot::SignedOut => Some(ServerMessage::Session {
                user_id: None,
                email: None,
                role: None,
            }),
            SessionSnapshot::SignedIn { identity, role } => Some(ServerMessage::Session {
                user_id: Some(identity.id),
                email: Some(identity.email.clone()),
                role: Some(role.as_str().to_string()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onboarding_core::domain::Identity;

    #[test]
    fn client_messages_use_a_type_tag() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"subscribe","feed":"my_notifications"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Subscribe {
                feed: Feed::MyNotifications
            }
        );
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"resolve_route","path":"/iMATE/login"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::ResolveRoute {
                path: "/iMATE/login".to_string()
            }
        );
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"subscribe","feed":"x"}"#).is_err());
    }

    #[test]
    fn session_messages_follow_the_snapshot() {
        assert!(ServerMessage::session(&SessionSnapshot::Loading).is_none());

        let signed_out = ServerMessage::session(&SessionSnapshot::SignedOut).unwrap();
        assert_eq!(
            serde_json::to_value(&signed_out).unwrap(),
            serde_json::json!({"type": "session", "user_id": null, "email": null, "role": null})
        );

        let id = Uuid::new_v4();
        let signed_in = ServerMessage::session(&SessionSnapshot::SignedIn {
            identity: Identity {
                id,
                email: "ana@slu.edu".to_string(),
            },
            role: Role::Student,
        })
        .unwrap();
        let json = serde_json::to_value(&signed_in).unwrap();
        assert_eq!(json["role"], "student");
        assert_eq!(json["user_id"], id.to_string());
    }

    #[test]
    fn feeds_are_scoped_by_role() {
        assert_eq!(Feed::Modules.required_role(), None);
        assert_eq!(Feed::Students.required_role(), Some(Role::Admin));
        assert_eq!(Feed::MyDocuments.required_role(), Some(Role::Student));
        let me = Uuid::new_v4();
        assert_eq!(Feed::MySubmissions.collection(me), Collection::Submissions(me));
    }
}
