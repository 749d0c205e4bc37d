//! crates/onboarding_core/src/feed.rs
//!
//! Live feeds: a watched collection turned into a stream of full snapshots.
//! Every snapshot replaces the previous one; there is no diffing and no
//! backpressure beyond what the underlying change stream provides.

use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;

use crate::directory::order_modules;
use crate::domain::{
    AdminDocument, GradedSubmission, Module, Notification, Profile, Role, StudentDocument,
};
use crate::notifications::newest_first;
use crate::ports::{Collection, DocumentStore, PortResult};
use crate::submissions::graded_submissions;

#[derive(Debug, Clone)]
pub enum FeedSnapshot {
    /// Student profiles only.
    Students(Vec<Profile>),
    /// In display order.
    Modules(Vec<Module>),
    AdminDocuments(Vec<AdminDocument>),
    Submissions(Vec<GradedSubmission>),
    StudentDocuments(Vec<StudentDocument>),
    /// Newest first.
    Notifications(Vec<Notification>),
}

pub type SnapshotStream = Pin<Box<dyn Stream<Item = PortResult<FeedSnapshot>> + Send>>;

/// Reads the full current state of a collection.
pub async fn load_snapshot(
    store: &dyn DocumentStore,
    collection: Collection,
) -> PortResult<FeedSnapshot> {
    Ok(match collection {
        Collection::Profiles => FeedSnapshot::Students(
            store
                .list_profiles()
                .await?
                .into_iter()
                .filter(|p| p.role == Role::Student)
                .collect(),
        ),
        Collection::Modules => FeedSnapshot::Modules(order_modules(store.list_modules().await?)),
        Collection::AdminDocuments => {
            FeedSnapshot::AdminDocuments(store.list_admin_documents().await?)
        }
        Collection::Submissions(student) => {
            FeedSnapshot::Submissions(graded_submissions(store, student).await?)
        }
        Collection::StudentDocuments(student) => {
            FeedSnapshot::StudentDocuments(store.list_student_documents(student).await?)
        }
        Collection::Notifications(student) => {
            FeedSnapshot::Notifications(newest_first(store.list_notifications(student).await?))
        }
    })
}

/// The current snapshot, then a fresh one after every change signal.
pub async fn live_feed(
    store: Arc<dyn DocumentStore>,
    collection: Collection,
) -> PortResult<SnapshotStream> {
    // Watch first so a change landing during the initial read is not lost.
    let mut changes = store.watch(collection).await?;
    Ok(Box::pin(async_stream::stream! {
        yield load_snapshot(store.as_ref(), collection).await;
        while let Some(signal) = changes.next().await {
            match signal {
                Ok(()) => yield load_snapshot(store.as_ref(), collection).await,
                Err(e) => yield Err(e),
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Identity, NewModule};
    use crate::memory::InMemoryBackend;
    use std::time::Duration;
    use uuid::Uuid;

    async fn next(stream: &mut SnapshotStream) -> FeedSnapshot {
        tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("snapshot arrives")
            .expect("stream is open")
            .expect("snapshot loads")
    }

    fn new_module(title: &str) -> NewModule {
        NewModule {
            title: title.to_string(),
            description: "d".to_string(),
            video: None,
            image: None,
            mcq: None,
            essay: None,
        }
    }

    #[tokio::test]
    async fn module_feed_replays_full_ordered_state() {
        let store = Arc::new(InMemoryBackend::new());
        store.create_module(new_module("Module 2")).await.unwrap();
        let mut feed = live_feed(store.clone(), Collection::Modules).await.unwrap();

        let FeedSnapshot::Modules(initial) = next(&mut feed).await else {
            panic!("modules snapshot");
        };
        assert_eq!(initial.len(), 1);

        store.create_module(new_module("Module 1")).await.unwrap();
        let FeedSnapshot::Modules(updated) = next(&mut feed).await else {
            panic!("modules snapshot");
        };
        let titles: Vec<_> = updated.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, ["Module 1", "Module 2"]);
    }

    #[tokio::test]
    async fn students_feed_excludes_admins() {
        let store = Arc::new(InMemoryBackend::new());
        for (email, role) in [("s@slu.edu", Role::Student), ("a@slu.edu", Role::Admin)] {
            let identity = Identity {
                id: Uuid::new_v4(),
                email: email.to_string(),
            };
            store.create_profile(&identity, "x", role).await.unwrap();
        }
        let FeedSnapshot::Students(students) =
            load_snapshot(store.as_ref(), Collection::Profiles).await.unwrap()
        else {
            panic!("students snapshot");
        };
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].email, "s@slu.edu");
    }

    #[tokio::test]
    async fn notification_feed_is_newest_first() {
        let store = Arc::new(InMemoryBackend::new());
        let sid = Uuid::new_v4();
        let mut feed = live_feed(store.clone(), Collection::Notifications(sid))
            .await
            .unwrap();
        assert!(matches!(next(&mut feed).await, FeedSnapshot::Notifications(n) if n.is_empty()));

        store.create_notification(sid, "first").await.unwrap();
        next(&mut feed).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.create_notification(sid, "second").await.unwrap();
        let FeedSnapshot::Notifications(notes) = next(&mut feed).await else {
            panic!("notifications snapshot");
        };
        assert_eq!(notes[0].message, "second");
        assert_eq!(notes[1].message, "first");
    }
}
