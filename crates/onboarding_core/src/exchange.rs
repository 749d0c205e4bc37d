//! crates/onboarding_core/src/exchange.rs
//!
//! Document exchange: an admin shares a (title, link) pair with one student.
//! The document is written to the student's own collection and mirrored into
//! the admin index as two separate writes; nothing ties them together.

use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{AdminDocument, Role, StudentDocument};
use crate::ports::{DocumentStore, PortError, PortResult};

#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Uploaded {
        document: StudentDocument,
        mirror: AdminDocument,
    },
    /// Missing title/link or no such student; nothing was written.
    Skipped,
}

pub async fn upload(
    store: &dyn DocumentStore,
    student_id: Uuid,
    title: &str,
    link: &str,
) -> PortResult<UploadOutcome> {
    let (title, link) = (title.trim(), link.trim());
    if title.is_empty() || link.is_empty() {
        return Ok(UploadOutcome::Skipped);
    }
    let student = match store.get_profile(student_id).await {
        Ok(profile) if profile.role == Role::Student => profile,
        Ok(_) | Err(PortError::NotFound(_)) => return Ok(UploadOutcome::Skipped),
        Err(e) => return Err(e),
    };

    let document = store
        .create_student_document(student.id, title, link)
        .await?;
    let mirror = store
        .create_admin_document(&student, title, link)
        .await
        .inspect_err(|e| {
            error!(
                "Document {} stored for student {} but its admin mirror failed: {:?}",
                document.id, student.id, e
            )
        })?;

    info!("Shared document '{}' with student {}", title, student.id);
    Ok(UploadOutcome::Uploaded { document, mirror })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Identity;
    use crate::memory::InMemoryBackend;

    async fn profile(store: &InMemoryBackend, role: Role) -> Uuid {
        let identity = Identity {
            id: Uuid::new_v4(),
            email: "kim@slu.edu".to_string(),
        };
        store.create_profile(&identity, "Kim", role).await.unwrap();
        identity.id
    }

    #[tokio::test]
    async fn writes_student_copy_and_admin_mirror() {
        let store = InMemoryBackend::new();
        let sid = profile(&store, Role::Student).await;

        let outcome = upload(&store, sid, "I-20", "https://docs/i20.pdf").await.unwrap();
        let UploadOutcome::Uploaded { mirror, .. } = outcome else {
            panic!("expected upload");
        };
        assert_eq!(mirror.student_name, "Kim");
        assert_eq!(mirror.student_email, "kim@slu.edu");

        let docs = store.list_student_documents(sid).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].link, "https://docs/i20.pdf");
        assert_eq!(store.list_admin_documents().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn skips_incomplete_forms_and_unknown_students() {
        let store = InMemoryBackend::new();
        let sid = profile(&store, Role::Student).await;
        let admin = profile(&store, Role::Admin).await;

        for (student, title, link) in [
            (sid, "", "https://x"),
            (sid, "Visa", "   "),
            (Uuid::new_v4(), "Visa", "https://x"),
            (admin, "Visa", "https://x"),
        ] {
            assert!(matches!(
                upload(&store, student, title, link).await.unwrap(),
                UploadOutcome::Skipped
            ));
        }
        assert!(store.list_admin_documents().await.unwrap().is_empty());
    }
}
