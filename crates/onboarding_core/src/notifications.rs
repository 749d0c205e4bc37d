//! crates/onboarding_core/src/notifications.rs

use uuid::Uuid;

use crate::domain::Notification;
use crate::ports::{DocumentStore, PortResult};

/// Newest first. Equal timestamps keep store order.
pub fn newest_first(mut notifications: Vec<Notification>) -> Vec<Notification> {
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    notifications
}

pub async fn feed(store: &dyn DocumentStore, student_id: Uuid) -> PortResult<Vec<Notification>> {
    Ok(newest_first(store.list_notifications(student_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn note(message: &str, minutes_ago: i64) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            student_id: Uuid::nil(),
            message: message.to_string(),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn sorts_most_recent_first() {
        let sorted = newest_first(vec![note("old", 30), note("new", 1), note("mid", 10)]);
        let messages: Vec<_> = sorted.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, ["new", "mid", "old"]);
    }
}
