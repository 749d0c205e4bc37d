//! services/api/src/web/views.rs
//!
//! JSON shapes returned by the REST API and carried in WebSocket snapshots.

use chrono::{DateTime, Utc};
use onboarding_core::directory::{progress_percent, DirectoryEntry};
use onboarding_core::domain::{
    AdminDocument, Grade, GradedSubmission, Module, Notification, Profile, StudentDocument,
    Submission,
};
use onboarding_core::feed::FeedSnapshot;
use onboarding_core::grading::GradingRow;
use onboarding_core::routing::{RouteDecision, View};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct ProfileView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub completed_modules: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<&Profile> for ProfileView {
    fn from(p: &Profile) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            email: p.email.clone(),
            role: p.role.as_str().to_string(),
            completed_modules: p.completed_modules.iter().copied().collect(),
            created_at: p.created_at,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct McqView {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct ModuleView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub video: Option<String>,
    pub image: Option<String>,
    pub mcq: Option<McqView>,
    pub essay: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Module> for ModuleView {
    fn from(m: &Module) -> Self {
        Self {
            id: m.id,
            title: m.title.clone(),
            description: m.description.clone(),
            video: m.video.clone(),
            image: m.image.clone(),
            mcq: m.mcq.as_ref().map(|mcq| McqView {
                question: mcq.question.clone(),
                options: mcq.options.to_vec(),
                correct_answer: mcq.correct_answer.clone(),
            }),
            essay: m.essay.clone(),
            created_at: m.created_at,
        }
    }
}

/// One module card on the student dashboard.
#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct DirectoryEntryView {
    pub module: ModuleView,
    pub position: usize,
    pub locked: bool,
    /// `not_submitted`, `awaiting_grade` or `graded`.
    pub status: String,
    pub status_label: String,
}

impl From<&DirectoryEntry> for DirectoryEntryView {
    fn from(e: &DirectoryEntry) -> Self {
        use onboarding_core::directory::ModuleStatus;
        let status = match e.status {
            ModuleStatus::NotSubmitted => "not_submitted",
            ModuleStatus::AwaitingGrade => "awaiting_grade",
            ModuleStatus::Graded(_) => "graded",
        };
        Self {
            module: ModuleView::from(&e.module),
            position: e.position,
            locked: e.locked,
            status: status.to_string(),
            status_label: e.status.label(),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct SubmissionView {
    pub student_id: Uuid,
    pub module_id: Uuid,
    pub mcq_answer: Option<String>,
    pub essay_answer: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl From<&Submission> for SubmissionView {
    fn from(s: &Submission) -> Self {
        Self {
            student_id: s.student_id,
            module_id: s.module_id,
            mcq_answer: s.answers.mcq_answer.clone(),
            essay_answer: s.answers.essay_answer.clone(),
            submitted_at: s.submitted_at,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct GradeView {
    pub score: String,
    pub feedback: Option<String>,
    pub graded_at: DateTime<Utc>,
}

impl From<&Grade> for GradeView {
    fn from(g: &Grade) -> Self {
        Self {
            score: g.score.clone(),
            feedback: g.feedback.clone(),
            graded_at: g.graded_at,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct GradedSubmissionView {
    pub submission: SubmissionView,
    pub grade: Option<GradeView>,
}

impl From<&GradedSubmission> for GradedSubmissionView {
    fn from(g: &GradedSubmission) -> Self {
        Self {
            submission: SubmissionView::from(&g.submission),
            grade: g.grade.as_ref().map(GradeView::from),
        }
    }
}

/// One row of an admin's grading sheet for a student.
#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct GradingRowView {
    pub label: String,
    pub module: Option<ModuleView>,
    pub submission: SubmissionView,
    pub grade: Option<GradeView>,
}

impl From<&GradingRow> for GradingRowView {
    fn from(r: &GradingRow) -> Self {
        Self {
            label: r.label(),
            module: r.module.as_ref().map(ModuleView::from),
            submission: SubmissionView::from(&r.submission),
            grade: r.grade.as_ref().map(GradeView::from),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct StudentDocumentView {
    pub id: Uuid,
    pub student_id: Uuid,
    pub title: String,
    pub link: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<&StudentDocument> for StudentDocumentView {
    fn from(d: &StudentDocument) -> Self {
        Self {
            id: d.id,
            student_id: d.student_id,
            title: d.title.clone(),
            link: d.link.clone(),
            uploaded_at: d.uploaded_at,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct AdminDocumentView {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub student_email: String,
    pub title: String,
    pub link: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<&AdminDocument> for AdminDocumentView {
    fn from(d: &AdminDocument) -> Self {
        Self {
            id: d.id,
            student_id: d.student_id,
            student_name: d.student_name.clone(),
            student_email: d.student_email.clone(),
            title: d.title.clone(),
            link: d.link.clone(),
            uploaded_at: d.uploaded_at,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct NotificationView {
    pub id: Uuid,
    pub student_id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Notification> for NotificationView {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            student_id: n.student_id,
            message: n.message.clone(),
            created_at: n.created_at,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct ProgressView {
    pub completed: usize,
    pub total: usize,
    pub percent: f64,
}

impl ProgressView {
    pub fn new(completed: usize, total: usize) -> Self {
        Self {
            completed,
            total,
            percent: progress_percent(completed, total),
        }
    }
}

/// A student on the admin roster with their completion progress.
#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct RosterEntryView {
    pub student: ProfileView,
    pub progress: ProgressView,
}

impl RosterEntryView {
    pub fn new(student: &Profile, total_modules: usize) -> Self {
        Self {
            student: ProfileView::from(student),
            progress: ProgressView::new(student.completed_modules.len(), total_modules),
        }
    }
}

/// The route guard's answer for one client path.
#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteDecisionView {
    Render {
        view: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        module_id: Option<String>,
    },
    Redirect {
        to: String,
    },
    NotFound,
}

impl From<RouteDecision> for RouteDecisionView {
    fn from(decision: RouteDecision) -> Self {
        match decision {
            RouteDecision::Render(view) => {
                let (name, module_id) = match view {
                    View::Loading => ("loading", None),
                    View::Home => ("home", None),
                    View::About => ("about", None),
                    View::Login => ("login", None),
                    View::Signup => ("signup", None),
                    View::StudentDashboard => ("student_dashboard", None),
                    View::AdminDashboard => ("admin_dashboard", None),
                    View::ModuleDetail(id) => ("module_detail", Some(id)),
                };
                RouteDecisionView::Render {
                    view: name.to_string(),
                    module_id,
                }
            }
            RouteDecision::Redirect(to) => RouteDecisionView::Redirect { to },
            RouteDecision::NotFound => RouteDecisionView::NotFound,
        }
    }
}

/// Serialises a feed snapshot as the JSON array the client renders.
pub fn snapshot_data(snapshot: &FeedSnapshot) -> serde_json::Result<serde_json::Value> {
    match snapshot {
        FeedSnapshot::Students(ps) => {
            serde_json::to_value(ps.iter().map(ProfileView::from).collect::<Vec<_>>())
        }
        FeedSnapshot::Modules(ms) => {
            serde_json::to_value(ms.iter().map(ModuleView::from).collect::<Vec<_>>())
        }
        FeedSnapshot::AdminDocuments(ds) => {
            serde_json::to_value(ds.iter().map(AdminDocumentView::from).collect::<Vec<_>>())
        }
        FeedSnapshot::Submissions(gs) => {
            serde_json::to_value(gs.iter().map(GradedSubmissionView::from).collect::<Vec<_>>())
        }
        FeedSnapshot::StudentDocuments(ds) => {
            serde_json::to_value(ds.iter().map(StudentDocumentView::from).collect::<Vec<_>>())
        }
        FeedSnapshot::Notifications(ns) => {
            serde_json::to_value(ns.iter().map(NotificationView::from).collect::<Vec<_>>())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_decisions_serialise_with_a_kind_tag() {
        let render = RouteDecisionView::from(RouteDecision::Render(View::ModuleDetail(
            "abc".to_string(),
        )));
        assert_eq!(
            serde_json::to_value(&render).unwrap(),
            serde_json::json!({"kind": "render", "view": "module_detail", "module_id": "abc"})
        );

        let redirect = RouteDecisionView::from(RouteDecision::Redirect("/iMATE/login".into()));
        assert_eq!(
            serde_json::to_value(&redirect).unwrap(),
            serde_json::json!({"kind": "redirect", "to": "/iMATE/login"})
        );

        let home = RouteDecisionView::from(RouteDecision::Render(View::Home));
        assert_eq!(
            serde_json::to_value(&home).unwrap(),
            serde_json::json!({"kind": "render", "view": "home"})
        );
        assert_eq!(
            serde_json::to_value(RouteDecisionView::NotFound).unwrap(),
            serde_json::json!({"kind": "not_found"})
        );
    }

    #[test]
    fn progress_is_capped() {
        let p = ProgressView::new(5, 4);
        assert_eq!(p.percent, 100.0);
        assert_eq!(ProgressView::new(0, 0).percent, 0.0);
    }
}
