//! crates/onboarding_core/src/directory.rs
//!
//! Module ordering and linear progression gating.
//!
//! Modules carry no explicit position. Their order is derived from the first
//! integer found in the title ("Module 3: Housing" sorts as 3), and a module
//! only unlocks once the one before it has been graded.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::domain::{Grade, GradedSubmission, Module};

fn digits() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"[0-9]+").expect("static regex is valid"))
}

/// The first integer in a title, or 0 when there is none.
pub fn display_order_token(title: &str) -> u64 {
    match digits().find(title) {
        Some(m) => m.as_str().parse().unwrap_or(u64::MAX),
        None => 0,
    }
}

/// Stable ascending sort by display token.
pub fn order_modules(mut modules: Vec<Module>) -> Vec<Module> {
    modules.sort_by_key(|m| display_order_token(&m.title));
    modules
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleStatus {
    NotSubmitted,
    AwaitingGrade,
    Graded(String),
}

impl ModuleStatus {
    pub fn label(&self) -> String {
        match self {
            ModuleStatus::NotSubmitted => "You haven't submitted this module yet.".to_string(),
            ModuleStatus::AwaitingGrade => "Grader will grade your submission soon".to_string(),
            ModuleStatus::Graded(score) => format!("Graded: {score}"),
        }
    }
}

/// One card of a student's module list.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub module: Module,
    pub position: usize,
    pub locked: bool,
    pub status: ModuleStatus,
}

/// Annotates the modules with lock state and submission status for one student.
///
/// Position `i` is locked unless `i == 0` or the module at `i - 1` has a grade.
pub fn student_directory(
    modules: Vec<Module>,
    submissions: &[GradedSubmission],
) -> Vec<DirectoryEntry> {
    let by_module: HashMap<Uuid, Option<&Grade>> = submissions
        .iter()
        .map(|s| (s.submission.module_id, s.grade.as_ref()))
        .collect();

    let mut previous_graded = true;
    order_modules(modules)
        .into_iter()
        .enumerate()
        .map(|(position, module)| {
            let status = match by_module.get(&module.id) {
                None => ModuleStatus::NotSubmitted,
                Some(None) => ModuleStatus::AwaitingGrade,
                Some(Some(grade)) => ModuleStatus::Graded(grade.score.clone()),
            };
            let locked = position > 0 && !previous_graded;
            previous_graded = matches!(status, ModuleStatus::Graded(_));
            DirectoryEntry {
                module,
                position,
                locked,
                status,
            }
        })
        .collect()
}

/// Whether the module is open to the student, given their graded submissions.
/// Unknown modules count as locked.
pub fn is_unlocked(module_id: Uuid, modules: Vec<Module>, submissions: &[GradedSubmission]) -> bool {
    student_directory(modules, submissions)
        .iter()
        .find(|e| e.module.id == module_id)
        .map(|e| !e.locked)
        .unwrap_or(false)
}

/// Completion percentage, capped at 100.
pub fn progress_percent(completed: usize, total: usize) -> f64 {
    let total = total.max(1);
    ((completed as f64 / total as f64) * 100.0).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Answers, Submission};
    use chrono::Utc;

    fn module(title: &str) -> Module {
        Module {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            video: None,
            image: None,
            mcq: None,
            essay: None,
            created_at: Utc::now(),
        }
    }

    fn submitted(module: &Module, score: Option<&str>) -> GradedSubmission {
        GradedSubmission {
            submission: Submission {
                student_id: Uuid::nil(),
                module_id: module.id,
                answers: Answers::default(),
                submitted_at: Utc::now(),
            },
            grade: score.map(|s| Grade {
                score: s.to_string(),
                feedback: None,
                graded_at: Utc::now(),
            }),
        }
    }

    #[test]
    fn token_is_first_integer_or_zero() {
        assert_eq!(display_order_token("Module 12: Visas 2024"), 12);
        assert_eq!(display_order_token("Welcome"), 0);
        assert_eq!(display_order_token(""), 0);
        assert_eq!(display_order_token("Part007"), 7);
        assert_eq!(display_order_token("Module 99999999999999999999999"), u64::MAX);
    }

    #[test]
    fn ordering_is_stable_and_untitled_first() {
        let ordered = order_modules(vec![
            module("Module 3"),
            module("Intro"),
            module("Module 1"),
            module("Orientation"),
            module("Module 2"),
        ]);
        let titles: Vec<_> = ordered.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(
            titles,
            ["Intro", "Orientation", "Module 1", "Module 2", "Module 3"]
        );
    }

    #[test]
    fn only_first_module_open_without_grades() {
        let modules = vec![module("Module 1"), module("Module 2"), module("Module 3")];
        let entries = student_directory(modules, &[]);
        let locks: Vec<_> = entries.iter().map(|e| e.locked).collect();
        assert_eq!(locks, [false, true, true]);
    }

    #[test]
    fn submission_without_grade_keeps_next_locked() {
        let m1 = module("Module 1");
        let m2 = module("Module 2");
        let subs = vec![submitted(&m1, None), submitted(&m2, Some("9/10"))];
        let entries = student_directory(vec![m2.clone(), m1.clone()], &subs);
        assert_eq!(entries[0].status, ModuleStatus::AwaitingGrade);
        assert!(!entries[0].locked);
        // Graded out of order, but still gated on Module 1.
        assert!(entries[1].locked);
        assert!(!is_unlocked(m2.id, vec![m1, m2.clone()], &subs));
    }

    #[test]
    fn grading_unlocks_the_next_position() {
        let m1 = module("Module 1");
        let m2 = module("Module 2");
        let m3 = module("Module 3");
        let subs = vec![submitted(&m1, Some("8/10"))];
        let entries = student_directory(vec![m1.clone(), m2.clone(), m3], &subs);
        assert_eq!(entries[0].status.label(), "Graded: 8/10");
        assert!(!entries[1].locked);
        assert!(entries[2].locked);
    }

    #[test]
    fn unknown_module_is_locked() {
        assert!(!is_unlocked(Uuid::new_v4(), vec![module("Module 1")], &[]));
    }

    #[test]
    fn progress_is_capped() {
        assert_eq!(progress_percent(0, 0), 0.0);
        assert_eq!(progress_percent(1, 4), 25.0);
        assert_eq!(progress_percent(5, 4), 100.0);
    }
}
