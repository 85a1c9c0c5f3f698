//! Task filtering
//!
//! Pure derivation of the visible task subset. Never mutates the collection.

use crate::{Priority, Result, Status, TaskRecord};
use serde::{Deserialize, Serialize};

/// Sentinel accepted for "no restriction" on status or priority
pub const ALL: &str = "all";

/// Status, priority and free-text filter inputs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    /// `None` disables the status predicate
    pub status: Option<Status>,
    /// `None` disables the priority predicate
    pub priority: Option<Priority>,
    /// Empty disables the text predicate
    pub text: String,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a status filter, treating "all" (or empty) as no restriction
    pub fn parse_status(s: &str) -> Result<Option<Status>> {
        if s.is_empty() || s.eq_ignore_ascii_case(ALL) {
            Ok(None)
        } else {
            s.parse().map(Some)
        }
    }

    /// Parse a priority filter, treating "all" (or empty) as no restriction
    pub fn parse_priority(s: &str) -> Result<Option<Priority>> {
        if s.is_empty() || s.eq_ignore_ascii_case(ALL) {
            Ok(None)
        } else {
            s.parse().map(Some)
        }
    }

    pub fn with_status(mut self, status: Option<Status>) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: Option<Priority>) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// True when no predicate is active
    pub fn is_identity(&self) -> bool {
        self.status.is_none() && self.priority.is_none() && self.text.is_empty()
    }

    pub fn matches(&self, task: &TaskRecord) -> bool {
        self.matches_lowered(task, &self.text.to_lowercase())
    }

    /// Visible subset, in collection order
    pub fn apply<'a>(&self, tasks: &'a [TaskRecord]) -> Vec<&'a TaskRecord> {
        let needle = self.text.to_lowercase();
        tasks
            .iter()
            .filter(|task| self.matches_lowered(task, &needle))
            .collect()
    }

    /// `needle` is the search text, already lowercased
    fn matches_lowered(&self, task: &TaskRecord, needle: &str) -> bool {
        self.status.is_none_or(|s| task.status == s)
            && self.priority.is_none_or(|p| task.priority == p)
            && (needle.is_empty() || task.matches_text(needle))
    }
}

impl std::fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.status.map(|s| s.to_string());
        let priority = self.priority.map(|p| p.to_string());
        write!(
            f,
            "status={} priority={} text=\"{}\"",
            status.as_deref().unwrap_or(ALL),
            priority.as_deref().unwrap_or(ALL),
            self.text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, title: &str, status: Status, priority: Priority) -> TaskRecord {
        TaskRecord {
            status,
            priority,
            description: format!("about {}", title.to_lowercase()),
            ..TaskRecord::new(id, title)
        }
    }

    fn fixtures() -> Vec<TaskRecord> {
        vec![
            task("MAINT-001", "Schema migration", Status::InProgress, Priority::Medium),
            task("FEAT-002", "CSV support", Status::Pending, Priority::Low),
            task("OPT-003", "Report speed", Status::Pending, Priority::Low),
            task("UI-004", "Viewer", Status::InProgress, Priority::High),
            task("DOC-005", "API docs", Status::Completed, Priority::Medium),
        ]
    }

    #[test]
    fn test_identity_filter_returns_everything_in_order() {
        let tasks = fixtures();
        let filter = TaskFilter::new();
        assert!(filter.is_identity());
        let visible = filter.apply(&tasks);
        assert_eq!(visible.len(), tasks.len());
        assert!(visible.iter().zip(&tasks).all(|(a, b)| a.id == b.id));
    }

    #[test]
    fn test_apply_is_intersection_of_predicates() {
        let tasks = fixtures();
        let statuses = [None, Some(Status::Pending), Some(Status::InProgress)];
        let priorities = [None, Some(Priority::Low), Some(Priority::High)];
        let texts = ["", "o", "VIEW", "missing"];

        for status in statuses {
            for priority in priorities {
                for text in texts {
                    let filter = TaskFilter::new()
                        .with_status(status)
                        .with_priority(priority)
                        .with_text(text);
                    let expected: Vec<_> = tasks
                        .iter()
                        .filter(|t| status.is_none_or(|s| t.status == s))
                        .filter(|t| priority.is_none_or(|p| t.priority == p))
                        .filter(|t| text.is_empty() || t.matches_text(&text.to_lowercase()))
                        .map(|t| t.id.as_str())
                        .collect();
                    let got: Vec<_> = filter.apply(&tasks).iter().map(|t| t.id.as_str()).collect();
                    assert_eq!(got, expected, "{filter}");
                    let by_matches: Vec<_> = tasks
                        .iter()
                        .filter(|t| filter.matches(t))
                        .map(|t| t.id.as_str())
                        .collect();
                    assert_eq!(got, by_matches, "{filter}");
                }
            }
        }
    }

    #[test]
    fn test_text_matches_id_title_or_description() {
        let tasks = fixtures();
        let by_id = TaskFilter::new().with_text("feat-");
        assert_eq!(by_id.apply(&tasks).len(), 1);

        let by_description = TaskFilter::new().with_text("ABOUT report");
        assert_eq!(by_description.apply(&tasks)[0].id, "OPT-003");
    }

    #[test]
    fn test_parse_all_sentinel() {
        assert_eq!(TaskFilter::parse_status("all").unwrap(), None);
        assert_eq!(TaskFilter::parse_status("ALL").unwrap(), None);
        assert_eq!(
            TaskFilter::parse_status("blocked").unwrap(),
            Some(Status::Blocked)
        );
        assert_eq!(TaskFilter::parse_priority("").unwrap(), None);
        assert!(TaskFilter::parse_priority("urgent").is_err());
    }
}
