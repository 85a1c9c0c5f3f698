//! Task data model for brainview
//!
//! One normalized record shape, whatever document the tasks came from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Pending,
    InProgress,
    Completed,
    Blocked,
    Cancelled,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Pending,
        Status::InProgress,
        Status::Completed,
        Status::Blocked,
        Status::Cancelled,
    ];

    /// Progress percentage implied by this status.
    pub fn progress(&self) -> u8 {
        match self {
            Status::Pending => 0,
            Status::InProgress => 50,
            Status::Completed => 100,
            Status::Blocked => 25,
            Status::Cancelled => 0,
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Status::Pending => "To Do",
            Status::InProgress => "In Progress",
            Status::Completed => "Completed",
            Status::Blocked => "Blocked",
            Status::Cancelled => "Cancelled",
        }
    }
}

impl std::str::FromStr for Status {
    type Err = crate::Error;

    // Also accepts the labels used by the legacy sample document.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" | "todo" | "to do" | "cần làm" => Ok(Status::Pending),
            "in_progress" | "in-progress" | "inprogress" | "in progress" | "đang thực hiện" => {
                Ok(Status::InProgress)
            }
            "completed" | "done" | "hoàn thành" => Ok(Status::Completed),
            "blocked" | "bị block" => Ok(Status::Blocked),
            "cancelled" | "canceled" | "đã hủy" => Ok(Status::Cancelled),
            _ => Err(crate::Error::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Pending => write!(f, "pending"),
            Status::InProgress => write!(f, "in_progress"),
            Status::Completed => write!(f, "completed"),
            Status::Blocked => write!(f, "blocked"),
            Status::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn label(&self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" | "cao" => Ok(Priority::High),
            "medium" | "trung bình" => Ok(Priority::Medium),
            "low" | "thấp" => Ok(Priority::Low),
            _ => Err(crate::Error::InvalidPriority(s.to_string())),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

/// Comment attached to a task by a status commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskComment {
    pub timestamp: DateTime<Utc>,
    pub comment: String,
    /// Rendered as `"<old> → <new>"`
    pub status_change: String,
}

/// Normalized task record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique identifier, stable across reloads
    pub id: String,

    pub title: String,

    pub description: String,

    pub status: Status,

    pub priority: Priority,

    /// Percentage 0-100. `None` until a commit when the source had none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    /// Append-only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<TaskComment>,

    /// Grouping label when sourced from a phased document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Create a task with minimal required fields
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            status: Status::Pending,
            priority: Priority::Medium,
            progress: None,
            assignee: None,
            comments: Vec::new(),
            phase_name: None,
            due_date: None,
            updated_at: None,
        }
    }

    /// Progress to display; a missing value renders as 0.
    pub fn display_progress(&self) -> u8 {
        self.progress.unwrap_or(0)
    }

    pub fn latest_comment(&self) -> Option<&TaskComment> {
        self.comments.last()
    }

    /// Apply a status change the way a commit does.
    ///
    /// Recomputes `progress` from the new status, stamps `updated_at`, and
    /// appends one comment when `comment` is non-empty. Nothing else changes.
    pub fn apply_status_change(
        &mut self,
        new_status: Status,
        comment: Option<&str>,
        now: DateTime<Utc>,
    ) {
        let old_status = self.status;
        self.status = new_status;
        self.progress = Some(new_status.progress());
        self.updated_at = Some(now);

        // Text is stored as entered; only an empty comment is dropped
        if let Some(text) = comment.filter(|c| !c.is_empty()) {
            self.comments.push(TaskComment {
                timestamp: now,
                comment: text.to_string(),
                status_change: format!("{} → {}", old_status, new_status),
            });
        }
    }

    /// Case-insensitive substring match against title, description and id
    pub fn matches_text(&self, needle_lower: &str) -> bool {
        self.title.to_lowercase().contains(needle_lower)
            || self.description.to_lowercase().contains(needle_lower)
            || self.id.to_lowercase().contains(needle_lower)
    }
}

impl std::fmt::Display for TaskRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] [{}] {}% - {}",
            self.id,
            self.priority,
            self.status,
            self.display_progress(),
            self.title
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_mapping() {
        assert_eq!(Status::Pending.progress(), 0);
        assert_eq!(Status::InProgress.progress(), 50);
        assert_eq!(Status::Blocked.progress(), 25);
        assert_eq!(Status::Completed.progress(), 100);
        assert_eq!(Status::Cancelled.progress(), 0);
    }

    #[test]
    fn test_status_parse_accepts_legacy_labels() {
        assert_eq!("Đang Thực Hiện".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!("Hoàn Thành".parse::<Status>().unwrap(), Status::Completed);
        assert_eq!("in-progress".parse::<Status>().unwrap(), Status::InProgress);
        assert!("nope".parse::<Status>().is_err());
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!("Cao".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("Trung Bình".parse::<Priority>().unwrap(), Priority::Medium);
        assert_eq!("LOW".parse::<Priority>().unwrap(), Priority::Low);
    }

    #[test]
    fn test_apply_status_change_with_comment() {
        let mut task = TaskRecord::new("T1", "A");
        let now = Utc::now();
        task.apply_status_change(Status::Completed, Some("done"), now);

        assert_eq!(task.status, Status::Completed);
        assert_eq!(task.progress, Some(100));
        assert_eq!(task.updated_at, Some(now));
        assert_eq!(task.comments.len(), 1);
        assert_eq!(task.comments[0].comment, "done");
        assert_eq!(task.comments[0].status_change, "pending → completed");
    }

    #[test]
    fn test_apply_status_change_empty_comment_is_skipped() {
        let mut task = TaskRecord::new("T1", "A");
        task.apply_status_change(Status::InProgress, Some(""), Utc::now());
        assert_eq!(task.progress, Some(50));
        assert!(task.comments.is_empty());
    }

    #[test]
    fn test_apply_status_change_keeps_comment_as_entered() {
        let mut task = TaskRecord::new("T1", "A");
        task.apply_status_change(Status::Blocked, Some("  waiting on ops "), Utc::now());
        task.apply_status_change(Status::InProgress, Some("   "), Utc::now());
        assert_eq!(task.comments.len(), 2);
        assert_eq!(task.comments[0].comment, "  waiting on ops ");
        assert_eq!(task.comments[1].comment, "   ");
    }
}
