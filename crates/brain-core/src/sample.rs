//! Built-in sample task set
//!
//! Served whenever the tasks endpoint cannot be reached, so the task view is
//! never empty.

use crate::{Priority, ProjectInfo, Status, TaskDocument, TaskRecord};

struct SampleTask {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    status: Status,
    priority: Priority,
    assignee: &'static str,
    due_date: &'static str,
    progress: u8,
}

const SAMPLE_TASKS: &[SampleTask] = &[
    SampleTask {
        id: "MAINT-001",
        title: "Update database schema migration",
        description: "Maintain and update the schema for expense categories and extra charges",
        status: Status::InProgress,
        priority: Priority::Medium,
        assignee: "Development Team",
        due_date: "15/10/2025",
        progress: 60,
    },
    SampleTask {
        id: "FEAT-002",
        title: "Improve Vietnamese CSV support",
        description: "Better parsing of Vietnamese headers in exported booking CSV files",
        status: Status::Pending,
        priority: Priority::Low,
        assignee: "Development Team",
        due_date: "01/11/2025",
        progress: 0,
    },
    SampleTask {
        id: "OPT-003",
        title: "Optimize report performance",
        description: "Speed up monthly revenue reports on large datasets",
        status: Status::Pending,
        priority: Priority::Low,
        assignee: "Development Team",
        due_date: "01/12/2025",
        progress: 0,
    },
    SampleTask {
        id: "UI-004",
        title: "Complete the brain viewer",
        description: "Finish the viewer for project brain content",
        status: Status::InProgress,
        priority: Priority::High,
        assignee: "Frontend Team",
        due_date: "30/09/2025",
        progress: 85,
    },
    SampleTask {
        id: "DOC-005",
        title: "Update API documentation",
        description: "Document the HTTP endpoints with request and response examples",
        status: Status::Completed,
        priority: Priority::Medium,
        assignee: "Development Team",
        due_date: "25/09/2025",
        progress: 100,
    },
];

/// The fallback document
pub fn sample_document() -> TaskDocument {
    let tasks = SAMPLE_TASKS
        .iter()
        .map(|s| TaskRecord {
            description: s.description.to_string(),
            status: s.status,
            priority: s.priority,
            progress: Some(s.progress),
            assignee: Some(s.assignee.to_string()),
            due_date: Some(s.due_date.to_string()),
            ..TaskRecord::new(s.id, s.title)
        })
        .collect();

    TaskDocument::Flat {
        project: Some(ProjectInfo {
            name: Some("Revenue WebApp".to_string()),
            version: Some("1.0.0".to_string()),
            domain: Some("PMS".to_string()),
            status: Some("Production ready".to_string()),
            last_updated: Some("27/09/2025".to_string()),
        }),
        tasks,
    }
}
