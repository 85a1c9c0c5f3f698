//! In-memory task store
//!
//! Loaded once from a [`TaskSource`], falling back to the built-in sample on
//! any failure. Absence of a backend is not an error for this view.

use crate::{Error, ProjectInfo, Result, Status, TaskDocument, TaskFilter, TaskRecord};
use async_trait::async_trait;
use serde::Serialize;

/// Anything that can produce a task document
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn fetch_document(&self) -> Result<TaskDocument>;
}

/// Where the store's contents came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOrigin {
    Remote,
    Sample,
}

impl std::fmt::Display for TaskOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskOrigin::Remote => write!(f, "remote"),
            TaskOrigin::Sample => write!(f, "sample"),
        }
    }
}

/// Counts shown above the task table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub pending: usize,
    pub blocked: usize,
    pub completion_percent: u8,
}

impl TaskStats {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a TaskRecord>) -> Self {
        let mut stats = TaskStats::default();
        for task in tasks {
            stats.total += 1;
            match task.status {
                Status::Completed => stats.completed += 1,
                Status::InProgress => stats.in_progress += 1,
                Status::Pending => stats.pending += 1,
                Status::Blocked => stats.blocked += 1,
                Status::Cancelled => {}
            }
        }
        if stats.total > 0 {
            stats.completion_percent =
                ((stats.completed as f64 / stats.total as f64) * 100.0).round() as u8;
        }
        stats
    }
}

/// Ordered task collection
#[derive(Debug, Clone)]
pub struct TaskStore {
    tasks: Vec<TaskRecord>,
    project: Option<ProjectInfo>,
    origin: TaskOrigin,
}

impl TaskStore {
    /// Build a store from an already-decoded document
    pub fn from_document(document: TaskDocument, origin: TaskOrigin) -> Self {
        let project = document.project().cloned();
        Self {
            tasks: document.into_tasks(),
            project,
            origin,
        }
    }

    /// Store holding only the built-in sample
    pub fn sample() -> Self {
        Self::from_document(crate::sample::sample_document(), TaskOrigin::Sample)
    }

    /// Load from `source`, degrading silently to the sample set.
    ///
    /// A document that decodes but holds no tasks also falls back, so the
    /// resulting store is never empty.
    pub async fn load<S: TaskSource + ?Sized>(source: &S) -> Self {
        match source.fetch_document().await {
            Ok(document) => {
                let store = Self::from_document(document, TaskOrigin::Remote);
                if store.tasks.is_empty() {
                    tracing::warn!("task document has no tasks, using sample data");
                    return Self::sample();
                }
                tracing::debug!(count = store.tasks.len(), "loaded tasks");
                store
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not load tasks, using sample data");
                Self::sample()
            }
        }
    }

    pub fn origin(&self) -> TaskOrigin {
        self.origin
    }

    pub fn project(&self) -> Option<&ProjectInfo> {
        self.project.as_ref()
    }

    pub fn tasks(&self) -> &[TaskRecord] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TaskRecord> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Replace a record in place, keeping its position
    pub fn replace(&mut self, task: TaskRecord) -> Result<()> {
        let slot = self
            .tasks
            .iter_mut()
            .find(|t| t.id == task.id)
            .ok_or_else(|| Error::NotFound(task.id.clone()))?;
        *slot = task;
        Ok(())
    }

    /// Records visible under `filter`
    pub fn view(&self, filter: &TaskFilter) -> Vec<&TaskRecord> {
        filter.apply(&self.tasks)
    }

    pub fn stats(&self) -> TaskStats {
        TaskStats::from_tasks(&self.tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Phase, Priority};

    struct FixedSource(Result<TaskDocument>);

    #[async_trait]
    impl TaskSource for FixedSource {
        async fn fetch_document(&self) -> Result<TaskDocument> {
            match &self.0 {
                Ok(doc) => Ok(doc.clone()),
                Err(e) => Err(Error::Other(e.to_string())),
            }
        }
    }

    fn phased(tasks: Vec<TaskRecord>) -> TaskDocument {
        TaskDocument::Phased {
            project: None,
            phases: vec![Phase {
                name: "P1".to_string(),
                tasks,
            }],
        }
    }

    #[tokio::test]
    async fn test_load_falls_back_to_sample_on_failure() {
        let source = FixedSource(Err(Error::Other("connection refused".into())));
        let store = TaskStore::load(&source).await;
        assert_eq!(store.origin(), TaskOrigin::Sample);
        assert!(!store.is_empty());
    }

    #[tokio::test]
    async fn test_load_falls_back_when_document_is_empty() {
        let source = FixedSource(Ok(phased(Vec::new())));
        let store = TaskStore::load(&source).await;
        assert_eq!(store.origin(), TaskOrigin::Sample);
        assert!(!store.is_empty());
    }

    #[tokio::test]
    async fn test_load_remote_document() {
        let source = FixedSource(Ok(phased(vec![TaskRecord::new("T1", "A")])));
        let store = TaskStore::load(&source).await;
        assert_eq!(store.origin(), TaskOrigin::Remote);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("T1").unwrap().phase_name.as_deref(), Some("P1"));
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut store = TaskStore::sample();
        let mut task = store.tasks()[2].clone();
        task.priority = Priority::High;
        store.replace(task.clone()).unwrap();
        assert_eq!(store.tasks()[2], task);

        let missing = TaskRecord::new("NOPE", "x");
        assert!(matches!(store.replace(missing), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_stats() {
        let store = TaskStore::sample();
        let stats = store.stats();
        assert_eq!(stats.total, 5);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.in_progress, 2);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.completion_percent, 20);

        assert_eq!(TaskStats::from_tasks(&Vec::<TaskRecord>::new()).completion_percent, 0);
    }
}
