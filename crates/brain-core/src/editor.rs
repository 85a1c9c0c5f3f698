//! Per-row task editing
//!
//! Each row moves `Viewing -> Editing -> Committing -> Viewing`, or back to
//! `Viewing` when an edit is cancelled. The in-flight flag is tracked per
//! row: a commit on one task never blocks editing another, but a task cannot
//! have two commits in flight.

use crate::{Error, Result, Status, TaskRecord, TaskStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Sends a committed status change to wherever tasks are persisted
#[async_trait]
pub trait TaskUpdater: Send + Sync {
    async fn update_status(&self, task_id: &str, status: Status, comment: Option<&str>)
    -> Result<()>;
}

/// Updater with no server round trip. The change only lives in the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalUpdater;

#[async_trait]
impl TaskUpdater for LocalUpdater {
    async fn update_status(
        &self,
        task_id: &str,
        status: Status,
        _comment: Option<&str>,
    ) -> Result<()> {
        tracing::debug!(task_id, %status, "status change kept locally");
        Ok(())
    }
}

/// Staged, uncommitted changes for one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDraft {
    pub status: Status,
    pub comment: String,
    /// Message from the last failed commit
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowState {
    Viewing,
    Editing(EditDraft),
    Committing(EditDraft),
}

/// A commit that has left `Editing` and awaits its outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    pub task_id: String,
    pub status: Status,
    pub comment: Option<String>,
}

#[derive(Debug, Default)]
pub struct TaskEditor {
    // Rows absent from the map are viewing.
    rows: HashMap<String, RowState>,
}

impl TaskEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, task_id: &str) -> RowState {
        self.rows.get(task_id).cloned().unwrap_or(RowState::Viewing)
    }

    pub fn draft(&self, task_id: &str) -> Option<&EditDraft> {
        match self.rows.get(task_id) {
            Some(RowState::Editing(draft)) | Some(RowState::Committing(draft)) => Some(draft),
            _ => None,
        }
    }

    pub fn is_editing(&self, task_id: &str) -> bool {
        matches!(self.rows.get(task_id), Some(RowState::Editing(_)))
    }

    pub fn is_committing(&self, task_id: &str) -> bool {
        matches!(self.rows.get(task_id), Some(RowState::Committing(_)))
    }

    pub fn any_committing(&self) -> bool {
        self.rows
            .values()
            .any(|state| matches!(state, RowState::Committing(_)))
    }

    /// Enter edit mode, staging the task's current status.
    ///
    /// Re-entering a row that is already being edited keeps its draft.
    pub fn begin_edit(&mut self, store: &TaskStore, task_id: &str) -> Result<()> {
        let task = store
            .get(task_id)
            .ok_or_else(|| Error::NotFound(task_id.to_string()))?;

        match self.rows.get(task_id) {
            Some(RowState::Committing(_)) => Err(Error::CommitInFlight(task_id.to_string())),
            Some(RowState::Editing(_)) => Ok(()),
            _ => {
                self.rows.insert(
                    task_id.to_string(),
                    RowState::Editing(EditDraft {
                        status: task.status,
                        comment: String::new(),
                        error: None,
                    }),
                );
                Ok(())
            }
        }
    }

    fn editing_draft_mut(&mut self, task_id: &str) -> Result<&mut EditDraft> {
        match self.rows.get_mut(task_id) {
            Some(RowState::Editing(draft)) => Ok(draft),
            Some(RowState::Committing(_)) => Err(Error::CommitInFlight(task_id.to_string())),
            _ => Err(Error::NotEditing(task_id.to_string())),
        }
    }

    pub fn stage_status(&mut self, task_id: &str, status: Status) -> Result<()> {
        self.editing_draft_mut(task_id)?.status = status;
        Ok(())
    }

    pub fn stage_comment(&mut self, task_id: &str, comment: impl Into<String>) -> Result<()> {
        self.editing_draft_mut(task_id)?.comment = comment.into();
        Ok(())
    }

    /// Discard staged changes and return the row to viewing
    pub fn cancel(&mut self, task_id: &str) -> Result<()> {
        match self.rows.get(task_id) {
            Some(RowState::Committing(_)) => Err(Error::CommitInFlight(task_id.to_string())),
            Some(RowState::Editing(_)) => {
                self.rows.remove(task_id);
                Ok(())
            }
            _ => Err(Error::NotEditing(task_id.to_string())),
        }
    }

    /// Move an edited row to committing and hand back what must be sent
    pub fn begin_commit(&mut self, task_id: &str) -> Result<CommitRequest> {
        let draft = self.editing_draft_mut(task_id)?;
        draft.error = None;
        let draft = draft.clone();

        let comment = Some(draft.comment.clone()).filter(|c| !c.is_empty());
        let request = CommitRequest {
            task_id: task_id.to_string(),
            status: draft.status,
            comment,
        };
        self.rows
            .insert(task_id.to_string(), RowState::Committing(draft));
        Ok(request)
    }

    /// Settle a commit.
    ///
    /// On success the store record is updated in place and the row returns to
    /// viewing. On failure the row goes back to editing with the error
    /// attached, the store is left untouched, and the error is returned.
    pub fn finish_commit(
        &mut self,
        store: &mut TaskStore,
        request: &CommitRequest,
        outcome: Result<()>,
        now: DateTime<Utc>,
    ) -> Result<TaskRecord> {
        let draft = match self.rows.remove(&request.task_id) {
            Some(RowState::Committing(draft)) => draft,
            other => {
                if let Some(state) = other {
                    self.rows.insert(request.task_id.clone(), state);
                }
                return Err(Error::NotEditing(request.task_id.clone()));
            }
        };

        let applied = outcome.and_then(|()| {
            let mut task = store
                .get(&request.task_id)
                .cloned()
                .ok_or_else(|| Error::NotFound(request.task_id.clone()))?;
            task.apply_status_change(request.status, request.comment.as_deref(), now);
            store.replace(task.clone())?;
            Ok(task)
        });

        match applied {
            Ok(task) => Ok(task),
            Err(e) => {
                tracing::warn!(task_id = %request.task_id, error = %e, "task update failed");
                self.rows.insert(
                    request.task_id.clone(),
                    RowState::Editing(EditDraft {
                        error: Some(e.to_string()),
                        ..draft
                    }),
                );
                Err(e)
            }
        }
    }

    /// Commit the row's staged changes through `updater`
    pub async fn commit<U: TaskUpdater + ?Sized>(
        &mut self,
        store: &mut TaskStore,
        updater: &U,
        task_id: &str,
    ) -> Result<TaskRecord> {
        let request = self.begin_commit(task_id)?;
        let outcome = updater
            .update_status(&request.task_id, request.status, request.comment.as_deref())
            .await;
        self.finish_commit(store, &request, outcome, Utc::now())
    }

    /// Edit, stage and commit in one step
    pub async fn commit_status<U: TaskUpdater + ?Sized>(
        &mut self,
        store: &mut TaskStore,
        updater: &U,
        task_id: &str,
        status: Status,
        comment: Option<&str>,
    ) -> Result<TaskRecord> {
        self.begin_edit(store, task_id)?;
        self.stage_status(task_id, status)?;
        self.stage_comment(task_id, comment.unwrap_or_default())?;
        self.commit(store, updater, task_id).await
    }

    /// Drop every draft that is not committing (used after a reload)
    pub fn discard_drafts(&mut self) {
        self.rows
            .retain(|_, state| matches!(state, RowState::Committing(_)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Phase, TaskDocument, TaskOrigin};

    struct FailingUpdater;

    #[async_trait]
    impl TaskUpdater for FailingUpdater {
        async fn update_status(&self, _: &str, _: Status, _: Option<&str>) -> Result<()> {
            Err(Error::UnexpectedStatus {
                url: "http://brain/task/T1/update".to_string(),
                status: 500,
            })
        }
    }

    fn scenario_store() -> TaskStore {
        let mut t1 = TaskRecord::new("T1", "A");
        t1.description = "d".to_string();
        t1.priority = crate::Priority::Low;
        let t2 = TaskRecord::new("T2", "B");
        TaskStore::from_document(
            TaskDocument::Phased {
                project: None,
                phases: vec![Phase {
                    name: "P1".to_string(),
                    tasks: vec![t1, t2],
                }],
            },
            TaskOrigin::Remote,
        )
    }

    #[tokio::test]
    async fn test_commit_scenario() {
        let mut store = scenario_store();
        let before_t2 = store.get("T2").cloned().unwrap();
        let mut editor = TaskEditor::new();

        let task = editor
            .commit_status(&mut store, &LocalUpdater, "T1", Status::Completed, Some("done"))
            .await
            .unwrap();

        assert_eq!(task.status, Status::Completed);
        assert_eq!(task.progress, Some(100));
        assert_eq!(task.comments.len(), 1);
        assert_eq!(task.comments[0].status_change, "pending → completed");
        assert_eq!(task.comments[0].comment, "done");
        assert_eq!(task.phase_name.as_deref(), Some("P1"));
        assert_eq!(task.title, "A");

        assert_eq!(store.get("T1"), Some(&task));
        assert_eq!(store.get("T2"), Some(&before_t2));
        assert_eq!(editor.state("T1"), RowState::Viewing);
    }

    #[tokio::test]
    async fn test_commit_without_comment_appends_nothing() {
        let mut store = scenario_store();
        let mut editor = TaskEditor::new();
        let task = editor
            .commit_status(&mut store, &LocalUpdater, "T2", Status::InProgress, None)
            .await
            .unwrap();
        assert_eq!(task.progress, Some(50));
        assert!(task.comments.is_empty());
    }

    #[test]
    fn test_begin_commit_sends_comment_as_entered() {
        let store = scenario_store();
        let mut editor = TaskEditor::new();
        editor.begin_edit(&store, "T1").unwrap();
        editor.stage_comment("T1", " needs review ").unwrap();

        let request = editor.begin_commit("T1").unwrap();
        assert_eq!(request.comment.as_deref(), Some(" needs review "));

        editor.begin_edit(&store, "T2").unwrap();
        let request = editor.begin_commit("T2").unwrap();
        assert_eq!(request.comment, None);
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_row_editing_and_store_untouched() {
        let mut store = scenario_store();
        let before = store.tasks().to_vec();
        let mut editor = TaskEditor::new();

        editor.begin_edit(&store, "T1").unwrap();
        editor.stage_status("T1", Status::Blocked).unwrap();
        let err = editor.commit(&mut store, &FailingUpdater, "T1").await;

        assert!(err.is_err());
        assert_eq!(store.tasks(), before.as_slice());
        let draft = editor.draft("T1").unwrap();
        assert!(editor.is_editing("T1"));
        assert_eq!(draft.status, Status::Blocked);
        assert!(draft.error.as_deref().unwrap().contains("500"));
    }

    #[test]
    fn test_rows_are_independent() {
        let store = scenario_store();
        let mut editor = TaskEditor::new();

        editor.begin_edit(&store, "T1").unwrap();
        editor.begin_commit("T1").unwrap();
        assert!(editor.any_committing());

        // Another row can still be edited while T1 is in flight.
        editor.begin_edit(&store, "T2").unwrap();
        assert!(editor.is_editing("T2"));

        // T1 cannot be edited, cancelled or committed twice.
        assert!(matches!(
            editor.begin_edit(&store, "T1"),
            Err(Error::CommitInFlight(_))
        ));
        assert!(matches!(editor.cancel("T1"), Err(Error::CommitInFlight(_))));
        assert!(matches!(
            editor.begin_commit("T1"),
            Err(Error::CommitInFlight(_))
        ));
    }

    #[test]
    fn test_cancel_discards_draft() {
        let store = scenario_store();
        let mut editor = TaskEditor::new();
        editor.begin_edit(&store, "T1").unwrap();
        editor.stage_status("T1", Status::Cancelled).unwrap();
        editor.cancel("T1").unwrap();

        assert_eq!(editor.state("T1"), RowState::Viewing);
        assert_eq!(store.get("T1").unwrap().status, Status::Pending);
        assert!(matches!(editor.cancel("T1"), Err(Error::NotEditing(_))));
    }

    #[test]
    fn test_stage_requires_editing() {
        let mut editor = TaskEditor::new();
        assert!(matches!(
            editor.stage_status("T1", Status::Completed),
            Err(Error::NotEditing(_))
        ));
        assert!(matches!(
            editor.begin_edit(&scenario_store(), "missing"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_discard_drafts_keeps_in_flight_rows() {
        let store = scenario_store();
        let mut editor = TaskEditor::new();
        editor.begin_edit(&store, "T1").unwrap();
        editor.begin_edit(&store, "T2").unwrap();
        editor.begin_commit("T2").unwrap();

        editor.discard_drafts();
        assert_eq!(editor.state("T1"), RowState::Viewing);
        assert!(editor.is_committing("T2"));
    }
}
