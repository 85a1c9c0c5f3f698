//! brain-core: Core library for brainview
//!
//! Loads a project's task document, filters and edits task status, and
//! follows a remote content-sync service through a background poller.
//! Backends are reached over HTTP; when the tasks endpoint is unavailable a
//! built-in sample set is shown instead.

pub mod client;
pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod filter;
pub mod poller;
pub mod sample;
pub mod session;
pub mod store;
pub mod sync;
pub mod task;

pub use client::BrainClient;
pub use config::Config;
pub use document::{Phase, ProjectInfo, TaskDocument};
pub use editor::{CommitRequest, EditDraft, LocalUpdater, RowState, TaskEditor, TaskUpdater};
pub use error::Error;
pub use filter::TaskFilter;
pub use poller::{PollPhase, PollerConfig, PollerHandle, SyncNotification, SyncPoller, SyncSnapshot};
pub use session::{Session, SessionStore, UserInfo};
pub use store::{TaskOrigin, TaskSource, TaskStats, TaskStore};
pub use sync::{HistorySummary, SyncSource, SyncState, SyncStatusRecord};
pub use task::{Priority, Status, TaskComment, TaskRecord};

/// Result type for brainview operations
pub type Result<T> = std::result::Result<T, Error>;
