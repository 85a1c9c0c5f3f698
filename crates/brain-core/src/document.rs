//! Task document decoding
//!
//! The tasks endpoint serves one of two shapes: a phased document
//! (`{phases: [{phase_name, tasks}]}`) or the flat sample shape
//! (`{duAn, tasks_hoat_dong, thongKe}`). Both are decoded here into
//! [`TaskDocument`] and normalized to [`TaskRecord`] before anything else
//! sees them.

use crate::{Error, Priority, Result, Status, TaskComment, TaskRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Project metadata carried by some documents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectInfo {
    #[serde(alias = "ten")]
    pub name: Option<String>,
    #[serde(alias = "phienBan")]
    pub version: Option<String>,
    pub domain: Option<String>,
    #[serde(alias = "trangThai")]
    pub status: Option<String>,
    #[serde(alias = "capNhatCuoi")]
    pub last_updated: Option<String>,
}

/// A named group of tasks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub name: String,
    pub tasks: Vec<TaskRecord>,
}

/// Decoded task document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskDocument {
    Phased {
        project: Option<ProjectInfo>,
        phases: Vec<Phase>,
    },
    Flat {
        project: Option<ProjectInfo>,
        tasks: Vec<TaskRecord>,
    },
}

impl TaskDocument {
    /// Decode a document from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawDocument = serde_json::from_str(text)?;
        raw.normalize()
    }

    /// Decode a document from an already-parsed JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let raw: RawDocument = serde_json::from_value(value)?;
        raw.normalize()
    }

    pub fn project(&self) -> Option<&ProjectInfo> {
        match self {
            TaskDocument::Phased { project, .. } | TaskDocument::Flat { project, .. } => {
                project.as_ref()
            }
        }
    }

    /// Flatten into one ordered task list.
    ///
    /// Phased documents yield phase-then-within-phase order, each record
    /// tagged with its phase name.
    pub fn into_tasks(self) -> Vec<TaskRecord> {
        match self {
            TaskDocument::Phased { phases, .. } => phases
                .into_iter()
                .flat_map(|phase| {
                    let name = phase.name;
                    phase.tasks.into_iter().map(move |mut task| {
                        task.phase_name = Some(name.clone());
                        task
                    })
                })
                .collect(),
            TaskDocument::Flat { tasks, .. } => tasks,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDocument {
    Phased {
        phases: Vec<RawPhase>,
        #[serde(default, alias = "duAn")]
        project: Option<ProjectInfo>,
    },
    Flat {
        #[serde(alias = "tasks")]
        tasks_hoat_dong: Vec<RawTask>,
        #[serde(default, alias = "duAn")]
        project: Option<ProjectInfo>,
    },
}

#[derive(Debug, Deserialize)]
struct RawPhase {
    #[serde(alias = "name")]
    phase_name: String,
    #[serde(default)]
    tasks: Vec<RawTask>,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    id: String,
    #[serde(default, alias = "tieuDe")]
    title: String,
    #[serde(default, alias = "moTa")]
    description: String,
    #[serde(default, alias = "trangThai")]
    status: Option<String>,
    #[serde(default, alias = "uuTien")]
    priority: Option<String>,
    #[serde(default, alias = "phanCong")]
    assignee: Option<String>,
    #[serde(default, alias = "hanCuoi")]
    due_date: Option<String>,
    #[serde(default, alias = "tienDo")]
    progress: Option<RawProgress>,
    #[serde(default)]
    comments: Vec<TaskComment>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawProgress {
    Number(f64),
    Text(String),
}

impl RawProgress {
    fn percent(&self) -> Result<u8> {
        let value = match self {
            RawProgress::Number(n) => *n,
            RawProgress::Text(s) => s
                .trim()
                .trim_end_matches('%')
                .trim()
                .parse::<f64>()
                .map_err(|_| Error::InvalidProgress(s.clone()))?,
        };
        if !(0.0..=100.0).contains(&value) {
            return Err(Error::InvalidProgress(value.to_string()));
        }
        Ok(value.round() as u8)
    }
}

impl RawTask {
    fn normalize(self) -> Result<TaskRecord> {
        let status = match self.status.as_deref() {
            Some(s) => s.parse()?,
            None => Status::default(),
        };
        let priority = match self.priority.as_deref() {
            Some(p) => p.parse()?,
            None => Priority::default(),
        };
        let progress = self.progress.as_ref().map(RawProgress::percent).transpose()?;

        Ok(TaskRecord {
            id: self.id,
            title: self.title,
            description: self.description,
            status,
            priority,
            progress,
            assignee: self.assignee.filter(|a| !a.trim().is_empty()),
            comments: self.comments,
            phase_name: None,
            due_date: self.due_date,
            updated_at: None,
        })
    }
}

fn normalize_tasks(raw: Vec<RawTask>, seen: &mut HashSet<String>) -> Result<Vec<TaskRecord>> {
    raw.into_iter()
        .map(|task| {
            if !seen.insert(task.id.clone()) {
                return Err(Error::DuplicateId(task.id));
            }
            task.normalize()
        })
        .collect()
}

impl RawDocument {
    fn normalize(self) -> Result<TaskDocument> {
        let mut seen = HashSet::new();
        match self {
            RawDocument::Phased { phases, project } => {
                let phases = phases
                    .into_iter()
                    .map(|phase| {
                        Ok(Phase {
                            name: phase.phase_name,
                            tasks: normalize_tasks(phase.tasks, &mut seen)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(TaskDocument::Phased { project, phases })
            }
            RawDocument::Flat {
                tasks_hoat_dong,
                project,
            } => Ok(TaskDocument::Flat {
                project,
                tasks: normalize_tasks(tasks_hoat_dong, &mut seen)?,
            }),
        }
    }
}
