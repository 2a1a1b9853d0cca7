//! Domain Models
//!
//! Teams own projects, projects own an ordered list of stages, stages own an
//! ordered list of tasks. Stage and task ids are assigned by the store on insert
//! and never reused.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Team identifier
pub type TeamId = i64;

/// Student (user) identifier
pub type StudentId = i64;

/// Project identifier
pub type ProjectId = i64;

/// Stage identifier
pub type StageId = i64;

/// Task identifier
pub type TaskId = i64;

/// Team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub owner_id: StudentId,
    pub created_at: DateTime<Utc>,
}

/// Project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub team_id: TeamId,
}

/// Project creation payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub deadline: DateTime<Utc>,
    pub team_id: TeamId,
}

/// Project update payload (name, description and deadline are replaced)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectUpdate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub deadline: DateTime<Utc>,
}

/// Persisted stage with its ordered tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    pub project_id: ProjectId,
    pub name: String,
    pub duration: i64,
    pub is_completed: bool,
    pub responsibles: Vec<String>,
    pub feedback: Option<String>,
    /// Durable ids of stages in the same project
    pub dependencies: Vec<StageId>,
    pub tasks: Vec<Task>,
}

impl Stage {
    /// Task ids in stored order
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(|t| t.id).collect()
    }
}

/// Persisted task
///
/// `dependencies` mixes task ids and stage ids; the two id spaces are kept
/// apart only by the reference encoding used when the graph was submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub stage_id: StageId,
    pub name: String,
    pub duration: i64,
    pub is_completed: bool,
    pub responsibles: Vec<String>,
    pub feedback: Option<String>,
    pub dependencies: Vec<i64>,
}

/// Row data shared by a new stage or task
///
/// `position` is the 0-based slot in the submitted array and is what reads
/// order by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWorkItem {
    pub name: String,
    pub duration: i64,
    pub is_completed: bool,
    pub responsibles: Vec<String>,
    pub feedback: Option<String>,
    pub position: usize,
}

impl NewWorkItem {
    pub fn new(name: impl Into<String>, duration: i64, position: usize) -> Self {
        Self {
            name: name.into(),
            duration,
            is_completed: false,
            responsibles: Vec::new(),
            feedback: None,
            position,
        }
    }
}
