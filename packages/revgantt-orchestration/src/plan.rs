//! Submitted plan (request payload of a stage replace)

use revgantt_storage::NewWorkItem;
use serde::{Deserialize, Deserializer, Serialize};

fn default_duration() -> i64 {
    1
}

/// `null` deserializes like an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One stage of a submitted plan
///
/// `dependencies` are stage *positions* in the same submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,
    #[serde(default = "default_duration")]
    pub duration: i64,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub responsibles: Vec<String>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dependencies: Vec<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tasks: Vec<TaskSpec>,
}

/// One task of a submitted plan
///
/// `dependencies` use the encoding in [`crate::dependency_ref`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    #[serde(default = "default_duration")]
    pub duration: i64,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub responsibles: Vec<String>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dependencies: Vec<i64>,
}

impl StageSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration: default_duration(),
            is_completed: false,
            responsibles: Vec::new(),
            feedback: None,
            dependencies: Vec::new(),
            tasks: Vec::new(),
        }
    }

    pub fn with_duration(mut self, duration: i64) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<i64>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_tasks(mut self, tasks: Vec<TaskSpec>) -> Self {
        self.tasks = tasks;
        self
    }

    pub(crate) fn to_work_item(&self, position: usize) -> NewWorkItem {
        NewWorkItem {
            name: self.name.clone(),
            duration: self.duration,
            is_completed: self.is_completed,
            responsibles: self.responsibles.clone(),
            feedback: self.feedback.clone(),
            position,
        }
    }
}

impl TaskSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration: default_duration(),
            is_completed: false,
            responsibles: Vec::new(),
            feedback: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_duration(mut self, duration: i64) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<i64>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub(crate) fn to_work_item(&self, position: usize) -> NewWorkItem {
        NewWorkItem {
            name: self.name.clone(),
            duration: self.duration,
            is_completed: self.is_completed,
            responsibles: self.responsibles.clone(),
            feedback: self.feedback.clone(),
            position,
        }
    }
}
