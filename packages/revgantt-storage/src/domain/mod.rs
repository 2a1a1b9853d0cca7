//! Storage Domain Layer
//!
//! Port/Adapter pattern for storage backend abstraction

pub mod models;
pub mod ports;

pub use models::{
    NewProject, NewWorkItem, Project, ProjectId, ProjectUpdate, Stage, StageId, StudentId, Task,
    TaskId, Team, TeamId,
};
pub use ports::{GraphTransaction, PlanStore};
