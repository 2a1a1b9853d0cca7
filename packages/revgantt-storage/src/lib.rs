//! PlanStore - Persistent storage for teams, projects and stage graphs
//!
//! ## Core Principles
//!
//! 1. **Replace, don't diff**: a project's stages and tasks are rewritten as a whole
//! 2. **Durable ids**: assigned by the store on insert, monotonic, never reused
//! 3. **Explicit order**: stages and tasks carry a `position`; reads order by it
//!
//! ## Usage
//!
//! ```rust,ignore
//! use revgantt_storage::{GraphTransaction, NewWorkItem, PlanStore, SqlitePlanStore};
//!
//! let store = SqlitePlanStore::in_memory()?;
//!
//! let mut tx = store.begin_graph_transaction().await?;
//! tx.detach_stages(project_id)?;
//! let stage_id = tx.insert_stage(project_id, &NewWorkItem::new("Design", 2, 0))?;
//! tx.commit()?;
//!
//! let stages = store.get_stages(project_id).await?;
//! ```

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{ErrorKind, Result, StorageError};

pub use domain::{
    GraphTransaction, NewProject, NewWorkItem, PlanStore, Project, ProjectId, ProjectUpdate, Stage,
    StageId, StudentId, Task, TaskId, Team, TeamId,
};

pub use infrastructure::InMemoryPlanStore;
#[cfg(feature = "sqlite")]
pub use infrastructure::SqlitePlanStore;
