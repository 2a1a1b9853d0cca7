//! Storage Ports (Trait Interface)
//!
//! Port/Adapter pattern for backend flexibility:
//! - Production: SQLite
//! - Testing: InMemory
//!
//! Graph writes go through [`GraphTransaction`], a unit of work that either
//! commits as a whole or leaves the store untouched.

use async_trait::async_trait;

use super::models::{
    NewProject, NewWorkItem, Project, ProjectId, ProjectUpdate, Stage, StageId, StudentId, TaskId,
    Team, TeamId,
};
use crate::Result;

/// Plan Store Port (Primary Interface)
///
/// All storage backends must implement this trait
#[async_trait]
pub trait PlanStore: Send + Sync {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Teams & Membership
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Create a team; the owner becomes a member
    async fn create_team(&self, name: &str, owner_id: StudentId) -> Result<Team>;

    /// Get team by ID
    async fn get_team(&self, team_id: TeamId) -> Result<Option<Team>>;

    /// Add a member (idempotent). Returns false if the team doesn't exist
    async fn add_member(&self, team_id: TeamId, student_id: StudentId) -> Result<bool>;

    /// Owner or listed member
    async fn is_member(&self, team_id: TeamId, student_id: StudentId) -> Result<bool>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Projects
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Create a project
    ///
    /// # Errors
    ///
    /// `ErrorKind::TeamNotFound` if the team doesn't exist
    async fn create_project(&self, project: &NewProject) -> Result<Project>;

    /// Get project by ID
    async fn get_project(&self, project_id: ProjectId) -> Result<Option<Project>>;

    /// List projects of a team (ordered by id)
    async fn list_team_projects(&self, team_id: TeamId) -> Result<Vec<Project>>;

    /// Replace name, description and deadline. `None` if the project doesn't exist
    async fn update_project(
        &self,
        project_id: ProjectId,
        update: &ProjectUpdate,
    ) -> Result<Option<Project>>;

    /// Delete a project and, transitively, its stages and tasks
    async fn delete_project(&self, project_id: ProjectId) -> Result<bool>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Stage Graph
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Stages of a project ordered by position, each with tasks ordered by position
    async fn get_stages(&self, project_id: ProjectId) -> Result<Vec<Stage>>;

    /// Start a unit of work over the stage graph
    ///
    /// The store is exclusively held until the transaction is committed,
    /// rolled back or dropped. Dropping without commit rolls back.
    async fn begin_graph_transaction<'a>(&'a self) -> Result<Box<dyn GraphTransaction + 'a>>;
}

/// Unit of work over stages and tasks
///
/// Every write is visible to later reads on the same transaction and to
/// nobody else until [`GraphTransaction::commit`].
pub trait GraphTransaction: Send {
    /// Delete every stage (and transitively task) of a project. Returns the stage count removed
    fn detach_stages(&mut self, project_id: ProjectId) -> Result<usize>;

    /// Insert a stage with an empty dependency list
    fn insert_stage(&mut self, project_id: ProjectId, stage: &NewWorkItem) -> Result<StageId>;

    /// Insert a task with an empty dependency list
    fn insert_task(&mut self, stage_id: StageId, task: &NewWorkItem) -> Result<TaskId>;

    /// Overwrite a stage's dependency list
    fn set_stage_dependencies(&mut self, stage_id: StageId, dependencies: &[StageId])
        -> Result<()>;

    /// Overwrite a task's dependency list
    fn set_task_dependencies(&mut self, task_id: TaskId, dependencies: &[i64]) -> Result<()>;

    /// Read a stage back with its tasks (ordered by position)
    fn load_stage(&mut self, stage_id: StageId) -> Result<Option<Stage>>;

    /// Make every write of this unit durable
    fn commit(self: Box<Self>) -> Result<()>;

    /// Discard every write of this unit
    fn rollback(self: Box<Self>) -> Result<()>;
}
