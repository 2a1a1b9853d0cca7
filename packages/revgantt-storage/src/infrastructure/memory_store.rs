//! In-Memory Plan Store (for testing)
//!
//! BTreeMap-based implementation for unit tests.
//! A graph transaction edits a private copy of the state and swaps it in on commit.
//! NOT for production use.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::domain::models::{
    NewProject, NewWorkItem, Project, ProjectId, ProjectUpdate, Stage, StageId, StudentId, Task,
    TaskId, Team, TeamId,
};
use crate::domain::ports::{GraphTransaction, PlanStore};
use crate::error::{Result, StorageError};

#[derive(Debug, Clone)]
struct StageRow {
    position: usize,
    stage: Stage,
}

#[derive(Debug, Clone)]
struct TaskRow {
    position: usize,
    task: Task,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    teams: BTreeMap<TeamId, Team>,
    members: BTreeSet<(TeamId, StudentId)>,
    projects: BTreeMap<ProjectId, Project>,
    stages: BTreeMap<StageId, StageRow>,
    tasks: BTreeMap<TaskId, TaskRow>,
    last_team_id: TeamId,
    last_project_id: ProjectId,
    last_stage_id: StageId,
    last_task_id: TaskId,
}

impl MemoryState {
    fn tasks_of(&self, stage_id: StageId) -> Vec<Task> {
        let mut rows: Vec<&TaskRow> = self
            .tasks
            .values()
            .filter(|row| row.task.stage_id == stage_id)
            .collect();
        rows.sort_by_key(|row| (row.position, row.task.id));
        rows.into_iter().map(|row| row.task.clone()).collect()
    }

    fn stage(&self, stage_id: StageId) -> Option<Stage> {
        self.stages.get(&stage_id).map(|row| {
            let mut stage = row.stage.clone();
            stage.tasks = self.tasks_of(stage_id);
            stage
        })
    }

    fn stages_of(&self, project_id: ProjectId) -> Vec<Stage> {
        let mut rows: Vec<&StageRow> = self
            .stages
            .values()
            .filter(|row| row.stage.project_id == project_id)
            .collect();
        rows.sort_by_key(|row| (row.position, row.stage.id));
        rows.into_iter()
            .filter_map(|row| self.stage(row.stage.id))
            .collect()
    }

    fn remove_stages_of(&mut self, project_id: ProjectId) -> usize {
        let doomed: BTreeSet<StageId> = self
            .stages
            .values()
            .filter(|row| row.stage.project_id == project_id)
            .map(|row| row.stage.id)
            .collect();
        self.stages.retain(|id, _| !doomed.contains(id));
        self.tasks
            .retain(|_, row| !doomed.contains(&row.task.stage_id));
        doomed.len()
    }
}

fn check_duration(item: &NewWorkItem) -> Result<()> {
    if item.duration <= 0 {
        return Err(StorageError::constraint(format!(
            "duration must be positive, got {} for '{}'",
            item.duration, item.name
        )));
    }
    Ok(())
}

fn now_secs() -> DateTime<Utc> {
    DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap_or_default()
}

#[derive(Clone, Default)]
pub struct InMemoryPlanStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn create_team(&self, name: &str, owner_id: StudentId) -> Result<Team> {
        let mut state = self.state.lock().await;
        state.last_team_id += 1;
        let team = Team {
            id: state.last_team_id,
            name: name.to_string(),
            owner_id,
            created_at: now_secs(),
        };
        state.teams.insert(team.id, team.clone());
        state.members.insert((team.id, owner_id));
        Ok(team)
    }

    async fn get_team(&self, team_id: TeamId) -> Result<Option<Team>> {
        Ok(self.state.lock().await.teams.get(&team_id).cloned())
    }

    async fn add_member(&self, team_id: TeamId, student_id: StudentId) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.teams.contains_key(&team_id) {
            return Ok(false);
        }
        state.members.insert((team_id, student_id));
        Ok(true)
    }

    async fn is_member(&self, team_id: TeamId, student_id: StudentId) -> Result<bool> {
        let state = self.state.lock().await;
        let owner = state
            .teams
            .get(&team_id)
            .map(|team| team.owner_id == student_id)
            .unwrap_or(false);
        Ok(owner || state.members.contains(&(team_id, student_id)))
    }

    async fn create_project(&self, project: &NewProject) -> Result<Project> {
        let mut state = self.state.lock().await;
        if !state.teams.contains_key(&project.team_id) {
            return Err(StorageError::team_not_found(project.team_id));
        }
        state.last_project_id += 1;
        let created = Project {
            id: state.last_project_id,
            name: project.name.clone(),
            description: project.description.clone(),
            deadline: DateTime::from_timestamp(project.deadline.timestamp(), 0)
                .unwrap_or_default(),
            created_at: now_secs(),
            team_id: project.team_id,
        };
        state.projects.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_project(&self, project_id: ProjectId) -> Result<Option<Project>> {
        Ok(self.state.lock().await.projects.get(&project_id).cloned())
    }

    async fn list_team_projects(&self, team_id: TeamId) -> Result<Vec<Project>> {
        Ok(self
            .state
            .lock()
            .await
            .projects
            .values()
            .filter(|p| p.team_id == team_id)
            .cloned()
            .collect())
    }

    async fn update_project(
        &self,
        project_id: ProjectId,
        update: &ProjectUpdate,
    ) -> Result<Option<Project>> {
        let mut state = self.state.lock().await;
        Ok(state.projects.get_mut(&project_id).map(|project| {
            project.name = update.name.clone();
            project.description = update.description.clone();
            project.deadline =
                DateTime::from_timestamp(update.deadline.timestamp(), 0).unwrap_or_default();
            project.clone()
        }))
    }

    async fn delete_project(&self, project_id: ProjectId) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.projects.remove(&project_id).is_none() {
            return Ok(false);
        }
        state.remove_stages_of(project_id);
        Ok(true)
    }

    async fn get_stages(&self, project_id: ProjectId) -> Result<Vec<Stage>> {
        Ok(self.state.lock().await.stages_of(project_id))
    }

    async fn begin_graph_transaction<'a>(&'a self) -> Result<Box<dyn GraphTransaction + 'a>> {
        let guard = self.state.lock().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryGraphTransaction { guard, working }))
    }
}

/// Copy-on-begin transaction over the in-memory state
pub struct InMemoryGraphTransaction<'a> {
    guard: MutexGuard<'a, MemoryState>,
    working: MemoryState,
}

impl GraphTransaction for InMemoryGraphTransaction<'_> {
    fn detach_stages(&mut self, project_id: ProjectId) -> Result<usize> {
        Ok(self.working.remove_stages_of(project_id))
    }

    fn insert_stage(&mut self, project_id: ProjectId, stage: &NewWorkItem) -> Result<StageId> {
        check_duration(stage)?;
        if !self.working.projects.contains_key(&project_id) {
            return Err(StorageError::project_not_found(project_id));
        }
        self.working.last_stage_id += 1;
        let id = self.working.last_stage_id;
        self.working.stages.insert(
            id,
            StageRow {
                position: stage.position,
                stage: Stage {
                    id,
                    project_id,
                    name: stage.name.clone(),
                    duration: stage.duration,
                    is_completed: stage.is_completed,
                    responsibles: stage.responsibles.clone(),
                    feedback: stage.feedback.clone(),
                    dependencies: Vec::new(),
                    tasks: Vec::new(),
                },
            },
        );
        Ok(id)
    }

    fn insert_task(&mut self, stage_id: StageId, task: &NewWorkItem) -> Result<TaskId> {
        check_duration(task)?;
        if !self.working.stages.contains_key(&stage_id) {
            return Err(StorageError::constraint(format!(
                "Stage not found: {}",
                stage_id
            )));
        }
        self.working.last_task_id += 1;
        let id = self.working.last_task_id;
        self.working.tasks.insert(
            id,
            TaskRow {
                position: task.position,
                task: Task {
                    id,
                    stage_id,
                    name: task.name.clone(),
                    duration: task.duration,
                    is_completed: task.is_completed,
                    responsibles: task.responsibles.clone(),
                    feedback: task.feedback.clone(),
                    dependencies: Vec::new(),
                },
            },
        );
        Ok(id)
    }

    fn set_stage_dependencies(
        &mut self,
        stage_id: StageId,
        dependencies: &[StageId],
    ) -> Result<()> {
        let row = self
            .working
            .stages
            .get_mut(&stage_id)
            .ok_or_else(|| StorageError::database(format!("Stage not found: {}", stage_id)))?;
        row.stage.dependencies = dependencies.to_vec();
        Ok(())
    }

    fn set_task_dependencies(&mut self, task_id: TaskId, dependencies: &[i64]) -> Result<()> {
        let row = self
            .working
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| StorageError::database(format!("Task not found: {}", task_id)))?;
        row.task.dependencies = dependencies.to_vec();
        Ok(())
    }

    fn load_stage(&mut self, stage_id: StageId) -> Result<Option<Stage>> {
        Ok(self.working.stage(stage_id))
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        *self.guard = std::mem::take(&mut self.working);
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn seeded_project(store: &InMemoryPlanStore) -> Project {
        let team = store.create_team("Core", 1).await.unwrap();
        store
            .create_project(&NewProject {
                name: "Thesis".to_string(),
                description: Some("draft".to_string()),
                deadline: Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap(),
                team_id: team.id,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = InMemoryPlanStore::new();
        let project = seeded_project(&store).await;

        let mut tx = store.begin_graph_transaction().await.unwrap();
        let b = tx
            .insert_stage(project.id, &NewWorkItem::new("B", 1, 1))
            .unwrap();
        let a = tx
            .insert_stage(project.id, &NewWorkItem::new("A", 1, 0))
            .unwrap();
        tx.set_stage_dependencies(b, &[a]).unwrap();
        tx.commit().unwrap();

        let stages = store.get_stages(project.id).await.unwrap();
        assert_eq!(stages.iter().map(|s| s.id).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(stages[1].dependencies, vec![a]);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = InMemoryPlanStore::new();
        let project = seeded_project(&store).await;

        let mut tx = store.begin_graph_transaction().await.unwrap();
        tx.insert_stage(project.id, &NewWorkItem::new("A", 1, 0))
            .unwrap();
        tx.rollback().unwrap();

        assert!(store.get_stages(project.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_non_positive_duration() {
        let store = InMemoryPlanStore::new();
        let project = seeded_project(&store).await;

        let mut tx = store.begin_graph_transaction().await.unwrap();
        let err = tx
            .insert_stage(project.id, &NewWorkItem::new("A", -3, 0))
            .unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::Constraint);
    }

    #[tokio::test]
    async fn test_delete_project_removes_graph() {
        let store = InMemoryPlanStore::new();
        let project = seeded_project(&store).await;

        let mut tx = store.begin_graph_transaction().await.unwrap();
        let stage = tx
            .insert_stage(project.id, &NewWorkItem::new("A", 1, 0))
            .unwrap();
        tx.insert_task(stage, &NewWorkItem::new("t", 1, 0)).unwrap();
        tx.commit().unwrap();

        assert!(store.delete_project(project.id).await.unwrap());
        assert!(store.get_stages(project.id).await.unwrap().is_empty());
        assert!(store.get_project(project.id).await.unwrap().is_none());
    }
}
