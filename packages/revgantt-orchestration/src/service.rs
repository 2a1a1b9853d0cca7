//! Project service facade
//!
//! Resolves the project (404), checks team membership (403), then delegates
//! to the store or the [`StageGraphRebuilder`].

use crate::config::ServiceConfig;
use crate::error::{OrchestratorError, Result};
use crate::invitation::{Invitation, InvitationStateMachine};
use crate::plan::StageSpec;
use crate::rebuild::{RebuildReport, StageGraphRebuilder};
use revgantt_storage::{
    NewProject, PlanStore, Project, ProjectId, ProjectUpdate, SqlitePlanStore, Stage, StudentId,
    Team, TeamId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Project with its ordered stage graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: Project,
    pub stages: Vec<Stage>,
}

pub struct ProjectService {
    store: Arc<dyn PlanStore>,
    rebuilder: StageGraphRebuilder,
}

impl ProjectService {
    pub fn new(store: Arc<dyn PlanStore>) -> Self {
        let rebuilder = StageGraphRebuilder::new(store.clone());
        Self { store, rebuilder }
    }

    /// Open the configured SQLite database (in-memory when no path is set)
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;
        let store = match &config.database.path {
            Some(path) => SqlitePlanStore::new(path)?,
            None => SqlitePlanStore::in_memory()?,
        };
        info!(
            "{} service ready: database={}",
            config.app_name,
            config
                .database
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ":memory:".to_string())
        );
        Ok(Self::new(Arc::new(store)))
    }

    pub fn store(&self) -> &Arc<dyn PlanStore> {
        &self.store
    }

    pub fn rebuilder(&self) -> &StageGraphRebuilder {
        &self.rebuilder
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Access checks
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn require_member(&self, team_id: TeamId, user_id: StudentId) -> Result<()> {
        if self.store.is_member(team_id, user_id).await? {
            Ok(())
        } else {
            Err(OrchestratorError::PermissionDenied {
                team_id,
                student_id: user_id,
            })
        }
    }

    async fn require_team(&self, team_id: TeamId, user_id: StudentId) -> Result<Team> {
        let team = self
            .store
            .get_team(team_id)
            .await?
            .ok_or(OrchestratorError::TeamNotFound(team_id))?;
        self.require_member(team_id, user_id).await?;
        Ok(team)
    }

    async fn require_project(&self, project_id: ProjectId, user_id: StudentId) -> Result<Project> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or(OrchestratorError::ProjectNotFound(project_id))?;
        self.require_member(project.team_id, user_id).await?;
        Ok(project)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Teams
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn create_team(&self, name: &str, owner_id: StudentId) -> Result<Team> {
        Ok(self.store.create_team(name, owner_id).await?)
    }

    pub async fn get_team(&self, team_id: TeamId, user_id: StudentId) -> Result<Team> {
        self.require_team(team_id, user_id).await
    }

    /// Add a member on behalf of an existing member
    pub async fn add_member(
        &self,
        team_id: TeamId,
        requester: StudentId,
        student_id: StudentId,
    ) -> Result<()> {
        self.require_team(team_id, requester).await?;
        if !self.store.add_member(team_id, student_id).await? {
            return Err(OrchestratorError::TeamNotFound(team_id));
        }
        Ok(())
    }

    pub async fn is_member(&self, team_id: TeamId, student_id: StudentId) -> Result<bool> {
        Ok(self.store.is_member(team_id, student_id).await?)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Invitations
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Accept and join the team. The updated invitation is returned for persisting
    pub async fn accept_invitation(
        &self,
        invitation: Invitation,
        user_id: StudentId,
    ) -> Result<Invitation> {
        let team_id = invitation.team_id;
        let mut sm = InvitationStateMachine::new(invitation);
        sm.accept(user_id)?;

        if !self.store.add_member(team_id, user_id).await? {
            return Err(OrchestratorError::TeamNotFound(team_id));
        }
        info!("Invitation accepted: team={}, student={}", team_id, user_id);
        Ok(sm.into_invitation())
    }

    pub async fn decline_invitation(
        &self,
        invitation: Invitation,
        user_id: StudentId,
    ) -> Result<Invitation> {
        let mut sm = InvitationStateMachine::new(invitation);
        sm.decline(user_id)?;
        Ok(sm.into_invitation())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Projects
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn create_project(&self, user_id: StudentId, project: &NewProject) -> Result<Project> {
        self.require_team(project.team_id, user_id).await?;
        let created = self.store.create_project(project).await?;
        info!(
            "Project created: id={}, team={}",
            created.id, created.team_id
        );
        Ok(created)
    }

    pub async fn get_project(&self, project_id: ProjectId, user_id: StudentId) -> Result<ProjectView> {
        let project = self.require_project(project_id, user_id).await?;
        let stages = self.store.get_stages(project_id).await?;
        Ok(ProjectView { project, stages })
    }

    pub async fn list_team_projects(
        &self,
        team_id: TeamId,
        user_id: StudentId,
    ) -> Result<Vec<Project>> {
        self.require_team(team_id, user_id).await?;
        Ok(self.store.list_team_projects(team_id).await?)
    }

    pub async fn update_project(
        &self,
        project_id: ProjectId,
        user_id: StudentId,
        update: &ProjectUpdate,
    ) -> Result<Project> {
        self.require_project(project_id, user_id).await?;
        self.store
            .update_project(project_id, update)
            .await?
            .ok_or(OrchestratorError::ProjectNotFound(project_id))
    }

    /// Delete a project with its stages and tasks
    pub async fn delete_project(&self, project_id: ProjectId, user_id: StudentId) -> Result<()> {
        self.require_project(project_id, user_id).await?;

        let locks = self.rebuilder.locks();
        let guard = locks.acquire(project_id).await;
        let deleted = self.store.delete_project(project_id).await?;
        drop(guard);
        locks.forget(project_id);

        if !deleted {
            return Err(OrchestratorError::ProjectNotFound(project_id));
        }
        info!("Project deleted: id={}", project_id);
        Ok(())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Stage graph
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn get_stages(&self, project_id: ProjectId, user_id: StudentId) -> Result<Vec<Stage>> {
        self.require_project(project_id, user_id).await?;
        Ok(self.store.get_stages(project_id).await?)
    }

    /// `PUT /projects/{project_id}/stages`
    pub async fn replace_stages(
        &self,
        project_id: ProjectId,
        user_id: StudentId,
        specs: &[StageSpec],
    ) -> Result<Vec<Stage>> {
        self.replace_stages_with_report(project_id, user_id, specs)
            .await
            .map(|(stages, _)| stages)
    }

    pub async fn replace_stages_with_report(
        &self,
        project_id: ProjectId,
        user_id: StudentId,
        specs: &[StageSpec],
    ) -> Result<(Vec<Stage>, RebuildReport)> {
        self.require_project(project_id, user_id).await?;
        self.rebuilder.rebuild_with_report(project_id, specs).await
    }
}
