//! SQLite Plan Store
//!
//! File-based persistent storage using SQLite.
//! Foreign keys are enforced so deleting a project or stage cascades to its
//! children; ids use AUTOINCREMENT so a rebuilt graph never reuses an old id.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::domain::models::{
    NewProject, NewWorkItem, Project, ProjectId, ProjectUpdate, Stage, StageId, StudentId, Task,
    TaskId, Team, TeamId,
};
use crate::domain::ports::{GraphTransaction, PlanStore};
use crate::error::{Result, StorageError};

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS teams (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        owner_id INTEGER NOT NULL,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS team_members (
        team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
        student_id INTEGER NOT NULL,
        PRIMARY KEY (team_id, student_id)
    );

    CREATE TABLE IF NOT EXISTS projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        deadline INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_projects_team ON projects(team_id);

    CREATE TABLE IF NOT EXISTS stages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        name TEXT NOT NULL,
        duration INTEGER NOT NULL DEFAULT 1 CHECK (duration > 0),
        is_completed BOOLEAN NOT NULL DEFAULT 0,
        responsibles TEXT NOT NULL DEFAULT '[]',
        feedback TEXT,
        dependencies TEXT NOT NULL DEFAULT '[]'
    );

    CREATE INDEX IF NOT EXISTS idx_stages_project ON stages(project_id, position);

    CREATE TABLE IF NOT EXISTS tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        stage_id INTEGER NOT NULL REFERENCES stages(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        name TEXT NOT NULL,
        duration INTEGER NOT NULL DEFAULT 1 CHECK (duration > 0),
        is_completed BOOLEAN NOT NULL DEFAULT 0,
        responsibles TEXT NOT NULL DEFAULT '[]',
        feedback TEXT,
        dependencies TEXT NOT NULL DEFAULT '[]'
    );

    CREATE INDEX IF NOT EXISTS idx_tasks_stage ON tasks(stage_id, position);
";

/// SQLite-based PlanStore implementation
#[derive(Clone)]
pub struct SqlitePlanStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePlanStore {
    /// Create a new SQLite store at the given path, creating missing parent directories
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory SQLite store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn from_secs(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        name: row.get(1)?,
        owner_id: row.get(2)?,
        created_at: from_secs(row.get(3)?),
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        deadline: from_secs(row.get(3)?),
        created_at: from_secs(row.get(4)?),
        team_id: row.get(5)?,
    })
}

fn stage_from_row(row: &Row<'_>) -> rusqlite::Result<Stage> {
    Ok(Stage {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        duration: row.get(3)?,
        is_completed: row.get(4)?,
        responsibles: json_column(row, 5)?,
        feedback: row.get(6)?,
        dependencies: json_column(row, 7)?,
        tasks: Vec::new(),
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        stage_id: row.get(1)?,
        name: row.get(2)?,
        duration: row.get(3)?,
        is_completed: row.get(4)?,
        responsibles: json_column(row, 5)?,
        feedback: row.get(6)?,
        dependencies: json_column(row, 7)?,
    })
}

fn query_team(conn: &Connection, team_id: TeamId) -> Result<Option<Team>> {
    let team = conn
        .query_row(
            "SELECT id, name, owner_id, created_at FROM teams WHERE id = ?1",
            params![team_id],
            team_from_row,
        )
        .optional()?;
    Ok(team)
}

fn query_project(conn: &Connection, project_id: ProjectId) -> Result<Option<Project>> {
    let project = conn
        .query_row(
            "SELECT id, name, description, deadline, created_at, team_id
             FROM projects WHERE id = ?1",
            params![project_id],
            project_from_row,
        )
        .optional()?;
    Ok(project)
}

fn query_tasks(conn: &Connection, stage_id: StageId) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(
        "SELECT id, stage_id, name, duration, is_completed, responsibles, feedback, dependencies
         FROM tasks WHERE stage_id = ?1 ORDER BY position, id",
    )?;
    let tasks = stmt
        .query_map(params![stage_id], task_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

fn query_stage(conn: &Connection, stage_id: StageId) -> Result<Option<Stage>> {
    let stage = conn
        .query_row(
            "SELECT id, project_id, name, duration, is_completed, responsibles, feedback, dependencies
             FROM stages WHERE id = ?1",
            params![stage_id],
            stage_from_row,
        )
        .optional()?;

    match stage {
        Some(mut stage) => {
            stage.tasks = query_tasks(conn, stage.id)?;
            Ok(Some(stage))
        }
        None => Ok(None),
    }
}

fn query_stages(conn: &Connection, project_id: ProjectId) -> Result<Vec<Stage>> {
    let mut stmt = conn.prepare(
        "SELECT id, project_id, name, duration, is_completed, responsibles, feedback, dependencies
         FROM stages WHERE project_id = ?1 ORDER BY position, id",
    )?;
    let mut stages = stmt
        .query_map(params![project_id], stage_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for stage in &mut stages {
        stage.tasks = query_tasks(conn, stage.id)?;
    }
    Ok(stages)
}

#[async_trait]
impl PlanStore for SqlitePlanStore {
    async fn create_team(&self, name: &str, owner_id: StudentId) -> Result<Team> {
        let conn = self.conn.lock().await;
        let created_at = from_secs(Utc::now().timestamp());

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO teams (name, owner_id, created_at) VALUES (?1, ?2, ?3)",
            params![name, owner_id, created_at.timestamp()],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "INSERT OR IGNORE INTO team_members (team_id, student_id) VALUES (?1, ?2)",
            params![id, owner_id],
        )?;
        tx.commit()?;

        Ok(Team {
            id,
            name: name.to_string(),
            owner_id,
            created_at,
        })
    }

    async fn get_team(&self, team_id: TeamId) -> Result<Option<Team>> {
        let conn = self.conn.lock().await;
        query_team(&conn, team_id)
    }

    async fn add_member(&self, team_id: TeamId, student_id: StudentId) -> Result<bool> {
        let conn = self.conn.lock().await;
        if query_team(&conn, team_id)?.is_none() {
            return Ok(false);
        }
        conn.execute(
            "INSERT OR IGNORE INTO team_members (team_id, student_id) VALUES (?1, ?2)",
            params![team_id, student_id],
        )?;
        Ok(true)
    }

    async fn is_member(&self, team_id: TeamId, student_id: StudentId) -> Result<bool> {
        let conn = self.conn.lock().await;
        let member: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM teams WHERE id = ?1 AND owner_id = ?2)
                 OR EXISTS(SELECT 1 FROM team_members WHERE team_id = ?1 AND student_id = ?2)",
            params![team_id, student_id],
            |row| row.get(0),
        )?;
        Ok(member)
    }

    async fn create_project(&self, project: &NewProject) -> Result<Project> {
        let conn = self.conn.lock().await;
        if query_team(&conn, project.team_id)?.is_none() {
            return Err(StorageError::team_not_found(project.team_id));
        }

        let created_at = from_secs(Utc::now().timestamp());
        let deadline = from_secs(project.deadline.timestamp());
        conn.execute(
            "INSERT INTO projects (name, description, deadline, created_at, team_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &project.name,
                &project.description,
                deadline.timestamp(),
                created_at.timestamp(),
                project.team_id
            ],
        )?;

        Ok(Project {
            id: conn.last_insert_rowid(),
            name: project.name.clone(),
            description: project.description.clone(),
            deadline,
            created_at,
            team_id: project.team_id,
        })
    }

    async fn get_project(&self, project_id: ProjectId) -> Result<Option<Project>> {
        let conn = self.conn.lock().await;
        query_project(&conn, project_id)
    }

    async fn list_team_projects(&self, team_id: TeamId) -> Result<Vec<Project>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, description, deadline, created_at, team_id
             FROM projects WHERE team_id = ?1 ORDER BY id",
        )?;
        let projects = stmt
            .query_map(params![team_id], project_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(projects)
    }

    async fn update_project(
        &self,
        project_id: ProjectId,
        update: &ProjectUpdate,
    ) -> Result<Option<Project>> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE projects SET name = ?1, description = ?2, deadline = ?3 WHERE id = ?4",
            params![
                &update.name,
                &update.description,
                update.deadline.timestamp(),
                project_id
            ],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        query_project(&conn, project_id)
    }

    async fn delete_project(&self, project_id: ProjectId) -> Result<bool> {
        let conn = self.conn.lock().await;
        let deleted = conn.execute("DELETE FROM projects WHERE id = ?1", params![project_id])?;
        Ok(deleted > 0)
    }

    async fn get_stages(&self, project_id: ProjectId) -> Result<Vec<Stage>> {
        let conn = self.conn.lock().await;
        query_stages(&conn, project_id)
    }

    async fn begin_graph_transaction<'a>(&'a self) -> Result<Box<dyn GraphTransaction + 'a>> {
        let conn = self.conn.lock().await;
        conn.execute_batch("BEGIN IMMEDIATE").map_err(|e| {
            StorageError::transaction(format!("BEGIN failed: {}", e)).with_source(e)
        })?;
        Ok(Box::new(SqliteGraphTransaction {
            conn,
            finished: false,
        }))
    }
}

/// Open SQLite transaction holding the store's connection
pub struct SqliteGraphTransaction<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl SqliteGraphTransaction<'_> {
    fn finish(&mut self, statement: &str) -> Result<()> {
        self.conn.execute_batch(statement).map_err(|e| {
            StorageError::transaction(format!("{} failed: {}", statement, e)).with_source(e)
        })?;
        self.finished = true;
        Ok(())
    }
}

impl GraphTransaction for SqliteGraphTransaction<'_> {
    fn detach_stages(&mut self, project_id: ProjectId) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM stages WHERE project_id = ?1", params![project_id])?;
        Ok(removed)
    }

    fn insert_stage(&mut self, project_id: ProjectId, stage: &NewWorkItem) -> Result<StageId> {
        self.conn.execute(
            "INSERT INTO stages
             (project_id, position, name, duration, is_completed, responsibles, feedback, dependencies)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, '[]')",
            params![
                project_id,
                stage.position as i64,
                &stage.name,
                stage.duration,
                stage.is_completed,
                serde_json::to_string(&stage.responsibles)?,
                &stage.feedback,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn insert_task(&mut self, stage_id: StageId, task: &NewWorkItem) -> Result<TaskId> {
        self.conn.execute(
            "INSERT INTO tasks
             (stage_id, position, name, duration, is_completed, responsibles, feedback, dependencies)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, '[]')",
            params![
                stage_id,
                task.position as i64,
                &task.name,
                task.duration,
                task.is_completed,
                serde_json::to_string(&task.responsibles)?,
                &task.feedback,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn set_stage_dependencies(
        &mut self,
        stage_id: StageId,
        dependencies: &[StageId],
    ) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE stages SET dependencies = ?1 WHERE id = ?2",
            params![serde_json::to_string(dependencies)?, stage_id],
        )?;
        if updated == 0 {
            return Err(StorageError::database(format!(
                "Stage not found: {}",
                stage_id
            )));
        }
        Ok(())
    }

    fn set_task_dependencies(&mut self, task_id: TaskId, dependencies: &[i64]) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE tasks SET dependencies = ?1 WHERE id = ?2",
            params![serde_json::to_string(dependencies)?, task_id],
        )?;
        if updated == 0 {
            return Err(StorageError::database(format!("Task not found: {}", task_id)));
        }
        Ok(())
    }

    fn load_stage(&mut self, stage_id: StageId) -> Result<Option<Stage>> {
        query_stage(&self.conn, stage_id)
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        self.finish("COMMIT")
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK")
    }
}

impl Drop for SqliteGraphTransaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            tracing::warn!("Failed to roll back abandoned graph transaction: {}", e);
        }
    }
}
