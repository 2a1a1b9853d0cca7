//! Stage/Task Graph Rebuilder
//!
//! Replaces a project's whole stage graph with a submitted plan inside one
//! storage transaction:
//!
//! 1. Detach: delete every stage (and task) of the project
//! 2. Create stages in submitted order, recording position → id
//! 3. Create tasks per stage in submitted order, recording (stage, task) → id
//! 4. Resolve stage dependencies through the stage table
//! 5. Resolve task dependencies through [`crate::dependency_ref`]
//! 6. Reload, restore submission order, commit
//!
//! References that don't land on something in the plan are dropped, never
//! fatal. Any storage failure rolls the transaction back, leaving the
//! previous graph in place.

use crate::dependency_ref::{
    decode_stage_dependency, decode_task_dependency, DependencyRef, RefKind, TASK_INDEX_RADIX,
};
use crate::error::{OrchestratorError, Result};
use crate::metrics;
use crate::plan::StageSpec;
use crate::project_lock::ProjectLocks;
use revgantt_storage::{
    GraphTransaction, PlanStore, ProjectId, Stage, StageId, StorageError, TaskId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Submitted positions → durable ids, for one rebuild
#[derive(Debug, Default)]
pub struct PositionIndex {
    stages: Vec<StageId>,
    tasks: Vec<Vec<TaskId>>,
    task_positions: HashMap<TaskId, usize>,
}

impl PositionIndex {
    fn push_stage(&mut self, stage_id: StageId) {
        self.stages.push(stage_id);
        self.tasks.push(Vec::new());
    }

    fn push_task(&mut self, stage_position: usize, task_id: TaskId) {
        if let Some(tasks) = self.tasks.get_mut(stage_position) {
            self.task_positions.insert(task_id, tasks.len());
            tasks.push(task_id);
        }
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage_ids(&self) -> &[StageId] {
        &self.stages
    }

    pub fn stage(&self, position: usize) -> Option<StageId> {
        self.stages.get(position).copied()
    }

    pub fn task(&self, stage: usize, task: usize) -> Option<TaskId> {
        self.tasks.get(stage)?.get(task).copied()
    }

    /// Submission position of a task within its stage
    pub fn task_position(&self, task_id: TaskId) -> Option<usize> {
        self.task_positions.get(&task_id).copied()
    }

    /// Durable id for a decoded reference, if the plan has that position
    pub fn resolve(&self, reference: DependencyRef) -> Option<i64> {
        match reference {
            DependencyRef::Stage(stage) => self.stage(stage),
            DependencyRef::Task { stage, task } => self.task(stage, task),
        }
    }
}

/// Counts from one successful rebuild
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildReport {
    pub project_id: ProjectId,
    pub detached_stages: usize,
    pub stages: usize,
    pub tasks: usize,
    pub dropped_stage_refs: usize,
    pub dropped_task_refs: usize,
    pub elapsed_ms: u64,
}

impl RebuildReport {
    pub fn dropped_total(&self) -> usize {
        self.dropped_stage_refs + self.dropped_task_refs
    }
}

/// Map stage dependencies to durable stage ids, returning how many were dropped
pub fn resolve_stage_dependencies(deps: &[i64], index: &PositionIndex) -> (Vec<StageId>, usize) {
    let resolved: Vec<StageId> = deps
        .iter()
        .filter_map(|&d| decode_stage_dependency(d).and_then(|p| index.stage(p)))
        .collect();
    let dropped = deps.len() - resolved.len();
    (resolved, dropped)
}

/// Map task dependencies to durable task or stage ids, returning how many were dropped
pub fn resolve_task_dependencies(deps: &[i64], index: &PositionIndex) -> (Vec<i64>, usize) {
    let resolved: Vec<i64> = deps
        .iter()
        .filter_map(|&v| index.resolve(decode_task_dependency(v)))
        .collect();
    let dropped = deps.len() - resolved.len();
    (resolved, dropped)
}

/// Rebuilds project stage graphs against a [`PlanStore`]
#[derive(Clone)]
pub struct StageGraphRebuilder {
    store: Arc<dyn PlanStore>,
    locks: ProjectLocks,
}

impl StageGraphRebuilder {
    pub fn new(store: Arc<dyn PlanStore>) -> Self {
        Self::with_locks(store, ProjectLocks::new())
    }

    /// Share project locks with other writers (e.g. project deletion)
    pub fn with_locks(store: Arc<dyn PlanStore>, locks: ProjectLocks) -> Self {
        Self { store, locks }
    }

    pub fn locks(&self) -> &ProjectLocks {
        &self.locks
    }

    /// Replace the project's stages and tasks; returns them in submitted order
    pub async fn rebuild(&self, project_id: ProjectId, specs: &[StageSpec]) -> Result<Vec<Stage>> {
        self.rebuild_with_report(project_id, specs)
            .await
            .map(|(stages, _)| stages)
    }

    pub async fn rebuild_with_report(
        &self,
        project_id: ProjectId,
        specs: &[StageSpec],
    ) -> Result<(Vec<Stage>, RebuildReport)> {
        let _guard = self.locks.acquire(project_id).await;
        let started = Instant::now();

        if self.store.get_project(project_id).await?.is_none() {
            return Err(OrchestratorError::ProjectNotFound(project_id));
        }

        info!(
            "Rebuilding stage graph: project={}, stages={}",
            project_id,
            specs.len()
        );

        let mut tx = self.store.begin_graph_transaction().await?;
        let applied = apply_plan(&mut *tx, project_id, specs);

        let (stages, mut report) = match applied {
            Ok(result) => match tx.commit() {
                Ok(()) => result,
                Err(e) => return Err(self.abort(project_id, e)),
            },
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(
                        "Rollback failed: project={}, error={}",
                        project_id, rollback_err
                    );
                }
                return Err(self.abort(project_id, e));
            }
        };

        report.elapsed_ms = started.elapsed().as_millis() as u64;

        if report.dropped_total() > 0 {
            warn!(
                "Dropped dependency references: project={}, stage_refs={}, task_refs={}",
                project_id, report.dropped_stage_refs, report.dropped_task_refs
            );
        }
        metrics::record_dropped(RefKind::Stage, report.dropped_stage_refs);
        metrics::record_dropped(RefKind::Task, report.dropped_task_refs);

        info!(
            "Stage graph rebuilt: project={}, stages={}, tasks={}, elapsed={}ms",
            project_id, report.stages, report.tasks, report.elapsed_ms
        );

        Ok((stages, report))
    }

    fn abort(&self, project_id: ProjectId, e: StorageError) -> OrchestratorError {
        error!(
            "Stage graph rebuild rolled back: project={}, error={}",
            project_id, e
        );
        metrics::record_failure();
        OrchestratorError::Storage(e)
    }
}

/// Steps 1-6 inside an open transaction
fn apply_plan<T: GraphTransaction + ?Sized>(
    tx: &mut T,
    project_id: ProjectId,
    specs: &[StageSpec],
) -> std::result::Result<(Vec<Stage>, RebuildReport), StorageError> {
    let mut report = RebuildReport {
        project_id,
        ..Default::default()
    };

    report.detached_stages = tx.detach_stages(project_id)?;
    debug!(
        "Detached stages: project={}, count={}",
        project_id, report.detached_stages
    );

    let mut index = PositionIndex::default();
    for (position, spec) in specs.iter().enumerate() {
        let stage_id = tx.insert_stage(project_id, &spec.to_work_item(position))?;
        index.push_stage(stage_id);
    }

    for (stage_position, spec) in specs.iter().enumerate() {
        if spec.tasks.len() as i64 > TASK_INDEX_RADIX {
            warn!(
                "Stage has more tasks than references can address: project={}, stage={}, tasks={}",
                project_id,
                stage_position,
                spec.tasks.len()
            );
        }
        let Some(stage_id) = index.stage(stage_position) else {
            continue;
        };
        for (task_position, task) in spec.tasks.iter().enumerate() {
            let task_id = tx.insert_task(stage_id, &task.to_work_item(task_position))?;
            index.push_task(stage_position, task_id);
        }
        report.tasks += spec.tasks.len();
    }

    for (stage_position, spec) in specs.iter().enumerate() {
        let Some(stage_id) = index.stage(stage_position) else {
            continue;
        };
        let (deps, dropped) = resolve_stage_dependencies(&spec.dependencies, &index);
        report.dropped_stage_refs += dropped;
        if !deps.is_empty() {
            tx.set_stage_dependencies(stage_id, &deps)?;
        }
    }

    for (stage_position, spec) in specs.iter().enumerate() {
        for (task_position, task) in spec.tasks.iter().enumerate() {
            let Some(task_id) = index.task(stage_position, task_position) else {
                continue;
            };
            let (deps, dropped) = resolve_task_dependencies(&task.dependencies, &index);
            report.dropped_task_refs += dropped;
            if !deps.is_empty() {
                tx.set_task_dependencies(task_id, &deps)?;
            }
        }
    }

    let mut stages = Vec::with_capacity(index.stage_count());
    for &stage_id in index.stage_ids() {
        let mut stage = tx.load_stage(stage_id)?.ok_or_else(|| {
            StorageError::transaction(format!("Stage {} missing after insert", stage_id))
        })?;
        restore_task_order(&mut stage, &index);
        stages.push(stage);
    }
    report.stages = stages.len();

    Ok((stages, report))
}

/// Put a reloaded stage's tasks back in submission order
///
/// Tasks the index doesn't know sort last, keeping their loaded order.
fn restore_task_order(stage: &mut Stage, index: &PositionIndex) {
    stage
        .tasks
        .sort_by_key(|t| index.task_position(t.id).unwrap_or(usize::MAX));
}
