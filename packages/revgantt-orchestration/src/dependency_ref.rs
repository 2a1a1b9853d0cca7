//! Dependency reference codec
//!
//! Clients submit dependencies as plain integers that point at *positions* in
//! the submitted plan, not at durable ids:
//!
//! - Stage dependency `d`: stage at position `d`.
//! - Task dependency `v >= 0`: task `v % 10000` of stage `v / 10000`.
//! - Task dependency `v < 0`: stage at position `-(v + 1)`, so `-1` is stage 0.
//!
//! A task index of 10000 or more cannot be expressed. Encoding `(s, 10000 + k)`
//! naively yields the value of `(s + 1, k)`, so [`encode_task_ref`] refuses it.
//!
//! Everything the rebuilder needs to know about this scheme lives here.

use std::fmt;

/// Multiplier separating stage and task positions in a task reference
pub const TASK_INDEX_RADIX: i64 = 10_000;

/// A decoded positional reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyRef {
    /// Stage at a submitted position
    Stage(usize),
    /// Task at `(stage position, task position)`
    Task { stage: usize, task: usize },
}

impl DependencyRef {
    pub fn kind(&self) -> RefKind {
        match self {
            DependencyRef::Stage(_) => RefKind::Stage,
            DependencyRef::Task { .. } => RefKind::Task,
        }
    }
}

impl fmt::Display for DependencyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyRef::Stage(stage) => write!(f, "stage[{}]", stage),
            DependencyRef::Task { stage, task } => write!(f, "stage[{}].task[{}]", stage, task),
        }
    }
}

/// What a dependency value points at (used as a metric label)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Stage,
    Task,
}

impl RefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::Stage => "stage",
            RefKind::Task => "task",
        }
    }
}

/// Decode an entry of a task's `dependencies`
///
/// Never fails: the result is only a *shape*. Whether the position exists in
/// the plan is the caller's concern.
pub fn decode_task_dependency(value: i64) -> DependencyRef {
    if value >= 0 {
        DependencyRef::Task {
            stage: (value / TASK_INDEX_RADIX) as usize,
            task: (value % TASK_INDEX_RADIX) as usize,
        }
    } else {
        // -(v + 1) without overflowing on i64::MIN
        let stage = (-(value + 1)) as u64;
        DependencyRef::Stage(stage as usize)
    }
}

/// Decode an entry of a stage's `dependencies`
///
/// Negative values have no meaning and yield `None`.
pub fn decode_stage_dependency(value: i64) -> Option<usize> {
    usize::try_from(value).ok()
}

/// Encode a task reference. `None` if `task` can't be represented
pub fn encode_task_ref(stage: usize, task: usize) -> Option<i64> {
    let task = i64::try_from(task).ok().filter(|t| *t < TASK_INDEX_RADIX)?;
    i64::try_from(stage)
        .ok()?
        .checked_mul(TASK_INDEX_RADIX)?
        .checked_add(task)
}

/// Encode a task-to-stage reference (`-(stage + 1)`)
pub fn encode_stage_ref_for_task(stage: usize) -> Option<i64> {
    i64::try_from(stage).ok()?.checked_add(1).map(|v| -v)
}

/// Encode any reference as it would appear in a task's `dependencies`
pub fn encode(reference: DependencyRef) -> Option<i64> {
    match reference {
        DependencyRef::Stage(stage) => encode_stage_ref_for_task(stage),
        DependencyRef::Task { stage, task } => encode_task_ref(stage, task),
    }
}
