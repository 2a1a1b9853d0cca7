/*
 * Reverse Gantt Orchestration - stage graph rebuilds for team projects
 *
 * Architecture:
 * - Dependency reference codec (positional → durable ids)
 * - Stage/Task Graph Rebuilder (one transaction per save)
 * - Per-project rebuild locks
 * - Project service facade (404/403 checks, invitations)
 * - Configuration, logging, metrics
 */

// Public modules
pub mod config;
pub mod dependency_ref;
pub mod error;
pub mod invitation;
pub mod metrics;
pub mod plan;
pub mod project_lock;
pub mod rebuild;
pub mod service;
pub mod telemetry;

// Re-exports
pub use config::{DatabaseConfig, LoggingConfig, ServiceConfig};
pub use dependency_ref::{
    decode_stage_dependency, decode_task_dependency, encode, encode_stage_ref_for_task,
    encode_task_ref, DependencyRef, RefKind, TASK_INDEX_RADIX,
};
pub use error::{ErrorBody, ErrorCategory, OrchestratorError, Result};
pub use invitation::{Invitation, InvitationStateMachine, InvitationStatus};
pub use plan::{StageSpec, TaskSpec};
pub use project_lock::ProjectLocks;
pub use rebuild::{
    resolve_stage_dependencies, resolve_task_dependencies, PositionIndex, RebuildReport,
    StageGraphRebuilder,
};
pub use service::{ProjectService, ProjectView};
pub use telemetry::init_tracing;
