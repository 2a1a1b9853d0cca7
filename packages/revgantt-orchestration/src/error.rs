use revgantt_storage::{ErrorKind, ProjectId, StorageError, StudentId, TeamId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("Team not found: {0}")]
    TeamNotFound(TeamId),

    #[error("Student {student_id} is not a member of team {team_id}")]
    PermissionDenied { team_id: TeamId, student_id: StudentId },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl OrchestratorError {
    pub fn config<E: std::fmt::Display>(e: E) -> Self {
        Self::Config(e.to_string())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ProjectNotFound(_) | Self::TeamNotFound(_) => ErrorCategory::NotFound,
            Self::Storage(e) if e.is_not_found() => ErrorCategory::NotFound,
            Self::PermissionDenied { .. } => ErrorCategory::Permission,
            Self::InvalidStateTransition { .. } => ErrorCategory::Conflict,
            Self::Storage(_) | Self::Config(_) | Self::Io(_) | Self::Yaml(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// HTTP status the routing layer should answer with
    pub fn status_code(&self) -> u16 {
        self.category().status_code()
    }

    /// `{"detail": ...}` body matching the public API's error shape
    ///
    /// Internal errors name only the failure class; driver messages stay in the logs.
    pub fn error_body(&self) -> ErrorBody {
        let detail = match self {
            Self::ProjectNotFound(_) => "Project not found".to_string(),
            Self::TeamNotFound(_) => "Team not found".to_string(),
            Self::PermissionDenied { .. } => "Not a member of the project team".to_string(),
            Self::InvalidStateTransition { .. } => self.to_string(),
            Self::Storage(e) if e.is_not_found() => match e.kind {
                ErrorKind::TeamNotFound => "Team not found".to_string(),
                _ => "Project not found".to_string(),
            },
            Self::Storage(e) => format!("Internal server error: {} failure", e.kind),
            Self::Config(_) | Self::Yaml(_) => {
                "Internal server error: configuration failure".to_string()
            }
            Self::Io(_) => "Internal server error: io failure".to_string(),
        };
        ErrorBody { detail }
    }
}

/// Error category, one per response class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing project or team - don't retry
    NotFound,
    /// Caller is not a team member
    Permission,
    /// Request conflicts with current state (e.g. answering a settled invitation)
    Conflict,
    /// Storage or transaction failure - surfaced for manual retry
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Permission => "permission",
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::Internal => "internal",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCategory::NotFound => 404,
            ErrorCategory::Permission => 403,
            ErrorCategory::Conflict => 409,
            ErrorCategory::Internal => 500,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(OrchestratorError::ProjectNotFound(3).status_code(), 404);
        assert_eq!(
            OrchestratorError::PermissionDenied {
                team_id: 1,
                student_id: 2
            }
            .status_code(),
            403
        );
        assert_eq!(
            OrchestratorError::Storage(StorageError::transaction("COMMIT failed")).status_code(),
            500
        );
        assert_eq!(
            OrchestratorError::InvalidStateTransition {
                from: "accepted".to_string(),
                to: "declined".to_string()
            }
            .status_code(),
            409
        );
    }

    #[test]
    fn test_storage_not_found_maps_to_404() {
        let err: OrchestratorError = StorageError::team_not_found(8).into();
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_internal_error_body_hides_driver_text() {
        let err = OrchestratorError::Storage(StorageError::constraint(
            "SQLite error: CHECK constraint failed: duration > 0",
        ));
        let body = err.error_body();
        assert_eq!(body.detail, "Internal server error: constraint failure");
        assert!(!body.detail.contains("SQLite"));

        // Full text still available for logs
        assert!(err.to_string().contains("CHECK constraint failed"));

        let json = serde_json::to_value(&body).unwrap();
        assert!(json["detail"].is_string());
    }

    #[test]
    fn test_config_error_body() {
        let body = OrchestratorError::config("bad level 'loud'").error_body();
        assert_eq!(body.detail, "Internal server error: configuration failure");
    }

    #[test]
    fn test_not_found_body() {
        let body = OrchestratorError::ProjectNotFound(12).error_body();
        assert_eq!(body.detail, "Project not found");

        let body = OrchestratorError::Storage(StorageError::team_not_found(4)).error_body();
        assert_eq!(body.detail, "Team not found");
    }

    #[test]
    fn test_error_category_as_str() {
        assert_eq!(ErrorCategory::NotFound.as_str(), "not_found");
        assert_eq!(ErrorCategory::Permission.as_str(), "permission");
        assert_eq!(ErrorCategory::Conflict.as_str(), "conflict");
        assert_eq!(ErrorCategory::Internal.to_string(), "internal");
    }
}
