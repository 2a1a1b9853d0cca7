use crate::error::{OrchestratorError, Result};
use chrono::{DateTime, Utc};
use revgantt_storage::{StudentId, TeamId};
use serde::{Deserialize, Serialize};

/// Invitation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvitationStatus::Pending)
    }
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Team invitation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: i64,
    pub team_id: TeamId,
    pub invited_by: StudentId,
    pub invited_user: StudentId,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl Invitation {
    pub fn new_pending(
        id: i64,
        team_id: TeamId,
        invited_by: StudentId,
        invited_user: StudentId,
    ) -> Self {
        Self {
            id,
            team_id,
            invited_by,
            invited_user,
            status: InvitationStatus::Pending,
            created_at: Utc::now(),
            responded_at: None,
        }
    }
}

/// Invitation state machine for transitions
pub struct InvitationStateMachine {
    invitation: Invitation,
}

impl InvitationStateMachine {
    pub fn new(invitation: Invitation) -> Self {
        Self { invitation }
    }

    pub fn invitation(&self) -> &Invitation {
        &self.invitation
    }

    pub fn into_invitation(self) -> Invitation {
        self.invitation
    }

    /// Transition: PENDING → ACCEPTED
    pub fn accept(&mut self, responder: StudentId) -> Result<()> {
        self.respond(responder, InvitationStatus::Accepted)
    }

    /// Transition: PENDING → DECLINED
    pub fn decline(&mut self, responder: StudentId) -> Result<()> {
        self.respond(responder, InvitationStatus::Declined)
    }

    fn respond(&mut self, responder: StudentId, to: InvitationStatus) -> Result<()> {
        if responder != self.invitation.invited_user {
            return Err(OrchestratorError::PermissionDenied {
                team_id: self.invitation.team_id,
                student_id: responder,
            });
        }

        match self.invitation.status {
            InvitationStatus::Pending => {
                self.invitation.status = to;
                self.invitation.responded_at = Some(Utc::now());
                Ok(())
            }
            from => Err(OrchestratorError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }
}
