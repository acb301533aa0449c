//! Two-sided accept/decline handshakes that gate tournament match creation.

use shared::ParticipantId;
use std::fmt;

/// Errors that can occur while opening an invitation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvitationError {
    /// The participant already has an open invitation.
    AlreadyInvited(ParticipantId),
}

impl fmt::Display for InvitationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvitationError::AlreadyInvited(participant) => {
                write!(f, "participant {} already has an open invitation", participant)
            }
        }
    }
}

impl std::error::Error for InvitationError {}

#[derive(Debug, Clone)]
struct Invitation {
    a: ParticipantId,
    b: ParticipantId,
    response_a: Option<bool>,
    response_b: Option<bool>,
}

/// A handshake both sides have answered. The caller inspects both flags to
/// decide between creating the match and cancelling the pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedInvitation {
    pub a: ParticipantId,
    pub b: ParticipantId,
    pub accepted_a: bool,
    pub accepted_b: bool,
}

impl ResolvedInvitation {
    pub fn both_accepted(&self) -> bool {
        self.accepted_a && self.accepted_b
    }
}

/// Pending invitations for one tournament. At most one open invitation per
/// participant at a time.
#[derive(Debug, Clone, Default)]
pub struct InvitationPool {
    pending: Vec<Invitation>,
}

impl InvitationPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a pending invitation with both responses unset.
    pub fn open(&mut self, a: ParticipantId, b: ParticipantId) -> Result<(), InvitationError> {
        if self.has_open(a) {
            return Err(InvitationError::AlreadyInvited(a));
        }
        if self.has_open(b) {
            return Err(InvitationError::AlreadyInvited(b));
        }
        self.pending.push(Invitation {
            a,
            b,
            response_a: None,
            response_b: None,
        });
        Ok(())
    }

    pub fn has_open(&self, participant: ParticipantId) -> bool {
        self.pending
            .iter()
            .any(|invitation| invitation.a == participant || invitation.b == participant)
    }

    /// Records one side's answer. The invitation resolves only once both
    /// sides have answered, whatever the answers were; until then `None`.
    pub fn respond(
        &mut self,
        participant: ParticipantId,
        accept: bool,
    ) -> Option<ResolvedInvitation> {
        let index = self
            .pending
            .iter()
            .position(|invitation| invitation.a == participant || invitation.b == participant)?;

        let invitation = &mut self.pending[index];
        if invitation.a == participant {
            invitation.response_a = Some(accept);
        } else {
            invitation.response_b = Some(accept);
        }

        if let (Some(accepted_a), Some(accepted_b)) =
            (invitation.response_a, invitation.response_b)
        {
            let resolved = ResolvedInvitation {
                a: invitation.a,
                b: invitation.b,
                accepted_a,
                accepted_b,
            };
            self.pending.remove(index);
            Some(resolved)
        } else {
            None
        }
    }

    /// Removes any invitation involving the participant (disconnect or
    /// timeout handling). Returns true if one was removed.
    pub fn cancel(&mut self, participant: ParticipantId) -> bool {
        let before = self.pending.len();
        self.pending
            .retain(|invitation| invitation.a != participant && invitation.b != participant);
        self.pending.len() != before
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
