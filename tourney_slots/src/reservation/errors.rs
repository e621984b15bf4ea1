//! Reservation error types.

use super::models::ReservationId;
use crate::db::RepositoryError;
use crate::tournament::{TeamId, TournamentId};
use thiserror::Error;

/// Reservation errors
///
/// Every variant except `Repository` is a user-facing condition that the
/// presentation layer renders; none of them indicate a process failure.
#[derive(Debug, Error)]
pub enum ReservationError {
    /// Registration attempted after the tournament's deadline
    #[error("Registration deadline has passed for tournament {0}")]
    DeadlinePassed(TournamentId),

    /// Tournament is not active
    #[error("Tournament {0} is not accepting registrations")]
    RegistrationClosed(TournamentId),

    /// Participant already holds an unpaid or pending reservation here
    #[error("Participant already has reservation {existing} in this tournament")]
    DuplicateIntent { existing: ReservationId },

    /// Team is confirmed or pending for someone else
    #[error("Team {team_id} is not available in tournament {tournament_id}")]
    TeamUnavailable {
        tournament_id: TournamentId,
        team_id: TeamId,
    },

    /// Every team slot of the tournament is confirmed
    #[error("Tournament {0} is full")]
    TournamentFull(TournamentId),

    /// Team was taken between selection and payment; the reservation was removed
    #[error("Team {team_id} was taken before payment was recorded")]
    SlotLost { team_id: TeamId },

    /// Another reservation for the same team is already confirmed
    #[error("Team {team_id} is already confirmed for another participant")]
    SlotAlreadyTaken { team_id: TeamId },

    /// Paid reservations can only be removed by an operator
    #[error("Reservation {0} has been paid; contact an operator to cancel")]
    RequiresOperator(ReservationId),

    /// Caller lacks the role or ownership for this action
    #[error("Not authorized")]
    NotAuthorized,

    /// Payment resubmitted on a confirmed reservation
    #[error("Reservation {0} is already confirmed")]
    AlreadyConfirmed(ReservationId),

    /// Confirmation attempted before any payment was submitted
    #[error("Reservation {0} has no submitted payment")]
    PaymentNotSubmitted(ReservationId),

    /// Missing payment field
    #[error("Invalid payment: {0} is required")]
    InvalidPayment(&'static str),

    #[error("Tournament not found: {0}")]
    TournamentNotFound(TournamentId),

    #[error("Team not found: {0}")]
    TeamNotFound(TeamId),

    #[error("Reservation not found: {0}")]
    ReservationNotFound(ReservationId),

    /// Storage failure
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl ReservationError {
    /// Get a client-safe error message that doesn't leak storage details
    pub fn client_message(&self) -> String {
        match self {
            ReservationError::Repository(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Whether the condition is a contention outcome the caller may retry
    /// after refreshing availability data.
    pub fn is_slot_contention(&self) -> bool {
        matches!(
            self,
            ReservationError::TeamUnavailable { .. }
                | ReservationError::SlotLost { .. }
                | ReservationError::SlotAlreadyTaken { .. }
        )
    }
}

/// Result type for reservation operations
pub type ReservationResult<T> = Result<T, ReservationError>;
