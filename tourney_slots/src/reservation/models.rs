//! Reservation data models.

use crate::auth::UserId;
use crate::tournament::{Team, TeamId, Tournament, TournamentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reservation ID type
pub type ReservationId = i64;

/// Status derived from the `is_paid` / `payment_confirmed` flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Team selected, no payment submitted
    Unpaid,
    /// Payment submitted, awaiting operator review
    PendingConfirmation,
    /// Payment verified by an operator; the slot is final
    Confirmed,
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReservationStatus::Unpaid => write!(f, "unpaid"),
            ReservationStatus::PendingConfirmation => write!(f, "pending"),
            ReservationStatus::Confirmed => write!(f, "confirmed"),
        }
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unpaid" | "not_paid" => Ok(ReservationStatus::Unpaid),
            "pending" | "pending_confirmation" => Ok(ReservationStatus::PendingConfirmation),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            other => Err(format!("unknown reservation status: {other}")),
        }
    }
}

/// Availability of one team inside one tournament
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Nobody has paid for or confirmed the team
    Available,
    /// Someone else has submitted payment and awaits review
    PendingHeld,
    /// An operator confirmed the team for someone
    ConfirmedTaken,
}

impl Availability {
    /// Evaluate availability over every reservation of one (tournament, team) slot.
    ///
    /// When `viewer` is given, that participant's own paid reservation does not
    /// count as a pending hold. Unpaid reservations never hold a slot.
    pub fn evaluate<'a, I>(slot: I, viewer: Option<UserId>) -> Self
    where
        I: IntoIterator<Item = &'a Reservation>,
    {
        let mut pending = false;
        for reservation in slot {
            if reservation.payment_confirmed {
                return Availability::ConfirmedTaken;
            }
            if reservation.is_paid && viewer != Some(reservation.participant_id) {
                pending = true;
            }
        }

        if pending {
            Availability::PendingHeld
        } else {
            Availability::Available
        }
    }

    pub fn is_available(self) -> bool {
        self == Availability::Available
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Availability::Available => write!(f, "available"),
            Availability::PendingHeld => write!(f, "pending"),
            Availability::ConfirmedTaken => write!(f, "taken"),
        }
    }
}

/// Payment metadata recorded on submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    /// Off-platform payment channel (e.g. bKash, Nagad)
    pub method: String,
    pub transaction_ref: String,
    pub contact_number: String,
    pub paid_at: DateTime<Utc>,
}

/// Payment proof submitted by a participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSubmission {
    pub method: String,
    pub transaction_ref: String,
    pub contact_number: String,
}

impl PaymentSubmission {
    pub fn new(
        method: impl Into<String>,
        transaction_ref: impl Into<String>,
        contact_number: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            transaction_ref: transaction_ref.into(),
            contact_number: contact_number.into(),
        }
    }

    /// Trim every field and reject the submission if any is left empty.
    ///
    /// Returns the name of the first empty field on failure.
    pub fn normalized(&self) -> Result<PaymentSubmission, &'static str> {
        let method = self.method.trim();
        let transaction_ref = self.transaction_ref.trim();
        let contact_number = self.contact_number.trim();

        if method.is_empty() {
            return Err("payment method");
        }
        if transaction_ref.is_empty() {
            return Err("transaction reference");
        }
        if contact_number.is_empty() {
            return Err("contact number");
        }

        Ok(PaymentSubmission::new(method, transaction_ref, contact_number))
    }

    /// Stamp the submission with the time it was recorded
    pub fn at(self, paid_at: DateTime<Utc>) -> PaymentDetails {
        PaymentDetails {
            method: self.method,
            transaction_ref: self.transaction_ref,
            contact_number: self.contact_number,
            paid_at,
        }
    }
}

/// One participant's claim on one team within one tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub participant_id: UserId,
    pub tournament_id: TournamentId,
    pub team_id: TeamId,
    pub created_at: DateTime<Utc>,
    pub is_paid: bool,
    pub payment_confirmed: bool,
    /// Empty until payment is submitted, cleared again on rejection
    pub payment: Option<PaymentDetails>,
    pub confirmed_by: Option<UserId>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn status(&self) -> ReservationStatus {
        if self.payment_confirmed {
            ReservationStatus::Confirmed
        } else if self.is_paid {
            ReservationStatus::PendingConfirmation
        } else {
            ReservationStatus::Unpaid
        }
    }

    /// `"<method> - <transaction ref>"`, or a placeholder when unpaid
    pub fn payment_summary(&self) -> String {
        match &self.payment {
            Some(p) => format!("{} - {}", p.method, p.transaction_ref),
            None => "No payment info".to_string(),
        }
    }
}

/// Insert request for a fresh Unpaid reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReservation {
    pub participant_id: UserId,
    pub tournament_id: TournamentId,
    pub team_id: TeamId,
    pub created_at: DateTime<Utc>,
}

/// Result of a create request that did not fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reservation", rename_all = "snake_case")]
pub enum CreateOutcome {
    /// A new Unpaid reservation was inserted
    Created(Reservation),
    /// The participant already holds a confirmed slot in this tournament
    AlreadyConfirmed(Reservation),
}

impl CreateOutcome {
    pub fn reservation(&self) -> &Reservation {
        match self {
            CreateOutcome::Created(r) | CreateOutcome::AlreadyConfirmed(r) => r,
        }
    }

    pub fn into_reservation(self) -> Reservation {
        match self {
            CreateOutcome::Created(r) | CreateOutcome::AlreadyConfirmed(r) => r,
        }
    }
}

/// A (tournament, team) pair confirmed for more than one reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateSlot {
    pub tournament_id: TournamentId,
    pub team_id: TeamId,
    pub count: u64,
}

/// Team and its availability on a tournament board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSlot {
    pub team: Team,
    pub availability: Availability,
}

/// Availability of every team in a tournament plus capacity figures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamBoard {
    pub tournament: Tournament,
    pub teams: Vec<TeamSlot>,
    pub confirmed_count: u32,
    pub remaining_slots: u32,
    pub is_full: bool,
}

impl TeamBoard {
    /// Teams a participant could still pick
    pub fn available_teams(&self) -> impl Iterator<Item = &Team> {
        self.teams
            .iter()
            .filter(|slot| slot.availability.is_available())
            .map(|slot| &slot.team)
    }
}

/// Confirmed reservation with its team, as listed on the roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub team: Team,
    pub reservation: Reservation,
}

/// Outcome of confirming several reservations in one operator action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkConfirmReport {
    pub confirmed: Vec<ReservationId>,
    /// Reservation id and the reason it was not confirmed
    pub failed: Vec<(ReservationId, String)>,
}

/// Outcome of rejecting several payments in one operator action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRejectReport {
    pub rejected: Vec<ReservationId>,
    /// Reservation id and the reason it was not rejected
    pub failed: Vec<(ReservationId, String)>,
}

/// Operator listing filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationFilter {
    pub tournament_id: Option<TournamentId>,
    pub status: Option<ReservationStatus>,
}

impl ReservationFilter {
    pub fn matches(&self, reservation: &Reservation) -> bool {
        self.tournament_id
            .is_none_or(|id| reservation.tournament_id == id)
            && self.status.is_none_or(|s| reservation.status() == s)
    }
}
