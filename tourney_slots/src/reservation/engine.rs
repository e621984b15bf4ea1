//! Reservation engine enforcing the slot protocol.

use super::errors::{ReservationError, ReservationResult};
use super::models::{
    Availability, BulkConfirmReport, BulkRejectReport, CreateOutcome, DuplicateSlot, NewReservation,
    PaymentSubmission, Reservation, ReservationFilter, ReservationId, ReservationStatus,
    RosterEntry, TeamBoard, TeamSlot,
};
use crate::auth::{Actor, UserId};
use crate::clock::{Clock, SystemClock};
use crate::db::{Repository, RepositoryResult};
use crate::tournament::{Team, TeamId, Tournament, TournamentId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Run a guarded write, repeating it once if storage reports a conflict.
///
/// The repeated write re-evaluates its guard against fresh state. A second
/// conflict is reported as a refused guard (`None`) so the caller can
/// classify it from a re-read.
async fn guarded<T, F, Fut>(mut write: F) -> ReservationResult<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RepositoryResult<Option<T>>>,
{
    match write().await {
        Err(e) if e.is_conflict() => {
            log::warn!("Guarded write conflicted, retrying once: {}", e);
            match write().await {
                Err(e) if e.is_conflict() => {
                    log::warn!("Guarded write conflicted again: {}", e);
                    Ok(None)
                }
                other => Ok(other?),
            }
        }
        other => Ok(other?),
    }
}

/// Reservation engine
///
/// Every operation reads current state from the repository; nothing is
/// cached between calls, so several engines may share one store.
#[derive(Clone)]
pub struct ReservationEngine {
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
}

impl ReservationEngine {
    /// Create an engine with an explicit time source
    pub fn new(repo: Arc<dyn Repository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Create an engine on the wall clock
    pub fn with_system_clock(repo: Arc<dyn Repository>) -> Self {
        Self::new(repo, Arc::new(SystemClock))
    }

    /// Underlying repository
    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    fn require_operator(actor: &Actor) -> ReservationResult<()> {
        if actor.is_operator() {
            Ok(())
        } else {
            Err(ReservationError::NotAuthorized)
        }
    }

    async fn tournament(&self, id: TournamentId) -> ReservationResult<Tournament> {
        self.repo
            .find_tournament(id)
            .await?
            .ok_or(ReservationError::TournamentNotFound(id))
    }

    async fn team(&self, id: TeamId) -> ReservationResult<Team> {
        self.repo
            .find_team(id)
            .await?
            .ok_or(ReservationError::TeamNotFound(id))
    }

    async fn reservation(&self, id: ReservationId) -> ReservationResult<Reservation> {
        self.repo
            .find_reservation(id)
            .await?
            .ok_or(ReservationError::ReservationNotFound(id))
    }

    /// Reject the action unless the tournament accepts registrations now
    fn ensure_open(&self, tournament: &Tournament) -> ReservationResult<()> {
        if !tournament.is_active {
            return Err(ReservationError::RegistrationClosed(tournament.id));
        }
        if !tournament.before_deadline(self.clock.now()) {
            return Err(ReservationError::DeadlinePassed(tournament.id));
        }
        Ok(())
    }

    /// Map a participant's existing reservation to the create outcome
    fn existing_outcome(existing: Reservation) -> ReservationResult<CreateOutcome> {
        if existing.payment_confirmed {
            Ok(CreateOutcome::AlreadyConfirmed(existing))
        } else {
            Err(ReservationError::DuplicateIntent {
                existing: existing.id,
            })
        }
    }

    /// Availability of a team in a tournament
    pub async fn check_availability(
        &self,
        tournament_id: TournamentId,
        team_id: TeamId,
    ) -> ReservationResult<Availability> {
        self.evaluate_slot(tournament_id, team_id, None).await
    }

    /// Availability as seen by one participant; their own paid reservation
    /// does not count as a hold
    pub async fn availability_for(
        &self,
        participant_id: UserId,
        tournament_id: TournamentId,
        team_id: TeamId,
    ) -> ReservationResult<Availability> {
        self.evaluate_slot(tournament_id, team_id, Some(participant_id))
            .await
    }

    async fn evaluate_slot(
        &self,
        tournament_id: TournamentId,
        team_id: TeamId,
        viewer: Option<UserId>,
    ) -> ReservationResult<Availability> {
        self.tournament(tournament_id).await?;
        self.team(team_id).await?;

        let slot = self.repo.slot_reservations(tournament_id, team_id).await?;
        Ok(Availability::evaluate(&slot, viewer))
    }

    /// Reserve a team for a participant.
    ///
    /// # Errors
    ///
    /// * `NotAuthorized` - caller is an operator
    /// * `RegistrationClosed` / `DeadlinePassed` - tournament not open
    /// * `DuplicateIntent` - participant already has an open reservation here
    /// * `TournamentFull` - every slot is confirmed
    /// * `TeamUnavailable` - team is confirmed or held by someone else
    pub async fn create_reservation(
        &self,
        actor: &Actor,
        tournament_id: TournamentId,
        team_id: TeamId,
    ) -> ReservationResult<CreateOutcome> {
        if actor.is_operator() {
            return Err(ReservationError::NotAuthorized);
        }
        let participant_id = actor.user_id;

        let tournament = self.tournament(tournament_id).await?;
        self.ensure_open(&tournament)?;

        if let Some(existing) = self
            .repo
            .find_participant_reservation(participant_id, tournament_id)
            .await?
        {
            return Self::existing_outcome(existing);
        }

        self.team(team_id).await?;

        let reservations = self.repo.tournament_reservations(tournament_id).await?;
        let confirmed = reservations.iter().filter(|r| r.payment_confirmed).count();
        if confirmed >= tournament.max_teams as usize {
            return Err(ReservationError::TournamentFull(tournament_id));
        }

        let slot = reservations.iter().filter(|r| r.team_id == team_id);
        if !Availability::evaluate(slot, Some(participant_id)).is_available() {
            return Err(ReservationError::TeamUnavailable {
                tournament_id,
                team_id,
            });
        }

        let new = NewReservation {
            participant_id,
            tournament_id,
            team_id,
            created_at: self.clock.now(),
        };
        match guarded(|| self.repo.insert_reservation(&new)).await? {
            Some(reservation) => {
                log::info!(
                    "Reservation {} created for participant {} (tournament {}, team {})",
                    reservation.id,
                    participant_id,
                    tournament_id,
                    team_id
                );
                Ok(CreateOutcome::Created(reservation))
            }
            None => {
                if let Some(existing) = self
                    .repo
                    .find_participant_reservation(participant_id, tournament_id)
                    .await?
                {
                    return Self::existing_outcome(existing);
                }
                log::warn!(
                    "Participant {} lost team {} in tournament {} before insert",
                    participant_id,
                    team_id,
                    tournament_id
                );
                Err(ReservationError::TeamUnavailable {
                    tournament_id,
                    team_id,
                })
            }
        }
    }

    /// Record payment proof and move the reservation to PendingConfirmation.
    ///
    /// If the team has been paid for or confirmed by someone else in the
    /// meantime, the caller's reservation is deleted and `SlotLost` is
    /// returned.
    pub async fn submit_payment(
        &self,
        actor: &Actor,
        reservation_id: ReservationId,
        submission: PaymentSubmission,
    ) -> ReservationResult<Reservation> {
        let reservation = self.reservation(reservation_id).await?;
        if reservation.participant_id != actor.user_id {
            return Err(ReservationError::NotAuthorized);
        }

        let tournament = self.tournament(reservation.tournament_id).await?;
        self.ensure_open(&tournament)?;

        if reservation.payment_confirmed {
            return Err(ReservationError::AlreadyConfirmed(reservation_id));
        }

        let payment = submission
            .normalized()
            .map_err(ReservationError::InvalidPayment)?
            .at(self.clock.now());

        if let Some(paid) = guarded(|| self.repo.mark_paid(reservation_id, &payment)).await? {
            log::info!(
                "Payment submitted for reservation {} ({})",
                paid.id,
                paid.payment_summary()
            );
            return Ok(paid);
        }

        let current = self.reservation(reservation_id).await?;
        if current.payment_confirmed {
            return Err(ReservationError::AlreadyConfirmed(reservation_id));
        }

        // A pending reservation cannot outlive a slot taken by someone else
        if !self
            .repo
            .delete_unconfirmed_reservation(reservation_id)
            .await?
        {
            return match self.repo.find_reservation(reservation_id).await? {
                Some(_) => Err(ReservationError::AlreadyConfirmed(reservation_id)),
                None => Err(ReservationError::ReservationNotFound(reservation_id)),
            };
        }
        log::warn!(
            "Reservation {} lost team {} in tournament {} before payment",
            reservation_id,
            current.team_id,
            current.tournament_id
        );
        Err(ReservationError::SlotLost {
            team_id: current.team_id,
        })
    }

    /// Confirm a submitted payment, making the slot final.
    ///
    /// Confirming an already confirmed reservation returns it unchanged.
    ///
    /// # Errors
    ///
    /// * `NotAuthorized` - caller is not an operator
    /// * `PaymentNotSubmitted` - reservation is still unpaid
    /// * `SlotAlreadyTaken` - another reservation holds the confirmed slot;
    ///   the target is left pending
    pub async fn confirm_payment(
        &self,
        actor: &Actor,
        reservation_id: ReservationId,
    ) -> ReservationResult<Reservation> {
        Self::require_operator(actor)?;

        let reservation = self.reservation(reservation_id).await?;
        if reservation.payment_confirmed {
            return Ok(reservation);
        }
        if !reservation.is_paid {
            return Err(ReservationError::PaymentNotSubmitted(reservation_id));
        }

        let now = self.clock.now();
        if let Some(confirmed) =
            guarded(|| self.repo.mark_confirmed(reservation_id, actor.user_id, now)).await?
        {
            log::info!(
                "Reservation {} confirmed by operator {} (tournament {}, team {})",
                confirmed.id,
                actor.user_id,
                confirmed.tournament_id,
                confirmed.team_id
            );
            return Ok(confirmed);
        }

        let current = self.reservation(reservation_id).await?;
        match current.status() {
            ReservationStatus::Confirmed => Ok(current),
            ReservationStatus::Unpaid => Err(ReservationError::PaymentNotSubmitted(reservation_id)),
            ReservationStatus::PendingConfirmation => {
                log::warn!(
                    "Reservation {} not confirmed: team {} already confirmed in tournament {}",
                    reservation_id,
                    current.team_id,
                    current.tournament_id
                );
                Err(ReservationError::SlotAlreadyTaken {
                    team_id: current.team_id,
                })
            }
        }
    }

    /// Confirm several reservations in order, collecting per-id failures
    pub async fn confirm_payments(
        &self,
        actor: &Actor,
        reservation_ids: &[ReservationId],
    ) -> ReservationResult<BulkConfirmReport> {
        Self::require_operator(actor)?;

        let mut report = BulkConfirmReport::default();
        for &id in reservation_ids {
            match self.confirm_payment(actor, id).await {
                Ok(_) => report.confirmed.push(id),
                Err(e) => report.failed.push((id, e.client_message())),
            }
        }

        log::info!(
            "Bulk confirmation by operator {}: {} confirmed, {} failed",
            actor.user_id,
            report.confirmed.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Reject a payment, returning the reservation to Unpaid
    pub async fn reject_payment(
        &self,
        actor: &Actor,
        reservation_id: ReservationId,
    ) -> ReservationResult<Reservation> {
        Self::require_operator(actor)?;

        let reservation = self
            .repo
            .clear_payment(reservation_id)
            .await?
            .ok_or(ReservationError::ReservationNotFound(reservation_id))?;

        log::info!(
            "Payment for reservation {} rejected by operator {}",
            reservation_id,
            actor.user_id
        );
        Ok(reservation)
    }

    /// Reject several payments in order, collecting per-id failures
    pub async fn reject_payments(
        &self,
        actor: &Actor,
        reservation_ids: &[ReservationId],
    ) -> ReservationResult<BulkRejectReport> {
        Self::require_operator(actor)?;

        let mut report = BulkRejectReport::default();
        for &id in reservation_ids {
            match self.reject_payment(actor, id).await {
                Ok(_) => report.rejected.push(id),
                Err(e) => report.failed.push((id, e.client_message())),
            }
        }

        log::info!(
            "Bulk rejection by operator {}: {} rejected, {} failed",
            actor.user_id,
            report.rejected.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Cancel a reservation.
    ///
    /// Owners may cancel only while unpaid; operators may delete in any state.
    pub async fn cancel_reservation(
        &self,
        actor: &Actor,
        reservation_id: ReservationId,
    ) -> ReservationResult<()> {
        let reservation = self.reservation(reservation_id).await?;

        if actor.is_operator() {
            if !self.repo.delete_reservation(reservation_id).await? {
                return Err(ReservationError::ReservationNotFound(reservation_id));
            }
            log::info!(
                "Reservation {} ({}) deleted by operator {}",
                reservation_id,
                reservation.status(),
                actor.user_id
            );
            return Ok(());
        }

        if reservation.participant_id != actor.user_id {
            return Err(ReservationError::NotAuthorized);
        }
        if reservation.status() != ReservationStatus::Unpaid {
            return Err(ReservationError::RequiresOperator(reservation_id));
        }

        if !self.repo.delete_unpaid_reservation(reservation_id).await? {
            // Payment was submitted (or the row removed) since the read above
            return match self.repo.find_reservation(reservation_id).await? {
                Some(_) => Err(ReservationError::RequiresOperator(reservation_id)),
                None => Err(ReservationError::ReservationNotFound(reservation_id)),
            };
        }

        log::info!(
            "Reservation {} cancelled by participant {}",
            reservation_id,
            actor.user_id
        );
        Ok(())
    }

    /// Slots with more than one confirmed reservation
    pub async fn list_duplicate_confirmed_teams(
        &self,
        actor: &Actor,
    ) -> ReservationResult<Vec<DuplicateSlot>> {
        Self::require_operator(actor)?;

        let duplicates = self.repo.duplicate_confirmed_slots().await?;
        for dup in &duplicates {
            log::warn!(
                "Team {} confirmed {} times in tournament {}",
                dup.team_id,
                dup.count,
                dup.tournament_id
            );
        }
        Ok(duplicates)
    }

    /// Every team with its availability plus capacity figures
    pub async fn team_board(
        &self,
        tournament_id: TournamentId,
        viewer: Option<UserId>,
    ) -> ReservationResult<TeamBoard> {
        let tournament = self.tournament(tournament_id).await?;
        let teams = self.repo.list_teams().await?;
        let reservations = self.repo.tournament_reservations(tournament_id).await?;

        let mut by_team: HashMap<TeamId, Vec<&Reservation>> = HashMap::new();
        for r in &reservations {
            by_team.entry(r.team_id).or_default().push(r);
        }

        let teams = teams
            .into_iter()
            .map(|team| {
                let slot = by_team.get(&team.id).into_iter().flatten().copied();
                TeamSlot {
                    availability: Availability::evaluate(slot, viewer),
                    team,
                }
            })
            .collect();

        let confirmed_count =
            u32::try_from(reservations.iter().filter(|r| r.payment_confirmed).count())
                .unwrap_or(u32::MAX);

        Ok(TeamBoard {
            remaining_slots: tournament.max_teams.saturating_sub(confirmed_count),
            is_full: confirmed_count >= tournament.max_teams,
            confirmed_count,
            teams,
            tournament,
        })
    }

    /// The caller's own reservation in a tournament
    pub async fn participant_reservation(
        &self,
        actor: &Actor,
        tournament_id: TournamentId,
    ) -> ReservationResult<Option<Reservation>> {
        Ok(self
            .repo
            .find_participant_reservation(actor.user_id, tournament_id)
            .await?)
    }

    /// Confirmed reservations ordered by team name
    pub async fn confirmed_roster(
        &self,
        tournament_id: TournamentId,
    ) -> ReservationResult<Vec<RosterEntry>> {
        self.tournament(tournament_id).await?;

        let mut confirmed: HashMap<TeamId, Vec<Reservation>> = HashMap::new();
        for r in self.repo.tournament_reservations(tournament_id).await? {
            if r.payment_confirmed {
                confirmed.entry(r.team_id).or_default().push(r);
            }
        }

        let mut roster = Vec::new();
        for team in self.repo.list_teams().await? {
            for reservation in confirmed.remove(&team.id).unwrap_or_default() {
                roster.push(RosterEntry {
                    team: team.clone(),
                    reservation,
                });
            }
        }
        Ok(roster)
    }

    /// Operator listing
    pub async fn list_reservations(
        &self,
        actor: &Actor,
        filter: ReservationFilter,
    ) -> ReservationResult<Vec<Reservation>> {
        Self::require_operator(actor)?;

        let mut reservations = self.repo.list_reservations(filter.tournament_id).await?;
        reservations.retain(|r| filter.matches(r));
        Ok(reservations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::db::{CatalogRepository, InMemoryRepository};
    use crate::tournament::{NewTeam, NewTournament};
    use chrono::{Duration, Utc};

    async fn engine() -> (ReservationEngine, TournamentId, TeamId) {
        let repo = Arc::new(InMemoryRepository::new());
        let now = Utc::now();
        let tournament = repo
            .create_tournament(&NewTournament {
                name: "Cup".to_string(),
                description: String::new(),
                starts_at: now + Duration::days(30),
                ends_at: now + Duration::days(60),
                registration_deadline: now + Duration::days(15),
                max_teams: 2,
                entry_fee: 150,
            })
            .await
            .unwrap();
        let team = repo.create_team(&NewTeam::new("Brazil", "Brazil")).await.unwrap();
        let engine = ReservationEngine::new(repo, Arc::new(FixedClock::new(now)));
        (engine, tournament.id, team.id)
    }

    #[tokio::test]
    async fn test_operator_cannot_reserve() {
        let (engine, tournament, team) = engine().await;
        let err = engine
            .create_reservation(&Actor::operator(1), tournament, team)
            .await
            .unwrap_err();
        assert!(matches!(err, ReservationError::NotAuthorized));
    }

    #[tokio::test]
    async fn test_participant_cannot_confirm() {
        let (engine, tournament, team) = engine().await;
        let alice = Actor::participant(10);
        let r = engine
            .create_reservation(&alice, tournament, team)
            .await
            .unwrap()
            .into_reservation();

        let err = engine.confirm_payment(&alice, r.id).await.unwrap_err();
        assert!(matches!(err, ReservationError::NotAuthorized));
    }

    #[tokio::test]
    async fn test_unknown_references() {
        let (engine, tournament, team) = engine().await;
        assert!(matches!(
            engine.check_availability(999, team).await,
            Err(ReservationError::TournamentNotFound(999))
        ));
        assert!(matches!(
            engine.check_availability(tournament, 999).await,
            Err(ReservationError::TeamNotFound(999))
        ));
        assert!(matches!(
            engine.reject_payment(&Actor::operator(1), 999).await,
            Err(ReservationError::ReservationNotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_invalid_payment_leaves_reservation_unpaid() {
        let (engine, tournament, team) = engine().await;
        let alice = Actor::participant(10);
        let r = engine
            .create_reservation(&alice, tournament, team)
            .await
            .unwrap()
            .into_reservation();

        let err = engine
            .submit_payment(&alice, r.id, PaymentSubmission::new("bKash", "", "0170"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReservationError::InvalidPayment("transaction reference")));

        let mine = engine
            .participant_reservation(&alice, tournament)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mine.status(), ReservationStatus::Unpaid);
    }

    #[tokio::test]
    async fn test_confirm_unpaid_fails() {
        let (engine, tournament, team) = engine().await;
        let r = engine
            .create_reservation(&Actor::participant(10), tournament, team)
            .await
            .unwrap()
            .into_reservation();

        let err = engine
            .confirm_payment(&Actor::super_operator(1), r.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ReservationError::PaymentNotSubmitted(_)));
    }

    #[tokio::test]
    async fn test_guarded_retries_once_on_conflict() {
        use crate::db::RepositoryError;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = AtomicUsize::new(0);
        let result = guarded(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(RepositoryError::Conflict("busy".to_string()))
                } else {
                    Ok(Some(n))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_guarded_gives_up_after_second_conflict() {
        use crate::db::RepositoryError;

        let result: Option<()> = guarded(|| async {
            Err(RepositoryError::Conflict("busy".to_string()))
        })
        .await
        .unwrap();
        assert!(result.is_none());
    }
}
