//! In-process repository.
//!
//! All state sits behind one async mutex, so each guarded write evaluates
//! the slot and applies its change while no other write can interleave.
//! Uniqueness rules mirror the PostgreSQL schema and surface as
//! [`RepositoryError::Conflict`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::errors::{RepositoryError, RepositoryResult};
use super::repository::{CatalogRepository, ReservationRepository};
use crate::auth::UserId;
use crate::reservation::{DuplicateSlot, NewReservation, PaymentDetails, Reservation, ReservationId};
use crate::tournament::{
    NewTeam, NewTournament, Team, TeamId, Tournament, TournamentId, TournamentStatus,
};

#[derive(Debug, Default)]
struct Store {
    tournaments: BTreeMap<TournamentId, Tournament>,
    teams: BTreeMap<TeamId, Team>,
    reservations: BTreeMap<ReservationId, Reservation>,
    next_tournament_id: TournamentId,
    next_team_id: TeamId,
    next_reservation_id: ReservationId,
}

impl Store {
    fn slot(
        &self,
        tournament_id: TournamentId,
        team_id: TeamId,
    ) -> impl Iterator<Item = &Reservation> {
        self.reservations
            .values()
            .filter(move |r| r.tournament_id == tournament_id && r.team_id == team_id)
    }

    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }
}

/// Repository that keeps everything in memory
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a reservation exactly as given, bypassing every guard.
    ///
    /// Used to load legacy data, which may already violate the one confirmed
    /// reservation per slot rule. The participant uniqueness rule still holds.
    pub async fn restore(&self, reservation: Reservation) -> RepositoryResult<Reservation> {
        let mut store = self.store.lock().await;

        if store.reservations.values().any(|r| {
            r.id != reservation.id
                && r.participant_id == reservation.participant_id
                && r.tournament_id == reservation.tournament_id
        }) {
            return Err(RepositoryError::Conflict(format!(
                "participant {} already has a reservation in tournament {}",
                reservation.participant_id, reservation.tournament_id
            )));
        }

        store.next_reservation_id = store.next_reservation_id.max(reservation.id);
        store
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(reservation)
    }
}

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn create_tournament(&self, new: &NewTournament) -> RepositoryResult<Tournament> {
        let mut store = self.store.lock().await;
        let id = Store::next_id(&mut store.next_tournament_id);
        let tournament = Tournament {
            id,
            name: new.name.clone(),
            description: new.description.clone(),
            starts_at: new.starts_at,
            ends_at: new.ends_at,
            registration_deadline: new.registration_deadline,
            max_teams: new.max_teams,
            entry_fee: new.entry_fee,
            status: TournamentStatus::Upcoming,
            is_active: true,
            created_at: Utc::now(),
        };
        store.tournaments.insert(id, tournament.clone());
        Ok(tournament)
    }

    async fn find_tournament(&self, id: TournamentId) -> RepositoryResult<Option<Tournament>> {
        Ok(self.store.lock().await.tournaments.get(&id).cloned())
    }

    async fn list_tournaments(&self, active_only: bool) -> RepositoryResult<Vec<Tournament>> {
        let store = self.store.lock().await;
        Ok(store
            .tournaments
            .values()
            .rev()
            .filter(|t| t.is_active || !active_only)
            .cloned()
            .collect())
    }

    async fn set_tournament_active(
        &self,
        id: TournamentId,
        is_active: bool,
    ) -> RepositoryResult<bool> {
        let mut store = self.store.lock().await;
        match store.tournaments.get_mut(&id) {
            Some(tournament) => {
                tournament.is_active = is_active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_team(&self, new: &NewTeam) -> RepositoryResult<Team> {
        let mut store = self.store.lock().await;
        if store.teams.values().any(|t| t.name == new.name) {
            return Err(RepositoryError::Conflict(format!(
                "team name already exists: {}",
                new.name
            )));
        }

        let id = Store::next_id(&mut store.next_team_id);
        let team = Team {
            id,
            name: new.name.clone(),
            country: new.country.clone(),
        };
        store.teams.insert(id, team.clone());
        Ok(team)
    }

    async fn find_team(&self, id: TeamId) -> RepositoryResult<Option<Team>> {
        Ok(self.store.lock().await.teams.get(&id).cloned())
    }

    async fn find_team_by_name(&self, name: &str) -> RepositoryResult<Option<Team>> {
        let store = self.store.lock().await;
        Ok(store.teams.values().find(|t| t.name == name).cloned())
    }

    async fn list_teams(&self) -> RepositoryResult<Vec<Team>> {
        let store = self.store.lock().await;
        let mut teams: Vec<Team> = store.teams.values().cloned().collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(teams)
    }
}

#[async_trait]
impl ReservationRepository for InMemoryRepository {
    async fn find_reservation(&self, id: ReservationId) -> RepositoryResult<Option<Reservation>> {
        Ok(self.store.lock().await.reservations.get(&id).cloned())
    }

    async fn find_participant_reservation(
        &self,
        participant_id: UserId,
        tournament_id: TournamentId,
    ) -> RepositoryResult<Option<Reservation>> {
        let store = self.store.lock().await;
        Ok(store
            .reservations
            .values()
            .find(|r| r.participant_id == participant_id && r.tournament_id == tournament_id)
            .cloned())
    }

    async fn slot_reservations(
        &self,
        tournament_id: TournamentId,
        team_id: TeamId,
    ) -> RepositoryResult<Vec<Reservation>> {
        let store = self.store.lock().await;
        Ok(store.slot(tournament_id, team_id).cloned().collect())
    }

    async fn tournament_reservations(
        &self,
        tournament_id: TournamentId,
    ) -> RepositoryResult<Vec<Reservation>> {
        self.list_reservations(Some(tournament_id)).await
    }

    async fn list_reservations(
        &self,
        tournament_id: Option<TournamentId>,
    ) -> RepositoryResult<Vec<Reservation>> {
        let store = self.store.lock().await;
        Ok(store
            .reservations
            .values()
            .filter(|r| tournament_id.is_none_or(|id| r.tournament_id == id))
            .cloned()
            .collect())
    }

    async fn insert_reservation(
        &self,
        new: &NewReservation,
    ) -> RepositoryResult<Option<Reservation>> {
        let mut store = self.store.lock().await;

        if store.reservations.values().any(|r| {
            r.participant_id == new.participant_id && r.tournament_id == new.tournament_id
        }) {
            return Err(RepositoryError::Conflict(format!(
                "participant {} already has a reservation in tournament {}",
                new.participant_id, new.tournament_id
            )));
        }

        let blocked = store
            .slot(new.tournament_id, new.team_id)
            .any(|r| r.payment_confirmed || (r.is_paid && r.participant_id != new.participant_id));
        if blocked {
            return Ok(None);
        }

        let id = Store::next_id(&mut store.next_reservation_id);
        let reservation = Reservation {
            id,
            participant_id: new.participant_id,
            tournament_id: new.tournament_id,
            team_id: new.team_id,
            created_at: new.created_at,
            is_paid: false,
            payment_confirmed: false,
            payment: None,
            confirmed_by: None,
            confirmed_at: None,
        };
        store.reservations.insert(id, reservation.clone());
        Ok(Some(reservation))
    }

    async fn mark_paid(
        &self,
        id: ReservationId,
        payment: &PaymentDetails,
    ) -> RepositoryResult<Option<Reservation>> {
        let mut store = self.store.lock().await;
        let Some(target) = store.reservations.get(&id) else {
            return Ok(None);
        };
        if target.payment_confirmed {
            return Ok(None);
        }

        let (tournament_id, team_id) = (target.tournament_id, target.team_id);
        let contested = store
            .slot(tournament_id, team_id)
            .any(|r| r.id != id && (r.is_paid || r.payment_confirmed));
        if contested {
            return Ok(None);
        }

        let Some(reservation) = store.reservations.get_mut(&id) else {
            return Ok(None);
        };
        reservation.is_paid = true;
        reservation.payment = Some(payment.clone());
        Ok(Some(reservation.clone()))
    }

    async fn mark_confirmed(
        &self,
        id: ReservationId,
        operator_id: UserId,
        at: DateTime<Utc>,
    ) -> RepositoryResult<Option<Reservation>> {
        let mut store = self.store.lock().await;
        let Some(target) = store.reservations.get(&id) else {
            return Ok(None);
        };
        if !target.is_paid || target.payment_confirmed {
            return Ok(None);
        }

        let (tournament_id, team_id) = (target.tournament_id, target.team_id);
        if store
            .slot(tournament_id, team_id)
            .any(|r| r.id != id && r.payment_confirmed)
        {
            return Ok(None);
        }

        let Some(reservation) = store.reservations.get_mut(&id) else {
            return Ok(None);
        };
        reservation.payment_confirmed = true;
        reservation.confirmed_by = Some(operator_id);
        reservation.confirmed_at = Some(at);
        Ok(Some(reservation.clone()))
    }

    async fn clear_payment(&self, id: ReservationId) -> RepositoryResult<Option<Reservation>> {
        let mut store = self.store.lock().await;
        Ok(store.reservations.get_mut(&id).map(|reservation| {
            reservation.is_paid = false;
            reservation.payment_confirmed = false;
            reservation.payment = None;
            reservation.confirmed_by = None;
            reservation.confirmed_at = None;
            reservation.clone()
        }))
    }

    async fn delete_reservation(&self, id: ReservationId) -> RepositoryResult<bool> {
        Ok(self.store.lock().await.reservations.remove(&id).is_some())
    }

    async fn delete_unpaid_reservation(&self, id: ReservationId) -> RepositoryResult<bool> {
        let mut store = self.store.lock().await;
        match store.reservations.get(&id) {
            Some(r) if !r.is_paid && !r.payment_confirmed => {
                store.reservations.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_unconfirmed_reservation(&self, id: ReservationId) -> RepositoryResult<bool> {
        let mut store = self.store.lock().await;
        match store.reservations.get(&id) {
            Some(r) if !r.payment_confirmed => {
                store.reservations.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn duplicate_confirmed_slots(&self) -> RepositoryResult<Vec<DuplicateSlot>> {
        let store = self.store.lock().await;
        let mut counts: BTreeMap<(TournamentId, TeamId), u64> = BTreeMap::new();
        for r in store.reservations.values().filter(|r| r.payment_confirmed) {
            *counts.entry((r.tournament_id, r.team_id)).or_default() += 1;
        }

        Ok(counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|((tournament_id, team_id), count)| DuplicateSlot {
                tournament_id,
                team_id,
                count,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn seeded() -> (InMemoryRepository, TournamentId, TeamId) {
        let repo = InMemoryRepository::new();
        let now = Utc::now();
        let tournament = repo
            .create_tournament(&NewTournament {
                name: "Cup".to_string(),
                description: String::new(),
                starts_at: now + Duration::days(10),
                ends_at: now + Duration::days(20),
                registration_deadline: now + Duration::days(5),
                max_teams: 4,
                entry_fee: 150,
            })
            .await
            .unwrap();
        let team = repo.create_team(&NewTeam::new("Brazil", "Brazil")).await.unwrap();
        (repo, tournament.id, team.id)
    }

    fn new_reservation(participant: UserId, tournament: TournamentId, team: TeamId) -> NewReservation {
        NewReservation {
            participant_id: participant,
            tournament_id: tournament,
            team_id: team,
            created_at: Utc::now(),
        }
    }

    fn payment() -> PaymentDetails {
        PaymentDetails {
            method: "bKash".to_string(),
            transaction_ref: "TX1".to_string(),
            contact_number: "01700000000".to_string(),
            paid_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_second_reservation_for_participant_conflicts() {
        let (repo, tournament, team) = seeded().await;
        repo.insert_reservation(&new_reservation(1, tournament, team))
            .await
            .unwrap()
            .unwrap();

        let err = repo
            .insert_reservation(&new_reservation(1, tournament, team))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_paid_slot_blocks_other_inserts() {
        let (repo, tournament, team) = seeded().await;
        let first = repo
            .insert_reservation(&new_reservation(1, tournament, team))
            .await
            .unwrap()
            .unwrap();
        repo.mark_paid(first.id, &payment()).await.unwrap().unwrap();

        let blocked = repo
            .insert_reservation(&new_reservation(2, tournament, team))
            .await
            .unwrap();
        assert!(blocked.is_none());
    }

    #[tokio::test]
    async fn test_mark_paid_refuses_contested_slot() {
        let (repo, tournament, team) = seeded().await;
        let a = repo
            .insert_reservation(&new_reservation(1, tournament, team))
            .await
            .unwrap()
            .unwrap();
        let b = repo
            .insert_reservation(&new_reservation(2, tournament, team))
            .await
            .unwrap()
            .unwrap();

        assert!(repo.mark_paid(a.id, &payment()).await.unwrap().is_some());
        assert!(repo.mark_paid(b.id, &payment()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_confirmed_requires_payment() {
        let (repo, tournament, team) = seeded().await;
        let r = repo
            .insert_reservation(&new_reservation(1, tournament, team))
            .await
            .unwrap()
            .unwrap();

        assert!(repo.mark_confirmed(r.id, 99, Utc::now()).await.unwrap().is_none());
        repo.mark_paid(r.id, &payment()).await.unwrap();
        let confirmed = repo.mark_confirmed(r.id, 99, Utc::now()).await.unwrap().unwrap();
        assert!(confirmed.payment_confirmed);
        assert_eq!(confirmed.confirmed_by, Some(99));
    }

    #[tokio::test]
    async fn test_clear_payment_resets_fields() {
        let (repo, tournament, team) = seeded().await;
        let r = repo
            .insert_reservation(&new_reservation(1, tournament, team))
            .await
            .unwrap()
            .unwrap();
        repo.mark_paid(r.id, &payment()).await.unwrap();

        let cleared = repo.clear_payment(r.id).await.unwrap().unwrap();
        assert!(!cleared.is_paid);
        assert!(cleared.payment.is_none());
    }

    #[tokio::test]
    async fn test_delete_unpaid_only() {
        let (repo, tournament, team) = seeded().await;
        let r = repo
            .insert_reservation(&new_reservation(1, tournament, team))
            .await
            .unwrap()
            .unwrap();
        repo.mark_paid(r.id, &payment()).await.unwrap();

        assert!(!repo.delete_unpaid_reservation(r.id).await.unwrap());
        assert!(repo.delete_reservation(r.id).await.unwrap());
        assert!(repo.find_reservation(r.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_unconfirmed_keeps_confirmed() {
        let (repo, tournament, team) = seeded().await;
        let pending = repo
            .insert_reservation(&new_reservation(1, tournament, team))
            .await
            .unwrap()
            .unwrap();
        repo.mark_paid(pending.id, &payment()).await.unwrap();
        repo.mark_confirmed(pending.id, 99, Utc::now()).await.unwrap();

        assert!(!repo.delete_unconfirmed_reservation(pending.id).await.unwrap());
        repo.clear_payment(pending.id).await.unwrap();
        repo.mark_paid(pending.id, &payment()).await.unwrap();
        assert!(repo.delete_unconfirmed_reservation(pending.id).await.unwrap());
        assert!(repo.find_reservation(pending.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_surfaces_duplicates() {
        let (repo, tournament, team) = seeded().await;
        for (id, participant) in [(10, 1), (11, 2)] {
            repo.restore(Reservation {
                id,
                participant_id: participant,
                tournament_id: tournament,
                team_id: team,
                created_at: Utc::now(),
                is_paid: true,
                payment_confirmed: true,
                payment: Some(payment()),
                confirmed_by: Some(99),
                confirmed_at: Some(Utc::now()),
            })
            .await
            .unwrap();
        }

        let duplicates = repo.duplicate_confirmed_slots().await.unwrap();
        assert_eq!(
            duplicates,
            vec![DuplicateSlot {
                tournament_id: tournament,
                team_id: team,
                count: 2
            }]
        );

        // the confirmed slot still refuses new claims
        let next = repo
            .insert_reservation(&new_reservation(3, tournament, team))
            .await
            .unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_team_name_conflicts() {
        let (repo, _, _) = seeded().await;
        let err = repo
            .create_team(&NewTeam::new("Brazil", "Brazil"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }
}
