//! Concurrent access tests for slot exclusivity.
//!
//! These tests run engine operations from many tasks at once on a
//! multi-threaded runtime and check that no interleaving produces two
//! confirmed reservations for a team or two reservations for a participant.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tourney_slots::auth::Actor;
use tourney_slots::db::{CatalogRepository, InMemoryRepository, ReservationRepository};
use tourney_slots::reservation::{
    PaymentDetails, PaymentSubmission, Reservation, ReservationEngine, ReservationError,
    ReservationStatus,
};
use tourney_slots::tournament::{NewTeam, NewTournament, TeamId, TournamentId};

async fn setup() -> (ReservationEngine, Arc<InMemoryRepository>, TournamentId, TeamId) {
    let repo = Arc::new(InMemoryRepository::new());
    let now = Utc::now();
    let tournament = repo
        .create_tournament(&NewTournament {
            name: "Race Cup".to_string(),
            description: String::new(),
            starts_at: now + Duration::days(30),
            ends_at: now + Duration::days(60),
            registration_deadline: now + Duration::days(15),
            max_teams: 32,
            entry_fee: 15_000,
        })
        .await
        .unwrap();
    let team = repo
        .create_team(&NewTeam::new("Uruguay", "Uruguay"))
        .await
        .unwrap();

    let engine = ReservationEngine::with_system_clock(repo.clone());
    (engine, repo, tournament.id, team.id)
}

/// Load a pending reservation directly, the way legacy data may contain them
async fn restore_pending(
    repo: &InMemoryRepository,
    id: i64,
    participant: i64,
    tournament_id: TournamentId,
    team_id: TeamId,
) -> Reservation {
    repo.restore(Reservation {
        id,
        participant_id: participant,
        tournament_id,
        team_id,
        created_at: Utc::now(),
        is_paid: true,
        payment_confirmed: false,
        payment: Some(PaymentDetails {
            method: "bKash".to_string(),
            transaction_ref: format!("TX-{id}"),
            contact_number: "01700000000".to_string(),
            paid_at: Utc::now(),
        }),
        confirmed_by: None,
        confirmed_at: None,
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_confirmations_pick_one_winner() {
    let (engine, repo, tournament_id, team_id) = setup().await;
    let a = restore_pending(&repo, 1, 10, tournament_id, team_id).await;
    let b = restore_pending(&repo, 2, 11, tournament_id, team_id).await;

    let op1 = Actor::operator(900);
    let op2 = Actor::operator(901);
    let (ra, rb) = tokio::join!(
        engine.confirm_payment(&op1, a.id),
        engine.confirm_payment(&op2, b.id)
    );

    let outcomes = [ra, rb];
    let winners = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one confirmation must succeed");

    let loser = outcomes
        .iter()
        .find_map(|r| r.as_ref().err())
        .expect("one confirmation must fail");
    assert!(matches!(loser, ReservationError::SlotAlreadyTaken { .. }));

    let slot = repo.slot_reservations(tournament_id, team_id).await.unwrap();
    assert_eq!(slot.iter().filter(|r| r.payment_confirmed).count(), 1);
    assert_eq!(
        slot.iter()
            .filter(|r| r.status() == ReservationStatus::PendingConfirmation)
            .count(),
        1,
        "the losing reservation stays pending"
    );
    assert!(repo.duplicate_confirmed_slots().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_many_operators_confirm_same_slot() {
    let (engine, repo, tournament_id, team_id) = setup().await;
    let mut ids = Vec::new();
    for n in 0..16 {
        ids.push(restore_pending(&repo, 100 + n, 1000 + n, tournament_id, team_id).await.id);
    }

    let mut handles = Vec::new();
    for (n, id) in ids.into_iter().enumerate() {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.confirm_payment(&Actor::operator(900 + n as i64), id).await
        }));
    }

    let mut confirmed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => confirmed += 1,
            Err(e) => assert!(matches!(e, ReservationError::SlotAlreadyTaken { .. })),
        }
    }
    assert_eq!(confirmed, 1);
    assert!(repo.duplicate_confirmed_slots().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_payments_leave_one_holder() {
    let (engine, repo, tournament_id, team_id) = setup().await;

    let mut reservations = Vec::new();
    for participant in 1..=12 {
        let r = engine
            .create_reservation(&Actor::participant(participant), tournament_id, team_id)
            .await
            .unwrap()
            .into_reservation();
        reservations.push(r);
    }

    let mut handles = Vec::new();
    for r in reservations {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .submit_payment(
                    &Actor::participant(r.participant_id),
                    r.id,
                    PaymentSubmission::new("bKash", format!("TX-{}", r.id), "01700000000"),
                )
                .await
        }));
    }

    let mut paid = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => paid += 1,
            Err(e) => assert!(matches!(e, ReservationError::SlotLost { .. })),
        }
    }
    assert_eq!(paid, 1);

    // losers were removed, only the payer remains
    let slot = repo.slot_reservations(tournament_id, team_id).await.unwrap();
    assert_eq!(slot.len(), 1);
    assert!(slot[0].is_paid);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_for_one_participant() {
    let (engine, repo, tournament_id, team_id) = setup().await;
    let second_team = repo
        .create_team(&NewTeam::new("Paraguay", "Paraguay"))
        .await
        .unwrap();

    let alice = Actor::participant(7);
    let (first, second) = tokio::join!(
        engine.create_reservation(&alice, tournament_id, team_id),
        engine.create_reservation(&alice, tournament_id, second_team.id)
    );

    let created = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(created, 1);
    let err = [first, second]
        .into_iter()
        .find_map(Result::err)
        .expect("one create must fail");
    assert!(matches!(err, ReservationError::DuplicateIntent { .. }));

    let mine = repo.list_reservations(Some(tournament_id)).await.unwrap();
    assert_eq!(mine.len(), 1);
}
