//! Integration tests for the PostgreSQL repository.
//!
//! These need a reachable database (`DATABASE_URL`) and are ignored by
//! default; run them with `cargo test -- --ignored`. Each test truncates the
//! reservation tables, so they run serially.

use chrono::{Duration, Utc};
use serial_test::serial;
use sqlx::PgPool;
use std::sync::Arc;
use tourney_slots::auth::Actor;
use tourney_slots::clock::SystemClock;
use tourney_slots::db::{
    CatalogRepository, Database, DatabaseConfig, PgRepository, RepositoryError,
    ReservationRepository,
};
use tourney_slots::reservation::{
    NewReservation, PaymentSubmission, ReservationEngine, ReservationError, ReservationStatus,
};
use tourney_slots::tournament::{NewTeam, NewTournament, SeedConfig, TeamId, TournamentId, bootstrap};

/// Helper to create a test database with a clean schema
async fn setup_test_db() -> Database {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://postgres@localhost/tourney_slots_test".to_string());

    let config = DatabaseConfig {
        database_url,
        max_connections: 10,
        min_connections: 1,
        connection_timeout_secs: 5,
        idle_timeout_secs: 300,
        max_lifetime_secs: 1800,
    };

    let db = Database::new(&config)
        .await
        .expect("Failed to create test database");
    db.apply_schema().await.expect("Failed to apply schema");
    cleanup(db.pool()).await;
    db
}

async fn cleanup(pool: &PgPool) {
    sqlx::query("TRUNCATE reservations, tournaments, teams RESTART IDENTITY CASCADE")
        .execute(pool)
        .await
        .expect("Failed to truncate tables");
}

async fn tournament_and_team(repo: &PgRepository) -> (TournamentId, TeamId) {
    let now = Utc::now();
    let tournament = repo
        .create_tournament(&NewTournament {
            name: "PG Cup".to_string(),
            description: "integration".to_string(),
            starts_at: now + Duration::days(30),
            ends_at: now + Duration::days(60),
            registration_deadline: now + Duration::days(15),
            max_teams: 8,
            entry_fee: 15_000,
        })
        .await
        .unwrap();
    let team = repo
        .create_team(&NewTeam::new("Morocco", "Morocco"))
        .await
        .unwrap();
    (tournament.id, team.id)
}

/// Insert a paid, unconfirmed row directly, bypassing the guards
async fn insert_pending(pool: &PgPool, participant: i64, tournament: TournamentId, team: TeamId) -> i64 {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO reservations (participant_id, tournament_id, team_id, created_at, is_paid,
                                  payment_method, transaction_ref, contact_number, paid_at)
        VALUES ($1, $2, $3, NOW(), TRUE, 'bKash', 'TX', '017', NOW())
        RETURNING id
        "#,
    )
    .bind(participant)
    .bind(tournament)
    .bind(team)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_full_lifecycle() {
    let db = setup_test_db().await;
    let repo = db.repository();
    let (tournament, team) = tournament_and_team(&repo).await;
    let engine = ReservationEngine::with_system_clock(Arc::new(repo));

    let alice = Actor::participant(1);
    let r = engine
        .create_reservation(&alice, tournament, team)
        .await
        .unwrap()
        .into_reservation();
    assert_eq!(r.status(), ReservationStatus::Unpaid);

    let paid = engine
        .submit_payment(&alice, r.id, PaymentSubmission::new("bKash", "TX-1", "01700000000"))
        .await
        .unwrap();
    assert_eq!(paid.status(), ReservationStatus::PendingConfirmation);

    let confirmed = engine
        .confirm_payment(&Actor::operator(900), r.id)
        .await
        .unwrap();
    assert!(confirmed.payment_confirmed);
    assert_eq!(confirmed.confirmed_by, Some(900));

    let rejected = engine
        .reject_payment(&Actor::operator(900), r.id)
        .await
        .unwrap();
    assert_eq!(rejected.status(), ReservationStatus::Unpaid);
    assert!(rejected.payment.is_none());

    engine.cancel_reservation(&alice, r.id).await.unwrap();
    assert!(engine.participant_reservation(&alice, tournament).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_slot_lock_accepts_ids_beyond_i32() {
    let db = setup_test_db().await;
    for seq in ["tournaments_id_seq", "teams_id_seq"] {
        sqlx::query(&format!("SELECT setval('{seq}', 4294967296)"))
            .execute(db.pool())
            .await
            .unwrap();
    }
    let repo = db.repository();
    let (tournament, team) = tournament_and_team(&repo).await;
    assert!(tournament > i64::from(i32::MAX));
    assert!(team > i64::from(i32::MAX));

    let engine = ReservationEngine::with_system_clock(Arc::new(repo));
    let alice = Actor::participant(1);
    let r = engine
        .create_reservation(&alice, tournament, team)
        .await
        .unwrap()
        .into_reservation();
    engine
        .submit_payment(&alice, r.id, PaymentSubmission::new("bKash", "TX-9", "017"))
        .await
        .unwrap();
    let confirmed = engine
        .confirm_payment(&Actor::operator(900), r.id)
        .await
        .unwrap();
    assert_eq!(confirmed.team_id, team);
    assert!(confirmed.payment_confirmed);
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_participant_uniqueness_is_a_conflict() {
    let db = setup_test_db().await;
    let repo = db.repository();
    let (tournament, team) = tournament_and_team(&repo).await;

    let new = NewReservation {
        participant_id: 1,
        tournament_id: tournament,
        team_id: team,
        created_at: Utc::now(),
    };
    repo.insert_reservation(&new).await.unwrap().unwrap();

    let err = repo.insert_reservation(&new).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_concurrent_confirmations_pick_one_winner() {
    let db = setup_test_db().await;
    let repo = db.repository();
    let (tournament, team) = tournament_and_team(&repo).await;
    let a = insert_pending(db.pool(), 1, tournament, team).await;
    let b = insert_pending(db.pool(), 2, tournament, team).await;

    let engine = ReservationEngine::with_system_clock(Arc::new(repo.clone()));
    let op1 = Actor::operator(900);
    let op2 = Actor::operator(901);
    let (ra, rb) = tokio::join!(engine.confirm_payment(&op1, a), engine.confirm_payment(&op2, b));

    let outcomes = [ra, rb];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(r, Err(ReservationError::SlotAlreadyTaken { .. }))));

    let slot = repo.slot_reservations(tournament, team).await.unwrap();
    assert_eq!(slot.iter().filter(|r| r.payment_confirmed).count(), 1);
    assert!(repo.duplicate_confirmed_slots().await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_unique_index_blocks_second_confirmation() {
    let db = setup_test_db().await;
    let repo = db.repository();
    let (tournament, team) = tournament_and_team(&repo).await;
    let a = insert_pending(db.pool(), 1, tournament, team).await;
    let b = insert_pending(db.pool(), 2, tournament, team).await;

    sqlx::query("UPDATE reservations SET payment_confirmed = TRUE WHERE id = $1")
        .bind(a)
        .execute(db.pool())
        .await
        .unwrap();
    let err = sqlx::query("UPDATE reservations SET payment_confirmed = TRUE WHERE id = $1")
        .bind(b)
        .execute(db.pool())
        .await
        .unwrap_err();
    assert!(RepositoryError::from(err).is_conflict());
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_seed_is_idempotent() {
    let db = setup_test_db().await;
    let repo = db.repository();

    let first = bootstrap(&repo, &SystemClock, &SeedConfig::default()).await.unwrap();
    let second = bootstrap(&repo, &SystemClock, &SeedConfig::default()).await.unwrap();

    assert!(first.tournament_created);
    assert!(!second.tournament_created);
    assert_eq!(first.tournament.id, second.tournament.id);
    assert_eq!(repo.list_teams().await.unwrap().len(), 32);
    assert_eq!(second.teams_created, 0);
}
