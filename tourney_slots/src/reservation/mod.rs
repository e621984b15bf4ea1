//! Reservation module implementing the team-slot protocol.
//!
//! This module implements:
//! - Availability of a team within a tournament (available, pending, taken)
//! - Participant reservations with payment submission
//! - Operator confirmation, rejection and deletion
//! - Serialized confirmation so each team is confirmed at most once per tournament
//! - Diagnostics for duplicate confirmations in existing data
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use chrono::{Duration, Utc};
//! use tourney_slots::auth::Actor;
//! use tourney_slots::db::{CatalogRepository, InMemoryRepository};
//! use tourney_slots::reservation::{PaymentSubmission, ReservationEngine, ReservationStatus};
//! use tourney_slots::tournament::{NewTeam, NewTournament};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = Arc::new(InMemoryRepository::new());
//!     let now = Utc::now();
//!     let cup = repo
//!         .create_tournament(&NewTournament {
//!             name: "Spring Cup".to_string(),
//!             description: String::new(),
//!             starts_at: now + Duration::days(30),
//!             ends_at: now + Duration::days(60),
//!             registration_deadline: now + Duration::days(15),
//!             max_teams: 16,
//!             entry_fee: 150,
//!         })
//!         .await?;
//!     let brazil = repo.create_team(&NewTeam::new("Brazil", "Brazil")).await?;
//!
//!     let engine = ReservationEngine::with_system_clock(repo);
//!     let alice = Actor::participant(7);
//!
//!     let reservation = engine
//!         .create_reservation(&alice, cup.id, brazil.id)
//!         .await?
//!         .into_reservation();
//!     engine
//!         .submit_payment(&alice, reservation.id, PaymentSubmission::new("bKash", "TX1", "01700000000"))
//!         .await?;
//!
//!     let confirmed = engine.confirm_payment(&Actor::operator(1), reservation.id).await?;
//!     assert_eq!(confirmed.status(), ReservationStatus::Confirmed);
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod errors;
pub mod models;

pub use engine::ReservationEngine;
pub use errors::{ReservationError, ReservationResult};
pub use models::{
    Availability, BulkConfirmReport, BulkRejectReport, CreateOutcome, DuplicateSlot, NewReservation,
    PaymentDetails, PaymentSubmission, Reservation, ReservationFilter, ReservationId,
    ReservationStatus, RosterEntry, TeamBoard, TeamSlot,
};
