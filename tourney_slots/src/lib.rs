//! # Tourney Slots
//!
//! Team-slot reservations for tournament sign-ups.
//!
//! Participants pick a team in a tournament, submit off-platform payment
//! proof, and wait for an operator to confirm it. A team can be confirmed
//! for at most one participant per tournament, and each participant holds
//! at most one reservation per tournament.
//!
//! ## Lifecycle
//!
//! - **Unpaid**: team selected; the owner may still cancel
//! - **PendingConfirmation**: payment submitted; the team is held for others
//! - **Confirmed**: an operator verified the payment; the slot is final
//!
//! ## Core Modules
//!
//! - [`reservation`]: The reservation engine and its models
//! - [`tournament`]: Tournaments, teams and the default seed
//! - [`db`]: Repository traits with PostgreSQL and in-memory implementations
//! - [`auth`]: Caller identity and roles
//! - [`clock`]: Injectable time source
//!
//! ## Example
//!
//! ```
//! use tourney_slots::{Availability, ReservationStatus};
//!
//! assert!(Availability::Available.is_available());
//! assert_eq!("pending".parse::<ReservationStatus>(), Ok(ReservationStatus::PendingConfirmation));
//! ```

/// Caller identity and roles.
pub mod auth;

/// Time source for deadlines and timestamps.
pub mod clock;

/// Persistence layer.
pub mod db;

/// Reservation engine.
pub mod reservation;

/// Tournament and team catalog.
pub mod tournament;

pub use auth::{Actor, Role, UserId};
pub use clock::{Clock, FixedClock, SystemClock};
pub use reservation::{
    Availability, CreateOutcome, Reservation, ReservationEngine, ReservationError,
    ReservationResult, ReservationStatus,
};
pub use tournament::{Team, TeamId, Tournament, TournamentId};
