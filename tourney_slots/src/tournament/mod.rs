//! Tournament and team catalog.
//!
//! Tournaments carry the registration window and slot capacity the
//! reservation engine checks; teams are shared reference data across
//! tournaments. [`seed::bootstrap`] creates the default catalog.
//!
//! ## Example
//!
//! ```no_run
//! use tourney_slots::clock::SystemClock;
//! use tourney_slots::db::{Database, DatabaseConfig};
//! use tourney_slots::tournament::seed::{bootstrap, SeedConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&DatabaseConfig::from_env()?).await?;
//!     let report = bootstrap(&db.repository(), &SystemClock, &SeedConfig::default()).await?;
//!     println!("Open tournament: {}", report.tournament.name);
//!     Ok(())
//! }
//! ```

pub mod models;
pub mod seed;

pub use models::{
    NewTeam, NewTournament, Team, TeamId, Tournament, TournamentId, TournamentStatus,
};
pub use seed::{SeedConfig, SeedReport, bootstrap};
