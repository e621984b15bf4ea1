//! Tournament and team reference data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tournament ID type
pub type TournamentId = i64;

/// Team ID type
pub type TeamId = i64;

/// Tournament lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TournamentStatus {
    /// Not started yet
    Upcoming,
    /// Matches in progress
    Ongoing,
    /// Finished
    Completed,
}

impl std::fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TournamentStatus::Upcoming => write!(f, "upcoming"),
            TournamentStatus::Ongoing => write!(f, "ongoing"),
            TournamentStatus::Completed => write!(f, "completed"),
        }
    }
}

impl TournamentStatus {
    /// Parse the stored column value, falling back to `Upcoming`
    pub fn from_db(value: &str) -> Self {
        match value {
            "ongoing" => TournamentStatus::Ongoing,
            "completed" => TournamentStatus::Completed,
            _ => TournamentStatus::Upcoming,
        }
    }
}

/// Tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Last instant (exclusive) at which registration actions are accepted
    pub registration_deadline: DateTime<Utc>,
    /// Number of team slots that may be confirmed
    pub max_teams: u32,
    /// Entry fee in minor currency units
    pub entry_fee: i64,
    pub status: TournamentStatus,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Tournament {
    /// Whether the deadline is still ahead of `now`
    pub fn before_deadline(&self, now: DateTime<Utc>) -> bool {
        now < self.registration_deadline
    }

    /// Whether participants may create or pay for reservations at `now`
    pub fn accepts_registrations(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.before_deadline(now)
    }
}

/// Tournament creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTournament {
    pub name: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub registration_deadline: DateTime<Utc>,
    pub max_teams: u32,
    pub entry_fee: i64,
}

/// Team
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub country: String,
}

/// Team creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTeam {
    pub name: String,
    pub country: String,
}

impl NewTeam {
    pub fn new(name: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            country: country.into(),
        }
    }
}
