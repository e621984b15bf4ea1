//! Default tournament and team bootstrap.
//!
//! Run explicitly (the operator console's `seed` command); read paths never
//! create data.

use super::models::{NewTeam, NewTournament, Tournament, TournamentStatus};
use crate::clock::Clock;
use crate::db::config::env_or;
use crate::db::{CatalogRepository, RepositoryResult};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// National teams created by the default seed
pub const DEFAULT_TEAMS: [&str; 32] = [
    "Argentina",
    "Brazil",
    "France",
    "Germany",
    "Spain",
    "England",
    "Italy",
    "Portugal",
    "Netherlands",
    "Belgium",
    "Croatia",
    "Denmark",
    "Switzerland",
    "Uruguay",
    "Mexico",
    "USA",
    "Japan",
    "South Korea",
    "Australia",
    "Morocco",
    "Senegal",
    "Egypt",
    "Nigeria",
    "Ghana",
    "Cameroon",
    "Chile",
    "Colombia",
    "Peru",
    "Ecuador",
    "Paraguay",
    "Sweden",
    "Norway",
];

/// Bootstrap settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedConfig {
    pub tournament_name: String,
    pub description: String,
    /// Days from now until the tournament starts
    pub starts_in_days: i64,
    /// Days from now until the tournament ends
    pub ends_in_days: i64,
    /// Days from now until registration closes
    pub deadline_in_days: i64,
    pub max_teams: u32,
    /// Entry fee in minor currency units
    pub entry_fee: i64,
    pub teams: Vec<String>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            tournament_name: "WORLD CUP 2026".to_string(),
            description: "International Football Tournament 2026".to_string(),
            starts_in_days: 30,
            ends_in_days: 60,
            deadline_in_days: 15,
            max_teams: 32,
            entry_fee: 15_000,
            teams: DEFAULT_TEAMS.iter().map(|t| (*t).to_string()).collect(),
        }
    }
}

impl SeedConfig {
    /// Defaults overridden by the `SEED_*` environment variables.
    ///
    /// Unparseable numeric values fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tournament_name: std::env::var("SEED_TOURNAMENT_NAME")
                .unwrap_or(defaults.tournament_name),
            description: std::env::var("SEED_TOURNAMENT_DESCRIPTION")
                .unwrap_or(defaults.description),
            starts_in_days: env_or("SEED_STARTS_IN_DAYS", defaults.starts_in_days),
            ends_in_days: env_or("SEED_ENDS_IN_DAYS", defaults.ends_in_days),
            deadline_in_days: env_or("SEED_DEADLINE_IN_DAYS", defaults.deadline_in_days),
            max_teams: env_or("SEED_MAX_TEAMS", defaults.max_teams),
            entry_fee: env_or("SEED_ENTRY_FEE", defaults.entry_fee),
            teams: defaults.teams,
        }
    }
}

/// What a bootstrap run produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    /// The open tournament after the run
    pub tournament: Tournament,
    pub tournament_created: bool,
    pub teams_created: usize,
}

/// Create the default tournament if no active upcoming one exists, and any
/// configured team missing by name. Safe to run repeatedly.
pub async fn bootstrap<R>(
    repo: &R,
    clock: &dyn Clock,
    config: &SeedConfig,
) -> RepositoryResult<SeedReport>
where
    R: CatalogRepository + ?Sized,
{
    let existing = repo
        .list_tournaments(true)
        .await?
        .into_iter()
        .find(|t| t.status == TournamentStatus::Upcoming);

    let (tournament, tournament_created) = match existing {
        Some(tournament) => (tournament, false),
        None => {
            let now = clock.now();
            let tournament = repo
                .create_tournament(&NewTournament {
                    name: config.tournament_name.clone(),
                    description: config.description.clone(),
                    starts_at: now + Duration::days(config.starts_in_days),
                    ends_at: now + Duration::days(config.ends_in_days),
                    registration_deadline: now + Duration::days(config.deadline_in_days),
                    max_teams: config.max_teams,
                    entry_fee: config.entry_fee,
                })
                .await?;
            log::info!(
                "Created tournament {} '{}'",
                tournament.id,
                tournament.name
            );
            (tournament, true)
        }
    };

    let mut teams_created = 0;
    for name in &config.teams {
        if repo.find_team_by_name(name).await?.is_none() {
            repo.create_team(&NewTeam::new(name.as_str(), name.as_str()))
                .await?;
            teams_created += 1;
        }
    }
    if teams_created > 0 {
        log::info!("Created {} teams", teams_created);
    }

    Ok(SeedReport {
        tournament,
        tournament_created,
        teams_created,
    })
}
