//! Operator console for tournament team-slot reservations.
//!
//! Runs one command against the PostgreSQL store as a super operator and
//! exits. Every write goes through the reservation engine, so the console
//! is subject to the same slot rules as any other client.

mod config;
mod logging;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Error, anyhow, bail};
use log::info;
use pico_args::Arguments;
use serde::Serialize;
use tourney_slots::{
    Actor, Availability, ReservationEngine, SystemClock,
    db::Database,
    reservation::{
        BulkConfirmReport, BulkRejectReport, DuplicateSlot, Reservation, ReservationFilter,
        ReservationId, TeamBoard,
    },
    tournament::{SeedReport, TeamId, TournamentId, bootstrap},
};

use crate::config::AdminConfig;

const HELP: &str = "\
Operator console for tournament team-slot reservations

USAGE:
  ts_admin [OPTIONS] <COMMAND> [ARGS]

COMMANDS:
  seed                                    Create the default tournament and teams
  board <TOURNAMENT_ID>                   Team availability board
  availability <TOURNAMENT_ID> <TEAM_ID>  Availability of a single team
  list [--tournament ID] [--status S]     List reservations (S: unpaid|pending|confirmed)
  confirm <RESERVATION_ID>...             Confirm one or more submitted payments
  reject <RESERVATION_ID>...              Reject one or more payments (back to unpaid)
  delete <RESERVATION_ID>                 Delete a reservation
  duplicates                              List teams confirmed more than once

OPTIONS:
  --db-url       URL   Database connection string  [default: env DATABASE_URL]
  --operator-id  ID    Operator user id            [default: env TS_OPERATOR_ID]

FLAGS:
  -h, --help           Print help information
  --json               Print machine-readable JSON
  --apply-schema       Create missing tables and indexes before running

ENVIRONMENT:
  DATABASE_URL         PostgreSQL connection string
  TS_OPERATOR_ID       Operator user id
  RUST_LOG             Log filter (default: info,sqlx=warn)
  SEED_*               Overrides for the seed command (see .env)
";

/// Console command
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Seed,
    Board(TournamentId),
    Availability(TournamentId, TeamId),
    List(ReservationFilter),
    Confirm(Vec<ReservationId>),
    Reject(Vec<ReservationId>),
    Delete(ReservationId),
    Duplicates,
}

struct Args {
    database_url: Option<String>,
    operator_id: Option<i64>,
    json: bool,
    apply_schema: bool,
    command: Command,
}

impl Args {
    fn parse(mut pargs: Arguments) -> Result<Self, Error> {
        let database_url = pargs.opt_value_from_str("--db-url")?;
        let operator_id = pargs.opt_value_from_str("--operator-id")?;
        let json = pargs.contains("--json");
        let apply_schema = pargs.contains("--apply-schema");
        let command = parse_command(&mut pargs)?;

        let rest = pargs.finish();
        if !rest.is_empty() {
            bail!("Unexpected arguments: {:?}", rest);
        }

        Ok(Args {
            database_url,
            operator_id,
            json,
            apply_schema,
            command,
        })
    }
}

fn parse_command(pargs: &mut Arguments) -> Result<Command, Error> {
    let Some(name) = pargs.subcommand()? else {
        bail!("Missing command, see --help");
    };

    let command = match name.as_str() {
        "seed" => Command::Seed,
        "board" => Command::Board(pargs.free_from_str()?),
        "availability" => Command::Availability(pargs.free_from_str()?, pargs.free_from_str()?),
        "list" => Command::List(ReservationFilter {
            tournament_id: pargs.opt_value_from_str("--tournament")?,
            status: pargs.opt_value_from_str("--status")?,
        }),
        "confirm" => Command::Confirm(reservation_ids(pargs, "confirm")?),
        "reject" => Command::Reject(reservation_ids(pargs, "reject")?),
        "delete" => Command::Delete(pargs.free_from_str()?),
        "duplicates" => Command::Duplicates,
        other => bail!("Unknown command: {other}"),
    };

    Ok(command)
}

/// Consume the remaining free arguments as reservation ids
fn reservation_ids(pargs: &mut Arguments, command: &str) -> Result<Vec<ReservationId>, Error> {
    let ids = std::mem::replace(pargs, Arguments::from_vec(Vec::new()))
        .finish()
        .into_iter()
        .map(|arg| {
            arg.to_str()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| anyhow!("Invalid reservation id: {:?}", arg))
        })
        .collect::<Result<Vec<ReservationId>, _>>()?;
    if ids.is_empty() {
        bail!("{command} needs at least one reservation id");
    }
    Ok(ids)
}

#[derive(Serialize)]
struct AvailabilityView {
    tournament_id: TournamentId,
    team_id: TeamId,
    availability: Availability,
}

/// Print `value` as JSON, or through `human` otherwise
fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce(&T)) -> Result<(), Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

fn print_board(board: &TeamBoard) {
    let t = &board.tournament;
    let days_left = (t.registration_deadline - chrono::Utc::now()).num_days();
    println!(
        "{} (id {}, {}): {}/{} confirmed, {} remaining{}",
        t.name,
        t.id,
        t.status,
        board.confirmed_count,
        t.max_teams,
        board.remaining_slots,
        if board.is_full { ", FULL" } else { "" }
    );
    println!(
        "Registration closes {} ({} days)",
        t.registration_deadline.format("%Y-%m-%d %H:%M UTC"),
        days_left
    );
    for slot in &board.teams {
        println!("  {:>4}  {:<20} {}", slot.team.id, slot.team.name, slot.availability);
    }
}

fn print_reservations(reservations: &[Reservation]) {
    if reservations.is_empty() {
        println!("No reservations");
        return;
    }
    for r in reservations {
        println!(
            "#{:<6} participant {:<8} tournament {:<4} team {:<4} {:<10} {}",
            r.id,
            r.participant_id,
            r.tournament_id,
            r.team_id,
            r.status(),
            r.payment_summary()
        );
    }
}

fn print_report(report: &BulkConfirmReport) {
    for id in &report.confirmed {
        println!("confirmed #{id}");
    }
    for (id, reason) in &report.failed {
        println!("failed    #{id}: {reason}");
    }
}

fn print_reject_report(report: &BulkRejectReport) {
    for id in &report.rejected {
        println!("rejected  #{id}");
    }
    for (id, reason) in &report.failed {
        println!("failed    #{id}: {reason}");
    }
}

fn print_duplicates(duplicates: &[DuplicateSlot]) {
    if duplicates.is_empty() {
        println!("No duplicate confirmations");
    }
    for d in duplicates {
        println!(
            "tournament {} team {}: confirmed {} times",
            d.tournament_id, d.team_id, d.count
        );
    }
}

fn print_seed(report: &SeedReport) {
    let verb = if report.tournament_created {
        "Created"
    } else {
        "Kept"
    };
    println!(
        "{} tournament {} '{}'; {} teams added",
        verb, report.tournament.id, report.tournament.name, report.teams_created
    );
}

async fn run(
    engine: &ReservationEngine,
    operator: &Actor,
    config: &AdminConfig,
    command: Command,
    json: bool,
) -> Result<(), Error> {
    match command {
        Command::Seed => {
            let report = bootstrap(engine.repository().as_ref(), &SystemClock, &config.seed).await?;
            emit(json, &report, print_seed)
        }
        Command::Board(tournament_id) => {
            let board = engine.team_board(tournament_id, None).await?;
            emit(json, &board, print_board)
        }
        Command::Availability(tournament_id, team_id) => {
            let availability = engine.check_availability(tournament_id, team_id).await?;
            let view = AvailabilityView {
                tournament_id,
                team_id,
                availability,
            };
            emit(json, &view, |v| println!("{}", v.availability))
        }
        Command::List(filter) => {
            let reservations = engine.list_reservations(operator, filter).await?;
            emit(json, &reservations, |r| print_reservations(r))
        }
        Command::Confirm(ids) => {
            let report = engine.confirm_payments(operator, &ids).await?;
            for id in &report.confirmed {
                logging::log_operator_action("confirm", operator.user_id, *id, "ok");
            }
            for (id, reason) in &report.failed {
                logging::log_operator_action("confirm", operator.user_id, *id, reason);
            }
            emit(json, &report, print_report)?;
            if !report.failed.is_empty() {
                bail!("{} reservation(s) not confirmed", report.failed.len());
            }
            Ok(())
        }
        Command::Reject(ids) => {
            let report = engine.reject_payments(operator, &ids).await?;
            for id in &report.rejected {
                logging::log_operator_action("reject", operator.user_id, *id, "ok");
            }
            for (id, reason) in &report.failed {
                logging::log_operator_action("reject", operator.user_id, *id, reason);
            }
            emit(json, &report, print_reject_report)?;
            if !report.failed.is_empty() {
                bail!("{} reservation(s) not rejected", report.failed.len());
            }
            Ok(())
        }
        Command::Delete(id) => {
            let result = engine.cancel_reservation(operator, id).await;
            log_outcome("delete", operator, id, &result);
            result?;
            emit(json, &id, |id| println!("Deleted reservation #{id}"))
        }
        Command::Duplicates => {
            let duplicates = engine.list_duplicate_confirmed_teams(operator).await?;
            emit(json, &duplicates, |d| print_duplicates(d))
        }
    }
}

fn log_outcome<T>(
    action: &str,
    operator: &Actor,
    id: ReservationId,
    result: &tourney_slots::ReservationResult<T>,
) {
    match result {
        Ok(_) => logging::log_operator_action(action, operator.user_id, id, "ok"),
        Err(e) => logging::log_operator_action(action, operator.user_id, id, &e.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(ExitCode::SUCCESS);
    }

    let args = Args::parse(pargs)?;
    logging::init();

    let config = AdminConfig::from_env(args.database_url, args.operator_id)?;
    config.validate()?;

    let db = Database::new(&config.database)
        .await
        .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;
    db.health_check()
        .await
        .map_err(|e| anyhow!("Database health check failed: {}", e))?;
    info!("Database connected successfully");

    if args.apply_schema {
        db.apply_schema().await?;
    }

    let engine = ReservationEngine::with_system_clock(Arc::new(db.repository()));
    let operator = Actor::super_operator(config.operator_id);

    let outcome = run(&engine, &operator, &config, args.command, args.json).await;
    db.close().await;

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("Error: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}
