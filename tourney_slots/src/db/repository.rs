//! Repository traits for tournaments, teams and reservations.
//!
//! The engine only sees these traits. Methods that can grant a claim on a
//! (tournament, team) slot are *guarded writes*: the store re-evaluates the
//! slot and applies the write as one atomic unit, returning `None` when the
//! guard refuses it.
#![allow(clippy::needless_raw_string_hashes)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use super::errors::RepositoryResult;
use super::timeouts::{with_default_timeout, with_transaction_timeout};
use crate::auth::UserId;
use crate::reservation::{DuplicateSlot, NewReservation, PaymentDetails, Reservation, ReservationId};
use crate::tournament::{
    NewTeam, NewTournament, Team, TeamId, Tournament, TournamentId, TournamentStatus,
};

/// Trait for tournament and team reference data
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Create a tournament (active, status `Upcoming`)
    async fn create_tournament(&self, new: &NewTournament) -> RepositoryResult<Tournament>;

    /// Find tournament by ID
    async fn find_tournament(&self, id: TournamentId) -> RepositoryResult<Option<Tournament>>;

    /// List tournaments, newest first
    async fn list_tournaments(&self, active_only: bool) -> RepositoryResult<Vec<Tournament>>;

    /// Open or close a tournament; `false` if it does not exist
    async fn set_tournament_active(&self, id: TournamentId, is_active: bool)
    -> RepositoryResult<bool>;

    /// Create a team
    async fn create_team(&self, new: &NewTeam) -> RepositoryResult<Team>;

    /// Find team by ID
    async fn find_team(&self, id: TeamId) -> RepositoryResult<Option<Team>>;

    /// Find team by its unique name
    async fn find_team_by_name(&self, name: &str) -> RepositoryResult<Option<Team>>;

    /// List all teams ordered by name
    async fn list_teams(&self) -> RepositoryResult<Vec<Team>>;
}

/// Trait for reservation storage
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Find reservation by ID
    async fn find_reservation(&self, id: ReservationId) -> RepositoryResult<Option<Reservation>>;

    /// The participant's reservation in a tournament, if any
    async fn find_participant_reservation(
        &self,
        participant_id: UserId,
        tournament_id: TournamentId,
    ) -> RepositoryResult<Option<Reservation>>;

    /// Every reservation for one (tournament, team) slot
    async fn slot_reservations(
        &self,
        tournament_id: TournamentId,
        team_id: TeamId,
    ) -> RepositoryResult<Vec<Reservation>>;

    /// Every reservation in a tournament
    async fn tournament_reservations(
        &self,
        tournament_id: TournamentId,
    ) -> RepositoryResult<Vec<Reservation>>;

    /// All reservations ordered by ID, optionally for one tournament
    async fn list_reservations(
        &self,
        tournament_id: Option<TournamentId>,
    ) -> RepositoryResult<Vec<Reservation>>;

    /// Insert an Unpaid reservation unless the slot is confirmed or paid for
    /// by another participant.
    ///
    /// # Errors
    ///
    /// * `RepositoryError::Conflict` - participant already has a reservation
    ///   in the tournament
    async fn insert_reservation(
        &self,
        new: &NewReservation,
    ) -> RepositoryResult<Option<Reservation>>;

    /// Record payment unless the target is confirmed or another reservation
    /// for the slot is paid or confirmed
    async fn mark_paid(
        &self,
        id: ReservationId,
        payment: &PaymentDetails,
    ) -> RepositoryResult<Option<Reservation>>;

    /// Confirm a paid reservation unless another reservation for the slot is
    /// already confirmed.
    ///
    /// # Errors
    ///
    /// * `RepositoryError::Conflict` - a concurrent confirmation won the slot
    async fn mark_confirmed(
        &self,
        id: ReservationId,
        operator_id: UserId,
        at: DateTime<Utc>,
    ) -> RepositoryResult<Option<Reservation>>;

    /// Return a reservation to Unpaid, clearing payment and confirmation data
    async fn clear_payment(&self, id: ReservationId) -> RepositoryResult<Option<Reservation>>;

    /// Delete unconditionally; `false` if nothing was deleted
    async fn delete_reservation(&self, id: ReservationId) -> RepositoryResult<bool>;

    /// Delete only while the reservation is still Unpaid
    async fn delete_unpaid_reservation(&self, id: ReservationId) -> RepositoryResult<bool>;

    /// Delete unless the reservation has been confirmed
    async fn delete_unconfirmed_reservation(&self, id: ReservationId) -> RepositoryResult<bool>;

    /// Slots holding more than one confirmed reservation
    async fn duplicate_confirmed_slots(&self) -> RepositoryResult<Vec<DuplicateSlot>>;
}

/// Everything the reservation engine needs from storage
pub trait Repository: CatalogRepository + ReservationRepository {}

impl<T: CatalogRepository + ReservationRepository + ?Sized> Repository for T {}

const TOURNAMENT_COLUMNS: &str = "id, name, description, starts_at, ends_at, registration_deadline, \
     max_teams, entry_fee, status, is_active, created_at";

const RESERVATION_COLUMNS: &str = "id, participant_id, tournament_id, team_id, created_at, is_paid, \
     payment_confirmed, payment_method, transaction_ref, contact_number, paid_at, \
     confirmed_by, confirmed_at";

fn tournament_from_row(row: &PgRow) -> Result<Tournament, sqlx::Error> {
    let max_teams: i32 = row.try_get("max_teams")?;
    let status: String = row.try_get("status")?;
    Ok(Tournament {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        starts_at: row.try_get::<NaiveDateTime, _>("starts_at")?.and_utc(),
        ends_at: row.try_get::<NaiveDateTime, _>("ends_at")?.and_utc(),
        registration_deadline: row
            .try_get::<NaiveDateTime, _>("registration_deadline")?
            .and_utc(),
        max_teams: u32::try_from(max_teams).unwrap_or(0),
        entry_fee: row.try_get("entry_fee")?,
        status: TournamentStatus::from_db(&status),
        is_active: row.try_get("is_active")?,
        created_at: row.try_get::<NaiveDateTime, _>("created_at")?.and_utc(),
    })
}

fn team_from_row(row: &PgRow) -> Result<Team, sqlx::Error> {
    Ok(Team {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        country: row.try_get("country")?,
    })
}

fn reservation_from_row(row: &PgRow) -> Result<Reservation, sqlx::Error> {
    let method: Option<String> = row.try_get("payment_method")?;
    let transaction_ref: Option<String> = row.try_get("transaction_ref")?;
    let contact_number: Option<String> = row.try_get("contact_number")?;
    let paid_at: Option<NaiveDateTime> = row.try_get("paid_at")?;

    let payment = match (method, transaction_ref, contact_number, paid_at) {
        (Some(method), Some(transaction_ref), Some(contact_number), Some(paid_at)) => {
            Some(PaymentDetails {
                method,
                transaction_ref,
                contact_number,
                paid_at: paid_at.and_utc(),
            })
        }
        _ => None,
    };

    Ok(Reservation {
        id: row.try_get("id")?,
        participant_id: row.try_get("participant_id")?,
        tournament_id: row.try_get("tournament_id")?,
        team_id: row.try_get("team_id")?,
        created_at: row.try_get::<NaiveDateTime, _>("created_at")?.and_utc(),
        is_paid: row.try_get("is_paid")?,
        payment_confirmed: row.try_get("payment_confirmed")?,
        payment,
        confirmed_by: row.try_get("confirmed_by")?,
        confirmed_at: row
            .try_get::<Option<NaiveDateTime>, _>("confirmed_at")?
            .map(|dt| dt.and_utc()),
    })
}

fn reservations_from_rows(rows: &[PgRow]) -> Result<Vec<Reservation>, sqlx::Error> {
    rows.iter().map(reservation_from_row).collect()
}

/// Serialize guarded writes on one (tournament, team) slot until the
/// transaction ends. Key collisions only add contention, never unsafety.
async fn lock_slot(
    tx: &mut Transaction<'_, Postgres>,
    tournament_id: TournamentId,
    team_id: TeamId,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "SELECT pg_advisory_xact_lock(hashtextextended(format('%s:%s', $1::BIGINT, $2::BIGINT), 0))",
    )
    .bind(tournament_id)
    .bind(team_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Slot of an existing reservation, or `None` if it is gone
async fn slot_of(
    tx: &mut Transaction<'_, Postgres>,
    id: ReservationId,
) -> Result<Option<(TournamentId, TeamId)>, sqlx::Error> {
    sqlx::query_as::<_, (i64, i64)>(
        "SELECT tournament_id, team_id FROM reservations WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
}

/// PostgreSQL implementation of the repository traits
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_reservations(
        &self,
        sql: &str,
        binds: &[i64],
    ) -> RepositoryResult<Vec<Reservation>> {
        let mut query = sqlx::query(sql);
        for value in binds {
            query = query.bind(*value);
        }
        let rows = with_default_timeout(query.fetch_all(&self.pool)).await?;
        Ok(reservations_from_rows(&rows)?)
    }
}

#[async_trait]
impl CatalogRepository for PgRepository {
    async fn create_tournament(&self, new: &NewTournament) -> RepositoryResult<Tournament> {
        let sql = format!(
            r#"
            INSERT INTO tournaments (name, description, starts_at, ends_at, registration_deadline, max_teams, entry_fee, status, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE)
            RETURNING {TOURNAMENT_COLUMNS}
            "#
        );
        let row = with_default_timeout(
            sqlx::query(&sql)
                .bind(&new.name)
                .bind(&new.description)
                .bind(new.starts_at.naive_utc())
                .bind(new.ends_at.naive_utc())
                .bind(new.registration_deadline.naive_utc())
                .bind(i32::try_from(new.max_teams).unwrap_or(i32::MAX))
                .bind(new.entry_fee)
                .bind(TournamentStatus::Upcoming.to_string())
                .fetch_one(&self.pool),
        )
        .await?;

        Ok(tournament_from_row(&row)?)
    }

    async fn find_tournament(&self, id: TournamentId) -> RepositoryResult<Option<Tournament>> {
        let sql = format!("SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1");
        let row =
            with_default_timeout(sqlx::query(&sql).bind(id).fetch_optional(&self.pool)).await?;
        Ok(row.as_ref().map(tournament_from_row).transpose()?)
    }

    async fn list_tournaments(&self, active_only: bool) -> RepositoryResult<Vec<Tournament>> {
        let sql = format!(
            "SELECT {TOURNAMENT_COLUMNS} FROM tournaments
             WHERE is_active OR NOT $1
             ORDER BY created_at DESC, id DESC"
        );
        let rows =
            with_default_timeout(sqlx::query(&sql).bind(active_only).fetch_all(&self.pool))
                .await?;
        Ok(rows
            .iter()
            .map(tournament_from_row)
            .collect::<Result<_, _>>()?)
    }

    async fn set_tournament_active(
        &self,
        id: TournamentId,
        is_active: bool,
    ) -> RepositoryResult<bool> {
        let result = with_default_timeout(
            sqlx::query("UPDATE tournaments SET is_active = $1 WHERE id = $2")
                .bind(is_active)
                .bind(id)
                .execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_team(&self, new: &NewTeam) -> RepositoryResult<Team> {
        let row = with_default_timeout(
            sqlx::query("INSERT INTO teams (name, country) VALUES ($1, $2) RETURNING id, name, country")
                .bind(&new.name)
                .bind(&new.country)
                .fetch_one(&self.pool),
        )
        .await?;
        Ok(team_from_row(&row)?)
    }

    async fn find_team(&self, id: TeamId) -> RepositoryResult<Option<Team>> {
        let row = with_default_timeout(
            sqlx::query("SELECT id, name, country FROM teams WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await?;
        Ok(row.as_ref().map(team_from_row).transpose()?)
    }

    async fn find_team_by_name(&self, name: &str) -> RepositoryResult<Option<Team>> {
        let row = with_default_timeout(
            sqlx::query("SELECT id, name, country FROM teams WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool),
        )
        .await?;
        Ok(row.as_ref().map(team_from_row).transpose()?)
    }

    async fn list_teams(&self) -> RepositoryResult<Vec<Team>> {
        let rows = with_default_timeout(
            sqlx::query("SELECT id, name, country FROM teams ORDER BY name, id")
                .fetch_all(&self.pool),
        )
        .await?;
        Ok(rows.iter().map(team_from_row).collect::<Result<_, _>>()?)
    }
}

#[async_trait]
impl ReservationRepository for PgRepository {
    async fn find_reservation(&self, id: ReservationId) -> RepositoryResult<Option<Reservation>> {
        let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1");
        let row =
            with_default_timeout(sqlx::query(&sql).bind(id).fetch_optional(&self.pool)).await?;
        Ok(row.as_ref().map(reservation_from_row).transpose()?)
    }

    async fn find_participant_reservation(
        &self,
        participant_id: UserId,
        tournament_id: TournamentId,
    ) -> RepositoryResult<Option<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations
             WHERE participant_id = $1 AND tournament_id = $2"
        );
        let row = with_default_timeout(
            sqlx::query(&sql)
                .bind(participant_id)
                .bind(tournament_id)
                .fetch_optional(&self.pool),
        )
        .await?;
        Ok(row.as_ref().map(reservation_from_row).transpose()?)
    }

    async fn slot_reservations(
        &self,
        tournament_id: TournamentId,
        team_id: TeamId,
    ) -> RepositoryResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations
             WHERE tournament_id = $1 AND team_id = $2
             ORDER BY id"
        );
        self.fetch_reservations(&sql, &[tournament_id, team_id]).await
    }

    async fn tournament_reservations(
        &self,
        tournament_id: TournamentId,
    ) -> RepositoryResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE tournament_id = $1 ORDER BY id"
        );
        self.fetch_reservations(&sql, &[tournament_id]).await
    }

    async fn list_reservations(
        &self,
        tournament_id: Option<TournamentId>,
    ) -> RepositoryResult<Vec<Reservation>> {
        match tournament_id {
            Some(id) => self.tournament_reservations(id).await,
            None => {
                let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations ORDER BY id");
                self.fetch_reservations(&sql, &[]).await
            }
        }
    }

    async fn insert_reservation(
        &self,
        new: &NewReservation,
    ) -> RepositoryResult<Option<Reservation>> {
        let sql = format!(
            r#"
            INSERT INTO reservations (participant_id, tournament_id, team_id, created_at)
            SELECT $1, $2, $3, $4
            WHERE NOT EXISTS (
                SELECT 1 FROM reservations
                WHERE tournament_id = $2 AND team_id = $3
                  AND (payment_confirmed OR (is_paid AND participant_id <> $1))
            )
            RETURNING {RESERVATION_COLUMNS}
            "#
        );

        with_transaction_timeout(async {
            let mut tx = self.pool.begin().await?;
            lock_slot(&mut tx, new.tournament_id, new.team_id).await?;

            let row = sqlx::query(&sql)
                .bind(new.participant_id)
                .bind(new.tournament_id)
                .bind(new.team_id)
                .bind(new.created_at.naive_utc())
                .fetch_optional(&mut *tx)
                .await?;
            let reservation = row.as_ref().map(reservation_from_row).transpose()?;

            tx.commit().await?;
            Ok::<_, sqlx::Error>(reservation)
        })
        .await
    }

    async fn mark_paid(
        &self,
        id: ReservationId,
        payment: &PaymentDetails,
    ) -> RepositoryResult<Option<Reservation>> {
        let sql = format!(
            r#"
            UPDATE reservations r
            SET is_paid = TRUE, payment_method = $2, transaction_ref = $3,
                contact_number = $4, paid_at = $5
            WHERE r.id = $1
              AND NOT r.payment_confirmed
              AND NOT EXISTS (
                  SELECT 1 FROM reservations o
                  WHERE o.tournament_id = r.tournament_id AND o.team_id = r.team_id
                    AND o.id <> r.id AND (o.is_paid OR o.payment_confirmed)
              )
            RETURNING {RESERVATION_COLUMNS}
            "#
        );

        with_transaction_timeout(async {
            let mut tx = self.pool.begin().await?;
            let Some((tournament_id, team_id)) = slot_of(&mut tx, id).await? else {
                return Ok(None);
            };
            lock_slot(&mut tx, tournament_id, team_id).await?;

            let row = sqlx::query(&sql)
                .bind(id)
                .bind(&payment.method)
                .bind(&payment.transaction_ref)
                .bind(&payment.contact_number)
                .bind(payment.paid_at.naive_utc())
                .fetch_optional(&mut *tx)
                .await?;
            let reservation = row.as_ref().map(reservation_from_row).transpose()?;

            tx.commit().await?;
            Ok::<_, sqlx::Error>(reservation)
        })
        .await
    }

    async fn mark_confirmed(
        &self,
        id: ReservationId,
        operator_id: UserId,
        at: DateTime<Utc>,
    ) -> RepositoryResult<Option<Reservation>> {
        let sql = format!(
            r#"
            UPDATE reservations r
            SET payment_confirmed = TRUE, confirmed_by = $2, confirmed_at = $3
            WHERE r.id = $1
              AND r.is_paid
              AND NOT r.payment_confirmed
              AND NOT EXISTS (
                  SELECT 1 FROM reservations o
                  WHERE o.tournament_id = r.tournament_id AND o.team_id = r.team_id
                    AND o.id <> r.id AND o.payment_confirmed
              )
            RETURNING {RESERVATION_COLUMNS}
            "#
        );

        with_transaction_timeout(async {
            let mut tx = self.pool.begin().await?;
            let Some((tournament_id, team_id)) = slot_of(&mut tx, id).await? else {
                return Ok(None);
            };
            lock_slot(&mut tx, tournament_id, team_id).await?;

            // The partial unique index on confirmed slots rejects anything the
            // lock missed with a unique violation, surfaced as a conflict.
            let row = sqlx::query(&sql)
                .bind(id)
                .bind(operator_id)
                .bind(at.naive_utc())
                .fetch_optional(&mut *tx)
                .await?;
            let reservation = row.as_ref().map(reservation_from_row).transpose()?;

            tx.commit().await?;
            Ok::<_, sqlx::Error>(reservation)
        })
        .await
    }

    async fn clear_payment(&self, id: ReservationId) -> RepositoryResult<Option<Reservation>> {
        let sql = format!(
            r#"
            UPDATE reservations
            SET is_paid = FALSE, payment_confirmed = FALSE, payment_method = NULL,
                transaction_ref = NULL, contact_number = NULL, paid_at = NULL,
                confirmed_by = NULL, confirmed_at = NULL
            WHERE id = $1
            RETURNING {RESERVATION_COLUMNS}
            "#
        );
        let row =
            with_default_timeout(sqlx::query(&sql).bind(id).fetch_optional(&self.pool)).await?;
        Ok(row.as_ref().map(reservation_from_row).transpose()?)
    }

    async fn delete_reservation(&self, id: ReservationId) -> RepositoryResult<bool> {
        let result = with_default_timeout(
            sqlx::query("DELETE FROM reservations WHERE id = $1")
                .bind(id)
                .execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_unpaid_reservation(&self, id: ReservationId) -> RepositoryResult<bool> {
        let result = with_default_timeout(
            sqlx::query(
                "DELETE FROM reservations WHERE id = $1 AND NOT is_paid AND NOT payment_confirmed",
            )
            .bind(id)
            .execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_unconfirmed_reservation(&self, id: ReservationId) -> RepositoryResult<bool> {
        let result = with_default_timeout(
            sqlx::query("DELETE FROM reservations WHERE id = $1 AND NOT payment_confirmed")
                .bind(id)
                .execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn duplicate_confirmed_slots(&self) -> RepositoryResult<Vec<DuplicateSlot>> {
        let rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT tournament_id, team_id, COUNT(*) AS confirmed_count
                FROM reservations
                WHERE payment_confirmed
                GROUP BY tournament_id, team_id
                HAVING COUNT(*) > 1
                ORDER BY tournament_id, team_id
                "#,
            )
            .fetch_all(&self.pool),
        )
        .await?;

        let mut duplicates = Vec::with_capacity(rows.len());
        for row in rows {
            let count: i64 = row.try_get("confirmed_count")?;
            duplicates.push(DuplicateSlot {
                tournament_id: row.try_get("tournament_id")?,
                team_id: row.try_get("team_id")?,
                count: u64::try_from(count).unwrap_or(0),
            });
        }
        Ok(duplicates)
    }
}
