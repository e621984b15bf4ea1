//! Database module providing PostgreSQL connection pooling and repositories.
//!
//! The reservation engine talks to storage only through the traits in
//! [`repository`]. [`PgRepository`] is the durable implementation;
//! [`InMemoryRepository`] keeps the same atomicity rules in process memory.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub mod config;
pub mod errors;
pub mod memory;
pub mod repository;
pub mod timeouts;

pub use config::DatabaseConfig;
pub use errors::{RepositoryError, RepositoryResult};
pub use memory::InMemoryRepository;
pub use repository::{CatalogRepository, PgRepository, Repository, ReservationRepository};

/// Schema for tournaments, teams and reservations
pub const SCHEMA: &str = include_str!("schema.sql");

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tourney_slots::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let config = DatabaseConfig::from_env()?;
    ///     let db = Database::new(&config).await?;
    ///     db.apply_schema().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn apply_schema(&self) -> RepositoryResult<()> {
        timeouts::with_long_timeout(sqlx::raw_sql(SCHEMA).execute(&self.pool)).await?;
        log::info!("Database schema applied");
        Ok(())
    }

    /// Check if the database connection is healthy
    pub async fn health_check(&self) -> RepositoryResult<()> {
        timeouts::with_default_timeout(sqlx::query("SELECT 1").execute(&self.pool)).await?;
        Ok(())
    }

    /// Repository backed by this pool
    pub fn repository(&self) -> PgRepository {
        PgRepository::new(self.pool.clone())
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}
