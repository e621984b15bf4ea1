//! Console configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use tourney_slots::{UserId, db::DatabaseConfig, tournament::SeedConfig};

/// Complete console configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Database configuration
    pub database: DatabaseConfig,
    /// User id recorded as the confirming operator
    pub operator_id: UserId,
    /// Settings for the `seed` command
    pub seed: SeedConfig,
}

impl AdminConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `operator_id_override` - Optional operator id override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        database_url_override: Option<String>,
        operator_id_override: Option<UserId>,
    ) -> Result<Self, ConfigError> {
        let database = match database_url_override {
            Some(url) => DatabaseConfig::pool_from_env().with_url(url),
            None => DatabaseConfig::from_env().map_err(|_| ConfigError::MissingRequired {
                var: "DATABASE_URL".to_string(),
                hint: "Pass --db-url or set it in .env".to_string(),
            })?,
        };

        let operator_id = match operator_id_override {
            Some(id) => id,
            None => {
                let raw =
                    std::env::var("TS_OPERATOR_ID").map_err(|_| ConfigError::MissingRequired {
                        var: "TS_OPERATOR_ID".to_string(),
                        hint: "Pass --operator-id with your operator user id".to_string(),
                    })?;
                raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    var: "TS_OPERATOR_ID".to_string(),
                    reason: format!("Not an integer user id: {raw}"),
                })?
            }
        };

        let seed = SeedConfig::from_env();

        Ok(AdminConfig {
            database,
            operator_id,
            seed,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.operator_id <= 0 {
            return Err(ConfigError::Invalid {
                var: "TS_OPERATOR_ID".to_string(),
                reason: "Must be a positive user id".to_string(),
            });
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    self.database.max_connections
                ),
            });
        }

        if self.seed.max_teams == 0 {
            return Err(ConfigError::Invalid {
                var: "SEED_MAX_TEAMS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.seed.entry_fee < 0 {
            return Err(ConfigError::Invalid {
                var: "SEED_ENTRY_FEE".to_string(),
                reason: "Cannot be negative".to_string(),
            });
        }

        if self.seed.deadline_in_days > self.seed.starts_in_days {
            return Err(ConfigError::Invalid {
                var: "SEED_DEADLINE_IN_DAYS".to_string(),
                reason: format!(
                    "Registration must close before the start ({} days)",
                    self.seed.starts_in_days
                ),
            });
        }

        if self.seed.ends_in_days <= self.seed.starts_in_days {
            return Err(ConfigError::Invalid {
                var: "SEED_ENDS_IN_DAYS".to_string(),
                reason: format!(
                    "Must be after the start ({} days)",
                    self.seed.starts_in_days
                ),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AdminConfig {
        AdminConfig {
            database: DatabaseConfig::development(),
            operator_id: 1,
            seed: SeedConfig::default(),
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRequired {
            var: "TS_OPERATOR_ID".to_string(),
            hint: "Pass --operator-id".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("TS_OPERATOR_ID"));
        assert!(msg.contains("--operator-id"));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let config =
            AdminConfig::from_env(Some("postgres://cli/override".to_string()), Some(42)).unwrap();
        assert_eq!(config.database.database_url, "postgres://cli/override");
        assert_eq!(config.operator_id, 42);
    }

    #[test]
    fn test_url_override_keeps_pool_defaults() {
        let config = AdminConfig::from_env(Some("postgres://cli/pool".to_string()), Some(7)).unwrap();
        let pool = DatabaseConfig::pool_from_env();
        assert_eq!(config.database.max_connections, pool.max_connections);
        assert_eq!(config.database.max_lifetime_secs, pool.max_lifetime_secs);
        assert_eq!(config.seed.teams.len(), SeedConfig::default().teams.len());
    }

    #[test]
    fn test_defaults_validate() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_operator_id() {
        let mut config = config();
        config.operator_id = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_config_validation_deadline_after_start() {
        let mut config = config();
        config.seed.deadline_in_days = 40; // Invalid: after start at 30
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("SEED_DEADLINE_IN_DAYS"));
    }

    #[test]
    fn test_config_validation_pool_bounds() {
        let mut config = config();
        config.database.min_connections = config.database.max_connections + 1;
        assert!(config.validate().is_err());
    }
}
