//! PostgreSQL connection configuration.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use chronicle_core::error::DomainError;

/// Configuration could not be read from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is unset.
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    /// A variable holds an unusable value.
    #[error("{name} must be a positive integer, got {value:?}")]
    Invalid {
        /// The variable name.
        name: &'static str,
        /// The raw value found.
        value: String,
    },
}

/// Connection settings for the PostgreSQL stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgStoreConfig {
    /// Connection string.
    pub database_url: String,
    /// Upper bound of the connection pool.
    pub max_connections: u32,
}

impl PgStoreConfig {
    /// Pool size used when `CHRONICLE_MAX_CONNECTIONS` is unset.
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

    /// Reads `DATABASE_URL` and `CHRONICLE_MAX_CONNECTIONS`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `DATABASE_URL` is unset, or
    /// `ConfigError::Invalid` if the pool size is not a positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the settings through `lookup` instead of the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Same as [`PgStoreConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let max_connections = match lookup("CHRONICLE_MAX_CONNECTIONS") {
            None => Self::DEFAULT_MAX_CONNECTIONS,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(value) if value > 0 => value,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "CHRONICLE_MAX_CONNECTIONS",
                        value: raw,
                    });
                }
            },
        };
        Ok(Self {
            database_url,
            max_connections,
        })
    }

    /// Opens a connection pool.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the database is unreachable.
    pub async fn connect(&self) -> Result<PgPool, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.database_url)
            .await
            .map_err(|e| DomainError::Infrastructure(format!("database connection failed: {e}")))?;
        tracing::info!(max_connections = self.max_connections, "connected to event store database");
        Ok(pool)
    }
}
