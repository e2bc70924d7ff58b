//! Pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::pool::PoolOptions;
use sqlx::Database;

/// Settings for the pool a connection draws its client from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of pooled clients.
    pub max_connections: u32,
    /// Clients kept open while idle.
    pub min_connections: u32,
    /// Seconds to wait for a free client before failing.
    pub acquire_timeout_secs: u64,
    /// Seconds before an idle client is closed, `None` to keep it.
    pub idle_timeout_secs: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: Some(600),
        }
    }
}

impl PoolConfig {
    /// Returns the acquire timeout.
    #[must_use]
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Builds sqlx pool options for any driver.
    #[must_use]
    pub fn options<DB: Database>(&self) -> PoolOptions<DB> {
        PoolOptions::<DB>::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.acquire_timeout())
            .idle_timeout(self.idle_timeout_secs.map(Duration::from_secs))
    }
}
