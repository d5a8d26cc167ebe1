use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use super::DatabaseError;
use crate::config::IdentityConfig;

/// Connection pool for the platform database, shared by the identity store
/// and route handlers. Created once in `main` and closed on shutdown.
#[derive(Clone)]
pub struct DataStore {
    pool: PgPool,
}

impl DataStore {
    /// Build the pool without connecting; the first query opens connections.
    pub fn connect_lazy(config: &IdentityConfig) -> Result<Self, DatabaseError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.timeout_ms))
            .connect_lazy(url)?;

        info!("Created database pool (max {} connections)", config.max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }
}
