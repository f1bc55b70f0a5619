use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use super::models::{NewTerritory, Territory};

/// Destination for computed territories. The clustering activity only ever
/// computes; persistence goes through this seam so tests can capture output
/// without a database.
#[async_trait]
pub trait ClusterSink: Send + Sync {
    /// Persist one computed territory, returning the stored record.
    async fn persist(&self, territory: NewTerritory) -> Result<Territory>;
}

/// Production sink: writes territories to Postgres.
pub struct PgClusterSink {
    pool: PgPool,
}

impl PgClusterSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClusterSink for PgClusterSink {
    async fn persist(&self, territory: NewTerritory) -> Result<Territory> {
        Territory::insert(&territory, &self.pool).await
    }
}
