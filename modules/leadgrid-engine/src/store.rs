//! Postgres-backed implementations of the engine's store traits, delegating
//! to the domain models.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use leadgrid_common::{CellStatus, ClaimVerdict, DiscoveredCandidate, QuerySaturation};
use leadgrid_domains::grids::{Cell, Grid};
use leadgrid_domains::leads::Lead;

use crate::traits::{CellStore, LeadStore};

#[derive(Clone)]
pub struct PgCellStore {
    pool: PgPool,
}

impl PgCellStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CellStore for PgCellStore {
    async fn claim(&self, cell_id: Uuid, expected: &[CellStatus]) -> Result<ClaimVerdict> {
        Cell::claim(cell_id, expected, &self.pool).await
    }

    async fn restore(&self, cell_id: Uuid, status: CellStatus) -> Result<()> {
        Cell::update_status(cell_id, status, &self.pool).await
    }

    async fn complete(
        &self,
        cell_id: Uuid,
        status: CellStatus,
        result_count: i32,
        saturation: &[QuerySaturation],
    ) -> Result<()> {
        Cell::complete_search(cell_id, status, result_count, saturation, &self.pool).await
    }

    async fn add_grid_leads(&self, grid_id: Uuid, count: i64) -> Result<()> {
        Grid::increment_lead_total(grid_id, count, &self.pool).await
    }
}

#[derive(Clone)]
pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn exists(&self, external_id: &str) -> Result<bool> {
        Ok(Lead::find_by_external_id(external_id, &self.pool)
            .await?
            .is_some())
    }

    async fn insert(&self, candidate: &DiscoveredCandidate) -> Result<()> {
        Lead::insert(candidate, &self.pool).await.map(|_| ())
    }
}
