// Trait abstractions for the discovery engine's dependencies.
//
// PlaceSearch — one provider text search, biased to a circle.
// CellStore — the cell state machine plus grid lead totals.
// LeadStore — existence checks and inserts for lead ingestion.
//
// These enable deterministic testing with MockPlaceSearch, MockCellStore
// and MockLeadStore: no network, no database.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use leadgrid_common::{CellStatus, ClaimVerdict, DiscoveredCandidate, GeoPoint, QuerySaturation};

/// One provider response for a single query.
#[derive(Debug, Clone, Default)]
pub struct PlaceResults {
    pub candidates: Vec<DiscoveredCandidate>,
    /// The provider returned as many results as it was asked for, so more
    /// may exist past the cap.
    pub hit_result_cap: bool,
}

#[async_trait]
pub trait PlaceSearch: Send + Sync {
    /// Run one text search biased to a circle around `center`.
    async fn search(&self, query: &str, center: GeoPoint, radius_km: f64) -> Result<PlaceResults>;
}

#[async_trait]
pub trait CellStore: Send + Sync {
    /// Atomically move a cell to `searching` when its current status is one
    /// of `expected`. Returns the status the claim observed, or `Lost` when
    /// another worker got there first.
    async fn claim(&self, cell_id: Uuid, expected: &[CellStatus]) -> Result<ClaimVerdict>;

    /// Put a cell back to the status its claim observed.
    async fn restore(&self, cell_id: Uuid, status: CellStatus) -> Result<()>;

    /// Record a finished search: final status, merged in-bounds result count
    /// and per-query saturation detail.
    async fn complete(
        &self,
        cell_id: Uuid,
        status: CellStatus,
        result_count: i32,
        saturation: &[QuerySaturation],
    ) -> Result<()>;

    /// Add newly inserted leads to a grid's running total.
    async fn add_grid_leads(&self, grid_id: Uuid, count: i64) -> Result<()>;
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Whether a lead with this provider id is already stored.
    async fn exists(&self, external_id: &str) -> Result<bool>;

    /// Insert one discovered candidate.
    async fn insert(&self, candidate: &DiscoveredCandidate) -> Result<()>;
}
