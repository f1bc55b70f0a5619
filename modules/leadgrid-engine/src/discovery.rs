//! The per-cell search orchestrator.
//!
//! One cell search is claim, fan out queries, merge, ingest, record. The
//! claim is the only mutual exclusion between workers: a lost claim leaves
//! the cell alone and returns zeroed stats. Any failure after a won claim
//! restores the status the claim observed, so the cell stays retryable,
//! then the original error propagates.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use tracing::{error, info};

use leadgrid_common::{
    CellStatus, ClaimVerdict, DiscoveredCandidate, LeadGridError, QuerySaturation,
};
use leadgrid_domains::grids::{Cell, Grid};

use crate::ingest::ingest_candidates;
use crate::saturation::cell_saturated;
use crate::traits::{CellStore, LeadStore, PlaceSearch};

/// Outcome of one cell search.
#[derive(Debug, Clone, Default)]
pub struct CellSearchStats {
    /// False when another worker held the cell; every other field is zero.
    pub claimed: bool,
    /// Raw provider results across all queries, before the bounds filter.
    pub results_total: u32,
    /// Unique in-bounds results across all queries after merging.
    pub results_in_bounds: u32,
    pub leads_inserted: u32,
    pub leads_skipped: u32,
    pub saturated: bool,
    /// Per-query detail in configured query order, as persisted on the cell.
    pub query_saturation: Vec<QuerySaturation>,
}

pub struct DiscoveryEngine {
    places: Arc<dyn PlaceSearch>,
    cells: Arc<dyn CellStore>,
    leads: Arc<dyn LeadStore>,
    density_threshold: u32,
    search_concurrency: usize,
}

impl DiscoveryEngine {
    pub fn new(
        places: Arc<dyn PlaceSearch>,
        cells: Arc<dyn CellStore>,
        leads: Arc<dyn LeadStore>,
        density_threshold: u32,
        search_concurrency: usize,
    ) -> Self {
        Self {
            places,
            cells,
            leads,
            density_threshold,
            search_concurrency: search_concurrency.max(1),
        }
    }

    /// Search one cell of a grid.
    ///
    /// Claims the cell from `unsearched` or `searched` (re-searching stale
    /// coverage is allowed), runs every configured query against the
    /// provider, ingests the merged in-bounds results and records the
    /// outcome on the cell.
    pub async fn search_cell(&self, grid: &Grid, cell: &Cell) -> Result<CellSearchStats> {
        if grid.search_queries.is_empty() {
            return Err(LeadGridError::Config(format!(
                "grid {} ({}) has no search queries configured",
                grid.id, grid.name
            ))
            .into());
        }

        let verdict = self
            .cells
            .claim(cell.id, &[CellStatus::Unsearched, CellStatus::Searched])
            .await?;

        let previous = match verdict {
            ClaimVerdict::Acquired { previous } => previous,
            ClaimVerdict::Lost => {
                info!(cell = %cell.cell_key, "Cell held by another worker, skipping");
                return Ok(CellSearchStats::default());
            }
        };

        match self.search_claimed_cell(grid, cell).await {
            Ok(stats) => Ok(stats),
            Err(e) => {
                if let Err(restore_err) = self.cells.restore(cell.id, previous).await {
                    error!(
                        cell = %cell.cell_key,
                        error = %restore_err,
                        "Failed to restore claimed cell"
                    );
                }
                Err(e)
            }
        }
    }

    async fn search_claimed_cell(&self, grid: &Grid, cell: &Cell) -> Result<CellSearchStats> {
        let bounds = cell.bounds();
        let center = bounds.center();
        let radius_km = bounds.circumscribed_radius_km();

        // Fan the queries out to the provider, then put the outcomes back in
        // configured order so merging stays deterministic no matter which
        // search finished first.
        let mut outcomes: Vec<_> =
            stream::iter(grid.search_queries.iter().enumerate().map(|(i, query)| {
                async move { (i, query, self.places.search(query, center, radius_km).await) }
            }))
            .buffer_unordered(self.search_concurrency)
            .collect()
            .await;
        outcomes.sort_by_key(|(i, _, _)| *i);

        let mut saturation: Vec<QuerySaturation> = Vec::with_capacity(outcomes.len());
        let mut merged: BTreeMap<String, DiscoveredCandidate> = BTreeMap::new();
        let mut results_total = 0u32;

        for (_, query, result) in outcomes {
            let results = result?;
            results_total += results.candidates.len() as u32;

            // In-bounds counts are per query, before cross-query dedup.
            // Results on a cell edge belong to no cell.
            let mut in_bounds_count = 0u32;
            for candidate in results.candidates {
                if !bounds.contains_strict(candidate.lat, candidate.lng) {
                    continue;
                }
                in_bounds_count += 1;
                merged
                    .entry(candidate.external_id.clone())
                    .or_insert(candidate);
            }

            saturation.push(QuerySaturation {
                query: query.clone(),
                in_bounds_count,
                hit_result_cap: results.hit_result_cap,
            });
        }

        let saturated = cell_saturated(&saturation, self.density_threshold);
        let status = if saturated {
            CellStatus::Saturated
        } else {
            CellStatus::Searched
        };

        let candidates: Vec<DiscoveredCandidate> = merged.into_values().collect();
        let outcome = ingest_candidates(&candidates, self.leads.as_ref()).await;

        self.cells
            .complete(cell.id, status, candidates.len() as i32, &saturation)
            .await?;

        if outcome.inserted > 0 {
            self.cells
                .add_grid_leads(grid.id, outcome.inserted as i64)
                .await?;
        }

        info!(
            cell = %cell.cell_key,
            status = %status,
            results_total,
            results_in_bounds = candidates.len(),
            inserted = outcome.inserted,
            skipped = outcome.skipped,
            "Cell search complete"
        );

        Ok(CellSearchStats {
            claimed: true,
            results_total,
            results_in_bounds: candidates.len() as u32,
            leads_inserted: outcome.inserted,
            leads_skipped: outcome.skipped,
            saturated,
            query_saturation: saturation,
        })
    }
}
