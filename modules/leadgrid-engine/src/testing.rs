// Test doubles for the discovery engine.
//
// Three mocks matching the three trait boundaries:
// - MockPlaceSearch (PlaceSearch) — HashMap-based query→results
// - MockCellStore (CellStore) — in-memory cell state machine
// - MockLeadStore (LeadStore) — in-memory lead set keyed by external id
//
// Plus helpers for building grids, cells and candidates without a database.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use leadgrid_common::{
    CellStatus, ClaimVerdict, DiscoveredCandidate, GeoPoint, LeadStatus, QuerySaturation,
};
use leadgrid_domains::grids::{cell_key, Cell, Grid};
use places_client::PlacesError;

use crate::traits::{CellStore, LeadStore, PlaceResults, PlaceSearch};

// ---------------------------------------------------------------------------
// MockPlaceSearch
// ---------------------------------------------------------------------------

/// HashMap-based place search. Returns `Err` for unregistered queries.
/// Builder pattern: `.on_query()`, `.rate_limited()`.
#[derive(Default)]
pub struct MockPlaceSearch {
    results: HashMap<String, PlaceResults>,
    rate_limited: HashSet<String>,
}

impl MockPlaceSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_query(
        mut self,
        query: &str,
        candidates: Vec<DiscoveredCandidate>,
        hit_result_cap: bool,
    ) -> Self {
        self.results.insert(
            query.to_string(),
            PlaceResults {
                candidates,
                hit_result_cap,
            },
        );
        self
    }

    /// Make this query fail with a provider rate-limit error.
    pub fn rate_limited(mut self, query: &str) -> Self {
        self.rate_limited.insert(query.to_string());
        self
    }
}

#[async_trait]
impl PlaceSearch for MockPlaceSearch {
    async fn search(&self, query: &str, _center: GeoPoint, _radius_km: f64) -> Result<PlaceResults> {
        if self.rate_limited.contains(query) {
            return Err(PlacesError::RateLimited {
                status: 429,
                message: format!("MockPlaceSearch: {query} is rate limited"),
            }
            .into());
        }
        self.results
            .get(query)
            .cloned()
            .ok_or_else(|| anyhow!("MockPlaceSearch: no results registered for {query}"))
    }
}

// ---------------------------------------------------------------------------
// MockCellStore
// ---------------------------------------------------------------------------

/// What the store has recorded for one cell.
#[derive(Debug, Clone)]
pub struct CellRecord {
    pub status: CellStatus,
    pub result_count: i32,
    pub saturation: Vec<QuerySaturation>,
    pub completed: bool,
}

/// In-memory cell store with the same conditional-claim semantics as the
/// Postgres one.
#[derive(Default)]
pub struct MockCellStore {
    cells: Mutex<HashMap<Uuid, CellRecord>>,
    grid_totals: Mutex<HashMap<Uuid, i64>>,
    fail_completes: bool,
}

impl MockCellStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cell(self, cell_id: Uuid, status: CellStatus) -> Self {
        self.cells.lock().unwrap().insert(
            cell_id,
            CellRecord {
                status,
                result_count: 0,
                saturation: Vec::new(),
                completed: false,
            },
        );
        self
    }

    /// Make every `complete` call fail.
    pub fn failing_completes(mut self) -> Self {
        self.fail_completes = true;
        self
    }

    pub fn record(&self, cell_id: Uuid) -> CellRecord {
        self.cells
            .lock()
            .unwrap()
            .get(&cell_id)
            .cloned()
            .expect("cell not seeded in MockCellStore")
    }

    pub fn grid_total(&self, grid_id: Uuid) -> i64 {
        self.grid_totals
            .lock()
            .unwrap()
            .get(&grid_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl CellStore for MockCellStore {
    async fn claim(&self, cell_id: Uuid, expected: &[CellStatus]) -> Result<ClaimVerdict> {
        let mut cells = self.cells.lock().unwrap();
        let record = cells
            .get_mut(&cell_id)
            .ok_or_else(|| anyhow!("MockCellStore: unknown cell {cell_id}"))?;

        if expected.contains(&record.status) {
            let previous = record.status;
            record.status = CellStatus::Searching;
            Ok(ClaimVerdict::Acquired { previous })
        } else {
            Ok(ClaimVerdict::Lost)
        }
    }

    async fn restore(&self, cell_id: Uuid, status: CellStatus) -> Result<()> {
        let mut cells = self.cells.lock().unwrap();
        let record = cells
            .get_mut(&cell_id)
            .ok_or_else(|| anyhow!("MockCellStore: unknown cell {cell_id}"))?;
        record.status = status;
        Ok(())
    }

    async fn complete(
        &self,
        cell_id: Uuid,
        status: CellStatus,
        result_count: i32,
        saturation: &[QuerySaturation],
    ) -> Result<()> {
        if self.fail_completes {
            bail!("MockCellStore: completes are failing");
        }
        let mut cells = self.cells.lock().unwrap();
        let record = cells
            .get_mut(&cell_id)
            .ok_or_else(|| anyhow!("MockCellStore: unknown cell {cell_id}"))?;
        record.status = status;
        record.result_count = result_count;
        record.saturation = saturation.to_vec();
        record.completed = true;
        Ok(())
    }

    async fn add_grid_leads(&self, grid_id: Uuid, count: i64) -> Result<()> {
        *self.grid_totals.lock().unwrap().entry(grid_id).or_insert(0) += count;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockLeadStore
// ---------------------------------------------------------------------------

/// In-memory lead set keyed by external id.
#[derive(Default)]
pub struct MockLeadStore {
    leads: Mutex<HashMap<String, DiscoveredCandidate>>,
    failing_ids: HashSet<String>,
}

impl MockLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a lead as already stored.
    pub fn with_existing(self, candidate: DiscoveredCandidate) -> Self {
        self.leads
            .lock()
            .unwrap()
            .insert(candidate.external_id.clone(), candidate);
        self
    }

    /// Make inserts of this external id fail.
    pub fn failing_insert(mut self, external_id: &str) -> Self {
        self.failing_ids.insert(external_id.to_string());
        self
    }

    pub fn contains(&self, external_id: &str) -> bool {
        self.leads.lock().unwrap().contains_key(external_id)
    }

    pub fn stored(&self, external_id: &str) -> Option<DiscoveredCandidate> {
        self.leads.lock().unwrap().get(external_id).cloned()
    }

    pub fn count(&self) -> usize {
        self.leads.lock().unwrap().len()
    }
}

#[async_trait]
impl LeadStore for MockLeadStore {
    async fn exists(&self, external_id: &str) -> Result<bool> {
        Ok(self.leads.lock().unwrap().contains_key(external_id))
    }

    async fn insert(&self, candidate: &DiscoveredCandidate) -> Result<()> {
        if self.failing_ids.contains(&candidate.external_id) {
            bail!(
                "MockLeadStore: insert of {} is failing",
                candidate.external_id
            );
        }
        self.leads
            .lock()
            .unwrap()
            .insert(candidate.external_id.clone(), candidate.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A grid over Wellington County, ON with the given queries.
pub fn test_grid(queries: &[&str]) -> Grid {
    Grid {
        id: Uuid::new_v4(),
        name: "Wellington County".to_string(),
        region: "Wellington".to_string(),
        province: "ON".to_string(),
        search_queries: queries.iter().map(|q| q.to_string()).collect(),
        cell_size_km: 2.0,
        lead_total: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// A 0.02° square cell of `grid_id` with its south-west corner at
/// (43.0, -80.3). Interior points around (43.01, -80.29) are in bounds.
pub fn test_cell(grid_id: Uuid) -> Cell {
    let (sw_lat, sw_lng) = (43.0, -80.3);
    Cell {
        id: Uuid::new_v4(),
        grid_id,
        cell_key: cell_key(sw_lat, sw_lng),
        sw_lat,
        sw_lng,
        ne_lat: sw_lat + 0.02,
        ne_lng: sw_lng + 0.02,
        depth: 0,
        parent_cell_id: None,
        is_leaf: true,
        status: CellStatus::Unsearched.to_string(),
        result_count: 0,
        query_saturation: serde_json::json!([]),
        last_searched_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// A candidate at the given coordinates.
pub fn candidate(external_id: &str, lat: f64, lng: f64) -> DiscoveredCandidate {
    DiscoveredCandidate {
        external_id: external_id.to_string(),
        name: format!("{external_id} Plumbing"),
        business_type: Some("plumber".to_string()),
        address: Some("12 Main St".to_string()),
        city: Some("Guelph".to_string()),
        province: Some("ON".to_string()),
        lat,
        lng,
        source: "google_places".to_string(),
        status: LeadStatus::New,
    }
}
