//! Grid-sweep lead discovery engine.
//!
//! A sweep claims unsearched cells one at a time, fans the grid's queries
//! out to the places provider for each claimed cell, merges and ingests the
//! in-bounds results, then records coverage back on the cell. Saturated
//! cells are subdivided into quadrants for the next sweep, and clustering
//! turns the accumulated leads into territories.

pub mod config;
pub mod discovery;
pub mod ingest;
pub mod providers;
pub mod saturation;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use config::AppConfig;
pub use discovery::{CellSearchStats, DiscoveryEngine};
pub use ingest::{ingest_candidates, IngestOutcome};
pub use providers::GooglePlaces;
pub use saturation::cell_saturated;
pub use store::{PgCellStore, PgLeadStore};
pub use traits::{CellStore, LeadStore, PlaceResults, PlaceSearch};
