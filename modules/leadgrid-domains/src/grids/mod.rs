pub mod models;
pub mod tiler;

pub use models::{Cell, CoverageCount, Grid};
pub use tiler::{cell_key, tile, Tile, DEFAULT_MAX_CELLS};
