pub mod cell;
pub mod grid;

pub use cell::{Cell, CoverageCount};
pub use grid::Grid;
