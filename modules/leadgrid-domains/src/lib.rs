pub mod clusters;
pub mod grids;
pub mod leads;
