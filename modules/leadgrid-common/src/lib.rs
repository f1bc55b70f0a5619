pub mod error;
pub mod geo;
pub mod types;

pub use error::LeadGridError;
pub use geo::*;
pub use types::*;
