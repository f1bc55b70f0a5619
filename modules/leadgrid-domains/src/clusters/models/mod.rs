pub mod territory;

pub use territory::{NewTerritory, Territory};
