pub mod activities;
pub mod dbscan;
pub mod models;
pub mod sink;

pub use activities::{cluster_leads, ClusterRunStats};
pub use dbscan::{dbscan, DbscanParams};
pub use models::{NewTerritory, Territory};
pub use sink::{ClusterSink, PgClusterSink};
