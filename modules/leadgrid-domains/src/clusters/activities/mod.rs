pub mod cluster_leads;

pub use cluster_leads::{cluster_leads, ClusterRunStats};
