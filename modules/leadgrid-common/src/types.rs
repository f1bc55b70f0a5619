use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geo::haversine_km;

// --- Geo Types ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A rectangular lat/lng region. Valid when the south-west corner is strictly
/// south and west of the north-east corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub sw_lat: f64,
    pub sw_lng: f64,
    pub ne_lat: f64,
    pub ne_lng: f64,
}

impl BoundingBox {
    pub fn new(sw_lat: f64, sw_lng: f64, ne_lat: f64, ne_lng: f64) -> Self {
        Self {
            sw_lat,
            sw_lng,
            ne_lat,
            ne_lng,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.sw_lat < self.ne_lat && self.sw_lng < self.ne_lng
    }

    /// Strict containment: points on an edge belong to no cell, so bordering
    /// cells never double-count a place sitting exactly on a shared edge.
    pub fn contains_strict(&self, lat: f64, lng: f64) -> bool {
        lat > self.sw_lat && lat < self.ne_lat && lng > self.sw_lng && lng < self.ne_lng
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.sw_lat + self.ne_lat) / 2.0,
            (self.sw_lng + self.ne_lng) / 2.0,
        )
    }

    /// Distance from the center to the north-east corner, in km. Used as the
    /// location-bias radius so a biased search covers the whole rectangle.
    /// On the sphere the opposite corner sits meters closer or farther, which
    /// is noise at the scale of a soft bias circle.
    pub fn circumscribed_radius_km(&self) -> f64 {
        let c = self.center();
        haversine_km(c.lat, c.lng, self.ne_lat, self.ne_lng)
    }
}

// --- Cell lifecycle ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    Unsearched,
    Searching,
    Searched,
    Saturated,
}

impl CellStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellStatus::Unsearched => "unsearched",
            CellStatus::Searching => "searching",
            CellStatus::Searched => "searched",
            CellStatus::Saturated => "saturated",
        }
    }
}

impl fmt::Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CellStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unsearched" => Ok(CellStatus::Unsearched),
            "searching" => Ok(CellStatus::Searching),
            "searched" => Ok(CellStatus::Searched),
            "saturated" => Ok(CellStatus::Saturated),
            other => Err(format!("unknown cell status: {other}")),
        }
    }
}

/// Outcome of an atomic cell claim. `Acquired` carries the status the cell
/// held immediately before the claim; rollback restores exactly that status,
/// never an unconditional `unsearched`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimVerdict {
    Acquired { previous: CellStatus },
    Lost,
}

impl ClaimVerdict {
    pub fn acquired(&self) -> bool {
        matches!(self, ClaimVerdict::Acquired { .. })
    }
}

/// Per-query saturation evidence from one cell search, persisted alongside
/// the cell for later subdivision decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySaturation {
    pub query: String,
    pub in_bounds_count: u32,
    pub hit_result_cap: bool,
}

// --- Leads ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Converted,
    Rejected,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Converted => "converted",
            LeadStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A business surfaced by a place search, not yet persisted. Converted 1:1
/// into a lead row by the ingestor after dedup by `external_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredCandidate {
    pub external_id: String,
    pub name: String,
    pub business_type: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub source: String,
    pub status: LeadStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toronto_box() -> BoundingBox {
        BoundingBox::new(43.6, -79.5, 43.7, -79.3)
    }

    #[test]
    fn bounding_box_validity() {
        assert!(toronto_box().is_valid());
        assert!(!BoundingBox::new(43.7, -79.5, 43.6, -79.3).is_valid());
        assert!(!BoundingBox::new(43.6, -79.3, 43.7, -79.5).is_valid());
    }

    #[test]
    fn containment_is_strict() {
        let b = toronto_box();
        assert!(b.contains_strict(43.65, -79.4));
        // Points exactly on an edge are outside.
        assert!(!b.contains_strict(43.6, -79.4));
        assert!(!b.contains_strict(43.65, -79.3));
        assert!(!b.contains_strict(44.0, -79.4));
    }

    #[test]
    fn center_is_corner_midpoint() {
        let c = toronto_box().center();
        assert!((c.lat - 43.65).abs() < 1e-12);
        assert!((c.lng - (-79.4)).abs() < 1e-12);
    }

    #[test]
    fn circumscribed_radius_reaches_corners() {
        let b = toronto_box();
        let c = b.center();
        let r = b.circumscribed_radius_km();
        let to_ne = haversine_km(c.lat, c.lng, b.ne_lat, b.ne_lng);
        let to_sw = haversine_km(c.lat, c.lng, b.sw_lat, b.sw_lng);
        assert_eq!(r, to_ne);
        // Opposite corners differ by meters at city scale.
        assert!(
            (r - to_sw).abs() < 0.05,
            "sw corner should be within meters of the radius, got {r} vs {to_sw}"
        );
    }

    #[test]
    fn cell_status_round_trips() {
        for status in [
            CellStatus::Unsearched,
            CellStatus::Searching,
            CellStatus::Searched,
            CellStatus::Saturated,
        ] {
            assert_eq!(status.as_str().parse::<CellStatus>().unwrap(), status);
        }
        assert!("archived".parse::<CellStatus>().is_err());
    }

    #[test]
    fn claim_verdict_accessors() {
        let acquired = ClaimVerdict::Acquired {
            previous: CellStatus::Searched,
        };
        assert!(acquired.acquired());
        assert!(!ClaimVerdict::Lost.acquired());
    }
}
