//! Virtual grid tiler: partitions a bounding box into rectangular search
//! cells on a stable global lattice.
//!
//! Stability is the whole point. Cell edges are derived from a lattice that
//! depends only on the cell size and a snapped latitude band, never on the
//! exact viewport, so two overlapping requests produce bit-identical cell
//! corners and keys in the overlap. Persisted cells can then be upserted by
//! key without gaps or partial-cell duplicates.

use leadgrid_common::{BoundingBox, LeadGridError};

/// Default ceiling on cells emitted per call. Oversized requests return
/// nothing and the caller must pick a coarser cell size.
pub const DEFAULT_MAX_CELLS: usize = 500;

/// Degrees of latitude per kilometer is treated as constant.
const KM_PER_DEGREE_LAT: f64 = 111.0;

/// Width of the latitude bands used to stabilize the longitude step.
const LAT_BAND_DEGREES: f64 = 5.0;

/// One emitted cell rectangle, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub key: String,
    pub bounds: BoundingBox,
}

/// Canonical cell key: the south-west corner at exactly 6 decimal places,
/// `"{lat}_{lng}"`. Cells with equal south-west corners always produce the
/// same key, which is the unique index for persisted cells within a grid.
pub fn cell_key(sw_lat: f64, sw_lng: f64) -> String {
    format!("{sw_lat:.6}_{sw_lng:.6}")
}

/// Tile `bounds` with cells of roughly `cell_size_km` per edge.
///
/// Emits row-major (south to north, west to east) until the far edges are
/// covered inclusive. Returns an empty vec when the cell count would exceed
/// `max_cells`; a count exactly equal to `max_cells` still succeeds.
pub fn tile(
    bounds: BoundingBox,
    cell_size_km: f64,
    max_cells: usize,
) -> Result<Vec<Tile>, LeadGridError> {
    if !bounds.is_valid() {
        return Err(LeadGridError::Geometry(format!(
            "bounds must run south-west to north-east, got ({}, {})..({}, {})",
            bounds.sw_lat, bounds.sw_lng, bounds.ne_lat, bounds.ne_lng
        )));
    }
    if !(cell_size_km > 0.0) {
        return Err(LeadGridError::Geometry(format!(
            "cell size must be positive, got {cell_size_km}"
        )));
    }

    let lat_step = cell_size_km / KM_PER_DEGREE_LAT;

    // Snap the midpoint latitude to the nearest 5-degree band before deriving
    // the longitude step. A small vertical pan then cannot shift column
    // boundaries, which would otherwise break cell-key stability.
    let mid_lat = (bounds.sw_lat + bounds.ne_lat) / 2.0;
    let band_lat = (mid_lat / LAT_BAND_DEGREES).round() * LAT_BAND_DEGREES;
    if band_lat.abs() >= 90.0 {
        return Err(LeadGridError::Geometry(format!(
            "bounds too close to a pole, snapped band {band_lat}"
        )));
    }
    let lng_step = cell_size_km / (KM_PER_DEGREE_LAT * band_lat.to_radians().cos());

    // Floor-snap the start corner onto the lattice so overlapping viewports
    // share cell edges exactly.
    let start_lat = (bounds.sw_lat / lat_step).floor() * lat_step;
    let start_lng = (bounds.sw_lng / lng_step).floor() * lng_step;

    let rows = steps_to_cover(start_lat, lat_step, bounds.ne_lat, max_cells);
    let cols = steps_to_cover(start_lng, lng_step, bounds.ne_lng, max_cells);
    if rows.saturating_mul(cols) > max_cells {
        return Ok(Vec::new());
    }

    // Corners come from integer step indices, not accumulated addition, so
    // adjacent cells share edges bit-for-bit.
    let mut tiles = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        let sw_lat = start_lat + row as f64 * lat_step;
        let ne_lat = start_lat + (row + 1) as f64 * lat_step;
        for col in 0..cols {
            let sw_lng = start_lng + col as f64 * lng_step;
            let ne_lng = start_lng + (col + 1) as f64 * lng_step;
            tiles.push(Tile {
                key: cell_key(sw_lat, sw_lng),
                bounds: BoundingBox::new(sw_lat, sw_lng, ne_lat, ne_lng),
            });
        }
    }
    Ok(tiles)
}

/// Smallest number of whole steps from `start` that reaches or passes `end`,
/// capped at `cap + 1` since anything past the cap is rejected anyway.
fn steps_to_cover(start: f64, step: f64, end: f64, cap: usize) -> usize {
    let mut n = 0usize;
    while start + n as f64 * step < end && n <= cap {
        n += 1;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gta_bounds() -> BoundingBox {
        // Roughly the west end of the Greater Toronto Area.
        BoundingBox::new(43.58, -79.7, 43.7, -79.5)
    }

    #[test]
    fn cell_key_formats_to_six_decimals() {
        assert_eq!(cell_key(43.0, -80.0), "43.000000_-80.000000");
        assert_eq!(cell_key(43.12345678, -80.98765432), "43.123457_-80.987654");
    }

    #[test]
    fn retiling_is_deterministic() {
        let a = tile(gta_bounds(), 2.0, DEFAULT_MAX_CELLS).unwrap();
        let b = tile(gta_bounds(), 2.0, DEFAULT_MAX_CELLS).unwrap();
        assert!(!a.is_empty());
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.key, y.key);
            assert_eq!(x.bounds, y.bounds);
        }
    }

    #[test]
    fn coverage_is_gapless() {
        let tiles = tile(gta_bounds(), 2.0, DEFAULT_MAX_CELLS).unwrap();
        let cols = tiles
            .iter()
            .filter(|t| t.bounds.sw_lat == tiles[0].bounds.sw_lat)
            .count();
        assert!(cols > 1, "test bounds should span multiple columns");

        for (i, t) in tiles.iter().enumerate() {
            // Neighbor to the east in the same row shares the edge exactly.
            if (i + 1) % cols != 0 {
                assert_eq!(t.bounds.ne_lng, tiles[i + 1].bounds.sw_lng);
                assert_eq!(t.bounds.sw_lat, tiles[i + 1].bounds.sw_lat);
            }
            // Neighbor in the row above shares the edge exactly.
            if i + cols < tiles.len() {
                assert_eq!(t.bounds.ne_lat, tiles[i + cols].bounds.sw_lat);
            }
        }

        // The union covers the requested bounds inclusive.
        let b = gta_bounds();
        assert!(tiles.first().unwrap().bounds.sw_lat <= b.sw_lat);
        assert!(tiles.first().unwrap().bounds.sw_lng <= b.sw_lng);
        assert!(tiles.last().unwrap().bounds.ne_lat >= b.ne_lat);
        assert!(tiles.last().unwrap().bounds.ne_lng >= b.ne_lng);
    }

    #[test]
    fn overlapping_viewports_share_cell_keys() {
        let a = tile(gta_bounds(), 2.0, DEFAULT_MAX_CELLS).unwrap();
        // Panned north-east by a fraction of a cell.
        let shifted = BoundingBox::new(43.59, -79.69, 43.71, -79.49);
        let b = tile(shifted, 2.0, DEFAULT_MAX_CELLS).unwrap();

        let keys_a: std::collections::HashSet<&str> =
            a.iter().map(|t| t.key.as_str()).collect();
        let shared = b.iter().filter(|t| keys_a.contains(t.key.as_str())).count();
        assert!(
            shared > 0,
            "overlapping viewports must produce identical keys in the overlap"
        );
    }

    #[test]
    fn max_cells_is_inclusive() {
        // A thin strip spanning many columns.
        let strip = BoundingBox::new(43.581, -79.7, 43.589, -79.5);
        let tiles = tile(strip, 2.0, DEFAULT_MAX_CELLS).unwrap();
        let n = tiles.len();
        assert!(n > 1);

        // Exactly at the ceiling: still succeeds.
        let at_cap = tile(strip, 2.0, n).unwrap();
        assert_eq!(at_cap.len(), n);

        // One under the ceiling: rejected as empty, not truncated.
        let over_cap = tile(strip, 2.0, n - 1).unwrap();
        assert!(over_cap.is_empty());
    }

    #[test]
    fn malformed_bounds_are_rejected() {
        let flipped = BoundingBox::new(43.7, -79.7, 43.58, -79.5);
        assert!(matches!(
            tile(flipped, 2.0, DEFAULT_MAX_CELLS),
            Err(LeadGridError::Geometry(_))
        ));

        let zero_size = tile(gta_bounds(), 0.0, DEFAULT_MAX_CELLS);
        assert!(matches!(zero_size, Err(LeadGridError::Geometry(_))));
    }

    #[test]
    fn polar_bounds_are_rejected() {
        let polar = BoundingBox::new(89.0, -10.0, 89.5, 10.0);
        assert!(matches!(
            tile(polar, 2.0, DEFAULT_MAX_CELLS),
            Err(LeadGridError::Geometry(_))
        ));
    }

    #[test]
    fn keys_sit_on_the_global_lattice() {
        let tiles = tile(gta_bounds(), 2.0, DEFAULT_MAX_CELLS).unwrap();
        let lat_step = 2.0 / 111.0;
        for t in &tiles {
            let ratio = t.bounds.sw_lat / lat_step;
            assert!(
                (ratio - ratio.round()).abs() < 1e-6,
                "south-west corner {} is off-lattice",
                t.bounds.sw_lat
            );
        }
    }
}
