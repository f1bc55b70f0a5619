//! Saturation policy for searched cells.

use leadgrid_common::QuerySaturation;

/// A cell is saturated when every configured query came back capped and
/// every query kept at least `density_threshold` results inside the cell.
/// A capped query whose results mostly fell outside the cell indicates the
/// search circle reached past the cell, not that the cell itself is dense.
pub fn cell_saturated(details: &[QuerySaturation], density_threshold: u32) -> bool {
    !details.is_empty()
        && details
            .iter()
            .all(|d| d.hit_result_cap && d.in_bounds_count >= density_threshold)
}
