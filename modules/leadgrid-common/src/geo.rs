//! Pure geodesic and planar geometry helpers. No state, no I/O.

use crate::types::GeoPoint;

/// Floor for cluster bounding radii, in km. Prevents degenerate near-zero
/// radii when every member sits at the same coordinates.
pub const MIN_CLUSTER_RADIUS_KM: f64 = 1.0;

/// Haversine great-circle distance between two lat/lng points in kilometers.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Arithmetic mean of member coordinates. `None` for an empty slice.
pub fn centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let lat = points.iter().map(|p| p.lat).sum::<f64>() / n;
    let lng = points.iter().map(|p| p.lng).sum::<f64>() / n;
    Some(GeoPoint::new(lat, lng))
}

/// Maximum haversine distance from `center` to any member, floored at
/// [`MIN_CLUSTER_RADIUS_KM`].
pub fn bounding_radius_km(center: GeoPoint, points: &[GeoPoint]) -> f64 {
    points
        .iter()
        .map(|p| haversine_km(center.lat, center.lng, p.lat, p.lng))
        .fold(0.0_f64, f64::max)
        .max(MIN_CLUSTER_RADIUS_KM)
}

/// Cross product z-component of (o→a) × (o→b) with lng as x and lat as y.
/// Positive means a counterclockwise turn.
fn cross(o: &GeoPoint, a: &GeoPoint, b: &GeoPoint) -> f64 {
    (a.lng - o.lng) * (b.lat - o.lat) - (a.lat - o.lat) * (b.lng - o.lng)
}

/// Convex hull via the monotone chain algorithm, O(n log n).
///
/// Returns vertices in counterclockwise order starting from the westernmost
/// point. Strictly interior and collinear points are dropped. Fewer than 3
/// distinct points: returns the distinct points as-is (no polygon to reduce).
pub fn convex_hull(points: &[GeoPoint]) -> Vec<GeoPoint> {
    let mut pts: Vec<GeoPoint> = points.to_vec();
    pts.sort_by(|a, b| a.lng.total_cmp(&b.lng).then(a.lat.total_cmp(&b.lat)));
    pts.dedup_by(|a, b| a.lat == b.lat && a.lng == b.lng);

    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<GeoPoint> = Vec::with_capacity(pts.len());
    for p in &pts {
        while lower.len() >= 2
            && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0
        {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<GeoPoint> = Vec::with_capacity(pts.len());
    for p in pts.iter().rev() {
        while upper.len() >= 2
            && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0
        {
            upper.pop();
        }
        upper.push(*p);
    }

    // Last point of each chain is the first of the other.
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_toronto_to_hamilton() {
        // Toronto to Hamilton is ~59km
        let dist = haversine_km(43.6532, -79.3832, 43.2557, -79.8711);
        assert!(
            (dist - 59.0).abs() < 3.0,
            "Toronto to Hamilton should be ~59km, got {dist}"
        );
    }

    #[test]
    fn haversine_toronto_to_ottawa() {
        // Toronto to Ottawa is ~352km
        let dist = haversine_km(43.6532, -79.3832, 45.4215, -75.6972);
        assert!(
            (dist - 352.0).abs() < 10.0,
            "Toronto to Ottawa should be ~352km, got {dist}"
        );
    }

    #[test]
    fn haversine_same_point_is_zero() {
        let dist = haversine_km(43.6532, -79.3832, 43.6532, -79.3832);
        assert!(dist.abs() < 1e-9);
    }

    #[test]
    fn centroid_is_arithmetic_mean() {
        let pts = vec![
            GeoPoint::new(43.0, -80.0),
            GeoPoint::new(44.0, -81.0),
            GeoPoint::new(43.5, -80.5),
        ];
        let c = centroid(&pts).unwrap();
        assert!((c.lat - 43.5).abs() < 1e-12);
        assert!((c.lng - (-80.5)).abs() < 1e-12);
    }

    #[test]
    fn centroid_of_empty_is_none() {
        assert!(centroid(&[]).is_none());
    }

    #[test]
    fn radius_of_coincident_points_is_the_floor() {
        let p = GeoPoint::new(43.5, -80.5);
        let pts = vec![p, p, p];
        let r = bounding_radius_km(p, &pts);
        assert_eq!(r, MIN_CLUSTER_RADIUS_KM);
    }

    #[test]
    fn radius_uses_farthest_member() {
        let center = GeoPoint::new(43.6532, -79.3832);
        let pts = vec![
            GeoPoint::new(43.66, -79.38),
            GeoPoint::new(43.2557, -79.8711), // Hamilton, ~59km out
        ];
        let r = bounding_radius_km(center, &pts);
        assert!((r - 59.0).abs() < 3.0, "expected ~59km, got {r}");
    }

    #[test]
    fn hull_of_square_excludes_interior_point() {
        let pts = vec![
            GeoPoint::new(43.0, -80.0),
            GeoPoint::new(43.0, -79.0),
            GeoPoint::new(44.0, -80.0),
            GeoPoint::new(44.0, -79.0),
            GeoPoint::new(43.5, -79.5), // interior
        ];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        assert!(!hull.iter().any(|p| p.lat == 43.5 && p.lng == -79.5));
    }

    #[test]
    fn hull_of_fewer_than_three_points_is_all_points() {
        let pts = vec![GeoPoint::new(43.0, -80.0), GeoPoint::new(44.0, -79.0)];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 2);

        let single = vec![GeoPoint::new(43.0, -80.0)];
        assert_eq!(convex_hull(&single).len(), 1);
    }

    #[test]
    fn hull_of_coincident_points_collapses_to_one() {
        let p = GeoPoint::new(43.0, -80.0);
        let hull = convex_hull(&[p, p, p, p]);
        assert_eq!(hull.len(), 1);
    }

    #[test]
    fn hull_drops_collinear_midpoints() {
        let pts = vec![
            GeoPoint::new(43.0, -80.0),
            GeoPoint::new(43.5, -79.5),
            GeoPoint::new(44.0, -79.0),
        ];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 2);
    }

    #[test]
    fn hull_is_counterclockwise() {
        let pts = vec![
            GeoPoint::new(43.0, -80.0),
            GeoPoint::new(43.0, -79.0),
            GeoPoint::new(44.0, -80.0),
            GeoPoint::new(44.0, -79.0),
        ];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        // Signed area of the polygon must be positive for CCW ordering.
        let mut area = 0.0;
        for i in 0..hull.len() {
            let a = &hull[i];
            let b = &hull[(i + 1) % hull.len()];
            area += a.lng * b.lat - b.lng * a.lat;
        }
        assert!(area > 0.0, "hull should wind counterclockwise");
    }
}
