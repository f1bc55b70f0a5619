//! Density-based clustering over geocoded leads.
//!
//! Classic DBSCAN with the haversine distance as the neighbor predicate.
//! Everything iterates in input order, so for a fixed input order and fixed
//! parameters the membership and the identity of each cluster are stable
//! across runs.

use std::collections::VecDeque;

use leadgrid_common::{haversine_km, GeoPoint};

#[derive(Debug, Clone, Copy)]
pub struct DbscanParams {
    /// Neighbor predicate: two points are neighbors if their great-circle
    /// distance is at most this many km.
    pub epsilon_km: f64,
    /// Minimum neighborhood size (including the point itself) for a point to
    /// be a core point.
    pub min_points: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Label {
    Unvisited,
    Noise,
    Cluster(usize),
}

/// Cluster `points`, returning member indices per cluster in ascending
/// order. Noise points appear in no cluster, even when they sit near a
/// cluster's boundary. Border points join exactly one cluster: the first
/// that reaches them.
pub fn dbscan(points: &[GeoPoint], params: DbscanParams) -> Vec<Vec<usize>> {
    let mut labels = vec![Label::Unvisited; points.len()];
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    for i in 0..points.len() {
        if labels[i] != Label::Unvisited {
            continue;
        }

        let neighbors = region_query(points, i, params.epsilon_km);
        if neighbors.len() < params.min_points {
            labels[i] = Label::Noise;
            continue;
        }

        // i is a core point: seed a new cluster and expand transitively.
        let cluster_id = clusters.len();
        clusters.push(vec![i]);
        labels[i] = Label::Cluster(cluster_id);

        let mut queue: VecDeque<usize> = neighbors.into_iter().filter(|&j| j != i).collect();
        while let Some(j) = queue.pop_front() {
            match labels[j] {
                Label::Cluster(_) => continue,
                Label::Noise => {
                    // A noise label means j's own neighborhood was already
                    // checked and was sparse: j is a border point, claimed by
                    // the first cluster that reaches it, never expanded.
                    labels[j] = Label::Cluster(cluster_id);
                    clusters[cluster_id].push(j);
                }
                Label::Unvisited => {
                    labels[j] = Label::Cluster(cluster_id);
                    clusters[cluster_id].push(j);
                    let j_neighbors = region_query(points, j, params.epsilon_km);
                    if j_neighbors.len() >= params.min_points {
                        queue.extend(j_neighbors);
                    }
                }
            }
        }
    }

    for members in &mut clusters {
        members.sort_unstable();
    }
    clusters
}

/// Indices of every point within `epsilon_km` of point `i`, including `i`
/// itself, in input order.
fn region_query(points: &[GeoPoint], i: usize, epsilon_km: f64) -> Vec<usize> {
    let p = points[i];
    points
        .iter()
        .enumerate()
        .filter(|(_, q)| haversine_km(p.lat, p.lng, q.lat, q.lng) <= epsilon_km)
        .map(|(j, _)| j)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(epsilon_km: f64, min_points: usize) -> DbscanParams {
        DbscanParams {
            epsilon_km,
            min_points,
        }
    }

    /// Points strung north-south near Toronto; 0.001 degrees of latitude is
    /// about 111 m.
    fn strip(lats: &[f64]) -> Vec<GeoPoint> {
        lats.iter().map(|&lat| GeoPoint::new(lat, -79.4)).collect()
    }

    #[test]
    fn tight_cluster_with_distant_outlier() {
        // Three points within ~220m of each other, one ~11km away.
        let pts = strip(&[43.700, 43.701, 43.702, 43.800]);
        let clusters = dbscan(&pts, params(0.5, 3));

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0], vec![0, 1, 2]);
        assert!(!clusters.iter().any(|c| c.contains(&3)));
    }

    #[test]
    fn two_separate_dense_groups() {
        let pts = strip(&[43.700, 43.701, 43.702, 43.900, 43.901, 43.902]);
        let clusters = dbscan(&pts, params(0.5, 3));

        assert_eq!(clusters.len(), 2);
        // Cluster identity follows input order: the group seeded by the
        // lowest index is cluster 0.
        assert_eq!(clusters[0], vec![0, 1, 2]);
        assert_eq!(clusters[1], vec![3, 4, 5]);
    }

    #[test]
    fn border_point_joins_exactly_one_cluster() {
        // Two all-pairs-dense groups of 4 with one point wedged between
        // them, ~890m from the nearest edge of each. With min_points = 4 the
        // wedge point's neighborhood is {edge of A, itself, edge of B} = 3,
        // so it is a border point of whichever cluster reaches it first, not
        // a bridge that merges the groups.
        let pts = strip(&[
            43.0000, 43.0025, 43.0050, 43.0075, // group A
            43.0155, // border
            43.0235, 43.0260, 43.0285, 43.0310, // group B
        ]);
        let clusters = dbscan(&pts, params(1.0, 4));

        assert_eq!(clusters.len(), 2, "border point must not merge the groups");
        assert_eq!(clusters[0], vec![0, 1, 2, 3, 4]);
        assert_eq!(clusters[1], vec![5, 6, 7, 8]);

        let appearances = clusters.iter().filter(|c| c.contains(&4)).count();
        assert_eq!(appearances, 1);
    }

    #[test]
    fn all_sparse_points_are_noise() {
        let pts = strip(&[43.0, 43.2, 43.4, 43.6]);
        let clusters = dbscan(&pts, params(0.5, 2));
        assert!(clusters.is_empty());
    }

    #[test]
    fn empty_input_yields_no_clusters() {
        assert!(dbscan(&[], params(1.0, 3)).is_empty());
    }

    #[test]
    fn repeated_runs_are_identical() {
        let pts = strip(&[43.700, 43.701, 43.702, 43.705, 43.900, 43.901, 43.902]);
        let a = dbscan(&pts, params(0.5, 3));
        let b = dbscan(&pts, params(0.5, 3));
        assert_eq!(a, b);
    }

    #[test]
    fn min_points_counts_the_point_itself() {
        // Two points 110m apart: each neighborhood is {self, other} = 2.
        let pts = strip(&[43.700, 43.701]);
        assert_eq!(dbscan(&pts, params(0.5, 2)).len(), 1);
        assert!(dbscan(&pts, params(0.5, 3)).is_empty());
    }
}
