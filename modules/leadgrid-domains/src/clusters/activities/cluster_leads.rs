use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::BTreeMap;

use leadgrid_common::{bounding_radius_km, centroid, convex_hull, GeoPoint};

use crate::clusters::{dbscan, ClusterSink, DbscanParams, NewTerritory, Territory};
use crate::leads::Lead;

/// Stats returned by one clustering run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterRunStats {
    pub leads_seen: u32,
    pub clusters_found: u32,
    pub leads_clustered: u32,
    pub noise_points: u32,
    pub territories_replaced: u64,
}

/// Rebuild auto-generated territories from the current set of geocoded leads.
///
/// Runs DBSCAN over every lead with coordinates, turns each cluster into a
/// territory (centroid, bounding radius, convex hull, dominant-city name) and
/// writes it through the sink. Previously auto-generated territories are
/// removed first so repeated runs converge on the current lead set instead of
/// accumulating stale shapes. Hand-drawn territories are never touched.
pub async fn cluster_leads(
    params: DbscanParams,
    sink: &dyn ClusterSink,
    pool: &PgPool,
) -> Result<ClusterRunStats> {
    let all = Lead::collect_geocoded(pool).await?;

    let mut leads = Vec::with_capacity(all.len());
    let mut points = Vec::with_capacity(all.len());
    for lead in all {
        if let Some(point) = lead.point() {
            leads.push(lead);
            points.push(point);
        }
    }

    let replaced = Territory::delete_auto_generated(pool).await?;

    let mut stats = ClusterRunStats {
        leads_seen: leads.len() as u32,
        clusters_found: 0,
        leads_clustered: 0,
        noise_points: 0,
        territories_replaced: replaced,
    };

    if leads.is_empty() {
        tracing::info!("No geocoded leads to cluster");
        return Ok(stats);
    }

    let clusters = dbscan(&points, params);

    for (ordinal, members) in clusters.iter().enumerate() {
        let Some(territory) = build_territory(&leads, &points, members, ordinal) else {
            continue;
        };

        let persisted = sink.persist(territory).await?;
        stats.clusters_found += 1;
        stats.leads_clustered += members.len() as u32;

        tracing::debug!(
            territory = %persisted.name,
            leads = members.len(),
            radius_km = persisted.radius_km,
            "Territory created"
        );
    }

    stats.noise_points = stats.leads_seen - stats.leads_clustered;

    tracing::info!(
        leads_seen = stats.leads_seen,
        clusters_found = stats.clusters_found,
        leads_clustered = stats.leads_clustered,
        noise_points = stats.noise_points,
        territories_replaced = stats.territories_replaced,
        "Clustering run complete"
    );

    Ok(stats)
}

/// Turn one DBSCAN cluster into a territory. Returns None for an empty
/// member list, which DBSCAN never emits but the type allows.
fn build_territory(
    leads: &[Lead],
    points: &[GeoPoint],
    members: &[usize],
    ordinal: usize,
) -> Option<NewTerritory> {
    let member_points: Vec<GeoPoint> = members.iter().map(|&i| points[i]).collect();

    let center = centroid(&member_points)?;
    let radius_km = bounding_radius_km(center, &member_points);
    let boundary = convex_hull(&member_points);

    Some(NewTerritory {
        name: territory_name(leads, members, ordinal),
        boundary,
        centroid: center,
        radius_km,
        lead_count: members.len() as i32,
        is_auto_generated: true,
    })
}

/// Name a cluster after the city most of its members sit in. Ties go to the
/// alphabetically first city. Clusters with no city data fall back to a
/// numbered name.
fn territory_name(leads: &[Lead], members: &[usize], ordinal: usize) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for &i in members {
        if let Some(city) = leads[i].city.as_deref() {
            if !city.is_empty() {
                *counts.entry(city).or_insert(0) += 1;
            }
        }
    }

    let mut dominant: Option<(&str, usize)> = None;
    for (city, count) in counts {
        match dominant {
            Some((_, best)) if count <= best => {}
            _ => dominant = Some((city, count)),
        }
    }

    match dominant {
        Some((city, _)) => format!("{city} Territory"),
        None => format!("Territory {}", ordinal + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn lead_at(lat: f64, lng: f64, city: Option<&str>) -> Lead {
        Lead {
            id: Uuid::new_v4(),
            external_id: Uuid::new_v4().to_string(),
            name: "Test Business".to_string(),
            business_type: None,
            address: None,
            city: city.map(|c| c.to_string()),
            province: None,
            latitude: Some(lat),
            longitude: Some(lng),
            source: "google_places".to_string(),
            status: "new".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn split(leads: &[Lead]) -> Vec<GeoPoint> {
        leads.iter().map(|l| l.point().unwrap()).collect()
    }

    #[test]
    fn territory_named_after_dominant_city() {
        let leads = vec![
            lead_at(43.0, -80.0, Some("Guelph")),
            lead_at(43.001, -80.0, Some("Guelph")),
            lead_at(43.002, -80.0, Some("Cambridge")),
        ];
        let name = territory_name(&leads, &[0, 1, 2], 0);
        assert_eq!(name, "Guelph Territory");
    }

    #[test]
    fn city_tie_breaks_alphabetically() {
        let leads = vec![
            lead_at(43.0, -80.0, Some("Waterloo")),
            lead_at(43.001, -80.0, Some("Kitchener")),
        ];
        let name = territory_name(&leads, &[0, 1], 3);
        assert_eq!(name, "Kitchener Territory");
    }

    #[test]
    fn missing_cities_fall_back_to_numbered_name() {
        let leads = vec![
            lead_at(43.0, -80.0, None),
            lead_at(43.001, -80.0, Some("")),
        ];
        let name = territory_name(&leads, &[0, 1], 0);
        assert_eq!(name, "Territory 1");
    }

    #[test]
    fn build_territory_computes_geometry() {
        // Unit square of leads plus one interior point.
        let leads = vec![
            lead_at(43.0, -80.0, Some("Brantford")),
            lead_at(43.0, -79.9, Some("Brantford")),
            lead_at(43.1, -80.0, Some("Brantford")),
            lead_at(43.1, -79.9, Some("Brantford")),
            lead_at(43.05, -79.95, Some("Brantford")),
        ];
        let points = split(&leads);

        let territory = build_territory(&leads, &points, &[0, 1, 2, 3, 4], 0).unwrap();

        assert_eq!(territory.name, "Brantford Territory");
        assert_eq!(territory.lead_count, 5);
        assert!(territory.is_auto_generated);
        assert_eq!(territory.boundary.len(), 4);
        assert!((territory.centroid.lat - 43.05).abs() < 1e-9);
        assert!((territory.centroid.lng - -79.95).abs() < 1e-9);
        assert!(territory.radius_km >= 1.0);
    }

    #[test]
    fn coincident_cluster_gets_floor_radius() {
        let leads = vec![
            lead_at(43.5, -80.5, Some("Guelph")),
            lead_at(43.5, -80.5, Some("Guelph")),
            lead_at(43.5, -80.5, Some("Guelph")),
        ];
        let points = split(&leads);

        let territory = build_territory(&leads, &points, &[0, 1, 2], 0).unwrap();

        assert_eq!(territory.radius_km, 1.0);
        assert!((territory.centroid.lat - 43.5).abs() < 1e-9);
        assert!((territory.centroid.lng - -80.5).abs() < 1e-9);
    }

    #[test]
    fn empty_member_list_yields_nothing() {
        let leads: Vec<Lead> = Vec::new();
        let points: Vec<GeoPoint> = Vec::new();
        assert!(build_territory(&leads, &points, &[], 0).is_none());
    }
}
