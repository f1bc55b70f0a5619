use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use leadgrid_common::{DiscoveredCandidate, GeoPoint, LeadStatus};

/// A persisted business lead. `external_id` is the provider's place id and
/// carries a unique constraint; it is the dedup key for all ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lead {
    pub id: Uuid,
    pub external_id: String,
    pub name: String,
    pub business_type: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub source: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Coordinates as a point, when the lead is geocoded.
    pub fn point(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        }
    }

    pub async fn insert(candidate: &DiscoveredCandidate, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO leads
                (external_id, name, business_type, address, city, province,
                 latitude, longitude, source, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(&candidate.external_id)
        .bind(&candidate.name)
        .bind(&candidate.business_type)
        .bind(&candidate.address)
        .bind(&candidate.city)
        .bind(&candidate.province)
        .bind(candidate.lat)
        .bind(candidate.lng)
        .bind(&candidate.source)
        .bind(candidate.status.as_str())
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_external_id(external_id: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM leads WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Leads with coordinates, in insertion order. Clustering input: the
    /// order is part of the determinism contract, so it is fixed here.
    pub async fn collect_geocoded(pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM leads
            WHERE latitude IS NOT NULL AND longitude IS NOT NULL
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn update_status(id: Uuid, status: LeadStatus, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE leads SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(pool)
            .await?;
        Ok(())
    }
}
