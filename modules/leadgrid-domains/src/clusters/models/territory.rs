use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use leadgrid_common::GeoPoint;

/// A named convex region grouping leads. Immutable once created except for
/// `lead_count`, which membership changes elsewhere may maintain.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Territory {
    pub id: Uuid,
    pub name: String,
    /// Ordered convex hull vertices as JSONB: [{"lat": .., "lng": ..}, ...].
    pub boundary: serde_json::Value,
    pub centroid_lat: f64,
    pub centroid_lng: f64,
    pub radius_km: f64,
    pub lead_count: i32,
    pub is_auto_generated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A computed territory awaiting persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTerritory {
    pub name: String,
    pub boundary: Vec<GeoPoint>,
    pub centroid: GeoPoint,
    pub radius_km: f64,
    pub lead_count: i32,
    pub is_auto_generated: bool,
}

impl Territory {
    pub fn boundary_points(&self) -> Vec<GeoPoint> {
        serde_json::from_value(self.boundary.clone()).unwrap_or_default()
    }

    pub async fn insert(t: &NewTerritory, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO territories
                (name, boundary, centroid_lat, centroid_lng, radius_km,
                 lead_count, is_auto_generated)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&t.name)
        .bind(serde_json::to_value(&t.boundary)?)
        .bind(t.centroid.lat)
        .bind(t.centroid.lng)
        .bind(t.radius_km)
        .bind(t.lead_count)
        .bind(t.is_auto_generated)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM territories WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM territories ORDER BY created_at")
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// Remove one territory. Returns false when the id was not found.
    pub async fn delete(id: Uuid, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query("DELETE FROM territories WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear previous auto-clustering output so a re-run replaces it instead
    /// of stacking duplicates. Manually drawn territories are untouched.
    pub async fn delete_auto_generated(pool: &PgPool) -> Result<u64> {
        let result = sqlx::query("DELETE FROM territories WHERE is_auto_generated")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
