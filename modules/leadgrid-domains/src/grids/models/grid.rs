use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// A named discovery area: the search configuration every cell of the grid
/// shares. Cell size is immutable after creation; changing it means a new
/// grid, because cell keys are derived from it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Grid {
    pub id: Uuid,
    pub name: String,
    pub region: String,
    pub province: String,
    pub search_queries: Vec<String>,
    pub cell_size_km: f64,
    pub lead_total: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Grid {
    pub async fn create(
        name: &str,
        region: &str,
        province: &str,
        search_queries: &[String],
        cell_size_km: f64,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO grids (name, region, province, search_queries, cell_size_km)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(region)
        .bind(province)
        .bind(search_queries)
        .bind(cell_size_km)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM grids WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM grids ORDER BY created_at")
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// Append a query to the grid's ordered list. Appending a query that is
    /// already present is a no-op.
    pub async fn add_query(id: Uuid, query: &str, pool: &PgPool) -> Result<Self> {
        let updated = sqlx::query_as::<_, Self>(
            r#"
            UPDATE grids
            SET search_queries = array_append(search_queries, $2), updated_at = now()
            WHERE id = $1 AND NOT ($2 = ANY(search_queries))
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(query)
        .fetch_optional(pool)
        .await?;

        match updated {
            Some(grid) => Ok(grid),
            None => Self::find_by_id(id, pool)
                .await?
                .ok_or_else(|| anyhow!("grid {id} not found")),
        }
    }

    pub async fn remove_query(id: Uuid, query: &str, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE grids
            SET search_queries = array_remove(search_queries, $2), updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(query)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| anyhow!("grid {id} not found"))
    }

    /// Bump the running total of leads this grid has produced.
    pub async fn increment_lead_total(id: Uuid, by: i64, pool: &PgPool) -> Result<()> {
        sqlx::query(
            "UPDATE grids SET lead_total = lead_total + $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(by)
        .execute(pool)
        .await?;
        Ok(())
    }
}
