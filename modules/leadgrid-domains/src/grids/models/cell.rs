use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use leadgrid_common::{BoundingBox, CellStatus, ClaimVerdict, QuerySaturation};

use super::grid::Grid;
use crate::grids::tiler::{cell_key, tile, Tile};

/// One searchable rectangle of a grid. Cells are never deleted; they are the
/// historical record of search coverage. Only `claim`, `complete_search`,
/// `update_status`, and `subdivide` mutate them.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Cell {
    pub id: Uuid,
    pub grid_id: Uuid,
    pub cell_key: String,
    pub sw_lat: f64,
    pub sw_lng: f64,
    pub ne_lat: f64,
    pub ne_lng: f64,
    pub depth: i32,
    pub parent_cell_id: Option<Uuid>,
    pub is_leaf: bool,
    pub status: String,
    pub result_count: i32,
    pub query_saturation: serde_json::Value,
    pub last_searched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-status cell tally for one grid.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CoverageCount {
    pub status: String,
    pub cells: i64,
}

impl Cell {
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.sw_lat, self.sw_lng, self.ne_lat, self.ne_lng)
    }

    /// Saturation evidence from the last search, if any was recorded.
    pub fn saturation_detail(&self) -> Vec<QuerySaturation> {
        serde_json::from_value(self.query_saturation.clone()).unwrap_or_default()
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM grid_cells WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Shallowest cell carrying this key, i.e. the one the tiler emitted.
    pub async fn find_by_key(grid_id: Uuid, cell_key: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM grid_cells WHERE grid_id = $1 AND cell_key = $2 ORDER BY depth LIMIT 1",
        )
        .bind(grid_id)
        .bind(cell_key)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Tile `bounds` at the grid's cell size and persist every cell that is
    /// not already present. Overlapping viewports re-generate the same keys,
    /// so the conflict target makes repeated generation idempotent. Returns
    /// the number of cells actually inserted.
    pub async fn generate(
        grid: &Grid,
        bounds: BoundingBox,
        max_cells: usize,
        pool: &PgPool,
    ) -> Result<u64> {
        let tiles = tile(bounds, grid.cell_size_km, max_cells)?;
        if tiles.is_empty() {
            tracing::warn!(
                grid_id = %grid.id,
                cell_size_km = grid.cell_size_km,
                max_cells,
                "cell budget exceeded, nothing generated; use a coarser cell size"
            );
            return Ok(0);
        }
        Self::insert_many(grid.id, &tiles, pool).await
    }

    /// Bulk-insert tiler output as depth-0 leaf cells.
    pub async fn insert_many(grid_id: Uuid, tiles: &[Tile], pool: &PgPool) -> Result<u64> {
        let keys: Vec<&str> = tiles.iter().map(|t| t.key.as_str()).collect();
        let sw_lats: Vec<f64> = tiles.iter().map(|t| t.bounds.sw_lat).collect();
        let sw_lngs: Vec<f64> = tiles.iter().map(|t| t.bounds.sw_lng).collect();
        let ne_lats: Vec<f64> = tiles.iter().map(|t| t.bounds.ne_lat).collect();
        let ne_lngs: Vec<f64> = tiles.iter().map(|t| t.bounds.ne_lng).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO grid_cells (grid_id, cell_key, sw_lat, sw_lng, ne_lat, ne_lng)
            SELECT $1, t.key, t.sw_lat, t.sw_lng, t.ne_lat, t.ne_lng
            FROM UNNEST($2::text[], $3::float8[], $4::float8[], $5::float8[], $6::float8[])
                AS t(key, sw_lat, sw_lng, ne_lat, ne_lng)
            ON CONFLICT (grid_id, depth, cell_key) DO NOTHING
            "#,
        )
        .bind(grid_id)
        .bind(&keys)
        .bind(&sw_lats)
        .bind(&sw_lngs)
        .bind(&ne_lats)
        .bind(&ne_lngs)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Atomically move the cell to `searching` if its current status is one
    /// of `expected`, returning the status it held immediately before.
    ///
    /// Single-statement compare-and-swap: the `FOR UPDATE` subquery pins the
    /// row version, so the returned previous status cannot race a concurrent
    /// claim. A lost claim is a normal outcome, not an error.
    pub async fn claim(id: Uuid, expected: &[CellStatus], pool: &PgPool) -> Result<ClaimVerdict> {
        let expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();

        let previous = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE grid_cells c
            SET status = 'searching', updated_at = now()
            FROM (SELECT id, status FROM grid_cells WHERE id = $1 FOR UPDATE) prev
            WHERE c.id = prev.id AND prev.status = ANY($2)
            RETURNING prev.status
            "#,
        )
        .bind(id)
        .bind(&expected)
        .fetch_optional(pool)
        .await?;

        match previous {
            Some(status) => Ok(ClaimVerdict::Acquired {
                previous: status.parse().map_err(|e: String| anyhow!(e))?,
            }),
            None => Ok(ClaimVerdict::Lost),
        }
    }

    /// Unconditional status write. Used by the post-claim compensation path
    /// to restore the pre-claim status, and by operators forcing a re-search.
    pub async fn update_status(id: Uuid, status: CellStatus, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE grid_cells SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Record the outcome of a completed search in one write.
    pub async fn complete_search(
        id: Uuid,
        status: CellStatus,
        result_count: i32,
        saturation: &[QuerySaturation],
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE grid_cells
            SET status = $2, result_count = $3, query_saturation = $4,
                last_searched_at = now(), updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(result_count)
        .bind(serde_json::to_value(saturation)?)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Leaf cells of a grid that have never been searched, in key order.
    pub async fn next_unsearched(grid_id: Uuid, limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM grid_cells
            WHERE grid_id = $1 AND status = 'unsearched' AND is_leaf
            ORDER BY cell_key
            LIMIT $2
            "#,
        )
        .bind(grid_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Saturated leaf cells eligible for subdivision, shallowest first.
    pub async fn saturated_leaves(grid_id: Uuid, limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM grid_cells
            WHERE grid_id = $1 AND status = 'saturated' AND is_leaf
            ORDER BY depth, cell_key
            LIMIT $2
            "#,
        )
        .bind(grid_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn children(parent_id: Uuid, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM grid_cells WHERE parent_cell_id = $1 ORDER BY cell_key",
        )
        .bind(parent_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Cell tallies by status for one grid, for coverage logging.
    pub async fn status_counts(grid_id: Uuid, pool: &PgPool) -> Result<Vec<CoverageCount>> {
        sqlx::query_as::<_, CoverageCount>(
            r#"
            SELECT status, COUNT(*) AS cells
            FROM grid_cells
            WHERE grid_id = $1
            GROUP BY status
            ORDER BY status
            "#,
        )
        .bind(grid_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Split a saturated leaf into 4 quadrant children one level deeper.
    ///
    /// The parent row is locked for the duration, so two concurrent
    /// subdivision triggers cannot both insert children. The parent keeps its
    /// saturated status as history; it just stops being a leaf.
    pub async fn subdivide(id: Uuid, pool: &PgPool) -> Result<Vec<Self>> {
        let mut tx = pool.begin().await?;

        let parent =
            sqlx::query_as::<_, Self>("SELECT * FROM grid_cells WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| anyhow!("cell {id} not found"))?;

        if parent.status != CellStatus::Saturated.as_str() {
            bail!(
                "cell {id} is {}, only saturated cells subdivide",
                parent.status
            );
        }
        if !parent.is_leaf {
            bail!("cell {id} is already subdivided");
        }

        let mut children = Vec::with_capacity(4);
        for q in quadrants(parent.bounds()) {
            let child = sqlx::query_as::<_, Self>(
                r#"
                INSERT INTO grid_cells
                    (grid_id, cell_key, sw_lat, sw_lng, ne_lat, ne_lng, depth, parent_cell_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING *
                "#,
            )
            .bind(parent.grid_id)
            .bind(cell_key(q.sw_lat, q.sw_lng))
            .bind(q.sw_lat)
            .bind(q.sw_lng)
            .bind(q.ne_lat)
            .bind(q.ne_lng)
            .bind(parent.depth + 1)
            .bind(parent.id)
            .fetch_one(&mut *tx)
            .await?;
            children.push(child);
        }

        sqlx::query("UPDATE grid_cells SET is_leaf = FALSE, updated_at = now() WHERE id = $1")
            .bind(parent.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(children)
    }
}

/// Quadrant split at the midpoints: SW, SE, NW, NE. Children share edges
/// exactly and cover the parent exactly.
fn quadrants(b: BoundingBox) -> [BoundingBox; 4] {
    let mid_lat = (b.sw_lat + b.ne_lat) / 2.0;
    let mid_lng = (b.sw_lng + b.ne_lng) / 2.0;
    [
        BoundingBox::new(b.sw_lat, b.sw_lng, mid_lat, mid_lng),
        BoundingBox::new(b.sw_lat, mid_lng, mid_lat, b.ne_lng),
        BoundingBox::new(mid_lat, b.sw_lng, b.ne_lat, mid_lng),
        BoundingBox::new(mid_lat, mid_lng, b.ne_lat, b.ne_lng),
    ]
}
