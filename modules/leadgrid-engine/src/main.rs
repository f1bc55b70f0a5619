use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use leadgrid_domains::clusters::{cluster_leads, DbscanParams, PgClusterSink};
use leadgrid_domains::grids::{Cell, Grid};
use leadgrid_engine::{AppConfig, DiscoveryEngine, GooglePlaces, PgCellStore, PgLeadStore};
use places_client::PlacesError;

/// Stats from one worker run.
#[derive(Debug, Default)]
struct SweepStats {
    cells_searched: u32,
    cells_lost: u32,
    cells_failed: u32,
    cells_saturated: u32,
    cells_subdivided: u32,
    leads_inserted: u32,
    leads_skipped: u32,
    territories: u32,
    rate_limited: bool,
}

impl std::fmt::Display for SweepStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Sweep Complete ===")?;
        writeln!(f, "Cells searched:    {}", self.cells_searched)?;
        writeln!(f, "Cells lost:        {}", self.cells_lost)?;
        writeln!(f, "Cells failed:      {}", self.cells_failed)?;
        writeln!(f, "Cells saturated:   {}", self.cells_saturated)?;
        writeln!(f, "Cells subdivided:  {}", self.cells_subdivided)?;
        writeln!(f, "Leads inserted:    {}", self.leads_inserted)?;
        writeln!(f, "Leads skipped:     {}", self.leads_skipped)?;
        writeln!(f, "Auto territories:  {}", self.territories)?;
        if self.rate_limited {
            writeln!(f, "Stopped early: provider rate limited")?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("leadgrid=info".parse()?))
        .init();

    info!("LeadGrid worker starting...");

    let config = AppConfig::from_env()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    info!("Connected to database");

    sqlx::migrate!("../../migrations").run(&pool).await?;
    info!("Migrations complete");

    // Cold start: seed a grid from env vars when the database has none.
    let mut grids = Grid::list(&pool).await?;
    if grids.is_empty() {
        match &config.seed_grid {
            Some(seed) => {
                info!(name = seed.name.as_str(), "No grids found, seeding from env");
                let grid = Grid::create(
                    &seed.name,
                    &seed.region,
                    &seed.province,
                    &seed.queries,
                    seed.cell_size_km,
                    &pool,
                )
                .await?;
                let created =
                    Cell::generate(&grid, seed.bounds, config.max_cells_per_grid, &pool).await?;
                info!(cells = created, "Seed grid tiled");
                grids = vec![grid];
            }
            None => {
                warn!("No grids in the database and no GRID_NAME seed set, nothing to sweep");
            }
        }
    }

    let engine = DiscoveryEngine::new(
        Arc::new(GooglePlaces::new(
            &config.places_api_key,
            config.places_result_cap,
        )),
        Arc::new(PgCellStore::new(pool.clone())),
        Arc::new(PgLeadStore::new(pool.clone())),
        config.density_threshold,
        config.search_concurrency,
    );

    let mut sweep = SweepStats::default();

    'grids: for grid in &grids {
        let batch = Cell::next_unsearched(grid.id, config.sweep_batch_size, &pool).await?;
        info!(grid = grid.name.as_str(), cells = batch.len(), "Sweeping grid");

        for cell in &batch {
            match engine.search_cell(grid, cell).await {
                Ok(stats) if stats.claimed => {
                    sweep.cells_searched += 1;
                    sweep.leads_inserted += stats.leads_inserted;
                    sweep.leads_skipped += stats.leads_skipped;
                    if stats.saturated {
                        sweep.cells_saturated += 1;
                    }
                }
                Ok(_) => sweep.cells_lost += 1,
                Err(e)
                    if matches!(
                        e.downcast_ref::<PlacesError>(),
                        Some(PlacesError::RateLimited { .. })
                    ) =>
                {
                    warn!(cell = cell.cell_key.as_str(), "Provider rate limited, stopping sweep");
                    sweep.rate_limited = true;
                    break 'grids;
                }
                Err(e) => {
                    warn!(cell = cell.cell_key.as_str(), error = %e, "Cell search failed");
                    sweep.cells_failed += 1;
                }
            }
        }

        // Subdivide saturated leaves so the next sweep covers them at a
        // finer resolution.
        let saturated = Cell::saturated_leaves(grid.id, config.sweep_batch_size, &pool).await?;
        for cell in saturated {
            if cell.depth >= config.max_cell_depth {
                continue;
            }
            let children = Cell::subdivide(cell.id, &pool).await?;
            sweep.cells_subdivided += 1;
            info!(
                cell = cell.cell_key.as_str(),
                children = children.len(),
                depth = cell.depth + 1,
                "Subdivided saturated cell"
            );
        }

        let coverage = Cell::status_counts(grid.id, &pool).await?;
        let summary = coverage
            .iter()
            .map(|c| format!("{}={}", c.status, c.cells))
            .collect::<Vec<_>>()
            .join(" ");
        info!(grid = grid.name.as_str(), %summary, "Grid coverage");
    }

    // Rebuild auto territories from everything found so far.
    let sink = PgClusterSink::new(pool.clone());
    let run = cluster_leads(
        DbscanParams {
            epsilon_km: config.cluster_epsilon_km,
            min_points: config.cluster_min_points,
        },
        &sink,
        &pool,
    )
    .await?;
    sweep.territories = run.clusters_found;

    info!("{sweep}");
    Ok(())
}
