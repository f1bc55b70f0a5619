use anyhow::Result;

use leadgrid_common::{BoundingBox, LeadGridError};

/// Worker configuration loaded from environment variables. Secrets and
/// connection strings are required; everything else has a sweep-friendly
/// default.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Database
    pub database_url: String,

    // Places provider
    pub places_api_key: String,
    pub places_result_cap: u8,

    // Sweep
    pub density_threshold: u32,
    pub search_concurrency: usize,
    pub sweep_batch_size: i64,
    pub max_cell_depth: i32,
    pub max_cells_per_grid: usize,

    // Clustering
    pub cluster_epsilon_km: f64,
    pub cluster_min_points: usize,

    // Cold-start grid seed
    pub seed_grid: Option<SeedGrid>,
}

/// Grid seeded from env vars when the database holds none.
#[derive(Debug, Clone)]
pub struct SeedGrid {
    pub name: String,
    pub region: String,
    pub province: String,
    pub bounds: BoundingBox,
    pub queries: Vec<String>,
    pub cell_size_km: f64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")?,
            places_api_key: std::env::var("PLACES_API_KEY")?,
            places_result_cap: std::env::var("PLACES_RESULT_CAP")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .unwrap_or(20),
            density_threshold: std::env::var("SATURATION_DENSITY_THRESHOLD")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .unwrap_or(20),
            search_concurrency: std::env::var("SEARCH_CONCURRENCY")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .unwrap_or(4),
            sweep_batch_size: std::env::var("SWEEP_BATCH_SIZE")
                .unwrap_or_else(|_| "25".to_string())
                .parse()
                .unwrap_or(25),
            max_cell_depth: std::env::var("MAX_CELL_DEPTH")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            max_cells_per_grid: std::env::var("MAX_CELLS_PER_GRID")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .unwrap_or(500),
            cluster_epsilon_km: std::env::var("CLUSTER_EPSILON_KM")
                .unwrap_or_else(|_| "2.0".to_string())
                .parse()
                .unwrap_or(2.0),
            cluster_min_points: std::env::var("CLUSTER_MIN_POINTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            seed_grid: seed_grid_from_env()?,
        };

        config.log_keys();
        Ok(config)
    }

    fn log_keys(&self) {
        fn preview(val: &str) -> String {
            let n = val.len().min(5);
            format!("{}...({} chars)", &val[..n], val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  PLACES_API_KEY: {}", preview(&self.places_api_key));
        tracing::info!("  PLACES_RESULT_CAP: {}", self.places_result_cap);
        tracing::info!(
            "  SATURATION_DENSITY_THRESHOLD: {}",
            self.density_threshold
        );
        tracing::info!("  SEARCH_CONCURRENCY: {}", self.search_concurrency);
        tracing::info!("  MAX_CELL_DEPTH: {}", self.max_cell_depth);
        tracing::info!(
            "  GRID seed: {}",
            self.seed_grid
                .as_ref()
                .map(|s| s.name.as_str())
                .unwrap_or("<not set>")
        );
    }
}

fn seed_grid_from_env() -> Result<Option<SeedGrid>> {
    let Ok(name) = std::env::var("GRID_NAME") else {
        return Ok(None);
    };

    let bounds_raw = std::env::var("GRID_BOUNDS").map_err(|_| {
        LeadGridError::Config("GRID_BOUNDS is required when GRID_NAME is set".to_string())
    })?;
    let bounds = parse_bounds(&bounds_raw)?;

    let queries: Vec<String> = std::env::var("GRID_QUERIES")
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().to_string())
        .collect();
    if queries.is_empty() {
        return Err(LeadGridError::Config(
            "GRID_QUERIES is required when GRID_NAME is set".to_string(),
        )
        .into());
    }

    Ok(Some(SeedGrid {
        name,
        region: std::env::var("GRID_REGION").unwrap_or_default(),
        province: std::env::var("GRID_PROVINCE").unwrap_or_default(),
        bounds,
        queries,
        cell_size_km: std::env::var("GRID_CELL_KM")
            .unwrap_or_else(|_| "2.0".to_string())
            .parse()
            .unwrap_or(2.0),
    }))
}

/// Parse a "swLat,swLng,neLat,neLng" bounds string.
pub fn parse_bounds(raw: &str) -> Result<BoundingBox> {
    let nums: Vec<f64> = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| {
            LeadGridError::Config(format!("GRID_BOUNDS must be four numbers, got '{raw}'"))
        })?;

    let [sw_lat, sw_lng, ne_lat, ne_lng] = nums.as_slice() else {
        return Err(LeadGridError::Config(format!(
            "GRID_BOUNDS must be 'swLat,swLng,neLat,neLng', got '{raw}'"
        ))
        .into());
    };

    let bounds = BoundingBox::new(*sw_lat, *sw_lng, *ne_lat, *ne_lng);
    if !bounds.is_valid() {
        return Err(LeadGridError::Config(format!(
            "GRID_BOUNDS south-west corner must sit south and west of the north-east corner, got '{raw}'"
        ))
        .into());
    }
    Ok(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_bounds() {
        let bounds = parse_bounds("43.0, -80.5, 43.8, -80.0").unwrap();
        assert_eq!(bounds.sw_lat, 43.0);
        assert_eq!(bounds.sw_lng, -80.5);
        assert_eq!(bounds.ne_lat, 43.8);
        assert_eq!(bounds.ne_lng, -80.0);
    }

    #[test]
    fn rejects_wrong_arity_and_garbage() {
        assert!(parse_bounds("43.0,-80.5,43.8").is_err());
        assert!(parse_bounds("43.0,-80.5,43.8,-80.0,1.0").is_err());
        assert!(parse_bounds("a,b,c,d").is_err());
        assert!(parse_bounds("").is_err());
    }

    #[test]
    fn rejects_inverted_corners() {
        let err = parse_bounds("43.8,-80.0,43.0,-80.5").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LeadGridError>(),
            Some(LeadGridError::Config(_))
        ));
    }
}
