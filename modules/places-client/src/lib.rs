pub mod error;
pub mod types;

pub use error::{PlacesError, Result};
pub use types::{LocalizedText, Place, PlaceLocation};

use types::{BiasCircle, LatLng, LocationBias, TextSearchRequest, TextSearchResponse};

const BASE_URL: &str = "https://places.googleapis.com/v1";

/// Fields requested from the text-search endpoint. Kept minimal: the API
/// bills by field mask tier.
const FIELD_MASK: &str =
    "places.id,places.displayName,places.formattedAddress,places.location,places.types";

/// Maximum bias-circle radius the API accepts, in meters.
const MAX_BIAS_RADIUS_M: f64 = 50_000.0;

pub struct PlacesClient {
    client: reqwest::Client,
    api_key: String,
}

impl PlacesClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }

    /// Run one `places:searchText` request biased toward a circle. Returns
    /// the raw place list; an absent `places` field means zero results.
    ///
    /// The bias is soft: the API may return places outside the circle, and
    /// it caps each response at 20 results regardless of `max_results`.
    pub async fn search_text(
        &self,
        query: &str,
        lat: f64,
        lng: f64,
        radius_m: f64,
        max_results: u8,
    ) -> Result<Vec<Place>> {
        let body = TextSearchRequest {
            text_query: query,
            max_result_count: max_results,
            location_bias: LocationBias {
                circle: BiasCircle {
                    center: LatLng {
                        latitude: lat,
                        longitude: lng,
                    },
                    radius: radius_m.min(MAX_BIAS_RADIUS_M),
                },
            },
        };

        let url = format!("{}/places:searchText", BASE_URL);
        let resp = self
            .client
            .post(&url)
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS
                || status == reqwest::StatusCode::SERVICE_UNAVAILABLE
            {
                return Err(PlacesError::RateLimited {
                    status: status.as_u16(),
                    message,
                });
            }
            return Err(PlacesError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: TextSearchResponse = resp.json().await?;
        let places = parsed.places.unwrap_or_default();
        tracing::debug!(query, count = places.len(), "Places text search returned");
        Ok(places)
    }
}
