use serde::{Deserialize, Serialize};

// --- Request ---

#[derive(Debug, Clone, Serialize)]
pub(crate) struct TextSearchRequest<'a> {
    #[serde(rename = "textQuery")]
    pub text_query: &'a str,
    #[serde(rename = "maxResultCount")]
    pub max_result_count: u8,
    #[serde(rename = "locationBias")]
    pub location_bias: LocationBias,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct LocationBias {
    pub circle: BiasCircle,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BiasCircle {
    pub center: LatLng,
    /// Meters. The API rejects radii above 50,000.
    pub radius: f64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

// --- Response ---

/// One place from a text-search response. Fields are optional because the
/// field mask and the API's partial data both leave holes; callers validate
/// what they need.
#[derive(Debug, Clone, Deserialize)]
pub struct Place {
    pub id: Option<String>,
    #[serde(rename = "displayName")]
    pub display_name: Option<LocalizedText>,
    #[serde(rename = "formattedAddress")]
    pub formatted_address: Option<String>,
    pub location: Option<PlaceLocation>,
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalizedText {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceLocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TextSearchResponse {
    pub places: Option<Vec<Place>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_with_api_field_names() {
        let req = TextSearchRequest {
            text_query: "plumber",
            max_result_count: 20,
            location_bias: LocationBias {
                circle: BiasCircle {
                    center: LatLng {
                        latitude: 43.65,
                        longitude: -79.4,
                    },
                    radius: 1200.0,
                },
            },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["textQuery"], "plumber");
        assert_eq!(json["maxResultCount"], 20);
        assert_eq!(json["locationBias"]["circle"]["radius"], 1200.0);
        assert_eq!(json["locationBias"]["circle"]["center"]["latitude"], 43.65);
    }

    #[test]
    fn response_tolerates_missing_fields() {
        let body = r#"{"places":[{"id":"abc","displayName":{"text":"Joe's"},"location":{"latitude":43.1,"longitude":-79.2}},{"formattedAddress":"1 Main St"}]}"#;
        let resp: TextSearchResponse = serde_json::from_str(body).unwrap();
        let places = resp.places.unwrap();
        assert_eq!(places.len(), 2);
        assert_eq!(places[0].id.as_deref(), Some("abc"));
        assert!(places[1].id.is_none());
        assert!(places[1].types.is_empty());
    }

    #[test]
    fn empty_response_parses() {
        let resp: TextSearchResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.places.is_none());
    }
}
