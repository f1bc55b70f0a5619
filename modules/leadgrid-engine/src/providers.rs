//! Google Places adapter for the `PlaceSearch` boundary.

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use leadgrid_common::{DiscoveredCandidate, GeoPoint, LeadStatus};
use places_client::{Place, PlacesClient};

use crate::traits::{PlaceResults, PlaceSearch};

/// Source tag stamped on every lead found through this adapter.
pub const SOURCE_GOOGLE_PLACES: &str = "google_places";

pub struct GooglePlaces {
    client: PlacesClient,
    result_cap: u8,
}

impl GooglePlaces {
    pub fn new(api_key: &str, result_cap: u8) -> Self {
        Self {
            client: PlacesClient::new(api_key.to_string()),
            result_cap,
        }
    }
}

#[async_trait]
impl PlaceSearch for GooglePlaces {
    async fn search(&self, query: &str, center: GeoPoint, radius_km: f64) -> Result<PlaceResults> {
        let places = self
            .client
            .search_text(query, center.lat, center.lng, radius_km * 1000.0, self.result_cap)
            .await?;

        // The cap check runs on the raw response, before any place is
        // dropped for missing fields.
        let total = places.len();
        let hit_result_cap = total >= self.result_cap as usize;

        let candidates: Vec<DiscoveredCandidate> =
            places.into_iter().filter_map(to_candidate).collect();
        if candidates.len() < total {
            debug!(
                query,
                dropped = total - candidates.len(),
                "Dropped places missing id, name or location"
            );
        }

        Ok(PlaceResults {
            candidates,
            hit_result_cap,
        })
    }
}

/// Map one provider place to a candidate. Places without an id, a display
/// name or coordinates carry nothing actionable and are dropped.
fn to_candidate(place: Place) -> Option<DiscoveredCandidate> {
    let external_id = place.id?;
    let name = place.display_name.and_then(|d| d.text)?;
    let location = place.location?;
    let (lat, lng) = (location.latitude?, location.longitude?);

    let (address, city, province) = place
        .formatted_address
        .as_deref()
        .map(split_address)
        .unwrap_or((None, None, None));

    Some(DiscoveredCandidate {
        external_id,
        name,
        business_type: place.types.first().cloned(),
        address,
        city,
        province,
        lat,
        lng,
        source: SOURCE_GOOGLE_PLACES.to_string(),
        status: LeadStatus::New,
    })
}

/// Split a formatted address like
/// "170 University Ave W, Waterloo, ON N2L 3E9, Canada" into street, city
/// and province. Three-part forms are "city, province, country" with no
/// street; the postal code and country are dropped.
fn split_address(formatted: &str) -> (Option<String>, Option<String>, Option<String>) {
    let parts: Vec<&str> = formatted
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let province_of = |part: &str| part.split_whitespace().next().map(str::to_string);

    match parts.as_slice() {
        [] => (None, None, None),
        [street] => (Some((*street).to_string()), None, None),
        [city, region] => (None, Some((*city).to_string()), province_of(region)),
        [city, region, _country] => (None, Some((*city).to_string()), province_of(region)),
        [street, city, region, ..] => (
            Some((*street).to_string()),
            Some((*city).to_string()),
            province_of(region),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use places_client::{LocalizedText, PlaceLocation};

    fn place(id: &str, name: &str, lat: f64, lng: f64) -> Place {
        Place {
            id: Some(id.to_string()),
            display_name: Some(LocalizedText {
                text: Some(name.to_string()),
            }),
            formatted_address: Some("170 University Ave W, Waterloo, ON N2L 3E9, Canada".to_string()),
            location: Some(PlaceLocation {
                latitude: Some(lat),
                longitude: Some(lng),
            }),
            types: vec!["plumber".to_string(), "establishment".to_string()],
        }
    }

    #[test]
    fn maps_a_complete_place() {
        let candidate = to_candidate(place("p1", "Fast Flow Plumbing", 43.47, -80.54)).unwrap();

        assert_eq!(candidate.external_id, "p1");
        assert_eq!(candidate.name, "Fast Flow Plumbing");
        assert_eq!(candidate.business_type.as_deref(), Some("plumber"));
        assert_eq!(candidate.address.as_deref(), Some("170 University Ave W"));
        assert_eq!(candidate.city.as_deref(), Some("Waterloo"));
        assert_eq!(candidate.province.as_deref(), Some("ON"));
        assert_eq!(candidate.source, SOURCE_GOOGLE_PLACES);
        assert_eq!(candidate.status, LeadStatus::New);
    }

    #[test]
    fn drops_places_missing_required_fields() {
        let mut no_id = place("p1", "A", 43.0, -80.0);
        no_id.id = None;
        assert!(to_candidate(no_id).is_none());

        let mut no_name = place("p2", "B", 43.0, -80.0);
        no_name.display_name = None;
        assert!(to_candidate(no_name).is_none());

        let mut no_location = place("p3", "C", 43.0, -80.0);
        no_location.location = None;
        assert!(to_candidate(no_location).is_none());

        let mut no_latitude = place("p4", "D", 43.0, -80.0);
        no_latitude.location = Some(PlaceLocation {
            latitude: None,
            longitude: Some(-80.0),
        });
        assert!(to_candidate(no_latitude).is_none());
    }

    #[test]
    fn keeps_a_place_without_an_address() {
        let mut bare = place("p1", "A", 43.0, -80.0);
        bare.formatted_address = None;
        bare.types = Vec::new();

        let candidate = to_candidate(bare).unwrap();
        assert_eq!(candidate.address, None);
        assert_eq!(candidate.city, None);
        assert_eq!(candidate.province, None);
        assert_eq!(candidate.business_type, None);
    }

    #[test]
    fn splits_shorter_address_forms() {
        assert_eq!(
            split_address("Waterloo, ON N2L, Canada"),
            (None, Some("Waterloo".to_string()), Some("ON".to_string()))
        );
        assert_eq!(
            split_address("Waterloo, Ontario"),
            (None, Some("Waterloo".to_string()), Some("Ontario".to_string()))
        );
        assert_eq!(
            split_address("Waterloo"),
            (Some("Waterloo".to_string()), None, None)
        );
        assert_eq!(split_address(""), (None, None, None));
    }
}
