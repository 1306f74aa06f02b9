use crate::error::GeocodeError;
use crate::models::{Placemark, Position};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/reverse";
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves coordinates to human-readable placemarks, best match first.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse_geocode(&self, position: Position) -> Result<Vec<Placemark>, GeocodeError>;
}

/// Reverse geocoding through OpenStreetMap Nominatim.
///
/// Nominatim's usage policy requires an identifying User-Agent.
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    user_agent: String,
}

#[derive(Deserialize, Debug)]
struct NominatimResponse {
    error: Option<String>,
    name: Option<String>,
    #[serde(default)]
    address: NominatimAddress,
}

#[derive(Deserialize, Debug, Default)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    hamlet: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl From<NominatimResponse> for Placemark {
    fn from(res: NominatimResponse) -> Self {
        let a = res.address;
        Self {
            name: non_empty(res.name),
            locality: non_empty(a.city)
                .or_else(|| non_empty(a.town))
                .or_else(|| non_empty(a.village))
                .or_else(|| non_empty(a.hamlet)),
            administrative_area: non_empty(a.state),
            country: non_empty(a.country),
        }
    }
}

impl NominatimGeocoder {
    /// Uses a client with a [`LOOKUP_TIMEOUT`] so a stalled lookup gives up.
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Could not build geocoding client with timeout: {}", e);
                Client::new()
            });
        Self::with_client(client, base_url, user_agent)
    }

    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            user_agent: user_agent.into(),
        }
    }

    fn request_url(&self, position: Position) -> Result<Url, GeocodeError> {
        Url::parse_with_params(
            &self.base_url,
            &[
                ("format", "jsonv2".to_string()),
                ("lat", position.latitude.to_string()),
                ("lon", position.longitude.to_string()),
            ],
        )
        .map_err(|e| GeocodeError::Lookup(e.to_string()))
    }
}

/// Turns a Nominatim body into placemarks; an `error` body means no match.
fn parse_placemarks(body: &[u8]) -> Result<Vec<Placemark>, GeocodeError> {
    let res: NominatimResponse =
        serde_json::from_slice(body).map_err(|e| GeocodeError::Lookup(e.to_string()))?;
    if let Some(e) = &res.error {
        debug!("Nominatim found nothing: {}", e);
        return Ok(Vec::new());
    }
    Ok(vec![Placemark::from(res)])
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse_geocode(&self, position: Position) -> Result<Vec<Placemark>, GeocodeError> {
        let url = self.request_url(position)?;
        let res = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, self.user_agent.as_str())
            .send()
            .await?
            .error_for_status()?;
        let body = res.bytes().await?;
        parse_placemarks(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_city_response() {
        let body = br#"{
            "place_id": 1,
            "name": "",
            "display_name": "Lyon, France",
            "address": {"city": "Lyon", "country": "France", "country_code": "fr"}
        }"#;
        let places = parse_placemarks(body).unwrap();
        assert_eq!(places.len(), 1);
        assert_eq!(places[0].name, None);
        assert_eq!(places[0].administrative_area, None);
        assert_eq!(places[0].display_name(), "Lyon, France");
    }

    #[test]
    fn test_town_falls_back_for_locality() {
        let body = br#"{
            "name": "Market Square",
            "address": {"town": "Keswick", "state": "England", "country": "United Kingdom"}
        }"#;
        let places = parse_placemarks(body).unwrap();
        assert_eq!(
            places[0].display_name(),
            "Market Square, Keswick, England, United Kingdom"
        );
    }

    #[test]
    fn test_error_body_has_no_placemarks() {
        let body = br#"{"error":"Unable to geocode"}"#;
        assert!(parse_placemarks(body).unwrap().is_empty());
    }

    #[test]
    fn test_garbage_body_is_error() {
        let err = parse_placemarks(b"<html>").unwrap_err();
        assert!(err.to_string().starts_with("Geocoding error: "));
    }

    #[test]
    fn test_request_url() {
        let g = NominatimGeocoder::new(NOMINATIM_URL, "airbar-test");
        let url = g.request_url(Position::new(45.76, 4.84)).unwrap();
        let query = url.query().unwrap();
        assert!(query.contains("format=jsonv2"));
        assert!(query.contains("lat=45.76"));
        assert!(query.contains("lon=4.84"));
    }
}
