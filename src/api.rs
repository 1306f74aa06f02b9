use crate::aqi::AqiScale;
use crate::error::FetchError;
use crate::models::{AirQualityReading, AirQualityResponse, Position};
use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

pub const OPEN_METEO_URL: &str = "https://air-quality-api.open-meteo.com/v1/air-quality";

/// Anything that can produce a current air-quality reading for a coordinate.
#[async_trait]
pub trait AirQualitySource: Send + Sync {
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<AirQualityReading, FetchError>;
}

/// Open-Meteo air-quality client. One request per call, no retries or caching.
pub struct AirQualityClient {
    client: Client,
    base_url: String,
    scale: AqiScale,
}

impl AirQualityClient {
    pub fn new(base_url: impl Into<String>, scale: AqiScale) -> Self {
        Self::with_client(Client::new(), base_url, scale)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, scale: AqiScale) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            scale,
        }
    }

    pub fn scale(&self) -> AqiScale {
        self.scale
    }

    pub fn request_url(&self, latitude: f64, longitude: f64) -> Result<Url, FetchError> {
        if !Position::new(latitude, longitude).is_valid() {
            return Err(FetchError::InvalidUrl);
        }

        Url::parse_with_params(
            &self.base_url,
            &[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current", self.scale.current_params()),
            ],
        )
        .map_err(|_| FetchError::InvalidUrl)
    }
}

#[async_trait]
impl AirQualitySource for AirQualityClient {
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<AirQualityReading, FetchError> {
        let url = self.request_url(latitude, longitude)?;
        debug!("Fetching air quality for ({}, {}): {}", latitude, longitude, url);

        let res = self.client.get(url).send().await?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = res.bytes().await?;
        if body.is_empty() {
            return Err(FetchError::EmptyBody);
        }

        let parsed: AirQualityResponse = serde_json::from_slice(&body)?;
        AirQualityReading::from_response(parsed, self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const OK_BODY: &str = r#"{"current":{"time":"2026-10-18T09:00","interval":3600,"us_aqi":151,"pm10":40.5,"pm2_5":55.25,"carbon_monoxide":310.0,"nitrogen_dioxide":22.75,"sulphur_dioxide":4.5,"ozone":80.0}}"#;

    /// Answers exactly one HTTP request with the given status line and body.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{}/v1/air-quality", addr)
    }

    fn client(base_url: &str, scale: AqiScale) -> AirQualityClient {
        let http = Client::builder().no_proxy().build().unwrap();
        AirQualityClient::with_client(http, base_url, scale)
    }

    #[test]
    fn test_request_url_params() {
        let c = client(OPEN_METEO_URL, AqiScale::European);
        let url = c.request_url(48.8566, 2.3522).unwrap();
        assert_eq!(url.host_str(), Some("air-quality-api.open-meteo.com"));
        assert_eq!(url.path(), "/v1/air-quality");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs.len(), 3);
        let params: HashMap<_, _> = pairs.into_iter().collect();
        assert_eq!(params["latitude"], "48.8566");
        assert_eq!(params["longitude"], "2.3522");

        let metrics: Vec<&str> = params["current"].split(',').collect();
        assert_eq!(
            metrics,
            vec![
                "european_aqi",
                "pm10",
                "pm2_5",
                "carbon_monoxide",
                "nitrogen_dioxide",
                "sulphur_dioxide",
                "ozone"
            ]
        );
    }

    #[test]
    fn test_request_url_us_scale_never_requests_both() {
        let c = client(OPEN_METEO_URL, AqiScale::Us);
        let url = c.request_url(-33.86, 151.2).unwrap();
        let current = url
            .query_pairs()
            .find(|(k, _)| k == "current")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert!(current.starts_with("us_aqi,"));
        assert!(!current.contains("european_aqi"));
    }

    #[test]
    fn test_request_url_rejects_out_of_range() {
        let c = client(OPEN_METEO_URL, AqiScale::European);
        assert_eq!(c.request_url(91.0, 0.0), Err(FetchError::InvalidUrl));
        assert_eq!(c.request_url(0.0, -180.5), Err(FetchError::InvalidUrl));
        assert_eq!(c.request_url(f64::INFINITY, 0.0), Err(FetchError::InvalidUrl));
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let url = serve_once("200 OK", OK_BODY).await;
        let reading = client(&url, AqiScale::Us).fetch(40.71, -74.0).await.unwrap();
        assert_eq!(reading.index, 151);
        assert_eq!(reading.pm10, 40.5);
        assert_eq!(reading.pm2_5, 55.25);
        assert_eq!(reading.carbon_monoxide, 310.0);
        assert_eq!(reading.nitrogen_dioxide, 22.75);
        assert_eq!(reading.sulphur_dioxide, 4.5);
        assert_eq!(reading.ozone, 80.0);
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_server_error() {
        let url = serve_once("404 Not Found", "").await;
        let err = client(&url, AqiScale::Us).fetch(40.71, -74.0).await.unwrap_err();
        assert_eq!(err, FetchError::Status(404));
        assert_eq!(err.to_string(), "Server error");
    }

    #[tokio::test]
    async fn test_fetch_internal_error_is_server_error() {
        let url = serve_once("500 Internal Server Error", r#"{"error":true}"#).await;
        let err = client(&url, AqiScale::Us).fetch(40.71, -74.0).await.unwrap_err();
        assert_eq!(err.to_string(), "Server error");
    }

    #[tokio::test]
    async fn test_fetch_empty_body() {
        let url = serve_once("200 OK", "").await;
        let err = client(&url, AqiScale::European).fetch(1.0, 1.0).await.unwrap_err();
        assert_eq!(err, FetchError::EmptyBody);
    }

    #[tokio::test]
    async fn test_fetch_schema_mismatch() {
        let url = serve_once("200 OK", r#"{"current":{"european_aqi":"high"}}"#).await;
        let err = client(&url, AqiScale::European).fetch(1.0, 1.0).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
        assert!(err.to_string().starts_with("Error decoding data: "));
    }

    #[tokio::test]
    async fn test_fetch_wrong_scale_key() {
        let url = serve_once("200 OK", OK_BODY).await;
        let err = client(&url, AqiScale::European).fetch(1.0, 1.0).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::Decode("missing field `european_aqi`".to_string())
        );
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{}/v1/air-quality", addr);
        let err = client(&url, AqiScale::European).fetch(1.0, 1.0).await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
        assert!(err.to_string().starts_with("Network error: "));
    }
}
