//! Error types for the location, geocoding and air-quality pipeline.
//!
//! The `Display` output of each variant doubles as the status line shown to
//! the user, so wording here is user-facing.

use thiserror::Error;

/// Failure of a single air-quality request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Invalid URL")]
    InvalidUrl,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error")]
    Status(u16),

    #[error("No data received")]
    EmptyBody,

    #[error("Error decoding data: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Decode(e.to_string())
    }
}

/// Failure reported by a location service.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    /// Position temporarily unavailable; worth retrying.
    #[error("Error: location temporarily unavailable")]
    Transient,

    #[error("Error: location access denied")]
    Denied,

    #[error("Error: {0}")]
    Other(String),
}

impl LocationError {
    pub fn is_transient(&self) -> bool {
        matches!(self, LocationError::Transient)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeocodeError {
    #[error("Geocoding error: {0}")]
    Lookup(String),
}

impl From<reqwest::Error> for GeocodeError {
    fn from(e: reqwest::Error) -> Self {
        GeocodeError::Lookup(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        assert_eq!(FetchError::InvalidUrl.to_string(), "Invalid URL");
        assert_eq!(FetchError::Status(404).to_string(), "Server error");
        assert_eq!(FetchError::Status(500).to_string(), "Server error");
        assert_eq!(FetchError::EmptyBody.to_string(), "No data received");
        assert_eq!(
            FetchError::Network("dns failure".to_string()).to_string(),
            "Network error: dns failure"
        );
        assert_eq!(
            FetchError::Decode("missing field `ozone`".to_string()).to_string(),
            "Error decoding data: missing field `ozone`"
        );
    }

    #[test]
    fn test_location_error_kinds() {
        assert!(LocationError::Transient.is_transient());
        assert!(!LocationError::Denied.is_transient());
        assert_eq!(
            LocationError::Other("hardware fault".to_string()).to_string(),
            "Error: hardware fault"
        );
    }
}
