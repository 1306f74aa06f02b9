use crate::aqi::{AqiBucket, AqiScale};
use crate::error::FetchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw coordinate pair reported by a location service, in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// The position a refresh cycle settled on, plus its resolved place name.
///
/// `name` is filled in later by reverse geocoding and stays `None` if that
/// lookup fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub name: Option<String>,
}

impl From<Position> for LocationFix {
    fn from(p: Position) -> Self {
        Self {
            latitude: p.latitude,
            longitude: p.longitude,
            name: None,
        }
    }
}

impl LocationFix {
    pub fn position(&self) -> Position {
        Position::new(self.latitude, self.longitude)
    }
}

/// Address descriptor returned by a reverse geocoding lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placemark {
    pub name: Option<String>,
    pub locality: Option<String>,
    pub administrative_area: Option<String>,
    pub country: Option<String>,
}

impl Placemark {
    /// Joins the present fields with ", " in name, locality, area, country order.
    pub fn display_name(&self) -> String {
        [
            &self.name,
            &self.locality,
            &self.administrative_area,
            &self.country,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
    }
}

#[derive(Deserialize, Debug)]
pub struct AirQualityResponse {
    pub current: CurrentAirQuality,
}

// Only one of the two index keys is present, depending on what was requested.
#[derive(Deserialize, Debug)]
pub struct CurrentAirQuality {
    pub european_aqi: Option<u16>,
    pub us_aqi: Option<u16>,
    pub pm10: f64,
    pub pm2_5: f64,
    pub carbon_monoxide: f64,
    pub nitrogen_dioxide: f64,
    pub sulphur_dioxide: f64,
    pub ozone: f64,
}

/// Current air quality at a location. Pollutants are in µg/m³.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirQualityReading {
    pub scale: AqiScale,
    pub index: u16,
    pub pm10: f64,
    pub pm2_5: f64,
    pub carbon_monoxide: f64,
    pub nitrogen_dioxide: f64,
    pub sulphur_dioxide: f64,
    pub ozone: f64,
}

impl AirQualityReading {
    /// Builds a reading from a decoded payload, requiring the index key of `scale`.
    pub fn from_response(res: AirQualityResponse, scale: AqiScale) -> Result<Self, FetchError> {
        let current = res.current;
        let index = match scale {
            AqiScale::European => current.european_aqi,
            AqiScale::Us => current.us_aqi,
        }
        .ok_or_else(|| FetchError::Decode(format!("missing field `{}`", scale.aqi_key())))?;

        Ok(Self {
            scale,
            index,
            pm10: current.pm10,
            pm2_5: current.pm2_5,
            carbon_monoxide: current.carbon_monoxide,
            nitrogen_dioxide: current.nitrogen_dioxide,
            sulphur_dioxide: current.sulphur_dioxide,
            ozone: current.ozone,
        })
    }

    pub fn bucket(&self) -> AqiBucket {
        self.scale.bucket(self.index)
    }

    /// Labelled pollutant values in display order.
    pub fn pollutants(&self) -> [(&'static str, f64); 6] {
        [
            ("PM10", self.pm10),
            ("PM2.5", self.pm2_5),
            ("Carbon Monoxide", self.carbon_monoxide),
            ("Nitrogen Dioxide", self.nitrogen_dioxide),
            ("Sulphur Dioxide", self.sulphur_dioxide),
            ("Ozone", self.ozone),
        ]
    }
}

/// Where the coordinator is in its refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Phase {
    #[default]
    Idle,
    RequestingAuthorization,
    AcquiringLocation,
    RetryingAfterTransientError,
    /// Geocoding and the air-quality fetch are running off the same fix.
    Resolving,
    Settled,
}

/// Observable state published by the coordinator.
///
/// `status` is empty exactly when the latest fetch succeeded; `is_loading`
/// holds from the start of a refresh until its first terminal outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub status: String,
    pub is_loading: bool,
    pub phase: Phase,
    pub location: Option<LocationFix>,
    pub reading: Option<AirQualityReading>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub const STATUS_INITIAL: &str = "Fetching location and air quality...";

impl Default for SessionState {
    fn default() -> Self {
        Self {
            status: STATUS_INITIAL.to_string(),
            is_loading: false,
            phase: Phase::Idle,
            location: None,
            reading: None,
            updated_at: None,
        }
    }
}
