use crate::aqi::AqiScale;
use crate::coordinator::CoordinatorSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::{info, warn};

pub const CONFIG_ENV: &str = "AIRBAR_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub location: LocationConfig,
    pub air_quality: AirQualityConfig,
    pub geocoding: GeocodingConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    Ip,
    Manual,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LocationConfig {
    pub source: LocationSource,
    pub manual_lat: f64,        // Used if source is "manual"
    pub manual_lon: f64,        // Used if source is "manual"
    pub lookup_ip: String,      // Empty means our own public address
    pub desired_accuracy_m: f64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AirQualityConfig {
    pub base_url: String,
    pub scale: AqiScale,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GeocodingConfig {
    pub enabled: bool,
    pub base_url: String,
    pub user_agent: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            source: LocationSource::Ip,
            manual_lat: 37.7749,
            manual_lon: -122.4194,
            lookup_ip: String::new(),
            desired_accuracy_m: 100.0,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for AirQualityConfig {
    fn default() -> Self {
        Self {
            base_url: crate::api::OPEN_METEO_URL.to_string(),
            scale: AqiScale::European,
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: crate::geocode::NOMINATIM_URL.to_string(),
            user_agent: concat!("airbar/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl LocationConfig {
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            desired_accuracy_m: self.desired_accuracy_m,
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

impl Config {
    /// Loads `config.toml` (or the file named by `AIRBAR_CONFIG`).
    /// Missing or malformed files fall back to defaults; nothing is written back.
    pub fn load() -> Self {
        let config_path =
            std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        match fs::read_to_string(&config_path) {
            Ok(content) => match Self::from_toml_str(&content) {
                Ok(config) => {
                    info!("Loaded configuration from {}.", config_path);
                    return config;
                }
                Err(e) => warn!("Failed to parse {}: {}. Using defaults.", config_path, e),
            },
            Err(_) => info!("No {} found. Using defaults.", config_path),
        }

        Config::default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
