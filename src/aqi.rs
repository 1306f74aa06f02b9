//! Air Quality Index scales and colour buckets.
//!
//! Open-Meteo reports either the European or the US index depending on which
//! key is requested. A deployment picks one [`AqiScale`]; the scale decides
//! both the query string sent to the API and how an index is bucketed.

use serde::{Deserialize, Serialize};

/// Pollutant keys requested alongside the index, in request order.
pub const POLLUTANT_KEYS: [&str; 6] = [
    "pm10",
    "pm2_5",
    "carbon_monoxide",
    "nitrogen_dioxide",
    "sulphur_dioxide",
    "ozone",
];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AqiScale {
    #[default]
    European,
    Us,
}

impl AqiScale {
    /// JSON key of the index inside the `current` block.
    pub fn aqi_key(self) -> &'static str {
        match self {
            AqiScale::European => "european_aqi",
            AqiScale::Us => "us_aqi",
        }
    }

    /// Comma-separated value of the `current` query parameter.
    pub fn current_params(self) -> String {
        std::iter::once(self.aqi_key())
            .chain(POLLUTANT_KEYS)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Maps an index value onto its colour bucket.
    ///
    /// The European scale tops out at [`AqiBucket::Purple`]; the US scale adds
    /// [`AqiBucket::Maroon`] for anything above 300.
    pub fn bucket(self, index: u16) -> AqiBucket {
        match index {
            0..=50 => AqiBucket::Green,
            51..=100 => AqiBucket::Yellow,
            101..=150 => AqiBucket::Orange,
            151..=200 => AqiBucket::Red,
            201..=300 => AqiBucket::Purple,
            _ => match self {
                AqiScale::European => AqiBucket::Purple,
                AqiScale::Us => AqiBucket::Maroon,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AqiBucket {
    Green,
    Yellow,
    Orange,
    Red,
    Purple,
    Maroon,
}

impl AqiBucket {
    pub fn label(self) -> &'static str {
        match self {
            AqiBucket::Green => "Good",
            AqiBucket::Yellow => "Moderate",
            AqiBucket::Orange => "Unhealthy for Sensitive Groups",
            AqiBucket::Red => "Unhealthy",
            AqiBucket::Purple => "Very Unhealthy",
            AqiBucket::Maroon => "Hazardous",
        }
    }

    pub fn hex(self) -> &'static str {
        match self {
            AqiBucket::Green => "#00E400",
            AqiBucket::Yellow => "#FFFF00",
            AqiBucket::Orange => "#FF7E00",
            AqiBucket::Red => "#FF0000",
            AqiBucket::Purple => "#8F3F97",
            AqiBucket::Maroon => "#800000",
        }
    }
}
