use airbar::{
    api::AirQualityClient,
    config::{Config, LocationSource},
    coordinator::LocationCoordinator,
    geocode::{Geocoder, NominatimGeocoder},
    location::{FixedLocationService, IpLocationService, LocationService},
    logging,
    models::{Phase, Position, SessionState},
};
use color_eyre::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = logging::initialize_logging("logs");
    color_eyre::install()?;

    let config = Config::load();

    let location: Arc<dyn LocationService> = match config.location.source {
        LocationSource::Ip => Arc::new(IpLocationService::new(config.location.lookup_ip.clone())),
        LocationSource::Manual => Arc::new(FixedLocationService::new(Position::new(
            config.location.manual_lat,
            config.location.manual_lon,
        ))),
    };
    let geocoder: Option<Arc<dyn Geocoder>> = if config.geocoding.enabled {
        Some(Arc::new(NominatimGeocoder::new(
            config.geocoding.base_url.clone(),
            config.geocoding.user_agent.clone(),
        )))
    } else {
        None
    };
    let air_quality = Arc::new(AirQualityClient::new(
        config.air_quality.base_url.clone(),
        config.air_quality.scale,
    ));

    let coordinator = LocationCoordinator::new(
        location,
        geocoder,
        air_quality,
        config.location.coordinator_settings(),
    );
    let (handle, join) = coordinator.spawn();
    let mut updates = handle.subscribe();

    println!("airbar: press Enter (or 'r') to refresh, 'q' to quit.");
    handle.refresh();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    // Once stdin closes, exit after the next settled state is shown.
    let mut stdin_open = true;
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if state.phase == Phase::Settled {
                    println!("{}", summary(&state));
                    if !stdin_open {
                        break;
                    }
                }
            }
            line = lines.next_line(), if stdin_open => {
                match Command::parse(line?.as_deref()) {
                    Command::Refresh => {
                        handle.refresh();
                    }
                    Command::Quit => break,
                    Command::Closed => {
                        info!("stdin closed; showing the current refresh and exiting.");
                        stdin_open = false;
                        let state = updates.borrow();
                        if state.phase == Phase::Settled && !state.is_loading {
                            break;
                        }
                    }
                    Command::Unknown(other) => println!("Unknown command '{}'", other),
                }
            }
        }
    }

    info!("Quitting.");
    handle.shutdown();
    join.await?;
    Ok(())
}

#[derive(Debug, PartialEq)]
enum Command {
    Refresh,
    Quit,
    /// stdin reached EOF.
    Closed,
    Unknown(String),
}

impl Command {
    fn parse(line: Option<&str>) -> Self {
        match line.map(str::trim) {
            None => Command::Closed,
            Some("") | Some("r") => Command::Refresh,
            Some("q") => Command::Quit,
            Some(other) => Command::Unknown(other.to_string()),
        }
    }
}

fn summary(state: &SessionState) -> String {
    let mut out = String::new();
    let place = state
        .location
        .as_ref()
        .and_then(|l| l.name.clone())
        .unwrap_or_else(|| "Location".to_string());
    out.push_str(&place);

    if !state.status.is_empty() {
        out.push_str(&format!("\n  {}", state.status));
    }

    if let Some(reading) = &state.reading {
        let bucket = reading.bucket();
        out.push_str(&format!(
            "\n  Air Quality Index: {} ({})",
            reading.index,
            bucket.label()
        ));
        for (label, value) in reading.pollutants() {
            out.push_str(&format!("\n  {:<17}{:>8.2} µg/m³", label, value));
        }
    } else {
        out.push_str("\n  Waiting for air quality data...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eof_does_not_quit() {
        assert_eq!(Command::parse(None), Command::Closed);
        assert_ne!(Command::parse(None), Command::Quit);
    }

    #[test]
    fn test_commands() {
        assert_eq!(Command::parse(Some("")), Command::Refresh);
        assert_eq!(Command::parse(Some(" r \n")), Command::Refresh);
        assert_eq!(Command::parse(Some("q")), Command::Quit);
        assert_eq!(
            Command::parse(Some("x")),
            Command::Unknown("x".to_string())
        );
    }

    #[test]
    fn test_summary_shows_reading_and_status() {
        let state = SessionState {
            status: "Geocoding error: timed out".to_string(),
            phase: Phase::Settled,
            reading: Some(airbar::models::AirQualityReading {
                scale: airbar::aqi::AqiScale::Us,
                index: 120,
                pm10: 1.0,
                pm2_5: 2.0,
                carbon_monoxide: 3.0,
                nitrogen_dioxide: 4.0,
                sulphur_dioxide: 5.0,
                ozone: 6.0,
            }),
            ..Default::default()
        };
        let text = summary(&state);
        assert!(text.starts_with("Location\n  Geocoding error: timed out"));
        assert!(text.contains("Air Quality Index: 120 (Unhealthy for Sensitive Groups)"));
        assert!(text.contains("Ozone"));
    }
}
