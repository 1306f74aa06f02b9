//! Location services for the air quality monitor.
//!
//! The coordinator talks to a [`LocationService`], which mirrors the shape of
//! a platform location manager: an authorization status, a request for
//! permission, and a start/stop update session that streams positions.
//! Two implementations ship with the crate: [`IpLocationService`], which
//! geolocates via the public IP address, and [`FixedLocationService`], which
//! reports a configured coordinate.

use crate::error::LocationError;
use crate::models::Position;
use async_trait::async_trait;
use ipgeolocate::{Locator, Service};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

/// Permission state of the location service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    Granted,
    Denied,
    Restricted,
    NotDetermined,
    /// A status this crate does not know how to handle.
    Unknown,
}

#[async_trait]
pub trait LocationService: Send + Sync {
    /// Whether location services are switched on at all.
    fn services_enabled(&self) -> bool;

    fn authorization_status(&self) -> AuthorizationStatus;

    /// Asks the user for permission and resolves with the resulting status.
    async fn request_authorization(&self) -> AuthorizationStatus;

    /// Begins an update session targeting the given accuracy in meters.
    fn start_updates(&self, desired_accuracy_m: f64);

    /// Waits for the next batch of positions (oldest first) or an error.
    async fn next_update(&self) -> Result<Vec<Position>, LocationError>;

    fn stop_updates(&self);
}

/// Resolves the user's approximate location via IP geolocation.
///
/// Uses the [IpApi](https://ip-api.com/) service. An empty `lookup_ip`
/// geolocates the caller's own public address. IP geolocation needs no
/// permission, so authorization is always granted. Service failures are
/// reported as transient so the coordinator retries them.
pub struct IpLocationService {
    lookup_ip: String,
    active: AtomicBool,
}

impl IpLocationService {
    pub fn new(lookup_ip: impl Into<String>) -> Self {
        Self {
            lookup_ip: lookup_ip.into(),
            active: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl LocationService for IpLocationService {
    fn services_enabled(&self) -> bool {
        true
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        AuthorizationStatus::Granted
    }

    async fn request_authorization(&self) -> AuthorizationStatus {
        AuthorizationStatus::Granted
    }

    fn start_updates(&self, desired_accuracy_m: f64) {
        // IP lookups are city-level at best; the accuracy target is advisory.
        info!("Starting IP geolocation (target accuracy {}m)", desired_accuracy_m);
        self.active.store(true, Ordering::SeqCst);
    }

    async fn next_update(&self) -> Result<Vec<Position>, LocationError> {
        if !self.active.load(Ordering::SeqCst) {
            return Err(LocationError::Other("location updates not started".to_string()));
        }

        match Locator::get(&self.lookup_ip, Service::IpApi).await {
            Ok(loc) => {
                let lat = loc.latitude.parse::<f64>();
                let lon = loc.longitude.parse::<f64>();
                match (lat, lon) {
                    (Ok(lat), Ok(lon)) => {
                        info!("Geolocation successful - ({}, {})", lat, lon);
                        Ok(vec![Position::new(lat, lon)])
                    }
                    _ => {
                        error!(
                            "Geolocation returned unparsable coordinates: ({}, {})",
                            loc.latitude, loc.longitude
                        );
                        Err(LocationError::Other(
                            "geolocation returned invalid coordinates".to_string(),
                        ))
                    }
                }
            }
            Err(e) => {
                warn!("Error using geolocation service: {}", e);
                Err(LocationError::Transient)
            }
        }
    }

    fn stop_updates(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Always reports the same configured position.
pub struct FixedLocationService {
    position: Position,
}

impl FixedLocationService {
    pub fn new(position: Position) -> Self {
        Self { position }
    }
}

#[async_trait]
impl LocationService for FixedLocationService {
    fn services_enabled(&self) -> bool {
        true
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        AuthorizationStatus::Granted
    }

    async fn request_authorization(&self) -> AuthorizationStatus {
        AuthorizationStatus::Granted
    }

    fn start_updates(&self, _desired_accuracy_m: f64) {}

    async fn next_update(&self) -> Result<Vec<Position>, LocationError> {
        if self.position.is_valid() {
            Ok(vec![self.position])
        } else {
            Err(LocationError::Other(format!(
                "configured position ({}, {}) is out of range",
                self.position.latitude, self.position.longitude
            )))
        }
    }

    fn stop_updates(&self) {}
}
