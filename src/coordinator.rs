//! The refresh pipeline: location, reverse geocoding and air quality.
//!
//! [`LocationCoordinator`] is an actor. It owns the [`SessionState`] and is
//! the only code that mutates it; location, geocoding and HTTP work runs in
//! spawned tasks that report back as [`Event`]s. A cycle moves through
//! `Idle -> RequestingAuthorization -> AcquiringLocation -> Resolving -> Settled`,
//! looping through `RetryingAfterTransientError` on transient location errors.
//! The air-quality outcome settles a cycle; a geocode that lands later only
//! fills in the place name or the status line.
//!
//! Each refresh bumps the [`Generation`] and aborts the previous cycle's
//! tasks. Anything that still arrives tagged with an older generation is
//! discarded, so the last refresh always wins.

use crate::api::AirQualitySource;
use crate::error::{FetchError, GeocodeError, LocationError};
use crate::events::{Event, EventChannel, Generation};
use crate::geocode::Geocoder;
use crate::location::{AuthorizationStatus, LocationService};
use crate::models::{AirQualityReading, LocationFix, Phase, Placemark, Position, SessionState};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const STATUS_FETCHING_LOCATION: &str = "Fetching location...";
pub const STATUS_SERVICES_DISABLED: &str = "Location services are disabled";
pub const STATUS_ACCESS_DENIED: &str = "Location access denied. Please enable in Settings.";
pub const STATUS_UNKNOWN_AUTHORIZATION: &str = "Unknown authorization status";
pub const STATUS_LOCATION_UPDATED: &str = "Location updated, fetching air quality...";
pub const STATUS_RETRIES_EXHAUSTED: &str =
    "Unable to fetch location after several attempts. Please try again later.";
pub const STATUS_NO_PLACEMARK: &str = "No placemark found";

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Accuracy target passed to the location service, in meters.
    pub desired_accuracy_m: f64,
    /// How many times a transient location error is retried.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            desired_accuracy_m: 100.0,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

pub struct LocationCoordinator {
    location: Arc<dyn LocationService>,
    geocoder: Option<Arc<dyn Geocoder>>,
    air_quality: Arc<dyn AirQualitySource>,
    settings: CoordinatorSettings,

    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    events: EventChannel,

    generation: Generation,
    retry_count: u32,
    authorization_requested: bool,
    tasks: Vec<JoinHandle<()>>,
}

/// Cloneable front door to a running coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Event>,
    state: watch::Receiver<SessionState>,
}

impl CoordinatorHandle {
    /// Starts a new refresh cycle. Returns `false` if the coordinator has stopped.
    pub fn refresh(&self) -> bool {
        self.tx.send(Event::Refresh).is_ok()
    }

    /// Snapshot of the current session state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Event::Shutdown);
    }
}

impl LocationCoordinator {
    /// Builds a coordinator. Pass `None` as `geocoder` to skip place names.
    pub fn new(
        location: Arc<dyn LocationService>,
        geocoder: Option<Arc<dyn Geocoder>>,
        air_quality: Arc<dyn AirQualitySource>,
        settings: CoordinatorSettings,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::default());
        Self {
            location,
            geocoder,
            air_quality,
            settings,
            state: SessionState::default(),
            state_tx,
            events: EventChannel::new(),
            generation: 0,
            retry_count: 0,
            authorization_requested: false,
            tasks: Vec::new(),
        }
    }

    /// Moves the coordinator onto its own task and returns a handle to it.
    pub fn spawn(self) -> (CoordinatorHandle, JoinHandle<()>) {
        let handle = CoordinatorHandle {
            tx: self.events.tx.clone(),
            state: self.state_tx.subscribe(),
        };
        let join = tokio::spawn(self.run());
        (handle, join)
    }

    async fn run(mut self) {
        while let Some(event) = self.events.next().await {
            if !self.handle_event(event) {
                break;
            }
        }
        self.cancel_in_flight();
        self.location.stop_updates();
        info!("Coordinator stopped.");
    }

    /// Applies one event. Returns `false` once the loop should stop.
    fn handle_event(&mut self, event: Event) -> bool {
        if let Some(generation) = event.generation() {
            if generation != self.generation {
                debug!(
                    "Dropping stale event from cycle {} (current {})",
                    generation, self.generation
                );
                return true;
            }
        }

        match event {
            Event::Refresh => self.start(),
            Event::AuthorizationChanged { status, .. } => self.check_authorization(status),
            Event::LocationUpdate { result, .. } => match result {
                Ok(positions) => self.on_positions(positions),
                Err(e) => self.on_location_error(e),
            },
            Event::RetryDue { .. } => self.begin_acquisition(),
            Event::Geocoded { result, .. } => self.on_geocoded(result),
            Event::AirQuality { result, .. } => self.on_air_quality(result),
            Event::Shutdown => return false,
        }

        self.state_tx.send_replace(self.state.clone());
        true
    }

    fn start(&mut self) {
        self.cancel_in_flight();
        self.location.stop_updates();

        self.generation += 1;
        self.retry_count = 0;
        self.authorization_requested = false;
        info!("Starting refresh cycle {}", self.generation);

        self.state.status = STATUS_FETCHING_LOCATION.to_string();
        self.state.is_loading = true;
        self.state.phase = Phase::Idle;

        if !self.location.services_enabled() {
            self.settle(STATUS_SERVICES_DISABLED);
            return;
        }
        self.check_authorization(self.location.authorization_status());
    }

    fn check_authorization(&mut self, status: AuthorizationStatus) {
        match status {
            AuthorizationStatus::Granted => self.begin_acquisition(),
            AuthorizationStatus::Denied | AuthorizationStatus::Restricted => {
                self.settle(STATUS_ACCESS_DENIED)
            }
            AuthorizationStatus::NotDetermined if !self.authorization_requested => {
                self.authorization_requested = true;
                self.state.phase = Phase::RequestingAuthorization;
                let location = self.location.clone();
                let generation = self.generation;
                self.spawn_task(async move {
                    Event::AuthorizationChanged {
                        generation,
                        status: location.request_authorization().await,
                    }
                });
            }
            AuthorizationStatus::NotDetermined | AuthorizationStatus::Unknown => {
                self.settle(STATUS_UNKNOWN_AUTHORIZATION)
            }
        }
    }

    fn begin_acquisition(&mut self) {
        self.state.phase = Phase::AcquiringLocation;
        self.location.start_updates(self.settings.desired_accuracy_m);
        self.await_next_update();
    }

    fn await_next_update(&mut self) {
        let location = self.location.clone();
        let generation = self.generation;
        self.spawn_task(async move {
            Event::LocationUpdate {
                generation,
                result: location.next_update().await,
            }
        });
    }

    fn on_positions(&mut self, positions: Vec<Position>) {
        let Some(position) = positions.last().copied() else {
            self.await_next_update();
            return;
        };
        self.location.stop_updates();
        info!(
            "Location fix ({}, {})",
            position.latitude, position.longitude
        );

        self.state.location = Some(LocationFix::from(position));
        self.state.status = STATUS_LOCATION_UPDATED.to_string();
        self.state.phase = Phase::Resolving;
        let generation = self.generation;

        if let Some(geocoder) = self.geocoder.clone() {
            self.spawn_task(async move {
                Event::Geocoded {
                    generation,
                    result: geocoder.reverse_geocode(position).await,
                }
            });
        }

        let air_quality = self.air_quality.clone();
        self.spawn_task(async move {
            Event::AirQuality {
                generation,
                result: air_quality
                    .fetch(position.latitude, position.longitude)
                    .await,
            }
        });
    }

    fn on_location_error(&mut self, error: LocationError) {
        self.location.stop_updates();

        if !error.is_transient() {
            warn!("Location error: {}", error);
            self.settle(&error.to_string());
            return;
        }

        if self.retry_count >= self.settings.max_retries {
            warn!("Giving up on location after {} retries", self.retry_count);
            self.settle(STATUS_RETRIES_EXHAUSTED);
            return;
        }

        self.retry_count += 1;
        info!(
            "Temporary location error, retry {}/{}",
            self.retry_count, self.settings.max_retries
        );
        self.state.phase = Phase::RetryingAfterTransientError;
        let delay = self.settings.retry_delay;
        let generation = self.generation;
        self.spawn_task(async move {
            tokio::time::sleep(delay).await;
            Event::RetryDue { generation }
        });
    }

    fn on_geocoded(&mut self, result: Result<Vec<Placemark>, GeocodeError>) {
        match result {
            Ok(placemarks) => match placemarks.first() {
                Some(placemark) => {
                    let name = placemark.display_name();
                    if let Some(fix) = self.state.location.as_mut() {
                        fix.name = Some(name).filter(|n| !n.is_empty());
                    }
                }
                None => self.state.status = STATUS_NO_PLACEMARK.to_string(),
            },
            Err(e) => {
                warn!("Reverse geocoding failed: {}", e);
                self.state.status = e.to_string();
            }
        }
    }

    fn on_air_quality(&mut self, result: Result<AirQualityReading, FetchError>) {
        self.state.is_loading = false;
        self.state.phase = Phase::Settled;
        match result {
            Ok(reading) => {
                info!("Air quality index {} ({})", reading.index, reading.bucket().label());
                self.state.reading = Some(reading);
                self.state.status.clear();
                self.state.updated_at = Some(Utc::now());
            }
            Err(e) => {
                warn!("Air quality fetch failed: {:?}", e);
                self.state.status = e.to_string();
            }
        }
    }

    fn settle(&mut self, status: &str) {
        self.state.status = status.to_string();
        self.state.is_loading = false;
        self.state.phase = Phase::Settled;
    }

    fn spawn_task<F>(&mut self, task: F)
    where
        F: Future<Output = Event> + Send + 'static,
    {
        self.tasks.retain(|t| !t.is_finished());
        let tx = self.events.tx.clone();
        self.tasks.push(tokio::spawn(async move {
            let _ = tx.send(task.await);
        }));
    }

    fn cancel_in_flight(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}
