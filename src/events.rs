//! Event types and the channel that serializes them into the coordinator.
//!
//! This module defines the [`Event`] enum (refresh requests, authorization
//! changes, location updates, retry timers, geocoding and air-quality
//! results) and the [`EventChannel`] the coordinator drains. Background
//! tasks never touch session state directly: they post an event stamped
//! with the [`Generation`] of the refresh cycle that spawned them, and the
//! coordinator drops events from superseded cycles.

use crate::error::{FetchError, GeocodeError, LocationError};
use crate::location::AuthorizationStatus;
use crate::models::{AirQualityReading, Placemark, Position};
use tokio::sync::mpsc;

/// Identifies one refresh cycle. Strictly increases with every refresh.
pub type Generation = u64;

/// Events processed by the coordinator loop.
#[derive(Debug)]
pub enum Event {
    /// Start a new refresh cycle, superseding any in flight.
    Refresh,
    /// Result of asking the user for location permission.
    AuthorizationChanged {
        generation: Generation,
        status: AuthorizationStatus,
    },
    /// A batch of positions (or a failure) from the location service.
    LocationUpdate {
        generation: Generation,
        result: Result<Vec<Position>, LocationError>,
    },
    /// The delay after a transient location error has elapsed.
    RetryDue { generation: Generation },
    Geocoded {
        generation: Generation,
        result: Result<Vec<Placemark>, GeocodeError>,
    },
    AirQuality {
        generation: Generation,
        result: Result<AirQualityReading, FetchError>,
    },
    /// Stop the coordinator loop.
    Shutdown,
}

impl Event {
    /// The cycle this event belongs to, or `None` for control events.
    pub fn generation(&self) -> Option<Generation> {
        match self {
            Event::Refresh | Event::Shutdown => None,
            Event::AuthorizationChanged { generation, .. }
            | Event::LocationUpdate { generation, .. }
            | Event::RetryDue { generation }
            | Event::Geocoded { generation, .. }
            | Event::AirQuality { generation, .. } => Some(*generation),
        }
    }
}

/// Unbounded channel feeding the coordinator.
///
/// The sender ([`tx`](EventChannel::tx)) is cloned into every background
/// task and into the [`CoordinatorHandle`](crate::coordinator::CoordinatorHandle);
/// the receiver is consumed by [`next`](EventChannel::next) in the
/// coordinator loop.
pub struct EventChannel {
    pub tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl EventChannel {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Receives the next event. Never returns `None` while the channel itself
    /// holds a sender, so the loop ends only on [`Event::Shutdown`].
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_tags() {
        assert_eq!(Event::Refresh.generation(), None);
        assert_eq!(Event::Shutdown.generation(), None);
        assert_eq!(Event::RetryDue { generation: 7 }.generation(), Some(7));
        let ev = Event::AirQuality {
            generation: 3,
            result: Err(FetchError::EmptyBody),
        };
        assert_eq!(ev.generation(), Some(3));
    }

    #[tokio::test]
    async fn test_channel_preserves_order() {
        let mut ch = EventChannel::new();
        ch.tx.send(Event::Refresh).unwrap();
        ch.tx.send(Event::RetryDue { generation: 1 }).unwrap();
        assert!(matches!(ch.next().await, Some(Event::Refresh)));
        assert!(matches!(ch.next().await, Some(Event::RetryDue { generation: 1 })));
    }
}
