//! Geolocation capture for staff checkout.
//!
//! Staff-created orders carry the state, display name and coordinates of the
//! person placing them. Coordinates come from a [`PositionSource`] (the
//! console's stand-in for an OS positioning service), then a
//! nominatim-compatible reverse geocoder turns them into an address. One
//! successful capture per session unlocks checkout; a denial blocks it until
//! a retry succeeds.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ClientConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LocationError {
    #[error("location access was denied; grant location permission and retry")]
    PermissionDenied,
    #[error("location information is unavailable; please try again")]
    PositionUnavailable,
    #[error("location request timed out; check your connection and try again")]
    Timeout,
    #[error("could not determine location details: {0}")]
    Geocode(String),
}

/// Where coordinates come from. Abstracted so tests and the console can
/// supply fixed positions instead of real hardware.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn current_position(&self) -> Result<Position, LocationError>;
}

/// Config-backed source. An absent position behaves exactly like a denied
/// permission, which is what the gate's retry affordance re-tests.
pub struct StaticPositionSource {
    position: Option<Position>,
}

impl StaticPositionSource {
    pub fn new(position: Option<Position>) -> Self {
        Self { position }
    }
}

#[async_trait]
impl PositionSource for StaticPositionSource {
    async fn current_position(&self) -> Result<Position, LocationError> {
        self.position.ok_or(LocationError::PermissionDenied)
    }
}

/// Captured location as attached to staff-created orders.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationData {
    pub state: String,
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ReverseGeocodeResponse {
    #[serde(default)]
    address: ReverseGeocodeAddress,
    #[serde(default)]
    display_name: Option<String>,
    lat: String,
    lon: String,
}

#[derive(Debug, Default, Deserialize)]
struct ReverseGeocodeAddress {
    #[serde(default)]
    state: Option<String>,
}

pub struct GeoLocator {
    http: reqwest::Client,
    source: Arc<dyn PositionSource>,
    geocoder_url: Url,
    timeout: Duration,
}

impl GeoLocator {
    pub fn from_config(config: &ClientConfig) -> crate::error::Result<Self> {
        let source = Arc::new(StaticPositionSource::new(config.position));
        Self::new(config, source)
    }

    pub fn new(
        config: &ClientConfig,
        source: Arc<dyn PositionSource>,
    ) -> crate::error::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.geocoder_timeout)
            .build()?;
        Ok(Self {
            http,
            source,
            geocoder_url: config.geocoder_url.clone(),
            timeout: config.geocoder_timeout,
        })
    }

    /// One full capture: bounded wait on the position source, then a reverse
    /// geocode. A missing state in the geocoder's answer is a capture
    /// failure, not a partial success.
    pub async fn capture(&self) -> Result<LocationData, LocationError> {
        let position = tokio::time::timeout(self.timeout, self.source.current_position())
            .await
            .map_err(|_| LocationError::Timeout)??;

        let url = format!(
            "{}/reverse?lat={}&lon={}&format=json",
            self.geocoder_url.as_str().trim_end_matches('/'),
            position.latitude,
            position.longitude
        );
        let response = self.http.get(&url).send().await.map_err(|error| {
            if error.is_timeout() {
                LocationError::Timeout
            } else {
                LocationError::Geocode(error.to_string())
            }
        })?;
        if !response.status().is_success() {
            return Err(LocationError::Geocode(format!(
                "geocoder answered {}",
                response.status()
            )));
        }
        let body: ReverseGeocodeResponse = response
            .json()
            .await
            .map_err(|error| LocationError::Geocode(error.to_string()))?;

        let state = body
            .address
            .state
            .filter(|state| !state.is_empty())
            .ok_or_else(|| {
                LocationError::Geocode("geocoder response carries no state".to_string())
            })?;
        let display_name = body.display_name.unwrap_or_else(|| state.clone());

        let latitude = body
            .lat
            .parse::<f64>()
            .map_err(|_| LocationError::Geocode(format!("unparseable latitude {:?}", body.lat)))?;
        let longitude = body.lon.parse::<f64>().map_err(|_| {
            LocationError::Geocode(format!("unparseable longitude {:?}", body.lon))
        })?;

        let data = LocationData {
            state,
            display_name,
            latitude: round_coordinate(latitude),
            longitude: round_coordinate(longitude),
        };
        debug!(state = %data.state, "location captured");
        Ok(data)
    }
}

/// The backend stores coordinates with 5 decimal places; round before
/// attaching so the payload matches what it keeps.
fn round_coordinate(coordinate: f64) -> f64 {
    (coordinate * 100_000.0).round() / 100_000.0
}

/// Session-scoped permission gate: the first successful capture is kept and
/// reused; failures leave the gate closed with a retryable error.
pub struct LocationGate {
    locator: GeoLocator,
    granted: Mutex<Option<LocationData>>,
}

impl LocationGate {
    pub fn new(locator: GeoLocator) -> Self {
        Self {
            locator,
            granted: Mutex::new(None),
        }
    }

    pub fn is_granted(&self) -> bool {
        self.granted.lock().is_some()
    }

    /// Returns the session's captured location, capturing one first if
    /// needed. This is the retry affordance: call again after a denial.
    pub async fn ensure_granted(&self) -> Result<LocationData, LocationError> {
        if let Some(data) = self.granted.lock().clone() {
            return Ok(data);
        }
        match self.locator.capture().await {
            Ok(data) => {
                *self.granted.lock() = Some(data.clone());
                Ok(data)
            }
            Err(error) => {
                warn!(error = %error, "location capture failed; checkout stays blocked");
                Err(error)
            }
        }
    }

    /// Dropped on logout so the next session asks again.
    pub fn reset(&self) {
        *self.granted.lock() = None;
    }
}
