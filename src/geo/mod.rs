//! Place resolution
//!
//! Turns a free-text birth place into a [`GeoFix`] using two external
//! collaborators: a [`Geocoder`] (place -> coordinates) and a
//! [`TimezoneResolver`] (coordinates -> IANA zone).
//!
//! [`GeoResolver`] wraps both with:
//! - a process-wide cache keyed by the trimmed, lowercased place string
//!   (entries never expire; coordinates of a place do not change)
//! - a bound on every call
//! - retries for transient failures only; "not found" is final

use async_trait::async_trait;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::GeocodingConfig;
use crate::error::{InputError, StageError, UpstreamError};
use crate::stages::round_to;
use crate::types::GeoFix;

mod http;
pub use http::{HttpTimezoneResolver, NominatimGeocoder};

/// A geocoder hit.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedPlace {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Look up a place. `PlaceNotFound` when the service has no match.
    async fn geocode(&self, place: &str) -> Result<GeocodedPlace, UpstreamError>;
}

#[async_trait]
pub trait TimezoneResolver: Send + Sync {
    /// IANA timezone at the given coordinates, `None` when unresolved
    /// (e.g. open sea).
    async fn timezone_at(&self, latitude: f64, longitude: f64) -> Result<Option<String>, UpstreamError>;
}

/// Cache key for a place string.
pub fn normalize_place(place: &str) -> String {
    place.trim().to_lowercase()
}

/// Cached, bounded, retrying place resolver shared by all pipeline runs.
pub struct GeoResolver {
    geocoder: Arc<dyn Geocoder>,
    timezones: Arc<dyn TimezoneResolver>,
    cache: DashMap<String, GeoFix>,
    timeout_secs: u64,
    max_attempts: u32,
    backoff: Duration,
}

impl GeoResolver {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        timezones: Arc<dyn TimezoneResolver>,
        config: &GeocodingConfig,
    ) -> Self {
        Self {
            geocoder,
            timezones,
            cache: DashMap::new(),
            timeout_secs: config.timeout_secs,
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Resolve a place to coordinates and timezone.
    pub async fn resolve(&self, place: &str) -> Result<GeoFix, StageError> {
        let key = normalize_place(place);
        if key.is_empty() {
            return Err(InputError::EmptyPlace.into());
        }

        let hit = self.cache.get(&key).map(|entry| entry.value().clone());
        if let Some(fix) = hit {
            debug!(place = %place, "Geocoding cache hit");
            return Ok(fix);
        }

        let query = place.trim();
        let found = self
            .with_retry("geocoder", || self.geocoder.geocode(query))
            .await?;

        let (lat, lon) = (found.latitude, found.longitude);
        let timezone = self
            .with_retry("timezone resolver", || self.timezones.timezone_at(lat, lon))
            .await?
            .ok_or_else(|| UpstreamError::TimezoneUnresolved {
                place: query.to_string(),
                latitude: lat,
                longitude: lon,
            })?;

        let fix = GeoFix {
            latitude: round_to(lat, 4),
            longitude: round_to(lon, 4),
            timezone,
            display_name: found.display_name,
        };

        // Two runs racing on the same key write equal values.
        self.cache.insert(key, fix.clone());
        info!(
            place = %query,
            latitude = fix.latitude,
            longitude = fix.longitude,
            timezone = %fix.timezone,
            "Place resolved"
        );
        Ok(fix)
    }

    /// Number of cached places.
    pub fn cached_places(&self) -> usize {
        self.cache.len()
    }

    async fn with_retry<T, F, Fut>(&self, service: &'static str, mut call: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut attempt = 1;
        loop {
            let outcome = match tokio::time::timeout(Duration::from_secs(self.timeout_secs), call()).await {
                Ok(result) => result,
                Err(_) => Err(UpstreamError::Timeout {
                    service,
                    secs: self.timeout_secs,
                }),
            };

            match outcome {
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(service, attempt, error = %e, "Transient upstream failure, retrying");
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
