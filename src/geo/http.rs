//! HTTP geocoding and timezone clients.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{GeocodedPlace, Geocoder, TimezoneResolver};
use crate::config::GeocodingConfig;
use crate::error::UpstreamError;

/// Nominatim search hit. Coordinates arrive as strings.
#[derive(Debug, Deserialize)]
struct NominatimHit {
    lat: String,
    lon: String,
    display_name: String,
}

/// Client for a Nominatim-compatible `/search` endpoint.
#[derive(Clone)]
pub struct NominatimGeocoder {
    http: reqwest::Client,
    url: String,
    language: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocodingConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            url: config.geocoder_url.clone(),
            language: config.language.clone(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, place: &str) -> Result<GeocodedPlace, UpstreamError> {
        let resp = self
            .http
            .get(&self.url)
            .query(&[
                ("q", place),
                ("format", "jsonv2"),
                ("limit", "1"),
                ("accept-language", self.language.as_str()),
            ])
            .send()
            .await
            .map_err(|e| UpstreamError::Geocoding(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(UpstreamError::Geocoding(format!(
                "geocoder returned status {}",
                resp.status()
            )));
        }

        let hits: Vec<NominatimHit> = resp
            .json()
            .await
            .map_err(|e| UpstreamError::Geocoding(format!("malformed response: {e}")))?;

        let hit = hits
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::PlaceNotFound(place.to_string()))?;

        parse_hit(hit)
    }
}

fn parse_hit(hit: NominatimHit) -> Result<GeocodedPlace, UpstreamError> {
    let coord = |raw: &str| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| UpstreamError::Geocoding(format!("unparseable coordinate '{raw}'")))
    };
    Ok(GeocodedPlace {
        latitude: coord(&hit.lat)?,
        longitude: coord(&hit.lon)?,
        display_name: hit.display_name,
    })
}

#[derive(Debug, Deserialize)]
struct TimezoneAnswer {
    #[serde(default)]
    timezone: Option<String>,
}

/// Client for a timezone lookup service: `GET {url}?lat=..&lon=..`
/// answering `{"timezone": "Europe/Berlin"}` or `{"timezone": null}`.
#[derive(Clone)]
pub struct HttpTimezoneResolver {
    http: reqwest::Client,
    url: String,
}

impl HttpTimezoneResolver {
    pub fn new(config: &GeocodingConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            url: config.timezone_url.clone(),
        })
    }
}

#[async_trait]
impl TimezoneResolver for HttpTimezoneResolver {
    async fn timezone_at(&self, latitude: f64, longitude: f64) -> Result<Option<String>, UpstreamError> {
        let resp = self
            .http
            .get(&self.url)
            .query(&[("lat", latitude), ("lon", longitude)])
            .send()
            .await
            .map_err(|e| UpstreamError::Timezone(e.to_string()))?;

        match resp.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let answer: TimezoneAnswer = resp
                    .json()
                    .await
                    .map_err(|e| UpstreamError::Timezone(format!("malformed response: {e}")))?;
                Ok(answer.timezone.filter(|tz| !tz.trim().is_empty()))
            }
            status => Err(UpstreamError::Timezone(format!(
                "timezone service returned status {status}"
            ))),
        }
    }
}
