//! HTTP client for an ephemeris engine service.
//!
//! `POST {base_url}/chart` with the birth moment, place and frame; the engine
//! answers with a [`ChartPositions`] document.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::{ChartPositions, ChartRequest, EphemerisEngine, ReferenceFrame};
use crate::config::EphemerisConfig;
use crate::error::UpstreamError;

#[derive(Debug, Serialize)]
struct ChartQuery<'a> {
    /// YYYY-MM-DD
    date: String,
    /// HH:MM
    time: String,
    latitude: f64,
    longitude: f64,
    timezone: &'a str,
    zodiac: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sidereal_mode: Option<&'static str>,
}

impl<'a> From<&'a ChartRequest> for ChartQuery<'a> {
    fn from(req: &'a ChartRequest) -> Self {
        let (zodiac, sidereal_mode) = match req.frame {
            ReferenceFrame::Tropical => ("tropical", None),
            ReferenceFrame::Sidereal(model) => ("sidereal", Some(model.engine_code())),
        };
        Self {
            date: req.local.format("%Y-%m-%d").to_string(),
            time: req.local.format("%H:%M").to_string(),
            latitude: req.latitude,
            longitude: req.longitude,
            timezone: &req.timezone,
            zodiac,
            sidereal_mode,
        }
    }
}

/// Ephemeris engine reached over HTTP.
#[derive(Clone)]
pub struct HttpEphemeris {
    http: reqwest::Client,
    base_url: String,
}

impl HttpEphemeris {
    pub fn new(config: &EphemerisConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl EphemerisEngine for HttpEphemeris {
    async fn chart(&self, request: &ChartRequest) -> Result<ChartPositions, UpstreamError> {
        let query = ChartQuery::from(request);
        debug!(zodiac = query.zodiac, date = %query.date, time = %query.time, "Requesting chart");

        let resp = self
            .http
            .post(format!("{}/chart", self.base_url))
            .json(&query)
            .send()
            .await
            .map_err(|e| UpstreamError::Ephemeris(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(UpstreamError::Ephemeris(format!(
                "engine returned status {}",
                resp.status()
            )));
        }

        let chart: ChartPositions = resp
            .json()
            .await
            .map_err(|e| UpstreamError::Ephemeris(format!("malformed chart: {e}")))?;
        chart.validate()?;
        Ok(chart)
    }

    fn engine_name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ephemeris::SiderealModel;

    fn request(frame: ReferenceFrame) -> ChartRequest {
        ChartRequest {
            local: chrono::NaiveDate::from_ymd_opt(1990, 6, 15)
                .unwrap()
                .and_hms_opt(9, 5, 0)
                .unwrap(),
            latitude: 52.52,
            longitude: 13.4,
            timezone: "Europe/Berlin".to_string(),
            frame,
        }
    }

    #[test]
    fn test_tropical_query_omits_model() {
        let req = request(ReferenceFrame::Tropical);
        let json = serde_json::to_value(ChartQuery::from(&req)).unwrap();
        assert_eq!(json["zodiac"], "tropical");
        assert_eq!(json["time"], "09:05");
        assert!(json.get("sidereal_mode").is_none());
    }

    #[test]
    fn test_sidereal_query_names_model() {
        let req = request(ReferenceFrame::Sidereal(SiderealModel::Lahiri));
        let json = serde_json::to_value(ChartQuery::from(&req)).unwrap();
        assert_eq!(json["zodiac"], "sidereal");
        assert_eq!(json["sidereal_mode"], "LAHIRI");
        assert_eq!(json["date"], "1990-06-15");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = EphemerisConfig {
            base_url: "http://engine:8088/".to_string(),
            ..EphemerisConfig::default()
        };
        let engine = HttpEphemeris::new(&config).unwrap();
        assert_eq!(engine.base_url(), "http://engine:8088");
    }
}
