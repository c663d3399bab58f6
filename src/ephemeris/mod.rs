//! Ephemeris Engine Module
//!
//! The planetary-position computation itself lives in an external engine.
//! This module owns the typed contract with it: what is asked for
//! ([`ChartRequest`]) and what comes back ([`ChartPositions`]).
//!
//! ## Contract
//!
//! For one local birth moment, place and reference frame the engine returns
//! sign code, degree-within-sign and absolute ecliptic longitude for the Sun,
//! Moon, Ascendant and the ten classifier bodies. The mean lunar node is
//! optional and modelled as such. Identical requests give identical answers,
//! so callers never retry.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::UpstreamError;

mod http;
pub use http::HttpEphemeris;

/// Unified trait for ephemeris backends
#[async_trait]
pub trait EphemerisEngine: Send + Sync {
    /// Compute body positions for one moment in one reference frame.
    async fn chart(&self, request: &ChartRequest) -> Result<ChartPositions, UpstreamError>;

    /// Backend name for logging
    fn engine_name(&self) -> &'static str;
}

/// Query the engine, giving up after `timeout_secs`. Never retried.
pub async fn chart_within(
    engine: &dyn EphemerisEngine,
    request: &ChartRequest,
    timeout_secs: u64,
) -> Result<ChartPositions, UpstreamError> {
    match tokio::time::timeout(Duration::from_secs(timeout_secs), engine.chart(request)).await {
        Ok(result) => result,
        Err(_) => Err(UpstreamError::Timeout {
            service: "ephemeris engine",
            secs: timeout_secs,
        }),
    }
}

// ============================================================================
// Request
// ============================================================================

/// Named sidereal offset (ayanamsa) model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SiderealModel {
    #[default]
    Lahiri,
    FaganBradley,
    Raman,
    Krishnamurti,
}

impl SiderealModel {
    /// Identifier understood by the engine.
    pub const fn engine_code(self) -> &'static str {
        match self {
            SiderealModel::Lahiri => "LAHIRI",
            SiderealModel::FaganBradley => "FAGAN_BRADLEY",
            SiderealModel::Raman => "RAMAN",
            SiderealModel::Krishnamurti => "KRISHNAMURTI",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            SiderealModel::Lahiri => "Lahiri",
            SiderealModel::FaganBradley => "Fagan-Bradley",
            SiderealModel::Raman => "Raman",
            SiderealModel::Krishnamurti => "Krishnamurti",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceFrame {
    Tropical,
    Sidereal(SiderealModel),
}

impl ReferenceFrame {
    pub fn is_sidereal(&self) -> bool {
        matches!(self, ReferenceFrame::Sidereal(_))
    }
}

/// One chart request: local wall-clock moment plus place.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRequest {
    /// Local time at the birth place
    pub local: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    /// IANA timezone id the local time is expressed in
    pub timezone: String,
    pub frame: ReferenceFrame,
}

impl ChartRequest {
    /// Same moment and place in another frame.
    pub fn in_frame(&self, frame: ReferenceFrame) -> Self {
        Self {
            frame,
            ..self.clone()
        }
    }

    /// Same place, frame and wall-clock time, `days` calendar days earlier.
    pub fn days_earlier(&self, days: i64) -> Self {
        Self {
            local: self.local - chrono::Duration::days(days),
            ..self.clone()
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// Raw position of one body as reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyPosition {
    /// Engine sign code, e.g. "Ari"
    pub sign: String,
    /// Degree within the sign, [0, 30)
    pub degree: f64,
    /// Absolute ecliptic longitude, [0, 360)
    pub longitude: f64,
}

/// Full chart for one moment and frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPositions {
    pub sun: BodyPosition,
    pub moon: BodyPosition,
    pub ascendant: BodyPosition,
    pub mercury: BodyPosition,
    pub venus: BodyPosition,
    pub mars: BodyPosition,
    pub jupiter: BodyPosition,
    pub saturn: BodyPosition,
    pub uranus: BodyPosition,
    pub neptune: BodyPosition,
    pub pluto: BodyPosition,
    /// Not every engine configuration reports the node
    #[serde(default)]
    pub mean_node: Option<BodyPosition>,
}

impl ChartPositions {
    /// Bodies that activate gates: Sun through Pluto, plus the mean node
    /// when reported. The Ascendant is not one of them.
    pub fn activation_bodies(&self) -> Vec<&BodyPosition> {
        let mut bodies = vec![
            &self.sun,
            &self.moon,
            &self.mercury,
            &self.venus,
            &self.mars,
            &self.jupiter,
            &self.saturn,
            &self.uranus,
            &self.neptune,
            &self.pluto,
        ];
        if let Some(node) = &self.mean_node {
            bodies.push(node);
        }
        bodies
    }

    /// Reject answers no stage could use.
    pub fn validate(&self) -> Result<(), UpstreamError> {
        let mut all = self.activation_bodies();
        all.push(&self.ascendant);
        for body in all {
            if !body.longitude.is_finite() || !body.degree.is_finite() {
                return Err(UpstreamError::Ephemeris(format!(
                    "non-finite position reported for sign {}",
                    body.sign
                )));
            }
            if !(0.0..360.0).contains(&body.longitude) || !(0.0..30.0).contains(&body.degree) {
                return Err(UpstreamError::Ephemeris(format!(
                    "position out of range: longitude {} degree {}",
                    body.longitude, body.degree
                )));
            }
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::body;
    use super::*;

    fn chart(node: Option<BodyPosition>) -> ChartPositions {
        let b = body("Gem", 84.5);
        ChartPositions {
            sun: b.clone(),
            moon: b.clone(),
            ascendant: body("Lib", 190.0),
            mercury: b.clone(),
            venus: b.clone(),
            mars: b.clone(),
            jupiter: b.clone(),
            saturn: b.clone(),
            uranus: b.clone(),
            neptune: b.clone(),
            pluto: b,
            mean_node: node,
        }
    }

    #[test]
    fn test_days_earlier_crosses_year() {
        let req = ChartRequest {
            local: chrono::NaiveDate::from_ymd_opt(1990, 2, 15)
                .unwrap()
                .and_hms_opt(8, 15, 0)
                .unwrap(),
            latitude: 52.52,
            longitude: 13.405,
            timezone: "Europe/Berlin".into(),
            frame: ReferenceFrame::Tropical,
        };
        let design = req.days_earlier(88);
        assert_eq!(design.local.date(), chrono::NaiveDate::from_ymd_opt(1989, 11, 19).unwrap());
        assert_eq!(design.local.time(), req.local.time());
        assert_eq!(design.timezone, req.timezone);
    }

    #[test]
    fn test_activation_bodies_include_node_only_when_present() {
        assert_eq!(chart(None).activation_bodies().len(), 10);
        assert_eq!(chart(Some(body("Aqu", 300.0))).activation_bodies().len(), 11);
    }

    #[test]
    fn test_missing_node_deserializes_as_absent() {
        let mut json = serde_json::to_value(chart(None)).unwrap();
        json.as_object_mut().unwrap().remove("mean_node");
        let parsed: ChartPositions = serde_json::from_value(json).unwrap();
        assert!(parsed.mean_node.is_none());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut c = chart(None);
        assert!(c.validate().is_ok());
        c.moon.longitude = 360.0;
        assert!(c.validate().is_err());
        c.moon.longitude = f64::NAN;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_request_rebinding() {
        let local = chrono::NaiveDate::from_ymd_opt(1990, 6, 15)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        let req = ChartRequest {
            local,
            latitude: 49.68,
            longitude: 8.62,
            timezone: "Europe/Berlin".into(),
            frame: ReferenceFrame::Tropical,
        };
        let sid = req.in_frame(ReferenceFrame::Sidereal(SiderealModel::Lahiri));
        assert!(sid.frame.is_sidereal());
        assert_eq!(sid.local, req.local);
    }
}
