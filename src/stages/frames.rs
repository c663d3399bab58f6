//! Frame calculator: Sun, Moon and Ascendant in the tropical and sidereal
//! reference frames.
//!
//! The sidereal stage queries the engine in both frames for the same moment
//! and derives the frame offset (ayanamsa) as tropical minus sidereal Sun
//! longitude.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::round_to;
use super::signs::{in_ophiuchus_zone, translate_sign};
use crate::ephemeris::{
    chart_within, BodyPosition, ChartPositions, ChartRequest, EphemerisEngine, ReferenceFrame,
    SiderealModel,
};
use crate::error::StageError;

/// Position of one body in one frame, rounded for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CelestialPosition {
    /// Domain sign name
    pub sign: String,
    /// Degree within the sign, 2 decimals
    pub degree: f64,
    /// Absolute ecliptic longitude, 2 decimals
    pub longitude: f64,
}

impl CelestialPosition {
    pub fn from_body(body: &BodyPosition) -> Self {
        Self {
            sign: translate_sign(&body.sign),
            degree: round_to(body.degree, 2),
            longitude: round_to(body.longitude, 2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TropicalChart {
    pub sun: CelestialPosition,
    pub moon: CelestialPosition,
    pub ascendant: CelestialPosition,
}

impl TropicalChart {
    pub fn from_chart(chart: &ChartPositions) -> Self {
        Self {
            sun: CelestialPosition::from_body(&chart.sun),
            moon: CelestialPosition::from_body(&chart.moon),
            ascendant: CelestialPosition::from_body(&chart.ascendant),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiderealPosition {
    #[serde(flatten)]
    pub position: CelestialPosition,
    /// Unrounded longitude falls in the 13th-sign zone
    pub is_ophiuchus: bool,
}

impl SiderealPosition {
    pub fn from_body(body: &BodyPosition) -> Self {
        Self {
            position: CelestialPosition::from_body(body),
            is_ophiuchus: in_ophiuchus_zone(body.longitude),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiderealChart {
    /// Tropical minus sidereal Sun longitude, 4 decimals
    pub ayanamsa: f64,
    pub model: String,
    pub sun: SiderealPosition,
    pub moon: SiderealPosition,
    pub ascendant: SiderealPosition,
}

impl SiderealChart {
    pub fn from_charts(sidereal: &ChartPositions, tropical: &ChartPositions, model: SiderealModel) -> Self {
        Self {
            ayanamsa: round_to(tropical.sun.longitude - sidereal.sun.longitude, 4),
            model: model.display_name().to_string(),
            sun: SiderealPosition::from_body(&sidereal.sun),
            moon: SiderealPosition::from_body(&sidereal.moon),
            ascendant: SiderealPosition::from_body(&sidereal.ascendant),
        }
    }

    /// Any of Sun, Moon or Ascendant in the 13th-sign zone.
    pub fn touches_ophiuchus(&self) -> bool {
        self.sun.is_ophiuchus || self.moon.is_ophiuchus || self.ascendant.is_ophiuchus
    }
}

/// Tropical stage: one engine query.
pub async fn tropical(
    engine: &dyn EphemerisEngine,
    request: &ChartRequest,
    timeout_secs: u64,
) -> Result<TropicalChart, StageError> {
    let chart = chart_within(engine, &request.in_frame(ReferenceFrame::Tropical), timeout_secs).await?;
    let result = TropicalChart::from_chart(&chart);
    info!(
        sun = %result.sun.sign,
        moon = %result.moon.sign,
        ascendant = %result.ascendant.sign,
        "Tropical chart computed"
    );
    Ok(result)
}

/// Sidereal stage: sidereal and tropical queries for the same moment.
pub async fn sidereal(
    engine: &dyn EphemerisEngine,
    request: &ChartRequest,
    model: SiderealModel,
    timeout_secs: u64,
) -> Result<SiderealChart, StageError> {
    let sid = chart_within(engine, &request.in_frame(ReferenceFrame::Sidereal(model)), timeout_secs).await?;
    let trop = chart_within(engine, &request.in_frame(ReferenceFrame::Tropical), timeout_secs).await?;
    let result = SiderealChart::from_charts(&sid, &trop, model);
    info!(
        sun = %result.sun.position.sign,
        moon = %result.moon.position.sign,
        ascendant = %result.ascendant.position.sign,
        ayanamsa = result.ayanamsa,
        model = %result.model,
        "Sidereal chart computed"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ephemeris::test_support::{chart_with_sun, FixedEphemeris};
    use crate::error::UpstreamError;

    fn request() -> ChartRequest {
        ChartRequest {
            local: chrono::NaiveDate::from_ymd_opt(1990, 6, 15)
                .unwrap()
                .and_hms_opt(14, 30, 0)
                .unwrap(),
            latitude: 49.6812,
            longitude: 8.6168,
            timezone: "Europe/Berlin".into(),
            frame: ReferenceFrame::Tropical,
        }
    }

    #[test]
    fn test_position_rounding_and_translation() {
        let body = BodyPosition {
            sign: "Gem".into(),
            degree: 24.356_78,
            longitude: 84.356_78,
        };
        let p = CelestialPosition::from_body(&body);
        assert_eq!(p.sign, "Zwillinge");
        assert_eq!(p.degree, 24.36);
        assert_eq!(p.longitude, 84.36);
    }

    #[test]
    fn test_ophiuchus_flag_uses_unrounded_longitude() {
        let body = BodyPosition {
            sign: "Sag".into(),
            degree: 25.996,
            longitude: 265.996,
        };
        let p = SiderealPosition::from_body(&body);
        assert_eq!(p.position.longitude, 266.0);
        assert!(p.is_ophiuchus);
    }

    #[tokio::test]
    async fn test_sidereal_offset() {
        let engine = FixedEphemeris::new(chart_with_sun("Gem", 84.3567), chart_with_sun("Tau", 60.5));
        let chart = sidereal(&engine, &request(), SiderealModel::Lahiri, 5).await.unwrap();
        assert_eq!(chart.ayanamsa, 23.8567);
        assert_eq!(chart.sun.position.sign, "Stier");
        assert_eq!(chart.model, "Lahiri");
        assert!(!chart.touches_ophiuchus());
    }

    #[tokio::test]
    async fn test_tropical_stage() {
        let engine = FixedEphemeris::new(chart_with_sun("Gem", 84.3567), chart_with_sun("Tau", 60.5));
        let chart = tropical(&engine, &request(), 5).await.unwrap();
        assert_eq!(chart.sun.sign, "Zwillinge");
        assert_eq!(chart.sun.longitude, 84.36);
    }

    #[tokio::test]
    async fn test_engine_failure_propagates() {
        let engine = FixedEphemeris::failing("engine offline");
        let err = tropical(&engine, &request(), 5).await.unwrap_err();
        assert_eq!(
            err,
            StageError::Upstream(UpstreamError::Ephemeris("engine offline".into()))
        );
    }
}
