//! Quick sign check: tropical vs sidereal Sun sign for a date alone.
//!
//! The Sun sign depends on the date far more than on place or hour, so the
//! check uses a fixed reference place and time.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::SignCheckConfig;
use crate::ephemeris::{ChartRequest, EphemerisEngine, ReferenceFrame, SiderealModel};
use crate::error::StageError;
use crate::stages::frames;
use crate::types::{parse_birth_date, parse_birth_time};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignCheck {
    pub tropical: String,
    pub sidereal: String,
    /// The two frames disagree on the Sun sign
    pub differs: bool,
    /// Sidereal Sun in the 13th-sign zone
    pub ophiuchus: bool,
}

pub async fn quick_sign_check(
    engine: &dyn EphemerisEngine,
    reference: &SignCheckConfig,
    model: SiderealModel,
    timeout_secs: u64,
    birth_date: &str,
) -> Result<SignCheck, StageError> {
    let date = parse_birth_date(birth_date)?;
    let time = parse_birth_time(&reference.time)?;
    let request = ChartRequest {
        local: date.and_time(time),
        latitude: reference.latitude,
        longitude: reference.longitude,
        timezone: reference.timezone.clone(),
        frame: ReferenceFrame::Tropical,
    };

    let tropical = frames::tropical(engine, &request, timeout_secs).await?;
    let sidereal = frames::sidereal(engine, &request, model, timeout_secs).await?;

    let check = SignCheck {
        differs: tropical.sun.sign != sidereal.sun.position.sign,
        tropical: tropical.sun.sign,
        ophiuchus: sidereal.sun.is_ophiuchus,
        sidereal: sidereal.sun.position.sign,
    };
    info!(
        date = %birth_date,
        tropical = %check.tropical,
        sidereal = %check.sidereal,
        differs = check.differs,
        "Sign check"
    );
    Ok(check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ephemeris::test_support::{chart_with_sun, FixedEphemeris};
    use crate::error::InputError;

    #[tokio::test]
    async fn test_same_sign_does_not_differ() {
        let engine = FixedEphemeris::new(chart_with_sun("Sco", 225.0), chart_with_sun("Sco", 215.0));
        let check = quick_sign_check(&engine, &SignCheckConfig::default(), SiderealModel::Lahiri, 5, "08.11.1985")
            .await
            .unwrap();
        assert_eq!(check.tropical, "Skorpion");
        assert!(!check.differs);
        assert!(!check.ophiuchus);
    }

    #[tokio::test]
    async fn test_ophiuchus_flagged() {
        let engine = FixedEphemeris::new(chart_with_sun("Sag", 270.0), chart_with_sun("Sag", 246.0));
        let check = quick_sign_check(&engine, &SignCheckConfig::default(), SiderealModel::Lahiri, 5, "22.12.1985")
            .await
            .unwrap();
        assert!(check.ophiuchus);
    }

    #[tokio::test]
    async fn test_bad_date_rejected_before_engine() {
        let engine = FixedEphemeris::failing("must not be called");
        let err = quick_sign_check(&engine, &SignCheckConfig::default(), SiderealModel::Lahiri, 5, "1985-12-22")
            .await
            .unwrap_err();
        assert_eq!(err, StageError::Input(InputError::InvalidDateFormat("1985-12-22".into())));
    }
}
