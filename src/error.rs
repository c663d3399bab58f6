//! Error taxonomy
//!
//! Errors are split by who can fix them:
//!
//! - [`InputError`]: malformed date, time, place or order fields (the user)
//! - [`ConfigGap`]: missing sign, decan or channel table entries (the operator)
//! - [`UpstreamError`]: ephemeris, geocoding or timezone collaborator failures
//!   (possibly transient)
//!
//! [`StageError`] is the union a pipeline stage may return. The orchestrator
//! turns it into a recorded [`crate::types::StageFailure`] instead of
//! propagating it.

use serde::{Deserialize, Serialize};

/// Coarse classification carried in every recorded stage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    ConfigurationGap,
    UpstreamFailure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidInput => write!(f, "invalid_input"),
            ErrorKind::ConfigurationGap => write!(f, "configuration_gap"),
            ErrorKind::UpstreamFailure => write!(f, "upstream_failure"),
        }
    }
}

/// User-correctable input problems.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("invalid date '{0}': expected DD.MM.YYYY")]
    InvalidDateFormat(String),
    #[error("invalid time '{0}': expected HH:MM (24h)")]
    InvalidTimeFormat(String),
    #[error("birth place must not be empty")]
    EmptyPlace,
    #[error("invalid product tier '{0}': expected 'normal' or 'pro'")]
    UnknownTier(String),
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("invalid email address '{0}'")]
    InvalidEmail(String),
}

/// Operator-correctable gaps in the static tables.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigGap {
    #[error("unknown sign '{0}'")]
    UnknownSign(String),
    #[error("decan {band} for {sign} is not configured")]
    DecanNotConfigured { sign: String, band: usize },
    #[error("table '{table}' is malformed: {reason}")]
    MalformedTable { table: &'static str, reason: String },
}

/// Failures of the external collaborators.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpstreamError {
    #[error("place not found: '{0}'")]
    PlaceNotFound(String),
    #[error("timezone could not be resolved for '{place}' ({latitude}, {longitude})")]
    TimezoneUnresolved {
        place: String,
        latitude: f64,
        longitude: f64,
    },
    #[error("geocoding service error: {0}")]
    Geocoding(String),
    #[error("timezone service error: {0}")]
    Timezone(String),
    #[error("ephemeris failure: {0}")]
    Ephemeris(String),
    #[error("{service} did not answer within {secs}s")]
    Timeout { service: &'static str, secs: u64 },
}

impl UpstreamError {
    /// Transport errors and timeouts may succeed on a second attempt;
    /// "not found" answers never will.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            UpstreamError::Geocoding(_)
                | UpstreamError::Timezone(_)
                | UpstreamError::Ephemeris(_)
                | UpstreamError::Timeout { .. }
        )
    }
}

/// Anything a single pipeline stage can fail with.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Configuration(#[from] ConfigGap),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl StageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::Input(_) => ErrorKind::InvalidInput,
            StageError::Configuration(_) => ErrorKind::ConfigurationGap,
            StageError::Upstream(_) => ErrorKind::UpstreamFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_kind() {
        let e: StageError = InputError::InvalidDateFormat("31.02.1990".into()).into();
        assert_eq!(e.kind(), ErrorKind::InvalidInput);

        let e: StageError = ConfigGap::UnknownSign("Drache".into()).into();
        assert_eq!(e.kind(), ErrorKind::ConfigurationGap);

        let e: StageError = UpstreamError::Ephemeris("engine down".into()).into();
        assert_eq!(e.kind(), ErrorKind::UpstreamFailure);
    }

    #[test]
    fn test_transparent_message() {
        let e: StageError = ConfigGap::DecanNotConfigured {
            sign: "Krebs".into(),
            band: 3,
        }
        .into();
        assert_eq!(e.to_string(), "decan 3 for Krebs is not configured");
    }

    #[test]
    fn test_not_found_is_not_transient() {
        assert!(!UpstreamError::PlaceNotFound("Atlantis".into()).is_transient());
        assert!(UpstreamError::Timeout { service: "geocoder", secs: 10 }.is_transient());
    }
}
