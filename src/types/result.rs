//! Aggregate output of one full pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GeoFix, PersonInput};
use crate::error::{ErrorKind, StageError};
use crate::stages::bodygraph::HumanDesignProfile;
use crate::stages::decans::DecanProfile;
use crate::stages::elements::ElementProfile;
use crate::stages::frames::{SiderealChart, TropicalChart};
use crate::stages::numerology::LifeNumber;

/// Pipeline stages, in execution order.
///
/// Serialized names are the identifiers persisted with every order result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageName {
    #[serde(rename = "geocoding")]
    Geocoding,
    #[serde(rename = "numerologie")]
    Numerology,
    #[serde(rename = "tropisch")]
    Tropical,
    #[serde(rename = "siderisch")]
    Sidereal,
    #[serde(rename = "element")]
    Element,
    #[serde(rename = "dekan")]
    Decan,
    #[serde(rename = "human_design")]
    HumanDesign,
}

impl StageName {
    pub const fn as_str(self) -> &'static str {
        match self {
            StageName::Geocoding => "geocoding",
            StageName::Numerology => "numerologie",
            StageName::Tropical => "tropisch",
            StageName::Sidereal => "siderisch",
            StageName::Element => "element",
            StageName::Decan => "dekan",
            StageName::HumanDesign => "human_design",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded, isolated stage failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: StageName,
    pub kind: ErrorKind,
    pub error: String,
}

impl StageFailure {
    pub fn new(stage: StageName, error: &StageError) -> Self {
        Self {
            stage,
            kind: error.kind(),
            error: error.to_string(),
        }
    }
}

/// Run metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMeta {
    /// Product tier the run was made for
    pub version: String,
    pub computed_at: DateTime<Utc>,
    /// Named sidereal offset model
    pub ayanamsa_model: String,
    /// Tropical minus sidereal Sun longitude, if the sidereal stage ran
    pub ayanamsa_value: Option<f64>,
}

/// Complete profile for one person.
///
/// Assembled once per run and never merged with another run. The failure
/// list is omitted from the serialized form when empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationResult {
    pub person: PersonInput,
    pub geocoding: Option<GeoFix>,
    pub numerology: Option<LifeNumber>,
    pub tropical: Option<TropicalChart>,
    pub sidereal: Option<SiderealChart>,
    pub element: Option<ElementProfile>,
    pub decan: Option<DecanProfile>,
    pub human_design: Option<HumanDesignProfile>,
    pub meta: ResultMeta,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<StageFailure>,
}

impl ComputationResult {
    /// Empty result carrying only identity and metadata.
    pub fn empty(person: PersonInput, meta: ResultMeta) -> Self {
        Self {
            person,
            geocoding: None,
            numerology: None,
            tropical: None,
            sidereal: None,
            element: None,
            decan: None,
            human_design: None,
            meta,
            failures: Vec::new(),
        }
    }

    pub fn failure_for(&self, stage: StageName) -> Option<&StageFailure> {
        self.failures.iter().find(|f| f.stage == stage)
    }

    /// A geocoding failure aborts the run; nothing downstream was attempted.
    pub fn is_fatal(&self) -> bool {
        self.failure_for(StageName::Geocoding).is_some()
    }
}
