//! Computation pipeline
//!
//! ```text
//! geocode -> numeric -> tropical -> sidereal -> element -> decan -> classify
//! ```
//!
//! Geocoding is the only fatal stage. Every other stage returns a tagged
//! [`StageOutcome`]; failures are recorded in the result and the run moves
//! on. Element and decan are skipped outright when the sidereal stage
//! produced nothing.

use tracing::{error, info};

use crate::error::StageError;
use crate::types::{StageFailure, StageName};

pub mod export;
mod orchestrator;
pub mod sign_check;

pub use orchestrator::Orchestrator;
pub use sign_check::{quick_sign_check, SignCheck};

/// Tagged result of one pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Completed(T),
    Failed(StageFailure),
    /// Not attempted because a stage it depends on produced nothing
    Skipped,
}

impl<T> StageOutcome<T> {
    /// Tag a stage's result, logging the failure if there is one.
    pub fn from_result(stage: StageName, result: Result<T, StageError>) -> Self {
        match result {
            Ok(value) => StageOutcome::Completed(value),
            Err(e) => {
                error!(stage = %stage, kind = %e.kind(), error = %e, "Stage failed");
                StageOutcome::Failed(StageFailure::new(stage, &e))
            }
        }
    }

    pub fn skipped(stage: StageName, reason: &str) -> Self {
        info!(stage = %stage, reason, "Stage skipped");
        StageOutcome::Skipped
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StageOutcome::Completed(_))
    }

    /// The value, pushing a failure record if the stage failed.
    pub fn collect(self, failures: &mut Vec<StageFailure>) -> Option<T> {
        match self {
            StageOutcome::Completed(value) => Some(value),
            StageOutcome::Failed(failure) => {
                failures.push(failure);
                None
            }
            StageOutcome::Skipped => None,
        }
    }
}
