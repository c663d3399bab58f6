//! Computation Orchestrator - one full pipeline run for one person.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use super::export::export_result;
use super::sign_check::{quick_sign_check, SignCheck};
use super::StageOutcome;
use crate::config::{AppConfig, SignCheckConfig, StaticTables};
use crate::ephemeris::{ChartRequest, EphemerisEngine, ReferenceFrame, SiderealModel};
use crate::error::{InputError, StageError};
use crate::geo::GeoResolver;
use crate::stages::{bodygraph, frames, numerology};
use crate::types::{ComputationResult, GeoFix, PersonInput, ProductTier, ResultMeta, StageFailure, StageName};

/// Sequences the stages against one person's data.
///
/// Holds only shared, read-only collaborators; concurrent runs are
/// independent.
pub struct Orchestrator {
    engine: Arc<dyn EphemerisEngine>,
    geo: Arc<GeoResolver>,
    tables: Arc<StaticTables>,
    sidereal_model: SiderealModel,
    ephemeris_timeout_secs: u64,
    sign_check: SignCheckConfig,
    /// Export every finished run here when set
    export_dir: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new(
        engine: Arc<dyn EphemerisEngine>,
        geo: Arc<GeoResolver>,
        tables: Arc<StaticTables>,
        config: &AppConfig,
    ) -> Self {
        info!(
            engine = engine.engine_name(),
            sidereal_model = config.ephemeris.sidereal_model.display_name(),
            export = config.output.export_results,
            "Initializing computation orchestrator"
        );
        Self {
            engine,
            geo,
            tables,
            sidereal_model: config.ephemeris.sidereal_model,
            ephemeris_timeout_secs: config.ephemeris.timeout_secs,
            sign_check: config.sign_check.clone(),
            export_dir: config
                .output
                .export_results
                .then(|| config.output.export_dir.clone()),
        }
    }

    /// Run every stage. Never fails: stage failures are recorded in the
    /// returned result.
    pub async fn run(&self, person: &PersonInput, tier: ProductTier) -> ComputationResult {
        let started = Instant::now();
        let meta = ResultMeta {
            version: tier.as_str().to_string(),
            computed_at: Utc::now(),
            ayanamsa_model: self.sidereal_model.display_name().to_string(),
            ayanamsa_value: None,
        };
        let mut result = ComputationResult::empty(person.clone(), meta);

        info!(
            person = %person.name,
            place = %person.birth_place,
            tier = %tier,
            "Pipeline run started"
        );

        // Everything downstream needs coordinates and a timezone.
        let fix = match self.geo.resolve(&person.birth_place).await {
            Ok(fix) => fix,
            Err(e) => {
                error!(
                    stage = %StageName::Geocoding,
                    kind = %e.kind(),
                    error = %e,
                    "Geocoding failed, aborting run"
                );
                result.failures.push(StageFailure::new(StageName::Geocoding, &e));
                return result;
            }
        };

        result.numerology = StageOutcome::from_result(
            StageName::Numerology,
            numerology::life_number(&person.birth_date).map_err(StageError::from),
        )
        .collect(&mut result.failures);

        let request = chart_request(person, &fix);
        result.geocoding = Some(fix);

        let engine = self.engine.as_ref();
        let timeout = self.ephemeris_timeout_secs;

        let tropical = match &request {
            Ok(req) => frames::tropical(engine, req, timeout).await,
            Err(e) => Err(e.clone().into()),
        };
        result.tropical = StageOutcome::from_result(StageName::Tropical, tropical).collect(&mut result.failures);

        let sidereal = match &request {
            Ok(req) => frames::sidereal(engine, req, self.sidereal_model, timeout).await,
            Err(e) => Err(e.clone().into()),
        };
        result.sidereal = StageOutcome::from_result(StageName::Sidereal, sidereal).collect(&mut result.failures);

        let (element, decan) = match &result.sidereal {
            Some(chart) => {
                let sun = &chart.sun.position;
                (
                    StageOutcome::from_result(
                        StageName::Element,
                        self.tables.elements.resolve(&sun.sign).map_err(StageError::from),
                    ),
                    StageOutcome::from_result(
                        StageName::Decan,
                        self.tables.decans.resolve(&sun.sign, sun.degree).map_err(StageError::from),
                    ),
                )
            }
            None => (
                StageOutcome::skipped(StageName::Element, "no sidereal sun position"),
                StageOutcome::skipped(StageName::Decan, "no sidereal sun position"),
            ),
        };
        result.element = element.collect(&mut result.failures);
        result.decan = decan.collect(&mut result.failures);

        let human_design = match &request {
            Ok(req) => bodygraph::human_design(engine, req, &self.tables.channels, timeout).await,
            Err(e) => Err(e.clone().into()),
        };
        result.human_design =
            StageOutcome::from_result(StageName::HumanDesign, human_design).collect(&mut result.failures);

        result.meta.ayanamsa_value = result.sidereal.as_ref().map(|s| s.ayanamsa);

        info!(
            person = %person.name,
            failures = result.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline run finished"
        );

        if let Some(dir) = &self.export_dir {
            if let Err(e) = export_result(&result, dir) {
                warn!(error = %e, "Result export failed");
            }
        }

        result
    }

    /// Tropical vs sidereal Sun sign for a date at the reference place.
    pub async fn sign_check(&self, birth_date: &str) -> Result<SignCheck, StageError> {
        quick_sign_check(
            self.engine.as_ref(),
            &self.sign_check,
            self.sidereal_model,
            self.ephemeris_timeout_secs,
            birth_date,
        )
        .await
    }
}

fn chart_request(person: &PersonInput, fix: &GeoFix) -> Result<ChartRequest, InputError> {
    let moment = person.moment()?;
    Ok(ChartRequest {
        local: moment.local_datetime(),
        latitude: fix.latitude,
        longitude: fix.longitude,
        timezone: fix.timezone.clone(),
        frame: ReferenceFrame::Tropical,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ephemeris::test_support::{chart_with_sun, FixedEphemeris};
    use crate::error::ErrorKind;
    use crate::geo::test_support::static_resolver;

    fn orchestrator(engine: FixedEphemeris) -> Orchestrator {
        let config = AppConfig::default();
        let geo = static_resolver();
        let tables = Arc::new(StaticTables::embedded().unwrap());
        Orchestrator::new(Arc::new(engine), geo, tables, &config)
    }

    fn person(date: &str, place: &str) -> PersonInput {
        PersonInput::new("Anna Müller", date, "14:30", place)
    }

    #[tokio::test]
    async fn test_full_run_populates_every_stage() {
        let o = orchestrator(FixedEphemeris::new(
            chart_with_sun("Gem", 84.3567),
            chart_with_sun("Tau", 60.5),
        ));
        let r = o.run(&person("15.06.1990", "Berlin"), ProductTier::Pro).await;

        assert!(r.failures.is_empty(), "{:?}", r.failures);
        assert_eq!(r.numerology.as_ref().unwrap().life_number, 4);
        assert_eq!(r.sidereal.as_ref().unwrap().sun.position.sign, "Stier");
        // 0.5° Stier: first Taurus decan
        assert_eq!(r.decan.as_ref().unwrap().number, 4);
        assert_eq!(r.decan.as_ref().unwrap().deity, "Ptah");
        assert!(r.element.is_some());
        assert!(r.human_design.is_some());
        assert_eq!(r.meta.version, "pro");
        assert_eq!(r.meta.ayanamsa_value, Some(23.8567));
    }

    #[tokio::test]
    async fn test_geocode_failure_is_fatal() {
        let o = orchestrator(FixedEphemeris::new(
            chart_with_sun("Gem", 84.3567),
            chart_with_sun("Tau", 60.5),
        ));
        let r = o.run(&person("15.06.1990", "Atlantis"), ProductTier::Normal).await;

        assert!(r.is_fatal());
        assert_eq!(r.failures.len(), 1);
        assert!(r.geocoding.is_none());
        assert!(r.numerology.is_none());
        assert!(r.tropical.is_none());
        assert!(r.human_design.is_none());
    }

    #[tokio::test]
    async fn test_engine_outage_skips_element_and_decan() {
        let o = orchestrator(FixedEphemeris::failing("engine offline"));
        let r = o.run(&person("15.06.1990", "Berlin"), ProductTier::Normal).await;

        let stages: Vec<_> = r.failures.iter().map(|f| f.stage).collect();
        assert_eq!(
            stages,
            vec![StageName::Tropical, StageName::Sidereal, StageName::HumanDesign]
        );
        assert!(r.numerology.is_some());
        assert!(r.element.is_none() && r.decan.is_none());
        assert_eq!(r.meta.ayanamsa_value, None);
    }

    #[tokio::test]
    async fn test_invalid_date_isolated_per_stage() {
        let o = orchestrator(FixedEphemeris::new(
            chart_with_sun("Gem", 84.3567),
            chart_with_sun("Tau", 60.5),
        ));
        let r = o.run(&person("31.02.1990", "Berlin"), ProductTier::Normal).await;

        assert!(r.geocoding.is_some());
        assert!(r.failures.iter().all(|f| f.kind == ErrorKind::InvalidInput));
        assert!(r.failure_for(StageName::Numerology).is_some());
        assert!(r.failure_for(StageName::HumanDesign).is_some());
        assert!(r.failure_for(StageName::Element).is_none());
    }

    #[tokio::test]
    async fn test_sign_check_delegates_to_engine() {
        let o = orchestrator(FixedEphemeris::new(
            chart_with_sun("Gem", 84.3567),
            chart_with_sun("Tau", 60.5),
        ));
        let check = o.sign_check("15.06.1990").await.unwrap();
        assert_eq!(check.tropical, "Zwillinge");
        assert_eq!(check.sidereal, "Stier");
        assert!(check.differs);
    }
}
