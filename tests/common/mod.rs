//! Shared fakes for the integration tests.
//!
//! Every collaborator the pipeline and the fulfillment service talk to is
//! replaced by an in-process stand-in so the tests never touch the network.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use cosmo_profile::config::{AppConfig, StaticTables};
use cosmo_profile::ephemeris::{BodyPosition, ChartPositions, ChartRequest, EphemerisEngine, ReferenceFrame};
use cosmo_profile::fulfillment::{DocumentRenderer, FulfillmentService, JsonDocumentRenderer, Mailer, RenderError};
use cosmo_profile::geo::{GeoResolver, GeocodedPlace, Geocoder, TimezoneResolver};
use cosmo_profile::storage::OrderStore;
use cosmo_profile::types::{ComputationResult, OrderId, OrderRequest, PaymentRef, ProductTier};
use cosmo_profile::{Orchestrator, UpstreamError};

// ============================================================================
// Ephemeris
// ============================================================================

pub fn body(code: &str, longitude: f64) -> BodyPosition {
    BodyPosition {
        sign: code.to_string(),
        degree: longitude % 30.0,
        longitude,
    }
}

/// Chart with every planet on the Sun, Ascendant at 0° Aries.
pub fn chart_with_sun(code: &str, longitude: f64) -> ChartPositions {
    let sun = body(code, longitude);
    ChartPositions {
        sun: sun.clone(),
        moon: sun.clone(),
        ascendant: body("Ari", 0.0),
        mercury: sun.clone(),
        venus: sun.clone(),
        mars: sun.clone(),
        jupiter: sun.clone(),
        saturn: sun.clone(),
        uranus: sun.clone(),
        neptune: sun.clone(),
        pluto: sun,
        mean_node: None,
    }
}

/// Answers with a fixed chart per frame. Can be told to fail the first
/// tropical request, or every request.
pub struct ScriptedEphemeris {
    tropical: ChartPositions,
    sidereal: ChartPositions,
    fail_first_tropical: bool,
    fail_all: bool,
    tropical_calls: AtomicUsize,
    pub calls: AtomicUsize,
}

impl ScriptedEphemeris {
    /// Sun at 24.36° Gemini tropical, 0.5° Taurus sidereal.
    pub fn new() -> Self {
        Self {
            tropical: chart_with_sun("Gem", 84.3567),
            sidereal: chart_with_sun("Tau", 60.5),
            fail_first_tropical: false,
            fail_all: false,
            tropical_calls: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_first_tropical() -> Self {
        Self {
            fail_first_tropical: true,
            ..Self::new()
        }
    }

    pub fn offline() -> Self {
        Self {
            fail_all: true,
            ..Self::new()
        }
    }

    pub fn with_sidereal(mut self, chart: ChartPositions) -> Self {
        self.sidereal = chart;
        self
    }
}

#[async_trait]
impl EphemerisEngine for ScriptedEphemeris {
    async fn chart(&self, request: &ChartRequest) -> Result<ChartPositions, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all {
            return Err(UpstreamError::Ephemeris("engine offline".into()));
        }
        match request.frame {
            ReferenceFrame::Tropical => {
                let n = self.tropical_calls.fetch_add(1, Ordering::SeqCst);
                if self.fail_first_tropical && n == 0 {
                    return Err(UpstreamError::Ephemeris("tropical query rejected".into()));
                }
                Ok(self.tropical.clone())
            }
            ReferenceFrame::Sidereal(_) => Ok(self.sidereal.clone()),
        }
    }

    fn engine_name(&self) -> &'static str {
        "scripted"
    }
}

// ============================================================================
// Places
// ============================================================================

/// Knows every place except "Atlantis".
pub struct StaticGeo {
    pub lookups: AtomicUsize,
}

impl StaticGeo {
    pub fn new() -> Self {
        Self {
            lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Geocoder for StaticGeo {
    async fn geocode(&self, place: &str) -> Result<GeocodedPlace, UpstreamError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if place.eq_ignore_ascii_case("atlantis") {
            return Err(UpstreamError::PlaceNotFound(place.to_string()));
        }
        Ok(GeocodedPlace {
            latitude: 49.6816,
            longitude: 8.6186,
            display_name: format!("{place}, Deutschland"),
        })
    }
}

#[async_trait]
impl TimezoneResolver for StaticGeo {
    async fn timezone_at(&self, _latitude: f64, _longitude: f64) -> Result<Option<String>, UpstreamError> {
        Ok(Some("Europe/Berlin".into()))
    }
}

// ============================================================================
// Delivery
// ============================================================================

/// JSON renderer that can be switched to fail.
pub struct SwitchableRenderer {
    inner: JsonDocumentRenderer,
    pub fail: AtomicBool,
}

impl SwitchableRenderer {
    pub fn new(dir: &Path) -> Self {
        Self {
            inner: JsonDocumentRenderer::new(dir),
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl DocumentRenderer for SwitchableRenderer {
    async fn render(
        &self,
        order_id: OrderId,
        result: &ComputationResult,
        tier: ProductTier,
    ) -> Result<PathBuf, RenderError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RenderError::Other("layout engine crashed".into()));
        }
        self.inner.render(order_id, result, tier).await
    }

    fn renderer_name(&self) -> &'static str {
        "switchable"
    }
}

/// Counts deliveries; accepts or refuses all of them.
pub struct RecordingMailer {
    pub accept: bool,
    pub sent: AtomicUsize,
}

impl RecordingMailer {
    pub fn new(accept: bool) -> Self {
        Self {
            accept,
            sent: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, _to_email: &str, _to_name: &str, document: &Path) -> bool {
        assert!(document.exists(), "mailer called before the document exists");
        self.sent.fetch_add(1, Ordering::SeqCst);
        self.accept
    }

    fn mailer_name(&self) -> &'static str {
        "recording"
    }
}

// ============================================================================
// Assembly
// ============================================================================

pub fn orchestrator_with(engine: ScriptedEphemeris, tables: StaticTables) -> Arc<Orchestrator> {
    let config = AppConfig::default();
    let geo = Arc::new(StaticGeo::new());
    let resolver = GeoResolver::new(geo.clone(), geo, &config.geocoding);
    Arc::new(Orchestrator::new(
        Arc::new(engine),
        Arc::new(resolver),
        Arc::new(tables),
        &config,
    ))
}

pub fn orchestrator(engine: ScriptedEphemeris) -> Arc<Orchestrator> {
    orchestrator_with(engine, StaticTables::embedded().expect("embedded tables"))
}

pub struct Harness {
    pub service: FulfillmentService,
    pub renderer: Arc<SwitchableRenderer>,
    pub mailer: Arc<RecordingMailer>,
    pub dir: tempfile::TempDir,
}

pub fn harness(store: Arc<dyn OrderStore>, accept_mail: bool) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let renderer = Arc::new(SwitchableRenderer::new(&dir.path().join("documents")));
    let mailer = Arc::new(RecordingMailer::new(accept_mail));
    let service = FulfillmentService::new(
        store,
        orchestrator(ScriptedEphemeris::new()),
        renderer.clone(),
        mailer.clone(),
        AppConfig::default().pricing,
    );
    Harness {
        service,
        renderer,
        mailer,
        dir,
    }
}

pub fn order_request(session: Option<&str>) -> OrderRequest {
    OrderRequest {
        name: "Jürgen Weiß".into(),
        email: "juergen@example.org".into(),
        birth_date: "15.06.1990".into(),
        birth_time: "14:30".into(),
        birth_place: "Bensheim".into(),
        tier: ProductTier::Normal,
        payment: PaymentRef {
            session_id: session.map(str::to_string),
            payment_id: None,
        },
    }
}
