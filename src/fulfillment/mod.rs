//! Order Fulfillment
//!
//! Drives a persisted [`Order`] through `new -> computing -> done | failed`:
//!
//! 1. claim: atomic `new -> computing` in the store; a second claim is refused
//! 2. compute: one orchestrator run, result attached and persisted
//! 3. render: document written, location persisted
//! 4. deliver: mail dispatched, delivery flag persisted
//! 5. `done`
//!
//! Every step is persisted before the next starts. Any error after the claim
//! is recorded verbatim as the order's error message and the order ends in
//! `failed`; whatever was persisted earlier (result, document) stays
//! attached. Failed orders are not retried.

mod collaborators;

pub use collaborators::{
    mailer_from_config, DisabledMailer, DocumentRenderer, HttpMailer, JsonDocumentRenderer, Mailer, RenderError,
};

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::defaults::ORDER_LIST_LIMIT;
use crate::config::PricingConfig;
use crate::error::InputError;
use crate::pipeline::Orchestrator;
use crate::storage::{InsertOutcome, OrderStore, StoreError};
use crate::types::{
    InvalidTransition, MonthlyStats, Order, OrderId, OrderRequest, OrderStatus, OrderStatusView, PaymentRef,
    ProductTier, StageName,
};

/// The only payment event that creates an order.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

const TERMINAL_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum FulfillmentError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("order {0} not found")]
    NotFound(OrderId),
    #[error("order {id} is already {status}, not starting another run")]
    AlreadyClaimed { id: OrderId, status: OrderStatus },
    /// Carries the geocoding failure message unchanged
    #[error("{0}")]
    Geocoding(String),
    #[error("document rendering failed: {0}")]
    Render(#[from] RenderError),
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

/// What an intake call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    Created(OrderId),
    /// The correlation id was already known; nothing was created
    Duplicate(OrderId),
    /// The confirmation does not describe a completed purchase
    Ignored(String),
}

impl IntakeOutcome {
    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            IntakeOutcome::Created(id) | IntakeOutcome::Duplicate(id) => Some(*id),
            IntakeOutcome::Ignored(_) => None,
        }
    }
}

/// Provider-neutral payment confirmation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PaymentConfirmation {
    pub event_type: String,
    pub session_id: String,
    pub payment_id: Option<String>,
    /// Amount paid in minor currency units
    pub amount_minor: Option<i64>,
    /// Order details attached at checkout
    pub metadata: HashMap<String, String>,
}

impl PaymentConfirmation {
    /// First non-empty value among the given metadata keys.
    fn field(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|k| self.metadata.get(*k))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn to_request(&self) -> Result<OrderRequest, InputError> {
        let required = |field: &'static str, keys: &[&str]| self.field(keys).ok_or(InputError::MissingField(field));

        let tier = match self.field(&["tier", "version"]) {
            Some(raw) => raw.parse()?,
            None => ProductTier::Normal,
        };

        Ok(OrderRequest {
            name: required("name", &["name"])?,
            email: required("email", &["email"])?,
            birth_date: required("birth_date", &["birth_date", "geburtsdatum"])?,
            birth_time: required("birth_time", &["birth_time", "geburtszeit"])?,
            birth_place: required("birth_place", &["birth_place", "geburtsort"])?,
            tier,
            payment: PaymentRef {
                session_id: Some(self.session_id.clone()),
                payment_id: self.payment_id.clone(),
            },
        })
    }
}

/// Order intake, background fulfillment and administrative queries.
#[derive(Clone)]
pub struct FulfillmentService {
    store: Arc<dyn OrderStore>,
    orchestrator: Arc<Orchestrator>,
    renderer: Arc<dyn DocumentRenderer>,
    mailer: Arc<dyn Mailer>,
    pricing: PricingConfig,
}

impl FulfillmentService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        orchestrator: Arc<Orchestrator>,
        renderer: Arc<dyn DocumentRenderer>,
        mailer: Arc<dyn Mailer>,
        pricing: PricingConfig,
    ) -> Self {
        info!(
            store = store.backend_name(),
            renderer = renderer.renderer_name(),
            mailer = mailer.mailer_name(),
            "Initializing fulfillment service"
        );
        Self {
            store,
            orchestrator,
            renderer,
            mailer,
            pricing,
        }
    }

    // ========================================================================
    // Intake
    // ========================================================================

    /// Validate and persist a new order in the `new` state.
    ///
    /// The price comes from the tier. An order whose correlation id is
    /// already stored is not created again.
    pub fn create_order(&self, request: OrderRequest) -> Result<IntakeOutcome, FulfillmentError> {
        let price = self.pricing.price_for(request.tier);
        self.insert(request, price)
    }

    fn insert(&self, request: OrderRequest, price: f64) -> Result<IntakeOutcome, FulfillmentError> {
        request.validate()?;
        let order = Order::new(&request, price);

        match self.store.insert_new(&order)? {
            InsertOutcome::Inserted => {
                info!(
                    order_id = %order.id,
                    tier = %order.tier,
                    price = order.price,
                    status = %order.status,
                    "Order created"
                );
                Ok(IntakeOutcome::Created(order.id))
            }
            InsertOutcome::Duplicate(existing) => {
                info!(order_id = %existing, "Duplicate correlation id, returning existing order");
                Ok(IntakeOutcome::Duplicate(existing))
            }
        }
    }

    /// Turn a payment confirmation into an order and start fulfilling it.
    ///
    /// Must be called inside a tokio runtime. Only completed checkouts count;
    /// confirmations with missing or invalid order details are ignored.
    pub fn confirm_payment(&self, confirmation: &PaymentConfirmation) -> Result<IntakeOutcome, FulfillmentError> {
        if confirmation.event_type != CHECKOUT_COMPLETED {
            info!(event = %confirmation.event_type, "Ignoring payment event");
            return Ok(IntakeOutcome::Ignored(format!("event type {}", confirmation.event_type)));
        }

        if let Some(existing) = self.store.find_by_session(&confirmation.session_id)? {
            info!(
                order_id = %existing.id,
                session = %confirmation.session_id,
                "Payment already processed"
            );
            return Ok(IntakeOutcome::Duplicate(existing.id));
        }

        let request = match confirmation.to_request().and_then(|r| r.validate().map(|()| r)) {
            Ok(request) => request,
            Err(e) => {
                error!(session = %confirmation.session_id, error = %e, "Payment confirmation without usable order details");
                return Ok(IntakeOutcome::Ignored(e.to_string()));
            }
        };

        let price = confirmation
            .amount_minor
            .map(|minor| minor as f64 / 100.0)
            .unwrap_or_else(|| self.pricing.price_for(request.tier));

        let outcome = self.insert(request, price)?;
        if let IntakeOutcome::Created(id) = outcome {
            self.dispatch(id);
        }
        Ok(outcome)
    }

    // ========================================================================
    // Fulfillment
    // ========================================================================

    /// Fulfill an order in the background. Callers need not await the handle.
    pub fn dispatch(&self, id: OrderId) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            match service.process(id).await {
                Ok(order) => info!(order_id = %id, status = %order.status, "Fulfillment run finished"),
                Err(e) => warn!(order_id = %id, error = %e, "Fulfillment run not completed"),
            }
        })
    }

    /// Claim and fulfill one order, returning its final persisted state.
    ///
    /// Errors only when the run could not start (unknown or already claimed
    /// order). Failures during the run end in a `failed` order instead.
    pub async fn process(&self, id: OrderId) -> Result<Order, FulfillmentError> {
        let mut order = match self.store.claim(id) {
            Ok(order) => order,
            Err(StoreError::NotFound(id)) => return Err(FulfillmentError::NotFound(id)),
            Err(StoreError::AlreadyClaimed { id, status }) => {
                return Err(FulfillmentError::AlreadyClaimed { id, status })
            }
            Err(e) => return Err(e.into()),
        };
        info!(order_id = %id, status = %order.status, "Order claimed");

        if let Err(e) = self.fulfill(&mut order).await {
            error!(order_id = %id, error = %e, "Fulfillment failed");
            order.error_message = Some(e.to_string());
            if let Err(t) = order.transition(OrderStatus::Failed) {
                warn!(order_id = %id, error = %t, "Order already terminal");
            }
            if let Err(save) = self.store.save(&order) {
                error!(order_id = %id, error = %save, "Could not record fulfillment failure");
            }
            info!(order_id = %id, status = %order.status, "Order transition");
        }
        Ok(order)
    }

    async fn fulfill(&self, order: &mut Order) -> Result<(), FulfillmentError> {
        let result = self.orchestrator.run(&order.person(), order.tier).await;
        let fatal = result
            .failure_for(StageName::Geocoding)
            .map(|f| f.error.clone());

        order.result = Some(result.clone());
        order.touch();
        self.store.save(order)?;

        if let Some(message) = fatal {
            return Err(FulfillmentError::Geocoding(message));
        }

        let path = self.renderer.render(order.id, &result, order.tier).await?;
        order.document_path = Some(path.clone());
        order.touch();
        self.store.save(order)?;

        order.email_sent = self
            .mailer
            .send(&order.customer_email, &order.customer_name, &path)
            .await;
        if !order.email_sent {
            warn!(order_id = %order.id, "Document not delivered by mail");
        }

        // Only adopt `done` once it is persisted, so a failed save can still
        // end in `failed`.
        let mut done = order.clone();
        done.transition(OrderStatus::Done)?;
        self.store.save(&done)?;
        *order = done;
        info!(order_id = %order.id, status = %order.status, email_sent = order.email_sent, "Order transition");
        Ok(())
    }

    /// Poll until the order reaches `done` or `failed`, or `deadline` passes.
    ///
    /// Returns the last observed state either way.
    pub async fn await_terminal(&self, id: OrderId, deadline: Duration) -> Result<Order, FulfillmentError> {
        let started = tokio::time::Instant::now();
        loop {
            let order = self.order(id)?;
            if order.status.is_terminal() || started.elapsed() >= deadline {
                return Ok(order);
            }
            tokio::time::sleep(TERMINAL_POLL_INTERVAL).await;
        }
    }

    // ========================================================================
    // Queries / Administration
    // ========================================================================

    pub fn order(&self, id: OrderId) -> Result<Order, FulfillmentError> {
        self.store.get(id)?.ok_or(FulfillmentError::NotFound(id))
    }

    /// Customer-facing status; `document_ready` means the file exists now.
    pub fn status(&self, id: OrderId) -> Result<OrderStatusView, FulfillmentError> {
        let order = self.order(id)?;
        Ok(OrderStatusView {
            id: order.id,
            status: order.status,
            document_ready: order.document_path.as_deref().is_some_and(|p| p.exists()),
            created_at: order.created_at,
        })
    }

    pub fn find_by_session(&self, session_id: &str) -> Result<Option<Order>, FulfillmentError> {
        Ok(self.store.find_by_session(session_id)?)
    }

    /// Newest first, at most `limit` (default 100).
    pub fn list(&self, status: Option<OrderStatus>, limit: Option<usize>) -> Result<Vec<Order>, FulfillmentError> {
        Ok(self.store.list(status, limit.unwrap_or(ORDER_LIST_LIMIT))?)
    }

    /// Count and revenue per month of creation, newest month first.
    pub fn monthly_stats(&self) -> Result<Vec<MonthlyStats>, FulfillmentError> {
        let mut months: BTreeMap<String, (u64, f64)> = BTreeMap::new();
        for order in self.store.all()? {
            let entry = months
                .entry(order.created_at.format("%Y-%m").to_string())
                .or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += order.price;
        }

        Ok(months
            .into_iter()
            .rev()
            .map(|(month, (count, revenue))| MonthlyStats {
                month,
                count,
                revenue: (revenue * 100.0).round() / 100.0,
            })
            .collect())
    }

    /// Remove an order and its rendered document.
    pub fn delete_order(&self, id: OrderId) -> Result<Order, FulfillmentError> {
        let order = self.store.delete(id)?.ok_or(FulfillmentError::NotFound(id))?;
        if let Some(path) = &order.document_path {
            collaborators::remove_document(path);
        }
        info!(order_id = %id, "Order deleted");
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, StaticTables};
    use crate::ephemeris::test_support::{chart_with_sun, FixedEphemeris};
    use crate::geo::test_support::static_resolver;
    use crate::storage::InMemoryOrderStore;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingMailer {
        sent: AtomicUsize,
        accept: bool,
    }

    #[async_trait]
    impl Mailer for CountingMailer {
        async fn send(&self, _to_email: &str, _to_name: &str, _document: &Path) -> bool {
            self.sent.fetch_add(1, Ordering::SeqCst);
            self.accept
        }

        fn mailer_name(&self) -> &'static str {
            "counting"
        }
    }

    struct BrokenRenderer;

    #[async_trait]
    impl DocumentRenderer for BrokenRenderer {
        async fn render(
            &self,
            _order_id: OrderId,
            _result: &crate::types::ComputationResult,
            _tier: ProductTier,
        ) -> Result<PathBuf, RenderError> {
            Err(RenderError::Other("template missing".into()))
        }

        fn renderer_name(&self) -> &'static str {
            "broken"
        }
    }

    struct Harness {
        service: FulfillmentService,
        store: Arc<InMemoryOrderStore>,
        mailer: Arc<CountingMailer>,
        _dir: tempfile::TempDir,
    }

    fn harness(renderer: Option<Arc<dyn DocumentRenderer>>, accept_mail: bool) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::default();
        let engine = FixedEphemeris::new(chart_with_sun("Gem", 84.3567), chart_with_sun("Tau", 60.5));
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(engine),
            static_resolver(),
            Arc::new(StaticTables::embedded().unwrap()),
            &config,
        ));
        let store = Arc::new(InMemoryOrderStore::new());
        let mailer = Arc::new(CountingMailer {
            sent: AtomicUsize::new(0),
            accept: accept_mail,
        });
        let renderer = renderer.unwrap_or_else(|| Arc::new(JsonDocumentRenderer::new(dir.path())));
        let service = FulfillmentService::new(store.clone(), orchestrator, renderer, mailer.clone(), config.pricing);
        Harness {
            service,
            store,
            mailer,
            _dir: dir,
        }
    }

    fn request(place: &str, session: Option<&str>) -> OrderRequest {
        OrderRequest {
            name: "Anna Müller".into(),
            email: "anna@example.org".into(),
            birth_date: "15.06.1990".into(),
            birth_time: "14:30".into(),
            birth_place: place.into(),
            tier: ProductTier::Pro,
            payment: PaymentRef {
                session_id: session.map(str::to_string),
                payment_id: None,
            },
        }
    }

    fn confirmation(session: &str) -> PaymentConfirmation {
        let metadata = [
            ("name", "Anna Müller"),
            ("email", "anna@example.org"),
            ("geburtsdatum", "15.06.1990"),
            ("geburtszeit", "14:30"),
            ("geburtsort", "Bensheim"),
            ("version", "pro"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        PaymentConfirmation {
            event_type: CHECKOUT_COMPLETED.into(),
            session_id: session.into(),
            payment_id: Some("pi_1".into()),
            amount_minor: Some(8900),
            metadata,
        }
    }

    fn created(outcome: IntakeOutcome) -> OrderId {
        match outcome {
            IntakeOutcome::Created(id) => id,
            other => panic!("expected a created order, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_happy_path_reaches_done() {
        let h = harness(None, true);
        let id = created(h.service.create_order(request("Bensheim", Some("cs_1"))).unwrap());

        let order = h.service.process(id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Done);
        assert!(order.email_sent);
        assert!(order.error_message.is_none());
        assert_eq!(order.price, 89.0);

        let stored = h.store.get(id).unwrap().unwrap();
        assert_eq!(stored, order);
        assert!(h.service.status(id).unwrap().document_ready);
    }

    #[tokio::test]
    async fn test_second_run_is_refused() {
        let h = harness(None, true);
        let id = created(h.service.create_order(request("Bensheim", None)).unwrap());

        h.service.process(id).await.unwrap();
        let err = h.service.process(id).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::AlreadyClaimed { status: OrderStatus::Done, .. }));
        assert_eq!(h.mailer.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_geocode_failure_fails_order_with_result_attached() {
        let h = harness(None, true);
        let id = created(h.service.create_order(request("Atlantis", None)).unwrap());

        let order = h.service.process(id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(order.error_message.as_deref(), Some("place not found: 'Atlantis'"));
        assert!(order.result.as_ref().unwrap().is_fatal());
        assert!(order.document_path.is_none());
        assert_eq!(h.mailer.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_render_failure_keeps_result() {
        let h = harness(Some(Arc::new(BrokenRenderer)), true);
        let id = created(h.service.create_order(request("Bensheim", None)).unwrap());

        h.service.process(id).await.unwrap();
        let stored = h.store.get(id).unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Failed);
        assert_eq!(
            stored.error_message.as_deref(),
            Some("document rendering failed: renderer failed: template missing")
        );
        assert!(stored.result.as_ref().unwrap().tropical.is_some());
        assert!(!h.service.status(id).unwrap().document_ready);
    }

    #[tokio::test]
    async fn test_undelivered_mail_still_done() {
        let h = harness(None, false);
        let id = created(h.service.create_order(request("Bensheim", None)).unwrap());

        let order = h.service.process(id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Done);
        assert!(!order.email_sent);
    }

    #[tokio::test]
    async fn test_invalid_request_rejected_immediately() {
        let h = harness(None, true);
        let mut bad = request("Bensheim", None);
        bad.birth_date = "1990-06-15".into();
        assert!(matches!(
            h.service.create_order(bad),
            Err(FulfillmentError::Input(InputError::InvalidDateFormat(_)))
        ));
        assert_eq!(h.store.count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_confirmation_returns_existing_order() {
        let h = harness(None, true);
        let first = h.service.confirm_payment(&confirmation("cs_dup")).unwrap();
        let id = first.order_id().unwrap();
        assert_eq!(first, IntakeOutcome::Created(id));

        let second = h.service.confirm_payment(&confirmation("cs_dup")).unwrap();
        assert_eq!(second, IntakeOutcome::Duplicate(id));
        assert_eq!(h.store.count(), 1);

        let order = h.service.find_by_session("cs_dup").unwrap().unwrap();
        assert_eq!(order.price, 89.0);
        assert_eq!(order.tier, ProductTier::Pro);
    }

    #[tokio::test]
    async fn test_confirmation_filtering() {
        let h = harness(None, true);

        let mut other = confirmation("cs_a");
        other.event_type = "payment_intent.created".into();
        assert!(matches!(h.service.confirm_payment(&other).unwrap(), IntakeOutcome::Ignored(_)));

        let mut incomplete = confirmation("cs_b");
        incomplete.metadata.remove("geburtsort");
        assert!(matches!(h.service.confirm_payment(&incomplete).unwrap(), IntakeOutcome::Ignored(_)));
        assert_eq!(h.store.count(), 0);
    }

    #[tokio::test]
    async fn test_confirmation_defaults_tier_and_price() {
        let h = harness(None, true);
        let mut c = confirmation("cs_plain");
        c.metadata.remove("version");
        c.amount_minor = None;

        let id = h.service.confirm_payment(&c).unwrap().order_id().unwrap();
        let order = h.service.order(id).unwrap();
        assert_eq!(order.tier, ProductTier::Normal);
        assert_eq!(order.price, 39.0);
    }

    #[tokio::test]
    async fn test_monthly_stats_newest_first() {
        let h = harness(None, true);
        for (session, month) in [("cs_1", 1), ("cs_2", 3), ("cs_3", 3)] {
            let mut order = Order::new(&request("Bensheim", Some(session)), 39.5);
            order.created_at = Utc.with_ymd_and_hms(2025, month, 10, 12, 0, 0).unwrap();
            h.store.insert_new(&order).unwrap();
        }

        let stats = h.service.monthly_stats().unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].month, "2025-03");
        assert_eq!(stats[0].count, 2);
        assert_eq!(stats[0].revenue, 79.0);
        assert_eq!(stats[1].month, "2025-01");
    }

    #[tokio::test]
    async fn test_delete_removes_document() {
        let h = harness(None, true);
        let id = created(h.service.create_order(request("Bensheim", None)).unwrap());
        let order = h.service.process(id).await.unwrap();
        let path = order.document_path.unwrap();
        assert!(path.exists());

        h.service.delete_order(id).unwrap();
        assert!(!path.exists());
        assert!(matches!(h.service.status(id), Err(FulfillmentError::NotFound(_))));
        assert!(matches!(h.service.delete_order(id), Err(FulfillmentError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_dispatch_runs_in_background() {
        let h = harness(None, true);
        let id = created(h.service.create_order(request("Bensheim", None)).unwrap());

        h.service.dispatch(id).await.unwrap();
        assert_eq!(h.service.status(id).unwrap().status, OrderStatus::Done);
    }

    /// Accepts every write except the one that marks an order `done`.
    struct DoneRefusingStore {
        inner: InMemoryOrderStore,
    }

    impl OrderStore for DoneRefusingStore {
        fn insert_new(&self, order: &Order) -> Result<InsertOutcome, StoreError> {
            self.inner.insert_new(order)
        }
        fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
            self.inner.get(id)
        }
        fn save(&self, order: &Order) -> Result<(), StoreError> {
            if order.status == OrderStatus::Done {
                return Err(StoreError::Storage("disk full".into()));
            }
            self.inner.save(order)
        }
        fn claim(&self, id: OrderId) -> Result<Order, StoreError> {
            self.inner.claim(id)
        }
        fn find_by_session(&self, session_id: &str) -> Result<Option<Order>, StoreError> {
            self.inner.find_by_session(session_id)
        }
        fn list(&self, status: Option<OrderStatus>, limit: usize) -> Result<Vec<Order>, StoreError> {
            self.inner.list(status, limit)
        }
        fn all(&self) -> Result<Vec<Order>, StoreError> {
            self.inner.all()
        }
        fn delete(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
            self.inner.delete(id)
        }
        fn count(&self) -> usize {
            self.inner.count()
        }
        fn backend_name(&self) -> &'static str {
            "done-refusing"
        }
    }

    #[tokio::test]
    async fn test_unsaved_done_ends_failed() {
        let h = harness(None, true);
        let store = Arc::new(DoneRefusingStore {
            inner: InMemoryOrderStore::new(),
        });
        let service = FulfillmentService {
            store: store.clone(),
            ..h.service.clone()
        };
        let id = created(service.create_order(request("Bensheim", None)).unwrap());

        let order = service.process(id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(order.error_message.as_deref(), Some("storage error: disk full"));

        let stored = store.get(id).unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Failed);
        assert!(stored.result.is_some());
        assert!(stored.document_path.is_some());
    }
}
