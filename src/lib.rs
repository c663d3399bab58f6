//! Cosmo Profile: birth-data profiles and paid-order fulfillment
//!
//! Turns a person's birth data into a structured cosmological profile by
//! running it through independent computation stages, then drives a
//! persisted fulfillment workflow (compute, render, deliver) for orders.
//!
//! ## Architecture
//!
//! - **Stages**: numeric reducer, sign translator, tropical / sidereal frames,
//!   element and decan lookups, gate / channel / center classifier
//! - **Pipeline**: orchestrator isolating stage failures, result export,
//!   quick sign check
//! - **Fulfillment**: crash-consistent order state machine over an
//!   [`storage::OrderStore`]
//! - **Collaborators**: ephemeris engine, geocoder, timezone resolver,
//!   document renderer and mailer behind async traits

pub mod config;
pub mod ephemeris;
pub mod error;
pub mod fulfillment;
pub mod geo;
pub mod pipeline;
pub mod stages;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::{AppConfig, StaticTables};

// Re-export the error taxonomy
pub use error::{ConfigGap, ErrorKind, InputError, StageError, UpstreamError};

// Re-export commonly used types
pub use types::{
    ComputationResult, MonthlyStats, Order, OrderId, OrderRequest, OrderStatus, OrderStatusView, PersonInput,
    ProductTier, StageFailure, StageName,
};

// Re-export the pipeline and fulfillment entry points
pub use fulfillment::{FulfillmentError, FulfillmentService, IntakeOutcome, PaymentConfirmation};
pub use pipeline::{quick_sign_check, Orchestrator, SignCheck};

// Re-export storage backends
pub use storage::{InMemoryOrderStore, OrderStore, SledOrderStore, StoreError};
