//! The order entity driven by the fulfillment state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use super::{parse_birth_date, parse_birth_time, ComputationResult, PersonInput};
use crate::error::InputError;

pub type OrderId = Uuid;

/// Lifecycle status: `new -> computing -> {done | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    New,
    Computing,
    Done,
    Failed,
}

impl OrderStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Computing => "computing",
            OrderStatus::Done => "done",
            OrderStatus::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Done | OrderStatus::Failed)
    }

    /// Forward edges of the transition graph. `failed` is reachable from
    /// every non-terminal state.
    pub const fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::New, OrderStatus::Computing)
                | (OrderStatus::Computing, OrderStatus::Done)
                | (OrderStatus::New, OrderStatus::Failed)
                | (OrderStatus::Computing, OrderStatus::Failed)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(OrderStatus::New),
            "computing" => Ok(OrderStatus::Computing),
            "done" => Ok(OrderStatus::Done),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(format!("unknown order status '{other}'")),
        }
    }
}

/// Product tier selecting price and document template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProductTier {
    #[default]
    Normal,
    Pro,
}

impl ProductTier {
    pub const fn as_str(self) -> &'static str {
        match self {
            ProductTier::Normal => "normal",
            ProductTier::Pro => "pro",
        }
    }
}

impl std::fmt::Display for ProductTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductTier {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(ProductTier::Normal),
            "pro" => Ok(ProductTier::Pro),
            _ => Err(InputError::UnknownTier(s.to_string())),
        }
    }
}

/// Payment-provider correlation ids.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentRef {
    /// Checkout session id; two orders with the same id are the same purchase
    pub session_id: Option<String>,
    pub payment_id: Option<String>,
}

/// Purchase intent as submitted, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub name: String,
    pub email: String,
    pub birth_date: String,
    pub birth_time: String,
    pub birth_place: String,
    #[serde(default)]
    pub tier: ProductTier,
    #[serde(default)]
    pub payment: PaymentRef,
}

impl OrderRequest {
    /// Reject anything the pipeline could never process.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.name.trim().is_empty() {
            return Err(InputError::MissingField("name"));
        }
        if !is_plausible_email(&self.email) {
            return Err(InputError::InvalidEmail(self.email.clone()));
        }
        parse_birth_date(&self.birth_date)?;
        parse_birth_time(&self.birth_time)?;
        if self.birth_place.trim().is_empty() {
            return Err(InputError::EmptyPlace);
        }
        Ok(())
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.trim().split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
        }
        None => false,
    }
}

/// A paid (or pending) profile order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_name: String,
    pub customer_email: String,
    pub birth_date: String,
    pub birth_time: String,
    pub birth_place: String,
    pub tier: ProductTier,
    pub price: f64,
    pub payment: PaymentRef,
    pub status: OrderStatus,
    /// Attached once by a full pipeline run
    pub result: Option<ComputationResult>,
    pub document_path: Option<PathBuf>,
    pub email_sent: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// New order in the `new` state with every delivery field empty.
    pub fn new(request: &OrderRequest, price: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer_name: request.name.trim().to_string(),
            customer_email: request.email.trim().to_string(),
            birth_date: request.birth_date.clone(),
            birth_time: request.birth_time.clone(),
            birth_place: request.birth_place.trim().to_string(),
            tier: request.tier,
            price,
            payment: request.payment.clone(),
            status: OrderStatus::New,
            result: None,
            document_path: None,
            email_sent: false,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn person(&self) -> PersonInput {
        PersonInput::new(
            &self.customer_name,
            &self.birth_date,
            &self.birth_time,
            &self.birth_place,
        )
    }

    /// Move along the transition graph, stamping `updated_at`.
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid order transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// Customer-facing status view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusView {
    pub id: OrderId,
    pub status: OrderStatus,
    pub document_ready: bool,
    pub created_at: DateTime<Utc>,
}

/// Orders and revenue for one calendar month of creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyStats {
    /// YYYY-MM
    pub month: String,
    pub count: u64,
    pub revenue: f64,
}
