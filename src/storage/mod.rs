//! Order Storage
//!
//! The fulfillment state machine persists every order transition through an
//! [`OrderStore`]. Two backends:
//! - `SledOrderStore`: durable, flushed after every write
//! - `InMemoryOrderStore`: for tests and ephemeral runs
//!
//! Both enforce the same two guarantees atomically: at most one order per
//! payment session id, and at most one successful claim (`new -> computing`)
//! per order.

pub mod lockfile;
mod memory;
mod sled_store;

pub use lockfile::ProcessLock;
pub use memory::InMemoryOrderStore;
pub use sled_store::SledOrderStore;

use crate::types::{Order, OrderId, OrderStatus};

/// Result of inserting a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// An order with the same session id already exists
    Duplicate(OrderId),
}

/// Trait for pluggable order persistence backends
///
/// Implementations must be thread-safe (Send + Sync) for shared access
/// across fulfillment tasks.
pub trait OrderStore: Send + Sync {
    /// Insert a new order unless its session id is already taken.
    fn insert_new(&self, order: &Order) -> Result<InsertOutcome, StoreError>;

    fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Overwrite an existing order. Fails with `NotFound` if it was deleted.
    fn save(&self, order: &Order) -> Result<(), StoreError>;

    /// Atomically move an order from `new` to `computing` and return it.
    fn claim(&self, id: OrderId) -> Result<Order, StoreError>;

    fn find_by_session(&self, session_id: &str) -> Result<Option<Order>, StoreError>;

    /// Orders newest first, optionally filtered by status.
    fn list(&self, status: Option<OrderStatus>, limit: usize) -> Result<Vec<Order>, StoreError>;

    /// Every stored order, in no particular order.
    fn all(&self) -> Result<Vec<Order>, StoreError>;

    /// Remove an order, returning it if it existed.
    fn delete(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    fn count(&self) -> usize;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Storage errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("order {0} not found")]
    NotFound(OrderId),
    #[error("order {id} already claimed (status {status})")]
    AlreadyClaimed { id: OrderId, status: OrderStatus },
}

fn newest_first(mut orders: Vec<Order>, status: Option<OrderStatus>, limit: usize) -> Vec<Order> {
    orders.retain(|o| status.map_or(true, |s| o.status == s));
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders.truncate(limit);
    orders
}

/// Shared claim rule: only `new` orders may start computing.
fn claim_transition(order: &mut Order) -> Result<(), StoreError> {
    order.transition(OrderStatus::Computing).map_err(|_| StoreError::AlreadyClaimed {
        id: order.id,
        status: order.status,
    })
}
