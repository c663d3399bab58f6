//! Durable order storage using Sled DB.
//!
//! Two trees: `orders` (uuid bytes -> JSON order) and `orders_by_session`
//! (session id -> uuid bytes). Multi-key updates run in sled transactions
//! and every write is flushed before returning, so a crash loses at most the
//! step that was in flight.

use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError, Transactional,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{claim_transition, newest_first, InsertOutcome, OrderStore, StoreError};
use crate::types::{Order, OrderId, OrderStatus};

const ORDERS_TREE: &str = "orders";
const SESSIONS_TREE: &str = "orders_by_session";

#[derive(Clone)]
pub struct SledOrderStore {
    db: Arc<sled::Db>,
    orders: sled::Tree,
    sessions: sled::Tree,
}

impl SledOrderStore {
    /// Open or create the order database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref).map_err(storage)?;
        let orders = db.open_tree(ORDERS_TREE).map_err(storage)?;
        let sessions = db.open_tree(SESSIONS_TREE).map_err(storage)?;

        info!(path = %path_ref.display(), orders = orders.len(), "Order storage opened");

        Ok(Self {
            db: Arc::new(db),
            orders,
            sessions,
        })
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.db.flush().map(|_| ()).map_err(storage)
    }
}

fn storage(e: sled::Error) -> StoreError {
    StoreError::Storage(e.to_string())
}

fn from_tx(e: TransactionError<StoreError>) -> StoreError {
    match e {
        TransactionError::Abort(inner) => inner,
        TransactionError::Storage(e) => storage(e),
    }
}

fn encode(order: &Order) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(order).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode(raw: &[u8]) -> Result<Order, StoreError> {
    serde_json::from_slice(raw).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_id(raw: &[u8]) -> Result<OrderId, StoreError> {
    Uuid::from_slice(raw).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn key(id: OrderId) -> Vec<u8> {
    id.as_bytes().to_vec()
}

impl OrderStore for SledOrderStore {
    fn insert_new(&self, order: &Order) -> Result<InsertOutcome, StoreError> {
        let value = encode(order)?;
        let session = order.payment.session_id.clone();

        let outcome = (&self.orders, &self.sessions)
            .transaction(|(orders, sessions)| -> ConflictableTransactionResult<InsertOutcome, StoreError> {
                if let Some(session) = &session {
                    if let Some(existing) = sessions.get(session.as_bytes())? {
                        let id = decode_id(&existing).map_err(ConflictableTransactionError::Abort)?;
                        return Ok(InsertOutcome::Duplicate(id));
                    }
                    sessions.insert(session.as_bytes(), key(order.id))?;
                }
                orders.insert(key(order.id), value.clone())?;
                Ok(InsertOutcome::Inserted)
            })
            .map_err(from_tx)?;

        if outcome == InsertOutcome::Inserted {
            self.flush()?;
        }
        debug!(order_id = %order.id, ?outcome, "Order insert");
        Ok(outcome)
    }

    fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        match self.orders.get(key(id)).map_err(storage)? {
            Some(raw) => decode(&raw).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, order: &Order) -> Result<(), StoreError> {
        let value = encode(order)?;
        let id = order.id;
        self.orders
            .transaction(|tx| -> ConflictableTransactionResult<(), StoreError> {
                if tx.get(key(id))?.is_none() {
                    return Err(ConflictableTransactionError::Abort(StoreError::NotFound(id)));
                }
                tx.insert(key(id), value.clone())?;
                Ok(())
            })
            .map_err(from_tx)?;
        self.flush()
    }

    fn claim(&self, id: OrderId) -> Result<Order, StoreError> {
        let claimed = self
            .orders
            .transaction(|tx| -> ConflictableTransactionResult<Order, StoreError> {
                let raw = tx
                    .get(key(id))?
                    .ok_or(ConflictableTransactionError::Abort(StoreError::NotFound(id)))?;
                let mut order = decode(&raw).map_err(ConflictableTransactionError::Abort)?;
                claim_transition(&mut order).map_err(ConflictableTransactionError::Abort)?;
                let value = encode(&order).map_err(ConflictableTransactionError::Abort)?;
                tx.insert(key(id), value)?;
                Ok(order)
            })
            .map_err(from_tx)?;
        self.flush()?;
        Ok(claimed)
    }

    fn find_by_session(&self, session_id: &str) -> Result<Option<Order>, StoreError> {
        match self.sessions.get(session_id.as_bytes()).map_err(storage)? {
            Some(raw) => self.get(decode_id(&raw)?),
            None => Ok(None),
        }
    }

    fn list(&self, status: Option<OrderStatus>, limit: usize) -> Result<Vec<Order>, StoreError> {
        Ok(newest_first(self.all()?, status, limit))
    }

    fn all(&self) -> Result<Vec<Order>, StoreError> {
        let mut orders = Vec::with_capacity(self.orders.len());
        for item in self.orders.iter() {
            let (k, raw) = item.map_err(storage)?;
            match decode(&raw) {
                Ok(order) => orders.push(order),
                Err(e) => {
                    warn!(key = ?k, error = %e, "Skipping undecodable order record");
                    continue;
                }
            }
        }
        Ok(orders)
    }

    fn delete(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let removed = (&self.orders, &self.sessions)
            .transaction(|(orders, sessions)| -> ConflictableTransactionResult<Option<Order>, StoreError> {
                let Some(raw) = orders.remove(key(id))? else {
                    return Ok(None);
                };
                let order = decode(&raw).map_err(ConflictableTransactionError::Abort)?;
                if let Some(session) = &order.payment.session_id {
                    sessions.remove(session.as_bytes())?;
                }
                Ok(Some(order))
            })
            .map_err(from_tx)?;

        if removed.is_some() {
            self.flush()?;
        }
        Ok(removed)
    }

    fn count(&self) -> usize {
        self.orders.len()
    }

    fn backend_name(&self) -> &'static str {
        "Sled"
    }
}
