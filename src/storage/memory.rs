//! In-memory order storage for tests and ephemeral runs.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{claim_transition, newest_first, InsertOutcome, OrderStore, StoreError};
use crate::types::{Order, OrderId, OrderStatus};

#[derive(Default)]
struct Inner {
    orders: HashMap<OrderId, Order>,
    sessions: HashMap<String, OrderId>,
}

/// Thread-safe via `RwLock`. Not durable, data lost on restart.
#[derive(Default)]
pub struct InMemoryOrderStore {
    inner: RwLock<Inner>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner.read().map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner.write().map_err(|e| StoreError::Storage(e.to_string()))
    }
}

impl OrderStore for InMemoryOrderStore {
    fn insert_new(&self, order: &Order) -> Result<InsertOutcome, StoreError> {
        let mut store = self.write()?;
        if let Some(session) = &order.payment.session_id {
            if let Some(existing) = store.sessions.get(session) {
                return Ok(InsertOutcome::Duplicate(*existing));
            }
            store.sessions.insert(session.clone(), order.id);
        }
        store.orders.insert(order.id, order.clone());
        Ok(InsertOutcome::Inserted)
    }

    fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.read()?.orders.get(&id).cloned())
    }

    fn save(&self, order: &Order) -> Result<(), StoreError> {
        let mut store = self.write()?;
        match store.orders.get_mut(&order.id) {
            Some(slot) => {
                *slot = order.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(order.id)),
        }
    }

    fn claim(&self, id: OrderId) -> Result<Order, StoreError> {
        let mut store = self.write()?;
        let order = store.orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        claim_transition(order)?;
        Ok(order.clone())
    }

    fn find_by_session(&self, session_id: &str) -> Result<Option<Order>, StoreError> {
        let store = self.read()?;
        Ok(store
            .sessions
            .get(session_id)
            .and_then(|id| store.orders.get(id))
            .cloned())
    }

    fn list(&self, status: Option<OrderStatus>, limit: usize) -> Result<Vec<Order>, StoreError> {
        Ok(newest_first(self.all()?, status, limit))
    }

    fn all(&self) -> Result<Vec<Order>, StoreError> {
        Ok(self.read()?.orders.values().cloned().collect())
    }

    fn delete(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let mut store = self.write()?;
        let removed = store.orders.remove(&id);
        if let Some(session) = removed.as_ref().and_then(|o| o.payment.session_id.as_ref()) {
            store.sessions.remove(session);
        }
        Ok(removed)
    }

    fn count(&self) -> usize {
        self.read().map_or(0, |store| store.orders.len())
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::exercise_store;

    #[test]
    fn test_in_memory_store_contract() {
        let store = InMemoryOrderStore::new();
        exercise_store(&store);
    }

    #[test]
    fn test_trait_object() {
        let store: Box<dyn OrderStore> = Box::new(InMemoryOrderStore::new());
        assert_eq!(store.backend_name(), "InMemory");
        assert_eq!(store.count(), 0);
    }
}
