use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use ferrogram_core::Context;

use super::{StateRepr, StateStore};
use crate::error::StoreResult;

/// Process-local [`StateStore`]. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: RwLock<HashMap<String, StateRepr>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of conversations with a stored state.
    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> StoreResult<Option<StateRepr>> {
        Ok(self.states.read().get(key).cloned())
    }

    async fn set(&self, key: &str, state: &str, payload: Context) -> StoreResult<()> {
        self.states
            .write()
            .insert(key.to_string(), StateRepr::new(key, state, payload));
        Ok(())
    }

    async fn clear(&self, key: &str) -> StoreResult<()> {
        self.states.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_overwrites_and_clear_removes() {
        let store = MemoryStateStore::new();
        assert!(store.get("k").await.unwrap().is_none());

        store.set("k", "a:1", Context::new()).await.unwrap();
        store
            .set("k", "a:2", Context::new().with("n", 2i64))
            .await
            .unwrap();

        let repr = store.get("k").await.unwrap().unwrap();
        assert_eq!(repr.state, "a:2");
        assert_eq!(repr.payload.get_int("n"), Some(2));
        assert_eq!(store.len(), 1);

        store.clear("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.is_empty());
    }
}
