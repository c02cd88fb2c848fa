use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use ferrogram_core::ContextValue;

use crate::error::StoreResult;

/// Keyed storage of short-lived values.
///
/// Every write carries its own time-to-live; an expired entry reads as absent.
#[async_trait]
pub trait ExpiringStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> StoreResult<Option<ContextValue>>;

    async fn set(&self, key: &str, value: ContextValue, ttl: Duration) -> StoreResult<()>;

    async fn remove(&self, key: &str) -> StoreResult<()>;
}

#[derive(Debug)]
struct Entry {
    value: ContextValue,
    /// `None` when the deadline does not fit in an `Instant`.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| deadline > now)
    }
}

/// Process-local [`ExpiringStore`].
///
/// Entries are dropped lazily when read after their deadline; call
/// [`purge_expired`](Self::purge_expired) to reclaim memory eagerly.
#[derive(Debug, Default)]
pub struct MemoryExpiringStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryExpiringStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl ExpiringStore for MemoryExpiringStore {
    async fn get(&self, key: &str) -> StoreResult<Option<ContextValue>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(Instant::now()) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: ContextValue, ttl: Duration) -> StoreResult<()> {
        let expires_at = Instant::now().checked_add(ttl);
        self.entries
            .lock()
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}
