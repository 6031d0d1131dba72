use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use super::{KvStore, SITE_KEY, StoreError, VIEWS_FIELD};

/// In-memory counter store
///
/// State lives only as long as the process and is not shared between
/// instances. Each operation holds the lock for its whole read-modify-write.
pub struct MemoryStore {
    data: RwLock<HashMap<String, HashMap<String, u64>>>,
}

impl MemoryStore {
    /// Create a store with the site counter seeded at zero
    pub fn new() -> Self {
        let mut data = HashMap::new();
        data.insert(
            SITE_KEY.to_string(),
            HashMap::from([(VIEWS_FIELD.to_string(), 0)]),
        );
        Self {
            data: RwLock::new(data),
        }
    }

    /// Number of resources currently held
    pub fn len(&self) -> usize {
        self.data.read().map(|data| data.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str, field: &str) -> Result<Option<u64>, StoreError> {
        let data = self.data.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(data.get(key).and_then(|fields| fields.get(field)).copied())
    }

    async fn set(&self, key: &str, field: &str, value: u64) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(|_| StoreError::LockPoisoned)?;
        data.entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }

    async fn increment(&self, key: &str, field: &str, by: u64) -> Result<u64, StoreError> {
        let mut data = self.data.write().map_err(|_| StoreError::LockPoisoned)?;
        let current = data
            .entry(key.to_string())
            .or_default()
            .entry(field.to_string())
            .or_insert(0);
        *current = current.checked_add(by).ok_or_else(|| StoreError::Overflow {
            key: key.to_string(),
            field: field.to_string(),
        })?;
        debug!(key, field, value = *current, "incremented counter");
        Ok(*current)
    }
}
