//! In-memory counter store implementation.
//!
//! Backs tests and single-process deployments with the same TTL and lock
//! semantics as a shared cache. Expired entries are evicted lazily on read.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use super::backend::{CounterStore, StoreLock, StoreResult};

/// How often a blocked lock acquisition retries.
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: u64,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy)]
struct LockEntry {
    owner: Uuid,
    expires_at: Instant,
}

/// Shared in-memory TTL store with named locks.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    locks: Arc<Mutex<HashMap<String, LockEntry>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<u64>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value));
            }
        } else {
            return Ok(None);
        }

        // Expired, evict before reporting absence
        self.entries.remove_if(key, |_, e| e.expires_at <= now);
        Ok(None)
    }

    async fn put(&self, key: &str, value: u64, ttl: Duration) -> StoreResult<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn forget(&self, key: &str) -> StoreResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn lock(&self, name: &str, ttl: Duration) -> Box<dyn StoreLock> {
        Box::new(MemoryLock {
            name: name.to_string(),
            ttl,
            owner: Uuid::new_v4(),
            acquired: false,
            locks: Arc::clone(&self.locks),
        })
    }
}

/// A named lock handle against a [`MemoryStore`].
///
/// Each handle carries its own owner token, so releasing after the lock
/// expired and was taken by another handle leaves the new holder intact.
pub struct MemoryLock {
    name: String,
    ttl: Duration,
    owner: Uuid,
    acquired: bool,
    locks: Arc<Mutex<HashMap<String, LockEntry>>>,
}

impl MemoryLock {
    fn try_acquire(&self) -> bool {
        let mut locks = self.locks.lock();
        let now = Instant::now();
        match locks.get(&self.name) {
            Some(held) if held.expires_at > now => false,
            _ => {
                locks.insert(
                    self.name.clone(),
                    LockEntry {
                        owner: self.owner,
                        expires_at: now + self.ttl,
                    },
                );
                true
            }
        }
    }
}

#[async_trait]
impl StoreLock for MemoryLock {
    async fn block(&mut self, timeout: Duration) -> StoreResult<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.try_acquire() {
                self.acquired = true;
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(LOCK_RETRY_INTERVAL).await;
        }
    }

    fn release(&mut self) {
        if !self.acquired {
            return;
        }
        self.acquired = false;

        let mut locks = self.locks.lock();
        if let Some(held) = locks.get(&self.name) {
            if held.owner == self.owner {
                locks.remove(&self.name);
            }
        }
    }
}

impl Drop for MemoryLock {
    fn drop(&mut self) {
        self.release();
    }
}
