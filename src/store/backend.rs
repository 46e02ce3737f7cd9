//! Counter store traits for abstracting shared TTL cache backends.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a counter store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Store operation failed: {0}")]
    Operation(String),
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Trait for shared TTL counter store implementations.
///
/// This trait abstracts over the cache deployment backing the throttle
/// state, allowing the limiter to work against an in-process store or a
/// shared one. Values carry a TTL and read as absent once expired.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read the value for a key, or `None` if absent or expired.
    async fn get(&self, key: &str) -> StoreResult<Option<u64>>;

    /// Write a value with a TTL, overwriting any prior value and
    /// renewing the expiry.
    async fn put(&self, key: &str, value: u64, ttl: Duration) -> StoreResult<()>;

    /// Remove a key if present.
    async fn forget(&self, key: &str) -> StoreResult<()>;

    /// Create a handle for a named mutual-exclusion lock.
    ///
    /// The lock is not acquired until [`StoreLock::block`] succeeds. The
    /// TTL bounds how long an acquired lock can be held before the store
    /// reclaims it from a crashed holder.
    fn lock(&self, name: &str, ttl: Duration) -> Box<dyn StoreLock>;
}

/// Handle for a named, TTL-bounded distributed lock.
#[async_trait]
pub trait StoreLock: Send {
    /// Wait up to `timeout` to acquire the lock.
    ///
    /// Returns `Ok(true)` when acquired, `Ok(false)` when the wait timed
    /// out, and `Err` only on backend failure.
    async fn block(&mut self, timeout: Duration) -> StoreResult<bool>;

    /// Release the lock.
    ///
    /// Idempotent. Safe to call when the lock was never acquired or has
    /// already expired; must not evict a lock that another holder
    /// re-acquired after expiry.
    fn release(&mut self);
}
