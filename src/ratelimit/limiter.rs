//! Core throttle implementation.
//!
//! Tracks failed attempts per subject key against the shared counter
//! store, locks a key out when its policy threshold is crossed, and
//! escalates repeated lockouts within the rolling window to a ban.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, trace, warn};

use crate::config::ThrottleConfig;
use crate::error::Result;
use crate::store::{CounterStore, StateKey, StoreLock, StoreResult};

use super::policy::{LimitPolicy, PolicyRegistry};

/// Message shown while a key is under a timed lockout.
const LOCKOUT_MESSAGE: &str = "Too many attempts. Please try again later.";
/// Message shown while a key is banned.
const BAN_MESSAGE: &str = "Access temporarily banned after repeated failed attempts.";

/// The abuse-prevention rate limiter guarding sensitive actions.
///
/// Callers check [`too_many_attempts`](Self::too_many_attempts) before
/// processing an action and invoke [`hit`](Self::hit) on each observed
/// failure. All state lives in the injected counter store; instances are
/// cheap views over it and can be shared freely across workers.
pub struct RateLimiter {
    /// The shared counter store
    store: Arc<dyn CounterStore>,
    /// Registered limit policies
    policies: PolicyRegistry,
    /// Lock and window tuning
    config: ThrottleConfig,
}

impl RateLimiter {
    /// Create a limiter with default throttle tuning.
    pub fn new(store: Arc<dyn CounterStore>, policies: PolicyRegistry) -> Self {
        Self::with_config(store, policies, ThrottleConfig::default())
    }

    /// Create a limiter with explicit throttle tuning.
    pub fn with_config(
        store: Arc<dyn CounterStore>,
        policies: PolicyRegistry,
        config: ThrottleConfig,
    ) -> Self {
        Self {
            store,
            policies,
            config,
        }
    }

    /// Whether the subject is currently blocked.
    ///
    /// A ban outranks a lockout; either blocks outright. Otherwise the key
    /// is blocked once its attempt counter has reached the policy maximum.
    pub async fn too_many_attempts(&self, key: &str, limit_type: &str) -> Result<bool> {
        let policy = self.policies.policy(limit_type)?;
        let state = StateKey::new(key);

        if self.is_banned(&state).await || self.is_locked(&state).await {
            return Ok(true);
        }

        Ok(self.attempts(key).await >= policy.max_attempts)
    }

    /// Record one failed action and return the attempt count after this
    /// call.
    ///
    /// No-op while the key is locked or banned: the counter is frozen for
    /// the duration of a block. The increment runs under a short-lived
    /// named lock scoped to the key; a lock-wait timeout returns the
    /// last-known count without incrementing, and any other store failure
    /// returns 0. Throttling is never allowed to block legitimate traffic
    /// because the cache is down.
    ///
    /// Only an unregistered limit type is surfaced as an error.
    pub async fn hit(&self, key: &str, limit_type: &str) -> Result<u64> {
        let policy = self.policies.policy(limit_type)?.clone();
        let state = StateKey::new(key);

        if self.is_banned(&state).await || self.is_locked(&state).await {
            trace!(key = %key, "Hit ignored while key is blocked");
            return Ok(self.attempts(key).await);
        }

        let mut lock = self
            .store
            .lock(&state.hit_lock(), Duration::from_secs(self.config.lock_ttl_secs));

        match lock
            .block(Duration::from_secs(self.config.lock_wait_secs))
            .await
        {
            Ok(true) => {
                let _guard = HeldLock(lock);
                Ok(self.record_attempt(&state, &policy).await)
            }
            Ok(false) => {
                warn!(
                    key = %key,
                    wait_secs = self.config.lock_wait_secs,
                    "Timed out waiting for the hit lock, returning last-known count"
                );
                Ok(self.attempts(key).await)
            }
            Err(e) => {
                error!(
                    key = %key,
                    error = %e,
                    "Counter store failed while acquiring the hit lock, failing open"
                );
                Ok(0)
            }
        }
    }

    /// Seconds until the most restrictive active block expires.
    ///
    /// Zero if the key is not blocked. A ban is checked before a lockout.
    pub async fn available_in(&self, key: &str) -> Duration {
        let state = StateKey::new(key);

        for record in [state.ban(), state.lockout()] {
            if let Some(expires_at) = self.read(&record).await {
                return Duration::from_secs(expires_at.saturating_sub(now_epoch()));
            }
        }

        Duration::ZERO
    }

    /// Attempts left before the key locks out. Zero while blocked.
    pub async fn remaining(&self, key: &str, limit_type: &str) -> Result<u64> {
        let policy = self.policies.policy(limit_type)?;
        let state = StateKey::new(key);

        if self.is_banned(&state).await || self.is_locked(&state).await {
            return Ok(0);
        }

        Ok(policy.max_attempts.saturating_sub(self.attempts(key).await))
    }

    /// The raw attempt counter for a key.
    pub async fn attempts(&self, key: &str) -> u64 {
        self.read(&StateKey::new(key).attempts()).await.unwrap_or(0)
    }

    /// The user-facing message for a blocked key.
    ///
    /// Ban-specific while banned, the generic lockout message otherwise.
    /// Side-effect-free; callers never see the internal distinction
    /// beyond the wording.
    pub async fn block_message(&self, key: &str) -> String {
        let state = StateKey::new(key);

        if self.is_banned(&state).await {
            BAN_MESSAGE.to_string()
        } else {
            LOCKOUT_MESSAGE.to_string()
        }
    }

    /// Operator reset: remove the attempt counter and lockout for a key.
    ///
    /// The ban record and rolling lockout count survive, so a reset never
    /// erases escalation history.
    pub async fn clear(&self, key: &str) {
        let state = StateKey::new(key);

        for store_key in [state.attempts(), state.lockout()] {
            if let Err(e) = self.store.forget(&store_key).await {
                error!(
                    key = %key,
                    store_key = %store_key,
                    error = %e,
                    "Failed to clear throttle state"
                );
            }
        }
    }

    /// Routine hygiene: clear the key only if it is currently unlocked
    /// with zero attempts. No-op otherwise.
    pub async fn cleanup(&self, key: &str) {
        let state = StateKey::new(key);

        if self.is_locked(&state).await || self.attempts(key).await > 0 {
            return;
        }

        self.clear(key).await;
    }

    /// Increment under the held lock, failing open on store errors.
    async fn record_attempt(&self, state: &StateKey, policy: &LimitPolicy) -> u64 {
        match self.increment(state, policy).await {
            Ok(count) => count,
            Err(e) => {
                error!(
                    key = %state.subject(),
                    error = %e,
                    "Counter store failed while recording an attempt, failing open"
                );
                0
            }
        }
    }

    async fn increment(&self, state: &StateKey, policy: &LimitPolicy) -> StoreResult<u64> {
        let count = self.store.get(&state.attempts()).await?.unwrap_or(0) + 1;
        self.store
            .put(&state.attempts(), count, policy.decay())
            .await?;

        if count >= policy.max_attempts {
            self.lockout(state, policy).await?;
        }

        Ok(count)
    }

    /// Convert a threshold breach into a lockout, or a ban once the
    /// rolling lockout count reaches the policy's ban threshold.
    ///
    /// Records store their own expiry as epoch seconds so `available_in`
    /// can be answered from a plain read.
    async fn lockout(&self, state: &StateKey, policy: &LimitPolicy) -> StoreResult<()> {
        let lockouts = self.store.get(&state.lockout_count()).await?.unwrap_or(0) + 1;
        self.store
            .put(
                &state.lockout_count(),
                lockouts,
                Duration::from_secs(self.config.lockout_count_ttl_secs),
            )
            .await?;

        if lockouts >= policy.ban_threshold {
            let expires_at = now_epoch() + policy.ban_duration_seconds;
            self.store
                .put(&state.ban(), expires_at, policy.ban_duration())
                .await?;
            warn!(
                key = %state.subject(),
                lockouts = lockouts,
                duration_secs = policy.ban_duration_seconds,
                "Repeated lockouts escalated to a ban"
            );
        } else {
            let expires_at = now_epoch() + policy.decay_seconds;
            self.store
                .put(&state.lockout(), expires_at, policy.decay())
                .await?;
            warn!(
                key = %state.subject(),
                lockouts = lockouts,
                duration_secs = policy.decay_seconds,
                "Attempt limit reached, key locked out"
            );
        }

        Ok(())
    }

    /// Read a store key, treating backend failure as absence.
    async fn read(&self, store_key: &str) -> Option<u64> {
        match self.store.get(store_key).await {
            Ok(value) => value,
            Err(e) => {
                error!(
                    store_key = %store_key,
                    error = %e,
                    "Counter store read failed, treating as unlimited"
                );
                None
            }
        }
    }

    async fn is_banned(&self, state: &StateKey) -> bool {
        self.read(&state.ban()).await.is_some()
    }

    async fn is_locked(&self, state: &StateKey) -> bool {
        self.read(&state.lockout()).await.is_some()
    }
}

/// Releases the held hit lock when dropped, so every exit path out of the
/// increment section releases, including panics.
struct HeldLock(Box<dyn StoreLock>);

impl Drop for HeldLock {
    fn drop(&mut self) {
        self.0.release();
    }
}

fn now_epoch() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}
