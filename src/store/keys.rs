//! Cache key namespacing for throttle state.
//!
//! Four state categories share one store. Each gets its own prefix so the
//! concerns never collide, and the layout must stay stable across
//! deployments that share a cache.

/// Prefix for attempt counters.
const ATTEMPTS_PREFIX: &str = "throttle:attempts:";
/// Prefix for active lockout records.
const LOCKOUT_PREFIX: &str = "throttle:lockout:";
/// Prefix for active ban records.
const BAN_PREFIX: &str = "throttle:ban:";
/// Prefix for the rolling lockout count.
const LOCKOUT_COUNT_PREFIX: &str = "throttle:lockout-count:";
/// Prefix for the per-key hit lock.
const HIT_LOCK_PREFIX: &str = "throttle:lock:";

/// The namespaced store keys for one throttled subject.
///
/// The subject key is an opaque caller-supplied string identifying the
/// principal being throttled, e.g. a hash of IP and account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    subject: String,
}

impl StateKey {
    /// Create the key set for a subject.
    pub fn new(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
        }
    }

    /// The raw subject key.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Store key for the attempt counter.
    pub fn attempts(&self) -> String {
        format!("{}{}", ATTEMPTS_PREFIX, self.subject)
    }

    /// Store key for the lockout record.
    pub fn lockout(&self) -> String {
        format!("{}{}", LOCKOUT_PREFIX, self.subject)
    }

    /// Store key for the ban record.
    pub fn ban(&self) -> String {
        format!("{}{}", BAN_PREFIX, self.subject)
    }

    /// Store key for the rolling lockout count.
    pub fn lockout_count(&self) -> String {
        format!("{}{}", LOCKOUT_COUNT_PREFIX, self.subject)
    }

    /// Name of the lock serializing increments for this subject.
    pub fn hit_lock(&self) -> String {
        format!("{}{}", HIT_LOCK_PREFIX, self.subject)
    }
}
