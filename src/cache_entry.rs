use crate::types::RateLimitMeta;
use std::time::{Duration, Instant};

/// Last successful upstream response for one resource kind
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse<T> {
    pub status_code: u16,
    pub meta: RateLimitMeta,
    pub payload: Vec<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expiry {
    Expired,
    At(Instant),
    /// `now + ttl` is past what `Instant` can represent
    Never,
}

/// A single-slot cache holding the last successful response for one resource kind.
///
/// The slot is only replaced, and the expiry only advanced, by [`CacheEntry::store`].
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    cached: Option<CachedResponse<T>>,
    expiry: Expiry,
}

impl<T> Default for CacheEntry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CacheEntry<T> {
    /// Creates an empty entry that is already expired
    pub fn new() -> Self {
        Self {
            cached: None,
            expiry: Expiry::Expired,
        }
    }

    /// Returns the cached response if it is still valid at `now`
    pub fn get(&self, now: Instant) -> Option<&CachedResponse<T>> {
        match self.expiry {
            Expiry::At(expires_at) if now < expires_at => self.cached.as_ref(),
            Expiry::Never => self.cached.as_ref(),
            _ => None,
        }
    }

    /// Time left before the entry expires, zero once expired
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.expiry {
            Expiry::Expired => Duration::ZERO,
            Expiry::At(expires_at) => expires_at.saturating_duration_since(now),
            Expiry::Never => Duration::MAX,
        }
    }

    /// Replaces the cached response and makes it valid until `now + ttl`.
    /// A TTL too large for `Instant` keeps the response forever.
    pub fn store(&mut self, response: CachedResponse<T>, now: Instant, ttl: Duration) {
        self.cached = Some(response);
        self.expiry = now.checked_add(ttl).map_or(Expiry::Never, Expiry::At);
    }
}
