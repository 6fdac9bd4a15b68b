use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::api::{ApiError, ApiResponse};

/// A fetch shared by every caller that joins it while it is outstanding.
pub(crate) type InFlight<T> = Shared<BoxFuture<'static, ApiResponse<T>>>;

/// The record written to durable storage for one cache key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    /// Time since the record was written. Clock skew into the future reads as zero.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.cached_at).to_std().unwrap_or_default()
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    /// `None` never expires; a zero TTL is always expired.
    pub fn is_expired(&self, ttl: Option<Duration>) -> bool {
        match ttl {
            None => false,
            Some(ttl) => self.age() >= ttl,
        }
    }
}

/// The single mutable slot behind a `DataStore`.
///
/// Every mutation bumps `version`; the broadcast channel uses it to drop
/// notifications that arrive after a newer one.
pub(crate) struct CacheEntry<T> {
    pub value: Option<ApiResponse<T>>,
    pub fetched_at: Option<Instant>,
    in_flight: Option<(u64, InFlight<T>)>,
    version: u64,
    next_fetch_id: u64,
}

impl<T: Clone> CacheEntry<T> {
    pub fn new() -> Self {
        Self {
            value: None,
            fetched_at: None,
            in_flight: None,
            version: 0,
            next_fetch_id: 0,
        }
    }

    fn is_fresh(&self, ttl: Option<Duration>, now: Instant) -> bool {
        match (self.fetched_at, ttl) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(fetched_at), Some(ttl)) => now.saturating_duration_since(fetched_at) < ttl,
        }
    }

    pub fn has_response(&self) -> bool {
        self.value.as_ref().is_some_and(|v| v.response.is_some())
    }

    /// The cached value, if it holds a response that is still within its TTL
    pub fn fresh_value(&self, ttl: Option<Duration>, now: Instant) -> Option<ApiResponse<T>> {
        if self.has_response() && self.is_fresh(ttl, now) {
            self.value.clone()
        } else {
            None
        }
    }

    pub fn is_stale(&self, ttl: Option<Duration>, now: Instant) -> bool {
        !self.is_fresh(ttl, now)
    }

    pub fn in_flight(&self) -> Option<InFlight<T>> {
        self.in_flight.as_ref().map(|(_, fetch)| fetch.clone())
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn next_fetch_id(&mut self) -> u64 {
        self.next_fetch_id += 1;
        self.next_fetch_id
    }

    #[must_use = "the returned fetch must be awaited for it to run"]
    pub fn start_fetch(&mut self, id: u64, fetch: BoxFuture<'static, ApiResponse<T>>) -> InFlight<T> {
        let shared = futures::FutureExt::shared(fetch);
        self.in_flight = Some((id, shared.clone()));
        shared
    }

    /// Whether `id` is still the fetch this entry is waiting on
    pub fn is_current_fetch(&self, id: u64) -> bool {
        self.in_flight.as_ref().is_some_and(|(current, _)| *current == id)
    }

    fn advance_fetched_at(&mut self, at: Instant) {
        self.fetched_at = Some(match self.fetched_at {
            Some(previous) if previous > at => previous,
            _ => at,
        });
    }

    fn bump(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    /// Store a successful response fetched by `id`. Returns `None` if the fetch
    /// has been superseded and the entry was left untouched.
    pub fn commit_success(&mut self, id: u64, response: T, at: Instant) -> Option<(ApiResponse<T>, u64)> {
        if !self.is_current_fetch(id) {
            return None;
        }
        let value = ApiResponse::ok(response);
        self.value = Some(value.clone());
        self.advance_fetched_at(at);
        self.in_flight = None;
        Some((value, self.bump()))
    }

    /// Record a failed fetch. The last good response is kept, or replaced by
    /// `fallback` when the entry has none. `fetched_at` does not move.
    pub fn commit_failure(
        &mut self,
        id: u64,
        error: ApiError,
        fallback: Option<T>,
    ) -> Option<(ApiResponse<T>, u64)> {
        if !self.is_current_fetch(id) {
            return None;
        }
        let previous = self
            .value
            .take()
            .and_then(|v| v.response)
            .or(fallback);
        let value = ApiResponse::with_fallback(error, previous);
        self.value = Some(value.clone());
        self.in_flight = None;
        Some((value, self.bump()))
    }

    /// Replace the value directly, dropping any outstanding fetch
    pub fn set(&mut self, response: T, at: Instant) -> (ApiResponse<T>, u64) {
        let value = ApiResponse::ok(response);
        self.value = Some(value.clone());
        self.advance_fetched_at(at);
        self.in_flight = None;
        (value, self.bump())
    }

    /// Back to `Empty`, keeping the version counter moving forward
    pub fn reset(&mut self) -> u64 {
        self.value = None;
        self.fetched_at = None;
        self.in_flight = None;
        self.bump()
    }
}

// ============================================================================
// Tests
// ============================================================================
