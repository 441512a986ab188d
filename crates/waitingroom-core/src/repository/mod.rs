//! Shared-store repository.
//!
//! The only reader/writer of the backing store. Operations are narrow and
//! semantic; callers never see raw keys or wire values. Absent keys are not
//! errors for idempotent reads: the watermark reads as `Option<i64>`
//! (`None` ≡ queue disabled), counters read as `0`, existence checks as
//! `false`. Writes that touch multiple keys go to the store as a single
//! pipelined batch.

mod memory;
mod redis;

use std::time::Duration;

use async_trait::async_trait;

pub use self::memory::MemoryRepository;
pub use self::redis::RedisRepository;

use crate::error::Result;

/// Semantic operations on the shared store.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Current admission watermark, `None` when the queue is disabled.
    async fn get_permit_number(&self, domain: &str) -> Result<Option<i64>>;

    /// Remaining lifetime of the watermark key; zero when absent.
    async fn get_permit_number_ttl(&self, domain: &str) -> Result<Duration>;

    /// Unconditionally sets the watermark.
    async fn save_permit_number(&self, domain: &str, value: i64, ttl: Duration) -> Result<()>;

    /// One pipelined batch recording a watermark advancement: the new
    /// watermark, a TTL refresh on the ticket counter, and the controller's
    /// ticket-counter snapshot, all with the same lifetime.
    async fn advance_permit_state(
        &self,
        domain: &str,
        permitted: i64,
        last: i64,
        ttl: Duration,
    ) -> Result<()>;

    /// Current ticket counter; absent reads as `0`.
    async fn get_current_number(&self, domain: &str) -> Result<i64>;

    /// Atomically takes the next ticket and refreshes the counter TTL.
    async fn incr_current_number(&self, domain: &str, ttl: Duration) -> Result<i64>;

    /// Unconditionally sets the ticket counter.
    async fn save_current_number(&self, domain: &str, value: i64, ttl: Duration) -> Result<()>;

    /// Ticket-counter snapshot from the previous controller tick; absent
    /// reads as `0`.
    async fn get_last_number(&self, domain: &str) -> Result<i64>;

    /// Records an admission for `client_id`.
    async fn permit_client(&self, client_id: &str, ttl: Duration) -> Result<()>;

    /// Authoritative "is this client admitted?" test.
    async fn is_client_permitted(&self, client_id: &str) -> Result<bool>;

    /// One pipelined batch enabling a domain: creates the watermark at `0`
    /// only if absent, sets its TTL, adds the domain to the enabled set,
    /// and extends the set's TTL to twice the key lifetime.
    async fn enable_domain(&self, domain: &str, ttl: Duration) -> Result<()>;

    /// One pipelined batch removing the domain from the enabled set and
    /// deleting all four per-domain keys.
    async fn disable_domain(&self, domain: &str) -> Result<()>;

    /// Extends the enabled-set TTL.
    async fn extend_domains_ttl(&self, ttl: Duration) -> Result<()>;

    /// Enabled domains in set order, `start..=stop` (negative `stop` counts
    /// from the end; `(0, -1)` lists everything).
    async fn get_enable_domains(&self, start: isize, stop: isize) -> Result<Vec<String>>;

    /// Number of enabled domains.
    async fn get_enable_domains_count(&self) -> Result<i64>;

    /// Allow-list membership.
    async fn is_white_list_domain(&self, domain: &str) -> Result<bool>;

    /// Adds to the allow-list and persists the set (no TTL).
    async fn add_white_list_domain(&self, domain: &str) -> Result<()>;

    /// Removes from the allow-list.
    async fn remove_white_list_domain(&self, domain: &str) -> Result<()>;

    /// Allow-listed domains in set order, `start..=stop`.
    async fn get_white_list_domains(&self, start: isize, stop: isize) -> Result<Vec<String>>;

    /// Number of allow-listed domains.
    async fn get_white_list_domains_count(&self) -> Result<i64>;

    /// Takes the per-domain watermark-advance lease for `ttl`.
    ///
    /// Returns `true` iff this call created the lock; at most one caller
    /// cluster-wide wins per TTL window.
    async fn try_acquire_permit_lock(&self, domain: &str, ttl: Duration) -> Result<bool>;

    /// Store liveness probe.
    async fn ping(&self) -> Result<()>;
}
