//! Per-domain admission engine.
//!
//! [`Waitingroom`] is the state machine behind every check request and
//! every controller tick: enabling a domain, handing out tickets, deciding
//! whether a client's ticket is covered by the admission watermark, and
//! advancing that watermark. It is stateless apart from its local TTL
//! caches; the shared store holds the authoritative state.
//!
//! # Cache coherence
//!
//! Reads on the hot path go through local TTL caches and may be stale up to
//! the configured cache TTL. Whenever the engine itself mutates store state
//! it flushes the affected local entries; the admission controller reads
//! the watermark directly, never through the cache.

use std::sync::Arc;

use crate::cache::TtlCache;
use crate::client::Client;
use crate::config::Config;
use crate::error::Result;
use crate::notify::{Notifier, QueueEvent, QueueEventKind};
use crate::repository::Repository;

/// Below this many issued tickets, watermark events are not worth an
/// operator notification.
const NOTIFY_MIN_CURRENT_NUMBER: i64 = 5;

/// Outcome of one watermark-advance attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The watermark moved up by one quantum.
    Advanced {
        permitted_number: i64,
        current_number: i64,
    },
    /// No ticket was taken since the previous tick and every issued ticket
    /// is already admitted; the queue was torn down.
    QuiescentReset,
    /// The watermark key was already gone when the advance started.
    AlreadyDisabled,
}

/// The admission-control engine.
pub struct Waitingroom {
    config: Arc<Config>,
    repository: Arc<dyn Repository>,
    notifier: Arc<dyn Notifier>,
    /// Throttles repeated enable calls per domain.
    enable_cache: TtlCache<()>,
    /// Client-permit existence, positively and negatively cached.
    permitted_client_cache: TtlCache<bool>,
    /// Watermark per domain; `None` caches the known-absent (disabled)
    /// state with the negative TTL.
    permit_number_cache: TtlCache<Option<i64>>,
    /// Allow-list membership per domain.
    white_list_cache: TtlCache<bool>,
}

impl Waitingroom {
    /// Builds an engine over the given store and notification sink.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        repository: Arc<dyn Repository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            repository,
            notifier,
            enable_cache: TtlCache::new(),
            permitted_client_cache: TtlCache::new(),
            permit_number_cache: TtlCache::new(),
            white_list_cache: TtlCache::new(),
        }
    }

    fn flush_cache(&self, domain: &str) {
        self.enable_cache.delete(domain);
        self.permit_number_cache.delete(domain);
    }

    /// Drops the locally cached watermark for `domain` so the next read is
    /// served fresh. The controller calls this at the start of each
    /// per-domain pass.
    pub fn flush_permit_number_cache(&self, domain: &str) {
        self.permit_number_cache.delete(domain);
    }

    /// Watermark through the local cache; `None` means disabled.
    async fn cached_permit_number(&self, domain: &str) -> Result<Option<i64>> {
        if let Some(cached) = self.permit_number_cache.get(domain) {
            return Ok(cached);
        }

        let value = self.repository.get_permit_number(domain).await?;
        let ttl = if value.is_some() {
            self.config.cache_ttl()
        } else {
            self.config.negative_cache_ttl()
        };
        self.permit_number_cache.set(domain, value, ttl);
        Ok(value)
    }

    /// Whether `domain` bypasses queueing entirely.
    pub async fn is_in_white_list(&self, domain: &str) -> Result<bool> {
        if let Some(cached) = self.white_list_cache.get(domain) {
            return Ok(cached);
        }

        let listed = self.repository.is_white_list_domain(domain).await?;
        let ttl = if listed {
            self.config.cache_ttl()
        } else {
            self.config.negative_cache_ttl()
        };
        self.white_list_cache.set(domain, listed, ttl);
        Ok(listed)
    }

    /// Whether `domain` currently queues clients (cached read).
    pub async fn is_enabled_queue(&self, domain: &str) -> Result<bool> {
        Ok(self.cached_permit_number(domain).await?.is_some())
    }

    /// Enabled check against the store, bypassing the local cache.
    pub async fn is_enabled_queue_fresh(&self, domain: &str) -> Result<bool> {
        Ok(self.repository.get_permit_number(domain).await?.is_some())
    }

    /// Starts (or keeps alive) queueing for `domain`.
    ///
    /// Idempotent, and throttled locally: after a successful call, repeat
    /// calls within half the key lifetime are no-ops so that a burst of
    /// edge-triggered enables does not hammer the store.
    pub async fn enable_queue(&self, domain: &str) -> Result<()> {
        if self.enable_cache.exists(domain) {
            return Ok(());
        }

        self.repository
            .enable_domain(domain, self.config.queue_enable())
            .await?;
        self.flush_cache(domain);
        self.enable_cache.set(domain, (), self.config.enable_throttle());
        tracing::info!(domain, "enable queue");
        Ok(())
    }

    /// Tears down all queue state for `domain`. Idempotent.
    pub async fn reset(&self, domain: &str) -> Result<()> {
        let result = self.repository.disable_domain(domain).await;
        self.flush_cache(domain);
        result
    }

    /// Whether `client` already holds a live permit.
    pub async fn is_permitted_client(&self, client: &Client) -> Result<bool> {
        if !client.has_id() {
            return Ok(false);
        }
        if let Some(cached) = self.permitted_client_cache.get(&client.id) {
            return Ok(cached);
        }

        let permitted = self.repository.is_client_permitted(&client.id).await?;
        let ttl = if permitted {
            self.config.cache_ttl()
        } else {
            self.config.negative_cache_ttl()
        };
        self.permitted_client_cache.set(&client.id, permitted, ttl);
        Ok(permitted)
    }

    /// Moves `client` one step through the ticketing state machine and
    /// returns its serial number (`0` while still in the entry-delay
    /// window).
    pub async fn assign_serial_number(&self, domain: &str, client: &mut Client) -> Result<i64> {
        if client.has_serial_number() {
            return Ok(client.serial_number);
        }

        if !client.has_id() {
            client.assign_id(self.config.entry_delay_sec);
        } else if client.can_take_serial_number() {
            let serial = self
                .repository
                .incr_current_number(domain, self.config.queue_enable())
                .await?;
            client.assign_serial_number(serial);
        }
        Ok(client.serial_number)
    }

    /// Admits `client` if the watermark covers its ticket, recording the
    /// permit in the store.
    ///
    /// A domain whose watermark is absent was never throttled (or has
    /// already wound down); such clients are admitted without a permit
    /// record.
    pub async fn check_and_permit_client(&self, domain: &str, client: &Client) -> Result<bool> {
        let Some(permitted_number) = self.cached_permit_number(domain).await? else {
            return Ok(true);
        };

        if client.is_permit_client(permitted_number) {
            self.repository
                .permit_client(&client.id, self.config.permitted_access())
                .await?;
            tracing::info!(domain, client_id = %client.id, "permit client");
            return Ok(true);
        }
        Ok(false)
    }

    /// Estimated wait in whole quanta, plus the watermark it was computed
    /// against.
    pub async fn calc_remaining_wait_second(
        &self,
        domain: &str,
        client: &Client,
    ) -> Result<(i64, i64)> {
        let Some(permitted_number) = self.cached_permit_number(domain).await? else {
            return Ok((0, 0));
        };

        let diff = client.serial_number - permitted_number;
        if diff <= 0 {
            return Ok((0, permitted_number));
        }

        let unit = self.config.permit_unit_number;
        let quanta = if diff % unit == 0 {
            diff / unit
        } else {
            diff / unit + 1
        };
        Ok((
            quanta * self.config.permit_interval_sec as i64,
            permitted_number,
        ))
    }

    /// Advances the admission watermark by one quantum.
    ///
    /// Only the admission controller calls this, and only while holding the
    /// per-domain permit lock. A quiescent domain (no new tickets since the
    /// previous tick, every ticket already covered) is reset instead of
    /// advanced.
    pub async fn append_permit_number(&self, domain: &str) -> Result<AdvanceOutcome> {
        let Some(permitted_number) = self.repository.get_permit_number(domain).await? else {
            return Ok(AdvanceOutcome::AlreadyDisabled);
        };

        let mut ttl = self.repository.get_permit_number_ttl(domain).await?;
        let current_number = self.repository.get_current_number(domain).await?;
        let last_number = self.repository.get_last_number(domain).await?;

        if last_number == current_number && current_number <= permitted_number {
            tracing::info!(
                domain,
                current = current_number,
                permitted = permitted_number,
                last = last_number,
                ttl_sec = ttl.as_secs(),
                "reset waiting room"
            );
            self.notify(QueueEvent {
                kind: QueueEventKind::Reset,
                domain: domain.to_string(),
                permitted_number,
                current_number,
                ttl,
            })
            .await;
            self.reset(domain).await?;
            return Ok(AdvanceOutcome::QuiescentReset);
        }

        let permitted_number = permitted_number + self.config.permit_unit_number;

        // Congested domains stay alive longer.
        if current_number > permitted_number || ttl.is_zero() {
            ttl = self.config.queue_enable();
        }

        self.repository
            .advance_permit_state(domain, permitted_number, current_number, ttl)
            .await?;

        tracing::info!(
            domain,
            current = current_number,
            permitted = permitted_number,
            ttl_sec = ttl.as_secs(),
            "append permit number"
        );
        self.notify(QueueEvent {
            kind: QueueEventKind::PermitAdvanced,
            domain: domain.to_string(),
            permitted_number,
            current_number,
            ttl,
        })
        .await;

        Ok(AdvanceOutcome::Advanced {
            permitted_number,
            current_number,
        })
    }

    async fn notify(&self, event: QueueEvent) {
        if event.current_number < NOTIFY_MIN_CURRENT_NUMBER {
            tracing::debug!(
                domain = %event.domain,
                current = event.current_number,
                "skip notify, low traffic"
            );
            return;
        }
        self.notifier.notify(&event).await;
    }

    /// Takes the per-domain watermark-advance lease for one tick interval.
    pub async fn try_acquire_permit_lock(&self, domain: &str) -> Result<bool> {
        self.repository
            .try_acquire_permit_lock(domain, self.config.permit_interval())
            .await
    }

    /// Enabled domains in set order, `start..=stop` (`(0, -1)` for all).
    pub async fn get_enable_domains(&self, start: isize, stop: isize) -> Result<Vec<String>> {
        self.repository.get_enable_domains(start, stop).await
    }

    /// Number of enabled domains.
    pub async fn get_enable_domains_count(&self) -> Result<i64> {
        self.repository.get_enable_domains_count().await
    }

    /// Current ticket counter for `domain` (management read).
    pub async fn get_current_number(&self, domain: &str) -> Result<i64> {
        self.repository.get_current_number(domain).await
    }

    /// Current watermark for `domain` (management read).
    pub async fn get_permit_number(&self, domain: &str) -> Result<Option<i64>> {
        self.repository.get_permit_number(domain).await
    }

    /// Overwrites the ticket counter (management write).
    pub async fn save_current_number(&self, domain: &str, value: i64) -> Result<()> {
        self.repository
            .save_current_number(domain, value, self.config.queue_enable())
            .await
    }

    /// Overwrites the watermark (management write), invalidating the local
    /// cache so handlers see it within one read.
    pub async fn save_permit_number(&self, domain: &str, value: i64) -> Result<()> {
        self.repository
            .save_permit_number(domain, value, self.config.queue_enable())
            .await?;
        self.flush_permit_number_cache(domain);
        Ok(())
    }

    /// Extends the enabled-set TTL to twice the key lifetime.
    pub async fn extend_domains_ttl(&self) -> Result<()> {
        self.repository
            .extend_domains_ttl(self.config.queue_enable() * 2)
            .await
    }

    /// Allow-listed domains in set order, `start..=stop`.
    pub async fn get_white_list_domains(&self, start: isize, stop: isize) -> Result<Vec<String>> {
        self.repository.get_white_list_domains(start, stop).await
    }

    /// Number of allow-listed domains.
    pub async fn get_white_list_domains_count(&self) -> Result<i64> {
        self.repository.get_white_list_domains_count().await
    }

    /// Adds `domain` to the allow-list.
    pub async fn add_white_list_domain(&self, domain: &str) -> Result<()> {
        self.repository.add_white_list_domain(domain).await?;
        self.white_list_cache.delete(domain);
        Ok(())
    }

    /// Removes `domain` from the allow-list.
    pub async fn remove_white_list_domain(&self, domain: &str) -> Result<()> {
        self.repository.remove_white_list_domain(domain).await?;
        self.white_list_cache.delete(domain);
        Ok(())
    }

    /// Store liveness probe for the status endpoint.
    pub async fn ping(&self) -> Result<()> {
        self.repository.ping().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::notify::NoopNotifier;
    use crate::repository::MemoryRepository;

    const DOMAIN: &str = "ex.com";

    fn test_config() -> Config {
        Config {
            entry_delay_sec: 0,
            queue_enable_sec: 600,
            permit_interval_sec: 60,
            permit_unit_number: 10,
            cache_ttl_sec: 60,
            negative_cache_ttl_sec: 60,
            ..Config::default()
        }
    }

    fn engine_with(config: Config) -> (Waitingroom, Arc<MemoryRepository>) {
        let repo = Arc::new(MemoryRepository::new());
        let engine = Waitingroom::new(
            Arc::new(config),
            Arc::clone(&repo) as Arc<dyn Repository>,
            Arc::new(NoopNotifier),
        );
        (engine, repo)
    }

    fn engine() -> (Waitingroom, Arc<MemoryRepository>) {
        engine_with(test_config())
    }

    fn ticketed_client(id: &str, serial: i64) -> Client {
        Client {
            id: id.to_string(),
            serial_number: serial,
            take_serial_number_time: 1,
        }
    }

    #[tokio::test]
    async fn enable_creates_zero_watermark_and_registers_domain() {
        let (engine, repo) = engine();
        engine.enable_queue(DOMAIN).await.unwrap();

        assert_eq!(repo.get_permit_number(DOMAIN).await.unwrap(), Some(0));
        assert_eq!(
            repo.get_enable_domains(0, -1).await.unwrap(),
            vec![DOMAIN.to_string()]
        );
        assert!(engine.is_enabled_queue(DOMAIN).await.unwrap());
    }

    #[tokio::test]
    async fn enable_does_not_clobber_an_existing_watermark() {
        let (engine, repo) = engine();
        engine.enable_queue(DOMAIN).await.unwrap();
        repo.save_permit_number(DOMAIN, 40, Duration::from_secs(600))
            .await
            .unwrap();

        // The throttle cache absorbs this call entirely.
        engine.enable_queue(DOMAIN).await.unwrap();
        assert_eq!(repo.get_permit_number(DOMAIN).await.unwrap(), Some(40));
    }

    #[tokio::test]
    async fn reset_clears_state_and_reenables_enable() {
        let (engine, repo) = engine();
        engine.enable_queue(DOMAIN).await.unwrap();
        engine.reset(DOMAIN).await.unwrap();

        assert_eq!(repo.get_permit_number(DOMAIN).await.unwrap(), None);
        assert!(repo.get_enable_domains(0, -1).await.unwrap().is_empty());

        // Reset flushed the throttle entry, so a fresh enable takes effect
        // immediately.
        engine.enable_queue(DOMAIN).await.unwrap();
        assert_eq!(repo.get_permit_number(DOMAIN).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let (engine, repo) = engine();
        engine.enable_queue(DOMAIN).await.unwrap();
        engine.reset(DOMAIN).await.unwrap();
        engine.reset(DOMAIN).await.unwrap();

        assert_eq!(repo.get_permit_number(DOMAIN).await.unwrap(), None);
        assert!(repo.get_enable_domains(0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fresh_client_gets_identity_but_no_ticket() {
        let (engine, _repo) = engine_with(Config {
            entry_delay_sec: 3600,
            ..test_config()
        });
        let mut client = Client::default();

        let serial = engine
            .assign_serial_number(DOMAIN, &mut client)
            .await
            .unwrap();
        assert_eq!(serial, 0);
        assert!(client.has_id());
        assert!(!client.has_serial_number());
    }

    #[tokio::test]
    async fn identified_client_takes_a_ticket_after_the_delay() {
        let (engine, _repo) = engine();
        let mut client = Client::default();

        // First contact: identity only (delay 0 means the next call
        // qualifies).
        engine
            .assign_serial_number(DOMAIN, &mut client)
            .await
            .unwrap();
        let serial = engine
            .assign_serial_number(DOMAIN, &mut client)
            .await
            .unwrap();
        assert_eq!(serial, 1);

        // Re-polling returns the same ticket without touching the counter.
        let again = engine
            .assign_serial_number(DOMAIN, &mut client)
            .await
            .unwrap();
        assert_eq!(again, 1);
    }

    #[tokio::test]
    async fn concurrent_ticket_assignments_are_distinct_and_positive() {
        let (engine, _repo) = engine();
        let engine = Arc::new(engine);

        let mut handles = Vec::new();
        for _ in 0..32 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                let mut client = Client {
                    id: Uuid::new_v4().to_string(),
                    serial_number: 0,
                    take_serial_number_time: 1,
                };
                engine
                    .assign_serial_number(DOMAIN, &mut client)
                    .await
                    .unwrap()
            }));
        }

        let mut serials = Vec::new();
        for handle in handles {
            serials.push(handle.await.unwrap());
        }
        serials.sort_unstable();
        assert!(serials.iter().all(|&s| s > 0));
        let unique: std::collections::BTreeSet<i64> = serials.iter().copied().collect();
        assert_eq!(unique.len(), serials.len());
    }

    #[tokio::test]
    async fn check_admits_when_watermark_covers_ticket() {
        let (engine, repo) = engine();
        repo.save_permit_number(DOMAIN, 5, Duration::from_secs(600))
            .await
            .unwrap();

        let client = ticketed_client("abc", 5);
        assert!(engine
            .check_and_permit_client(DOMAIN, &client)
            .await
            .unwrap());
        assert!(repo.is_client_permitted("abc").await.unwrap());
    }

    #[tokio::test]
    async fn check_rejects_ticket_above_watermark() {
        let (engine, repo) = engine();
        repo.save_permit_number(DOMAIN, 5, Duration::from_secs(600))
            .await
            .unwrap();

        let client = ticketed_client("abc", 6);
        assert!(!engine
            .check_and_permit_client(DOMAIN, &client)
            .await
            .unwrap());
        assert!(!repo.is_client_permitted("abc").await.unwrap());
    }

    #[tokio::test]
    async fn check_admits_on_unthrottled_domain() {
        let (engine, repo) = engine();
        let client = ticketed_client("abc", 100);
        assert!(engine
            .check_and_permit_client(DOMAIN, &client)
            .await
            .unwrap());
        // No permit record is written on the fast path.
        assert!(!repo.is_client_permitted("abc").await.unwrap());
    }

    #[tokio::test]
    async fn permitted_client_survives_at_least_the_permit_ttl() {
        let (engine, repo) = engine();
        repo.save_permit_number(DOMAIN, 5, Duration::from_secs(600))
            .await
            .unwrap();

        let client = ticketed_client("abc", 3);
        assert!(engine
            .check_and_permit_client(DOMAIN, &client)
            .await
            .unwrap());
        assert!(engine.is_permitted_client(&client).await.unwrap());
        // Cached positively afterwards.
        assert!(engine.is_permitted_client(&client).await.unwrap());
    }

    #[tokio::test]
    async fn anonymous_client_is_never_permitted() {
        let (engine, _repo) = engine();
        let client = Client::default();
        assert!(!engine.is_permitted_client(&client).await.unwrap());
    }

    #[tokio::test]
    async fn wait_estimate_rounds_up_to_whole_quanta() {
        let (engine, repo) = engine();
        repo.save_permit_number(DOMAIN, 1, Duration::from_secs(600))
            .await
            .unwrap();

        // diff = 30, unit = 10: exact division, 3 quanta.
        let client = ticketed_client("abc", 31);
        let (wait, permitted) = engine
            .calc_remaining_wait_second(DOMAIN, &client)
            .await
            .unwrap();
        assert_eq!(permitted, 1);
        assert_eq!(wait, 3 * 60);

        // diff = 31: partial quantum rounds up to 4.
        let client = ticketed_client("abc", 32);
        let (wait, _) = engine
            .calc_remaining_wait_second(DOMAIN, &client)
            .await
            .unwrap();
        assert_eq!(wait, 4 * 60);
    }

    #[tokio::test]
    async fn wait_estimate_is_zero_once_covered() {
        let (engine, repo) = engine();
        repo.save_permit_number(DOMAIN, 50, Duration::from_secs(600))
            .await
            .unwrap();

        let client = ticketed_client("abc", 31);
        let (wait, permitted) = engine
            .calc_remaining_wait_second(DOMAIN, &client)
            .await
            .unwrap();
        assert_eq!((wait, permitted), (0, 50));
    }

    #[tokio::test]
    async fn wait_estimate_never_increases_as_the_watermark_grows() {
        let client = ticketed_client("abc", 95);
        let mut previous = i64::MAX;
        for watermark in 0..100 {
            let (engine, repo) = engine();
            repo.save_permit_number(DOMAIN, watermark, Duration::from_secs(600))
                .await
                .unwrap();
            let (wait, _) = engine
                .calc_remaining_wait_second(DOMAIN, &client)
                .await
                .unwrap();
            assert!(wait <= previous, "wait grew at watermark {watermark}");
            previous = wait;
        }
    }

    #[tokio::test]
    async fn wait_estimate_on_disabled_domain_is_zero() {
        let (engine, _repo) = engine();
        let client = ticketed_client("abc", 31);
        let (wait, permitted) = engine
            .calc_remaining_wait_second(DOMAIN, &client)
            .await
            .unwrap();
        assert_eq!((wait, permitted), (0, 0));
    }

    #[tokio::test]
    async fn append_advances_by_one_quantum() {
        let (engine, repo) = engine();
        engine.enable_queue(DOMAIN).await.unwrap();
        repo.save_current_number(DOMAIN, 30, Duration::from_secs(600))
            .await
            .unwrap();

        let outcome = engine.append_permit_number(DOMAIN).await.unwrap();
        assert_eq!(
            outcome,
            AdvanceOutcome::Advanced {
                permitted_number: 10,
                current_number: 30,
            }
        );
        assert_eq!(repo.get_permit_number(DOMAIN).await.unwrap(), Some(10));
        assert_eq!(repo.get_last_number(DOMAIN).await.unwrap(), 30);
    }

    #[tokio::test]
    async fn append_extends_ttl_for_congested_domains() {
        let (engine, repo) = engine();
        repo.save_permit_number(DOMAIN, 0, Duration::from_secs(30))
            .await
            .unwrap();
        repo.save_current_number(DOMAIN, 500, Duration::from_secs(600))
            .await
            .unwrap();

        engine.append_permit_number(DOMAIN).await.unwrap();
        // 500 outstanding tickets against a watermark of 10: the key
        // lifetime is bumped from its remaining 30s to queue_enable_sec.
        let ttl = repo.get_permit_number_ttl(DOMAIN).await.unwrap();
        assert!(ttl > Duration::from_secs(500));
    }

    #[tokio::test]
    async fn append_resets_quiescent_domain() {
        let (engine, repo) = engine();
        engine.enable_queue(DOMAIN).await.unwrap();
        repo.save_current_number(DOMAIN, 10, Duration::from_secs(600))
            .await
            .unwrap();
        repo.advance_permit_state(DOMAIN, 10, 10, Duration::from_secs(600))
            .await
            .unwrap();

        let outcome = engine.append_permit_number(DOMAIN).await.unwrap();
        assert_eq!(outcome, AdvanceOutcome::QuiescentReset);
        assert_eq!(repo.get_permit_number(DOMAIN).await.unwrap(), None);
        assert!(repo.get_enable_domains(0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_on_disabled_domain_reports_already_disabled() {
        let (engine, _repo) = engine();
        let outcome = engine.append_permit_number(DOMAIN).await.unwrap();
        assert_eq!(outcome, AdvanceOutcome::AlreadyDisabled);
    }

    #[tokio::test]
    async fn white_list_membership_is_cached() {
        let (engine, repo) = engine();
        repo.add_white_list_domain(DOMAIN).await.unwrap();

        assert!(engine.is_in_white_list(DOMAIN).await.unwrap());

        // Stale-positive until the cache TTL: a raw repository removal is
        // not yet visible.
        repo.remove_white_list_domain(DOMAIN).await.unwrap();
        assert!(engine.is_in_white_list(DOMAIN).await.unwrap());
    }

    #[tokio::test]
    async fn white_list_removal_through_engine_invalidates_cache() {
        let (engine, _repo) = engine();
        engine.add_white_list_domain(DOMAIN).await.unwrap();
        assert!(engine.is_in_white_list(DOMAIN).await.unwrap());

        engine.remove_white_list_domain(DOMAIN).await.unwrap();
        assert!(!engine.is_in_white_list(DOMAIN).await.unwrap());
    }

    #[tokio::test]
    async fn save_permit_number_is_visible_immediately() {
        let (engine, _repo) = engine();
        engine.enable_queue(DOMAIN).await.unwrap();
        // Prime the cache with the current value.
        assert!(engine.is_enabled_queue(DOMAIN).await.unwrap());

        engine.save_permit_number(DOMAIN, 77).await.unwrap();
        let client = ticketed_client("abc", 77);
        assert!(engine
            .check_and_permit_client(DOMAIN, &client)
            .await
            .unwrap());
    }
}
