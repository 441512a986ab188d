//! In-memory repository.
//!
//! A single-process stand-in for the shared store, used by the test suites
//! and by local development without a Redis instance. Key expiry is
//! honored; the enabled/allow-list sets keep lexicographic order like a
//! sorted set with uniform scores. Cross-replica coordination obviously
//! does not apply: every clone shares one state.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::Repository;
use crate::error::Result;

#[derive(Clone)]
struct Value {
    value: i64,
    expires_at: Instant,
}

impl Value {
    fn live(&self) -> bool {
        self.expires_at > Instant::now()
    }
}

#[derive(Default)]
struct State {
    permitted: HashMap<String, Value>,
    current: HashMap<String, Value>,
    last: HashMap<String, Value>,
    locks: HashMap<String, Instant>,
    permits: HashMap<String, Instant>,
    enabled: BTreeSet<String>,
    white_list: BTreeSet<String>,
}

/// [`Repository`] backed by process memory.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    state: Arc<Mutex<State>>,
}

impl MemoryRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn live_get(map: &HashMap<String, Value>, key: &str) -> Option<i64> {
    map.get(key).filter(|v| v.live()).map(|v| v.value)
}

fn store(map: &mut HashMap<String, Value>, key: &str, value: i64, ttl: Duration) {
    map.insert(
        key.to_string(),
        Value {
            value,
            expires_at: Instant::now() + ttl,
        },
    );
}

/// `start..=stop` over set order, with a negative `stop` counting from the
/// end like a sorted-set range reply.
fn range(set: &BTreeSet<String>, start: isize, stop: isize) -> Vec<String> {
    let members: Vec<&String> = set.iter().collect();
    let len = members.len() as isize;
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return Vec::new();
    }
    let start = start.max(0) as usize;
    let stop = stop.max(0) as usize;
    members[start..=stop].iter().map(|d| (*d).clone()).collect()
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_permit_number(&self, domain: &str) -> Result<Option<i64>> {
        Ok(live_get(&self.lock().permitted, domain))
    }

    async fn get_permit_number_ttl(&self, domain: &str) -> Result<Duration> {
        let state = self.lock();
        let ttl = state
            .permitted
            .get(domain)
            .filter(|v| v.live())
            .map_or(Duration::ZERO, |v| {
                v.expires_at.saturating_duration_since(Instant::now())
            });
        Ok(ttl)
    }

    async fn save_permit_number(&self, domain: &str, value: i64, ttl: Duration) -> Result<()> {
        store(&mut self.lock().permitted, domain, value, ttl);
        Ok(())
    }

    async fn advance_permit_state(
        &self,
        domain: &str,
        permitted: i64,
        last: i64,
        ttl: Duration,
    ) -> Result<()> {
        let mut state = self.lock();
        store(&mut state.permitted, domain, permitted, ttl);
        if let Some(current) = state.current.get_mut(domain) {
            current.expires_at = Instant::now() + ttl;
        }
        store(&mut state.last, domain, last, ttl);
        Ok(())
    }

    async fn get_current_number(&self, domain: &str) -> Result<i64> {
        Ok(live_get(&self.lock().current, domain).unwrap_or(0))
    }

    async fn incr_current_number(&self, domain: &str, ttl: Duration) -> Result<i64> {
        let mut state = self.lock();
        let next = live_get(&state.current, domain).unwrap_or(0) + 1;
        store(&mut state.current, domain, next, ttl);
        Ok(next)
    }

    async fn save_current_number(&self, domain: &str, value: i64, ttl: Duration) -> Result<()> {
        store(&mut self.lock().current, domain, value, ttl);
        Ok(())
    }

    async fn get_last_number(&self, domain: &str) -> Result<i64> {
        Ok(live_get(&self.lock().last, domain).unwrap_or(0))
    }

    async fn permit_client(&self, client_id: &str, ttl: Duration) -> Result<()> {
        self.lock()
            .permits
            .insert(client_id.to_string(), Instant::now() + ttl);
        Ok(())
    }

    async fn is_client_permitted(&self, client_id: &str) -> Result<bool> {
        Ok(self
            .lock()
            .permits
            .get(client_id)
            .is_some_and(|exp| *exp > Instant::now()))
    }

    async fn enable_domain(&self, domain: &str, ttl: Duration) -> Result<()> {
        let mut state = self.lock();
        let value = live_get(&state.permitted, domain).unwrap_or(0);
        store(&mut state.permitted, domain, value, ttl);
        state.enabled.insert(domain.to_string());
        Ok(())
    }

    async fn disable_domain(&self, domain: &str) -> Result<()> {
        let mut state = self.lock();
        state.enabled.remove(domain);
        state.current.remove(domain);
        state.permitted.remove(domain);
        state.last.remove(domain);
        state.locks.remove(domain);
        Ok(())
    }

    async fn extend_domains_ttl(&self, _ttl: Duration) -> Result<()> {
        Ok(())
    }

    async fn get_enable_domains(&self, start: isize, stop: isize) -> Result<Vec<String>> {
        Ok(range(&self.lock().enabled, start, stop))
    }

    async fn get_enable_domains_count(&self) -> Result<i64> {
        Ok(self.lock().enabled.len() as i64)
    }

    async fn is_white_list_domain(&self, domain: &str) -> Result<bool> {
        Ok(self.lock().white_list.contains(domain))
    }

    async fn add_white_list_domain(&self, domain: &str) -> Result<()> {
        self.lock().white_list.insert(domain.to_string());
        Ok(())
    }

    async fn remove_white_list_domain(&self, domain: &str) -> Result<()> {
        self.lock().white_list.remove(domain);
        Ok(())
    }

    async fn get_white_list_domains(&self, start: isize, stop: isize) -> Result<Vec<String>> {
        Ok(range(&self.lock().white_list, start, stop))
    }

    async fn get_white_list_domains_count(&self) -> Result<i64> {
        Ok(self.lock().white_list.len() as i64)
    }

    async fn try_acquire_permit_lock(&self, domain: &str, ttl: Duration) -> Result<bool> {
        let mut state = self.lock();
        let now = Instant::now();
        if state.locks.get(domain).is_some_and(|exp| *exp > now) {
            return Ok(false);
        }
        state.locks.insert(domain.to_string(), now + ttl);
        Ok(true)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn watermark_is_absent_until_written() {
        let repo = MemoryRepository::new();
        assert_eq!(repo.get_permit_number("ex.com").await.unwrap(), None);

        repo.save_permit_number("ex.com", 10, TTL).await.unwrap();
        assert_eq!(repo.get_permit_number("ex.com").await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn counters_read_zero_when_absent() {
        let repo = MemoryRepository::new();
        assert_eq!(repo.get_current_number("ex.com").await.unwrap(), 0);
        assert_eq!(repo.get_last_number("ex.com").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn incr_is_sequential() {
        let repo = MemoryRepository::new();
        assert_eq!(repo.incr_current_number("ex.com", TTL).await.unwrap(), 1);
        assert_eq!(repo.incr_current_number("ex.com", TTL).await.unwrap(), 2);
        assert_eq!(repo.incr_current_number("ex.com", TTL).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn enable_is_idempotent_and_keeps_watermark() {
        let repo = MemoryRepository::new();
        repo.enable_domain("ex.com", TTL).await.unwrap();
        assert_eq!(repo.get_permit_number("ex.com").await.unwrap(), Some(0));

        repo.save_permit_number("ex.com", 7, TTL).await.unwrap();
        repo.enable_domain("ex.com", TTL).await.unwrap();
        assert_eq!(repo.get_permit_number("ex.com").await.unwrap(), Some(7));
        assert_eq!(
            repo.get_enable_domains(0, -1).await.unwrap(),
            vec!["ex.com".to_string()]
        );
    }

    #[tokio::test]
    async fn disable_removes_every_per_domain_key() {
        let repo = MemoryRepository::new();
        repo.enable_domain("ex.com", TTL).await.unwrap();
        repo.incr_current_number("ex.com", TTL).await.unwrap();
        repo.try_acquire_permit_lock("ex.com", TTL).await.unwrap();

        repo.disable_domain("ex.com").await.unwrap();
        assert_eq!(repo.get_permit_number("ex.com").await.unwrap(), None);
        assert_eq!(repo.get_current_number("ex.com").await.unwrap(), 0);
        assert!(repo.get_enable_domains(0, -1).await.unwrap().is_empty());
        // The lock was deleted too, so it can be taken again at once.
        assert!(repo.try_acquire_permit_lock("ex.com", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn lock_is_exclusive_until_expiry() {
        let repo = MemoryRepository::new();
        assert!(repo
            .try_acquire_permit_lock("ex.com", Duration::from_millis(30))
            .await
            .unwrap());
        assert!(!repo
            .try_acquire_permit_lock("ex.com", Duration::from_millis(30))
            .await
            .unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(repo
            .try_acquire_permit_lock("ex.com", Duration::from_millis(30))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn client_permits_expire() {
        let repo = MemoryRepository::new();
        repo.permit_client("abc", Duration::from_millis(30))
            .await
            .unwrap();
        assert!(repo.is_client_permitted("abc").await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!repo.is_client_permitted("abc").await.unwrap());
    }

    #[tokio::test]
    async fn ranges_follow_sorted_set_semantics() {
        let repo = MemoryRepository::new();
        for domain in ["a.com", "b.com", "c.com", "d.com"] {
            repo.add_white_list_domain(domain).await.unwrap();
        }

        assert_eq!(
            repo.get_white_list_domains(0, -1).await.unwrap(),
            vec!["a.com", "b.com", "c.com", "d.com"]
        );
        assert_eq!(
            repo.get_white_list_domains(1, 2).await.unwrap(),
            vec!["b.com", "c.com"]
        );
        assert_eq!(
            repo.get_white_list_domains(2, 100).await.unwrap(),
            vec!["c.com", "d.com"]
        );
        assert!(repo.get_white_list_domains(4, 10).await.unwrap().is_empty());
        assert_eq!(repo.get_white_list_domains_count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn advance_refreshes_counter_ttl() {
        let repo = MemoryRepository::new();
        repo.incr_current_number("ex.com", Duration::from_millis(30))
            .await
            .unwrap();
        repo.advance_permit_state("ex.com", 5, 1, TTL).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        // The advance extended the counter beyond its original expiry.
        assert_eq!(repo.get_current_number("ex.com").await.unwrap(), 1);
        assert_eq!(repo.get_permit_number("ex.com").await.unwrap(), Some(5));
        assert_eq!(repo.get_last_number("ex.com").await.unwrap(), 1);
    }
}
