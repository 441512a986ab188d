//! Redis-backed repository.
//!
//! Key layout, all per-domain keys prefixed by the domain itself:
//!
//! - `queue-domains` — sorted set of enabled domains
//! - `queue-whitelist` — sorted set of allow-listed domains
//! - `{domain}_permitted_no` — admission watermark
//! - `{domain}_current_no` — ticket counter
//! - `{domain}_last_no` — previous-tick counter snapshot
//! - `{domain}_permitted_no_lock` — watermark-advance lease
//! - `{client_id}` — client permit marker

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::Repository;
use crate::error::Result;

const ENABLE_DOMAIN_KEY: &str = "queue-domains";
const WHITE_LIST_KEY: &str = "queue-whitelist";

const SUFFIX_PERMITTED_NO: &str = "_permitted_no";
const SUFFIX_CURRENT_NO: &str = "_current_no";
const SUFFIX_LAST_NO: &str = "_last_no";
const SUFFIX_PERMITTED_NO_LOCK: &str = "_permitted_no_lock";

fn permitted_number_key(domain: &str) -> String {
    format!("{domain}{SUFFIX_PERMITTED_NO}")
}

fn current_number_key(domain: &str) -> String {
    format!("{domain}{SUFFIX_CURRENT_NO}")
}

fn last_number_key(domain: &str) -> String {
    format!("{domain}{SUFFIX_LAST_NO}")
}

fn permit_lock_key(domain: &str) -> String {
    format!("{domain}{SUFFIX_PERMITTED_NO_LOCK}")
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// [`Repository`] over a pooled Redis connection.
#[derive(Clone)]
pub struct RedisRepository {
    con: ConnectionManager,
}

impl RedisRepository {
    /// Wraps an established connection manager.
    #[must_use]
    pub fn new(con: ConnectionManager) -> Self {
        Self { con }
    }
}

#[async_trait]
impl Repository for RedisRepository {
    async fn get_permit_number(&self, domain: &str) -> Result<Option<i64>> {
        let mut con = self.con.clone();
        let value: Option<i64> = con.get(permitted_number_key(domain)).await?;
        Ok(value)
    }

    async fn get_permit_number_ttl(&self, domain: &str) -> Result<Duration> {
        let mut con = self.con.clone();
        // TTL replies -2 for a missing key and -1 for no expiry.
        let secs: i64 = con.ttl(permitted_number_key(domain)).await?;
        Ok(Duration::from_secs(secs.max(0) as u64))
    }

    async fn save_permit_number(&self, domain: &str, value: i64, ttl: Duration) -> Result<()> {
        let mut con = self.con.clone();
        let _: () = con
            .set_ex(permitted_number_key(domain), value, ttl_secs(ttl))
            .await?;
        Ok(())
    }

    async fn advance_permit_state(
        &self,
        domain: &str,
        permitted: i64,
        last: i64,
        ttl: Duration,
    ) -> Result<()> {
        let mut con = self.con.clone();
        let secs = ttl_secs(ttl);
        let _: () = redis::pipe()
            .set_ex(permitted_number_key(domain), permitted, secs)
            .ignore()
            .expire(current_number_key(domain), secs as i64)
            .ignore()
            .set_ex(last_number_key(domain), last, secs)
            .ignore()
            .query_async(&mut con)
            .await?;
        Ok(())
    }

    async fn get_current_number(&self, domain: &str) -> Result<i64> {
        let mut con = self.con.clone();
        let value: Option<i64> = con.get(current_number_key(domain)).await?;
        Ok(value.unwrap_or(0))
    }

    async fn incr_current_number(&self, domain: &str, ttl: Duration) -> Result<i64> {
        let mut con = self.con.clone();
        let (value,): (i64,) = redis::pipe()
            .incr(current_number_key(domain), 1)
            .expire(current_number_key(domain), ttl_secs(ttl) as i64)
            .ignore()
            .query_async(&mut con)
            .await?;
        Ok(value)
    }

    async fn save_current_number(&self, domain: &str, value: i64, ttl: Duration) -> Result<()> {
        let mut con = self.con.clone();
        let _: () = con
            .set_ex(current_number_key(domain), value, ttl_secs(ttl))
            .await?;
        Ok(())
    }

    async fn get_last_number(&self, domain: &str) -> Result<i64> {
        let mut con = self.con.clone();
        let value: Option<i64> = con.get(last_number_key(domain)).await?;
        Ok(value.unwrap_or(0))
    }

    async fn permit_client(&self, client_id: &str, ttl: Duration) -> Result<()> {
        let mut con = self.con.clone();
        let _: () = con.set_ex(client_id, 1, ttl_secs(ttl)).await?;
        Ok(())
    }

    async fn is_client_permitted(&self, client_id: &str) -> Result<bool> {
        let mut con = self.con.clone();
        let exists: bool = con.exists(client_id).await?;
        Ok(exists)
    }

    async fn enable_domain(&self, domain: &str, ttl: Duration) -> Result<()> {
        let mut con = self.con.clone();
        let secs = ttl_secs(ttl) as i64;
        let _: () = redis::pipe()
            // Keep an existing watermark; create at 0 otherwise.
            .cmd("SETNX")
            .arg(permitted_number_key(domain))
            .arg(0)
            .ignore()
            .expire(permitted_number_key(domain), secs)
            .ignore()
            .zadd(ENABLE_DOMAIN_KEY, domain, 1)
            .ignore()
            .expire(ENABLE_DOMAIN_KEY, secs * 2)
            .ignore()
            .query_async(&mut con)
            .await?;
        Ok(())
    }

    async fn disable_domain(&self, domain: &str) -> Result<()> {
        let mut con = self.con.clone();
        let _: () = redis::pipe()
            .zrem(ENABLE_DOMAIN_KEY, domain)
            .ignore()
            .del(vec![
                current_number_key(domain),
                permitted_number_key(domain),
                last_number_key(domain),
                permit_lock_key(domain),
            ])
            .ignore()
            .query_async(&mut con)
            .await?;
        Ok(())
    }

    async fn extend_domains_ttl(&self, ttl: Duration) -> Result<()> {
        let mut con = self.con.clone();
        let _: bool = con.expire(ENABLE_DOMAIN_KEY, ttl_secs(ttl) as i64).await?;
        Ok(())
    }

    async fn get_enable_domains(&self, start: isize, stop: isize) -> Result<Vec<String>> {
        let mut con = self.con.clone();
        let domains: Vec<String> = con.zrange(ENABLE_DOMAIN_KEY, start, stop).await?;
        Ok(domains)
    }

    async fn get_enable_domains_count(&self) -> Result<i64> {
        let mut con = self.con.clone();
        let count: i64 = con.zcount(ENABLE_DOMAIN_KEY, "-inf", "+inf").await?;
        Ok(count)
    }

    async fn is_white_list_domain(&self, domain: &str) -> Result<bool> {
        let mut con = self.con.clone();
        let score: Option<f64> = con.zscore(WHITE_LIST_KEY, domain).await?;
        Ok(score.is_some())
    }

    async fn add_white_list_domain(&self, domain: &str) -> Result<()> {
        let mut con = self.con.clone();
        // The allow-list survives any queue lifecycle: drop any TTL a
        // store-wide policy may have attached.
        let _: () = redis::pipe()
            .zadd(WHITE_LIST_KEY, domain, 1)
            .ignore()
            .cmd("PERSIST")
            .arg(WHITE_LIST_KEY)
            .ignore()
            .query_async(&mut con)
            .await?;
        Ok(())
    }

    async fn remove_white_list_domain(&self, domain: &str) -> Result<()> {
        let mut con = self.con.clone();
        let _: () = con.zrem(WHITE_LIST_KEY, domain).await?;
        Ok(())
    }

    async fn get_white_list_domains(&self, start: isize, stop: isize) -> Result<Vec<String>> {
        let mut con = self.con.clone();
        let domains: Vec<String> = con.zrange(WHITE_LIST_KEY, start, stop).await?;
        Ok(domains)
    }

    async fn get_white_list_domains_count(&self) -> Result<i64> {
        let mut con = self.con.clone();
        let count: i64 = con.zcount(WHITE_LIST_KEY, "-inf", "+inf").await?;
        Ok(count)
    }

    async fn try_acquire_permit_lock(&self, domain: &str, ttl: Duration) -> Result<bool> {
        let mut con = self.con.clone();
        // SET NX EX in one command: no window where the lock exists without
        // an expiry, and the reply is non-nil iff this call created it.
        let reply: Option<String> = redis::cmd("SET")
            .arg(permit_lock_key(domain))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut con)
            .await?;
        Ok(reply.is_some())
    }

    async fn ping(&self) -> Result<()> {
        let mut con = self.con.clone();
        let _: String = redis::cmd("PING").query_async(&mut con).await?;
        Ok(())
    }
}
