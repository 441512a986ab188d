//! Background admission controller.
//!
//! One [`AccessController`] task runs per gateway replica. Every tick it
//! walks the enabled domains and, for each, races the other replicas for
//! the per-domain permit lock; the winner advances that domain's watermark
//! by one quantum. The lock's TTL equals the tick interval, so a crashed
//! holder costs the cluster at most one missed advancement.

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::Config;
use crate::engine::{AdvanceOutcome, Waitingroom};
use crate::error::Result;

/// Periodic watermark-advancement worker.
pub struct AccessController {
    engine: Arc<Waitingroom>,
    config: Arc<Config>,
    shutdown: watch::Receiver<bool>,
}

impl AccessController {
    /// Builds a controller that stops when `shutdown` flips to `true` (or
    /// its sender is dropped).
    #[must_use]
    pub fn new(
        engine: Arc<Waitingroom>,
        config: Arc<Config>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            engine,
            config,
            shutdown,
        }
    }

    /// Runs ticks until shutdown.
    ///
    /// Ticks are serialized: when a tick body overruns the interval, the
    /// next tick starts immediately afterwards rather than being skipped.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.permit_interval());
        tracing::info!(
            interval_sec = self.config.permit_interval_sec,
            "permit worker started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.shutdown.changed() => break,
            }
            if let Err(e) = self.run_once().await {
                tracing::error!(error = %e, "error permit worker");
            }
            if *self.shutdown.borrow() {
                break;
            }
        }
        tracing::info!("permit worker stopped");
    }

    /// One controller tick over every enabled domain.
    ///
    /// A store failure on one domain is logged and the walk continues; only
    /// a failure to enumerate the enabled set fails the tick itself.
    ///
    /// # Errors
    ///
    /// Returns the store error from listing the enabled domains or from
    /// extending the set's TTL.
    pub async fn run_once(&self) -> Result<()> {
        let domains = self.engine.get_enable_domains(0, -1).await?;

        for domain in &domains {
            if *self.shutdown.borrow() {
                return Ok(());
            }
            if let Err(e) = self.process_domain(domain).await {
                tracing::warn!(domain = %domain, error = %e, "permit worker: domain pass failed");
            }
        }

        if !domains.is_empty() {
            self.engine.extend_domains_ttl().await?;
        }
        Ok(())
    }

    async fn process_domain(&self, domain: &str) -> Result<()> {
        tracing::debug!(domain, "try permit access");

        // Fresh read: a domain whose watermark expired must be torn down,
        // not advanced, and the local cache could hide that for a full TTL.
        if !self.engine.is_enabled_queue_fresh(domain).await? {
            tracing::info!(domain, "domain is not enabled");
            self.engine.reset(domain).await?;
            return Ok(());
        }

        self.engine.flush_permit_number_cache(domain);

        if !self.engine.try_acquire_permit_lock(domain).await? {
            return Ok(());
        }
        tracing::info!(domain, "got permit lock");

        match self.engine.append_permit_number(domain).await? {
            AdvanceOutcome::Advanced {
                permitted_number,
                current_number,
            } => {
                tracing::info!(
                    domain,
                    permitted = permitted_number,
                    current = current_number,
                    "allowed access"
                );
            }
            AdvanceOutcome::QuiescentReset => {
                tracing::info!(domain, "client not increase");
            }
            AdvanceOutcome::AlreadyDisabled => {
                tracing::info!(domain, "queue already disabled");
            }
        }
        Ok(())
    }
}
