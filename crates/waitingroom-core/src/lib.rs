//! Distributed admission-control engine for the waiting-room gateway.
//!
//! The gateway sits in front of arbitrary origin services and admits
//! clients at a bounded rate, pushing the overflow into a fair FIFO queue
//! per domain. This crate is the engine behind it: the shared-store
//! repository that coordinates gateway replicas, the local TTL cache in
//! front of hot reads, the sealed-cookie client identity, the per-domain
//! state machine, and the cluster-wide admission controller.
//!
//! The HTTP surface lives in the `waitingroom-gateway` binary crate.

pub mod cache;
pub mod client;
pub mod config;
pub mod controller;
pub mod cookie;
pub mod engine;
pub mod error;
pub mod notify;
pub mod repository;

pub use cache::TtlCache;
pub use client::Client;
pub use config::Config;
pub use controller::AccessController;
pub use cookie::{CookieCodec, COOKIE_NAME};
pub use engine::{AdvanceOutcome, Waitingroom};
pub use error::{Error, Result};
pub use notify::{Notifier, NoopNotifier, QueueEvent, QueueEventKind, SlackNotifier};
pub use repository::{MemoryRepository, RedisRepository, Repository};
