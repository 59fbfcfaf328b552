//! Owner locks
//!
//! A pass holds its owner's lock from reading the document until the status
//! is written back. The lease is sized from the controller's wait bound, so a
//! lock outliving any legitimate pass belongs to a crashed process and may be
//! taken over.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Slack added on top of the wait bound for describe/create/delete calls
pub const LEASE_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Lease used when no wait bound is known (10 min wait + margin)
pub const DEFAULT_LEASE: Duration = Duration::from_secs(15 * 60);

/// Lease long enough for one pass waiting at most `wait_timeout`
pub fn lease_for(wait_timeout: Duration) -> Duration {
    wait_timeout.saturating_add(LEASE_MARGIN)
}

/// The process holding a lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    pub user: String,
    pub host: String,
    pub pid: u32,
}

impl Holder {
    pub fn current() -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            user,
            host,
            pid: std::process::id(),
        }
    }
}

impl fmt::Display for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} (pid {})", self.user, self.host, self.pid)
    }
}

/// Exclusive claim on one owner for the duration of a pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerLock {
    pub id: String,
    pub owner: String,
    /// What the holder is doing: a controller name for passes, or a CLI
    /// command such as "init"
    pub purpose: String,
    pub holder: Holder,
    pub acquired: DateTime<Utc>,
    pub lease_until: DateTime<Utc>,
}

impl OwnerLock {
    pub fn new(owner: impl Into<String>, purpose: impl Into<String>, lease: Duration) -> Self {
        let acquired = Utc::now();
        // Leases beyond chrono's range are clamped to a century
        let lease = chrono::Duration::from_std(lease)
            .unwrap_or_else(|_| chrono::Duration::days(36_500));

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner: owner.into(),
            purpose: purpose.into(),
            holder: Holder::current(),
            acquired,
            lease_until: acquired + lease,
        }
    }

    /// The lease ran out: the pass that took it is gone
    pub fn is_stale(&self) -> bool {
        Utc::now() > self.lease_until
    }

    pub fn remaining(&self) -> chrono::Duration {
        self.lease_until - Utc::now()
    }
}
