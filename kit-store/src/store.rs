//! Owner store trait and error types

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use kit_core::owner::ControlPlane;
use thiserror::Error;

use crate::lock::OwnerLock;

/// Errors that can occur when interacting with an owner store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another pass holds the owner's lock
    #[error("Owner {owner} is locked by {holder} for {purpose} (lock ID: {lock_id})")]
    Locked {
        owner: String,
        lock_id: String,
        holder: String,
        purpose: String,
    },

    /// The lock was not found (for release/force-unlock operations)
    #[error("Lock not found: {0}")]
    LockNotFound(String),

    /// Lock ID mismatch when trying to release
    #[error("Lock ID mismatch: expected {expected}, got {actual}")]
    LockMismatch { expected: String, actual: String },

    /// The store type is not supported
    #[error("Unsupported store type: {0}")]
    UnsupportedStore(String),

    /// Owner names become file names; separators and empty names are rejected
    #[error("Invalid owner name: {0:?}")]
    InvalidOwnerName(String),

    #[error("Owner not found: {0}")]
    OwnerNotFound(String),

    /// Owner document is corrupted or invalid
    #[error("Invalid owner document: {0}")]
    InvalidOwner(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn locked(lock: &OwnerLock) -> Self {
        Self::Locked {
            owner: lock.owner.clone(),
            lock_id: lock.id.clone(),
            holder: lock.holder.to_string(),
            purpose: lock.purpose.clone(),
        }
    }

    pub fn unsupported_store(store_type: impl Into<String>) -> Self {
        Self::UnsupportedStore(store_type.into())
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage for owner documents
///
/// Stores hold the owner exactly as the controllers left it. They never
/// interpret the status; the remote provider stays the source of truth.
#[async_trait]
pub trait OwnerStore: Send + Sync {
    /// Read an owner. Returns `None` if it does not exist.
    async fn read_owner(&self, name: &str) -> StoreResult<Option<ControlPlane>>;

    /// Write an owner, replacing any previous document
    async fn write_owner(&self, owner: &ControlPlane) -> StoreResult<()>;

    /// Remove an owner after it has been finalized
    async fn remove_owner(&self, name: &str) -> StoreResult<()>;

    /// Names of every stored owner, sorted
    async fn list_owners(&self) -> StoreResult<Vec<String>>;

    /// Claim the owner for `purpose`
    ///
    /// Fails while another holder's lease is still running; stale locks are
    /// taken over
    async fn acquire_lock(&self, name: &str, purpose: &str) -> StoreResult<OwnerLock>;

    async fn release_lock(&self, lock: &OwnerLock) -> StoreResult<()>;

    /// Force release an owner's lock by its ID
    ///
    /// This is an administrative operation that should be used with caution
    async fn force_unlock(&self, name: &str, lock_id: &str) -> StoreResult<()>;

    /// Prepare the backing storage (create directories, etc.)
    async fn init(&self) -> StoreResult<()>;
}

/// Configuration for an owner store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Store type (e.g., "local")
    pub store_type: String,
    /// Store-specific attributes
    pub attributes: HashMap<String, String>,
}

impl StoreConfig {
    /// Local store rooted at `path`
    pub fn local(path: impl Into<String>) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert("path".to_string(), path.into());
        Self {
            store_type: "local".to_string(),
            attributes,
        }
    }

    /// Lease given to locks taken through this store
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.attributes
            .insert("lease_secs".to_string(), lease.as_secs().to_string());
        self
    }

    /// Get a string attribute value
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Configured lock lease, if any (an unparsable value counts as unset)
    pub fn lease(&self) -> Option<Duration> {
        self.get_string("lease_secs")
            .and_then(|secs| secs.parse().ok())
            .map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::DEFAULT_LEASE;

    #[test]
    fn test_store_error_locked() {
        let lock = OwnerLock::new("alpha", "natgateway", DEFAULT_LEASE);
        let error = StoreError::locked(&lock);
        assert!(error.to_string().contains(&format!("pid {}", std::process::id())));

        match error {
            StoreError::Locked {
                owner,
                lock_id,
                purpose,
                ..
            } => {
                assert_eq!(owner, "alpha");
                assert_eq!(lock_id, lock.id);
                assert_eq!(purpose, "natgateway");
            }
            _ => panic!("Expected Locked error"),
        }
    }

    #[test]
    fn test_store_error_display() {
        let error = StoreError::unsupported_store("s3");
        assert_eq!(error.to_string(), "Unsupported store type: s3");

        let error = StoreError::InvalidOwnerName("../etc".to_string());
        assert_eq!(error.to_string(), "Invalid owner name: \"../etc\"");
    }

    #[test]
    fn test_local_config() {
        let config = StoreConfig::local("/tmp/kit");
        assert_eq!(config.store_type, "local");
        assert_eq!(config.get_string("path"), Some("/tmp/kit"));
        assert_eq!(config.get_string("bucket"), None);
        assert_eq!(config.lease(), None);
    }

    #[test]
    fn test_store_config_lease() {
        let config = StoreConfig::local(".kit").with_lease(Duration::from_secs(900));
        assert_eq!(config.lease(), Some(Duration::from_secs(900)));

        let mut config = StoreConfig::local(".kit");
        config
            .attributes
            .insert("lease_secs".to_string(), "soon".to_string());
        assert_eq!(config.lease(), None);
    }
}
