//! Local directory store for owner documents
//!
//! Each owner lives in `<dir>/<name>.json` next to a `<name>.lock` file that
//! serializes passes for that owner.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use kit_core::owner::ControlPlane;

use crate::lock::{DEFAULT_LEASE, OwnerLock};
use crate::store::{OwnerStore, StoreConfig, StoreError, StoreResult};

/// Directory-backed owner store for development and single-host deployments
pub struct LocalStore {
    dir: PathBuf,
    lease: Duration,
}

impl LocalStore {
    /// Default store directory
    pub const DEFAULT_DIR: &'static str = ".kit";

    pub fn new() -> Self {
        Self::with_dir(PathBuf::from(Self::DEFAULT_DIR))
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lease: DEFAULT_LEASE,
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Create a LocalStore from configuration
    pub fn from_config(config: &StoreConfig) -> Self {
        let dir = config
            .get_string("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_DIR));

        let store = Self::with_dir(dir);
        match config.lease() {
            Some(lease) => store.with_lease(lease),
            None => store,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn owner_path(&self, name: &str) -> StoreResult<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{}.json", name)))
    }

    fn lock_path(&self, name: &str) -> StoreResult<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{}.lock", name)))
    }

    fn read_lock(path: &Path) -> StoreResult<Option<OwnerLock>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(format!("Failed to read lock file: {}", e))),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::InvalidOwner(format!("Failed to parse lock file: {}", e)))
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_name(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidOwnerName(name.to_string()))
    }
}

#[async_trait]
impl OwnerStore for LocalStore {
    async fn read_owner(&self, name: &str) -> StoreResult<Option<ControlPlane>> {
        let path = self.owner_path(name)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(format!("Failed to read owner file: {}", e))),
        };

        let owner: ControlPlane = serde_json::from_str(&content)
            .map_err(|e| StoreError::InvalidOwner(format!("Failed to parse owner file: {}", e)))?;

        if owner.name != name {
            return Err(StoreError::InvalidOwner(format!(
                "{} contains owner {:?}",
                path.display(),
                owner.name
            )));
        }

        Ok(Some(owner))
    }

    async fn write_owner(&self, owner: &ControlPlane) -> StoreResult<()> {
        let path = self.owner_path(&owner.name)?;
        let content = serde_json::to_string_pretty(owner)
            .map_err(|e| StoreError::Serialization(format!("Failed to serialize owner: {}", e)))?;

        // Write through a temporary file so a crash never leaves half a document
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)
            .map_err(|e| StoreError::Io(format!("Failed to write owner file: {}", e)))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| StoreError::Io(format!("Failed to write owner file: {}", e)))?;

        Ok(())
    }

    async fn remove_owner(&self, name: &str) -> StoreResult<()> {
        let path = self.owner_path(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::OwnerNotFound(name.to_string()))
            }
            Err(e) => Err(StoreError::Io(format!("Failed to remove owner file: {}", e))),
        }
    }

    async fn list_owners(&self) -> StoreResult<Vec<String>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(format!("Failed to read store directory: {}", e))),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| StoreError::Io(format!("Failed to read store directory: {}", e)))?
                .path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn acquire_lock(&self, name: &str, purpose: &str) -> StoreResult<OwnerLock> {
        let lock_path = self.lock_path(name)?;

        if let Some(existing) = Self::read_lock(&lock_path)? {
            if !existing.is_stale() {
                return Err(StoreError::locked(&existing));
            }
            std::fs::remove_file(&lock_path)
                .map_err(|e| StoreError::Io(format!("Failed to remove stale lock: {}", e)))?;
        }

        let lock = OwnerLock::new(name, purpose, self.lease);
        let content = serde_json::to_string_pretty(&lock)
            .map_err(|e| StoreError::Serialization(format!("Failed to serialize lock: {}", e)))?;

        // create_new makes two racing passes fight over the file, not overwrite it
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return match Self::read_lock(&lock_path)? {
                    Some(holder) => Err(StoreError::locked(&holder)),
                    None => Err(StoreError::Io("Lock file vanished while locking".to_string())),
                };
            }
            Err(e) => return Err(StoreError::Io(format!("Failed to create lock file: {}", e))),
        };
        file.write_all(content.as_bytes())
            .map_err(|e| StoreError::Io(format!("Failed to write lock file: {}", e)))?;

        Ok(lock)
    }

    async fn release_lock(&self, lock: &OwnerLock) -> StoreResult<()> {
        let lock_path = self.lock_path(&lock.owner)?;
        let existing =
            Self::read_lock(&lock_path)?.ok_or_else(|| StoreError::LockNotFound(lock.id.clone()))?;

        if existing.id != lock.id {
            return Err(StoreError::LockMismatch {
                expected: lock.id.clone(),
                actual: existing.id,
            });
        }

        std::fs::remove_file(&lock_path)
            .map_err(|e| StoreError::Io(format!("Failed to remove lock file: {}", e)))?;

        Ok(())
    }

    async fn force_unlock(&self, name: &str, lock_id: &str) -> StoreResult<()> {
        let lock_path = self.lock_path(name)?;
        let existing =
            Self::read_lock(&lock_path)?.ok_or_else(|| StoreError::LockNotFound(lock_id.to_string()))?;

        if existing.id != lock_id {
            return Err(StoreError::LockMismatch {
                expected: lock_id.to_string(),
                actual: existing.id,
            });
        }

        std::fs::remove_file(&lock_path)
            .map_err(|e| StoreError::Io(format!("Failed to remove lock file: {}", e)))?;

        Ok(())
    }

    async fn init(&self) -> StoreResult<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| StoreError::Io(format!("Failed to create store directory: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(dir: &tempfile::TempDir) -> LocalStore {
        LocalStore::with_dir(dir.path())
    }

    #[tokio::test]
    async fn test_local_store_read_write() {
        let dir = tempdir().unwrap();
        let store = store(&dir);

        assert!(store.read_owner("alpha").await.unwrap().is_none());

        let mut owner = ControlPlane::new("alpha")
            .with_address_allocation("eipalloc-1")
            .with_private_subnets(["subnet-1"]);
        owner.status.infrastructure.nat_gateway_id = Some("nat-1".to_string());
        store.write_owner(&owner).await.unwrap();

        let read = store.read_owner("alpha").await.unwrap().unwrap();
        assert_eq!(read, owner);
        assert_eq!(store.list_owners().await.unwrap(), vec!["alpha".to_string()]);
    }

    #[tokio::test]
    async fn test_local_store_remove() {
        let dir = tempdir().unwrap();
        let store = store(&dir);
        store.write_owner(&ControlPlane::new("gamma")).await.unwrap();

        store.remove_owner("gamma").await.unwrap();
        assert!(store.read_owner("gamma").await.unwrap().is_none());
        assert!(matches!(
            store.remove_owner("gamma").await,
            Err(StoreError::OwnerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_local_store_rejects_path_names() {
        let dir = tempdir().unwrap();
        let store = store(&dir);

        for name in ["", "../alpha", "a/b", ".hidden"] {
            assert!(matches!(
                store.read_owner(name).await,
                Err(StoreError::InvalidOwnerName(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_local_store_detects_mismatched_document() {
        let dir = tempdir().unwrap();
        let store = store(&dir);
        std::fs::write(dir.path().join("alpha.json"), r#"{"name":"beta"}"#).unwrap();

        assert!(matches!(
            store.read_owner("alpha").await,
            Err(StoreError::InvalidOwner(_))
        ));
    }

    #[tokio::test]
    async fn test_local_store_locking() {
        let dir = tempdir().unwrap();
        let store = store(&dir);

        let lock = store.acquire_lock("alpha", "natgateway").await.unwrap();
        assert_eq!(lock.purpose, "natgateway");

        // Same owner is serialized
        let result = store.acquire_lock("alpha", "finalize").await;
        assert!(matches!(result, Err(StoreError::Locked { .. })));

        // Other owners are independent
        let other = store.acquire_lock("beta", "reconcile").await.unwrap();
        store.release_lock(&other).await.unwrap();

        store.release_lock(&lock).await.unwrap();
        let lock2 = store.acquire_lock("alpha", "finalize").await.unwrap();
        store.release_lock(&lock2).await.unwrap();
    }

    #[tokio::test]
    async fn test_local_store_takes_over_expired_lock() {
        let dir = tempdir().unwrap();
        let store = store(&dir);
        let mut stale = OwnerLock::new("alpha", "natgateway", DEFAULT_LEASE);
        stale.lease_until = stale.acquired - chrono::Duration::seconds(1);
        std::fs::write(
            dir.path().join("alpha.lock"),
            serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();

        let lock = store.acquire_lock("alpha", "reconcile").await.unwrap();
        assert_ne!(lock.id, stale.id);
    }

    #[tokio::test]
    async fn test_local_store_force_unlock() {
        let dir = tempdir().unwrap();
        let store = store(&dir);
        let lock = store.acquire_lock("alpha", "reconcile").await.unwrap();

        assert!(matches!(
            store.force_unlock("alpha", "wrong-id").await,
            Err(StoreError::LockMismatch { .. })
        ));
        store.force_unlock("alpha", &lock.id).await.unwrap();
        assert!(matches!(
            store.release_lock(&lock).await,
            Err(StoreError::LockNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_local_store_from_config() {
        let config = StoreConfig::local("custom-dir");
        let store = LocalStore::from_config(&config);
        assert_eq!(store.dir(), Path::new("custom-dir"));

        let config = StoreConfig {
            store_type: "local".to_string(),
            attributes: Default::default(),
        };
        assert_eq!(LocalStore::from_config(&config).dir(), Path::new(".kit"));
    }

    #[tokio::test]
    async fn test_local_store_lease_from_config() {
        let dir = tempdir().unwrap();
        let config = StoreConfig::local(dir.path().to_string_lossy())
            .with_lease(Duration::from_secs(60));
        let store = LocalStore::from_config(&config);

        let lock = store.acquire_lock("alpha", "natgateway").await.unwrap();
        assert!(lock.remaining().num_seconds() <= 60);
        assert!(lock.remaining().num_seconds() > 50);
    }
}
