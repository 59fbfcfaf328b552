//! Store implementations

mod local;

pub use local::LocalStore;

use crate::store::{OwnerStore, StoreConfig, StoreError, StoreResult};

/// Create a store from configuration
pub async fn create_store(config: &StoreConfig) -> StoreResult<Box<dyn OwnerStore>> {
    match config.store_type.as_str() {
        "local" => {
            let store = LocalStore::from_config(config);
            store.init().await?;
            Ok(Box::new(store))
        }
        other => Err(StoreError::unsupported_store(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_unsupported_store() {
        let config = StoreConfig {
            store_type: "unsupported".to_string(),
            attributes: HashMap::new(),
        };

        let result = create_store(&config).await;
        if let Err(StoreError::UnsupportedStore(name)) = result {
            assert_eq!(name, "unsupported");
        } else {
            panic!("Expected UnsupportedStore error");
        }
    }

    #[tokio::test]
    async fn test_local_store_is_initialised() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("owners");
        let config = StoreConfig::local(root.to_string_lossy());

        let store = create_store(&config).await.unwrap();
        assert!(root.is_dir());
        assert!(store.list_owners().await.unwrap().is_empty());
    }
}
