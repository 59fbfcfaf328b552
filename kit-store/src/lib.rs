//! Kit Owner Store
//!
//! Persists control-plane owner documents between controller passes and
//! serializes passes per owner with lock files.
//!
//! # Overview
//!
//! - **OwnerStore**: A trait for owner storage backends
//! - **LocalStore**: One JSON document and one lock file per owner in a directory
//! - **OwnerLock**: Which process holds an owner, for what, and until when its lease runs out
//!
//! # Example
//!
//! ```ignore
//! use kit_store::{create_store, StoreConfig};
//!
//! let store = create_store(&StoreConfig::local("/var/lib/kit")).await?;
//!
//! // One pass at a time per owner
//! let lock = store.acquire_lock("alpha", "natgateway").await?;
//! let mut owner = store.read_owner("alpha").await?.expect("owner exists");
//!
//! // ... run the controller against `owner` ...
//!
//! store.write_owner(&owner).await?;
//! store.release_lock(&lock).await?;
//! ```

pub mod backends;
pub mod lock;
pub mod store;

// Re-export main types for convenience
pub use backends::{LocalStore, create_store};
pub use lock::{OwnerLock, lease_for};
pub use store::{OwnerStore, StoreConfig, StoreError, StoreResult};
