//! Portal Store
//!
//! The persistence contract the portal controller depends on, independent of
//! the concrete backend:
//! - **PortalStore**: document CRUD over collections, atomic counters, settings
//! - **RecordStore**: typed layer over any `PortalStore` (serde round-trips)
//! - **BlobStore**: file uploads returning a public URL
//!
//! Backends:
//! - [`MemoryStore`] / [`MemoryBlobStore`]: process-local, used for tests and demos
//! - [`JsonFileStore`] / [`FsBlobStore`]: embedded local store under a data directory
//!
//! # Example
//!
//! ```rust
//! use portal_store::{Collection, MemoryStore, PortalStore};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), portal_store::StoreError> {
//! let store = MemoryStore::new();
//! store.create(Collection::Articles, json!({"id": "a1", "views": 0})).await?;
//! let views = store
//!     .increment_counter(Collection::Articles, "a1", &portal_store::CounterPath::Views)
//!     .await?;
//! assert_eq!(views, 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod backends;
pub mod blob;
pub mod collection;
pub mod error;
pub mod record;
pub mod seed;
pub mod store;

// Re-exports
pub use backends::{JsonFileStore, MemoryStore};
pub use blob::{blob_path_for, BlobStore, FsBlobStore, MemoryBlobStore};
pub use collection::{Collection, CounterPath, Document};
pub use error::StoreError;
pub use record::{Record, RecordStore};
pub use seed::{seed_if_empty, SeedReport};
pub use store::PortalStore;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
