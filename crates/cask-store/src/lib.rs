//! Pluggable key-value blob storage.
//!
//! This crate defines a single capability -- [`BlobStore`], a named-blob
//! store with list/read/write operations and streaming variants -- and a set
//! of interchangeable implementations. Backends persist bytes; decorators
//! wrap other stores to add behavior without changing the contract.
//!
//! # Backends
//!
//! - [`MemoryStore`] -- `HashMap`-based store for tests and embedding
//! - [`FileStore`] -- one file per key under a root directory
//!
//! # Decorators
//!
//! - [`CachingStore`] -- fronts a slow origin with a cheaper cache store
//! - [`RoutingStore`] -- dispatches by key shape to one of many targets
//! - [`EncryptingStore`] -- encrypts on write, decrypts on read
//!
//! # Design Rules
//!
//! 1. Writing an empty byte sequence deletes the key; deleting an absent key
//!    is a no-op.
//! 2. Composition is plain construction: any decorator wraps any
//!    `Arc<dyn BlobStore>`, including another decorator.
//! 3. Authoritative-path errors (origin store, chosen route target) always
//!    propagate; optimization-path errors (cache population, cache clear)
//!    are swallowed at the decorator boundary and logged at most.
//! 4. The store never interprets blob contents -- it is a pure key-value
//!    store.

pub mod caching;
pub mod encrypting;
pub mod error;
pub mod filesystem;
pub mod memory;
pub mod routing;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use caching::CachingStore;
pub use encrypting::{EncryptingStore, EncryptionKey, Nonce};
pub use error::{StoreError, StoreResult};
pub use filesystem::FileStore;
pub use memory::MemoryStore;
pub use routing::{RouteBranch, RoutingStore};
pub use traits::{BlobStore, BlobStream};
