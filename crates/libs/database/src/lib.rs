//! Snapshots of characters and the world around them, kept in a document store.
//!
//! [`Database`] owns the MongoDB connection; [`MemoryStore`] stands in for it
//! in tests. Both sit behind [`DocumentStore`], which [`SnapshotStore`] wraps
//! with the bookkeeping callers use to throttle how often they persist.

pub mod collections;
pub mod error;
pub mod memory;
pub mod mongo;
pub mod records;
pub mod snapshot;
pub mod store;

pub use collections::{Collection, DocumentKey};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use mongo::{DEFAULT_URI, Database};
pub use records::PlayerRecord;
pub use snapshot::SnapshotStore;
pub use store::DocumentStore;
