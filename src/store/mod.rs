//! Store Module
//!
//! Persistent and session key-value stores, the entry record they persist,
//! and the namespace registry that partitions the physical key space.

pub mod envelope;

mod encrypted;
mod entry;
mod ephemeral;
mod kv;
mod namespace;

pub use encrypted::{EncryptedStore, EncryptionKey};
pub use entry::StorageEntry;
pub use ephemeral::EphemeralStore;
pub use kv::{KeyValueStore, SetOptions, SOFT_LIMIT_RATIO};
pub use namespace::{KeySpace, Namespace};
