//! Vigil Storage - Persistence for probe definitions and probe results
//!
//! This crate provides:
//! - KVStore trait for storage abstraction
//! - redb-based implementation
//! - Key layout for definitions, results and id counters
//! - ProbeRepository, the typed CRUD layer used by the binary

pub mod encoding;
pub mod error;
pub mod kv;
pub mod redb_backend;
pub mod repository;

// Re-export commonly used types
pub use encoding::KeyEncoder;
pub use error::{Result, StorageError};
pub use kv::{KVStore, Transaction};
pub use redb_backend::RedbBackend;
pub use repository::{DefinitionDraft, ProbeRepository};
