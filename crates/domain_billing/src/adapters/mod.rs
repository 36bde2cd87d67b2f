//! Storage adapters shipped with the domain crate
//!
//! PostgreSQL adapters live in `infra_db`.

pub mod memory;

pub use memory::{InMemoryDocumentStore, InMemoryLedgerStore};
