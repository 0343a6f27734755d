//! Key record persistence for Keygate.
//!
//! The engine talks to storage only through the [`KeyStore`] trait: get,
//! set, delete, list-keys, multi-get over [`keygate_types::KeyRecord`]s.
//! The contract is deliberately weak — atomic single-key writes, nothing
//! more. Serialization of read-modify-write sequences is the engine's job,
//! never the store's.
//!
//! [`MemoryStore`] is the bundled implementation, used by tests and
//! single-node deployments. Redis-shaped or SQL-shaped backends implement
//! the same trait out of tree.

mod error;
mod memory;
mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use store::KeyStore;
