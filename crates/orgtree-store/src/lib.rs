//! orgtree Store - persistence collaborators for the team hierarchy
//!
//! The hierarchy core never talks to a database directly. It calls two
//! narrow collaborators:
//! - [`RelationshipStore`]: directed typed edges and the "parentless" query
//!   that backs the implicit root
//! - [`EntityStore`]: team records plus lookups of the users, roles,
//!   policies and assets that teams reference
//!
//! [`MemoryStore`] implements both over a lock-protected in-process state
//! and is what the CLI and the test suites run against.

pub mod memory;
pub mod traits;

pub use memory::MemoryStore;
pub use traits::{EntityStore, RelationshipStore};

use orgtree_model::{EntityId, EntityType};
use thiserror::Error;

/// Errors originating from the storage layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Entity not found: {entity_type} {id}")]
    NotFound { entity_type: EntityType, id: EntityId },

    #[error("Entity already exists: {entity_type} {name}")]
    AlreadyExists { entity_type: EntityType, name: String },

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Storage error: {0}")]
    Backend(String),
}
