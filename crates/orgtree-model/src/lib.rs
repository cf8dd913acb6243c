//! orgtree - Core domain types for a typed team hierarchy
//!
//! Defines the vocabulary shared by every layer of the workspace:
//! entity identities and references, the five team kinds, the team record
//! itself, and the typed edges that connect teams to each other and to
//! users, roles, policies and owned assets.

pub mod constants;
pub mod error;
pub mod identity;
pub mod types;

pub use constants::*;
pub use error::*;
pub use identity::*;
pub use types::*;
