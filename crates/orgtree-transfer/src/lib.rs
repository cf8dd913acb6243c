//! orgtree Transfer - bulk export and import of team subtrees
//!
//! A subtree travels as a flat, order-independent list of team records:
//! - One record per team, parents referenced by name ([`record`])
//! - Export walks the subtree through child-scoped listings ([`export`])
//! - Import validates every record on its own, stages new teams so later
//!   records can name them, and never lets one bad record fail the
//!   batch ([`import`])

pub mod engine;
pub mod export;
pub mod import;
pub mod record;

pub use engine::BulkTransferEngine;
pub use import::{ImportResult, ImportStatus, RowResult, RowStatus};
pub use record::{CsvHeader, ImportDiagnostic, TeamRecord, HEADERS};

use orgtree_hierarchy::HierarchyError;
use orgtree_store::StoreError;
use thiserror::Error;

/// Errors that fail a whole transfer rather than a single record.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Malformed records at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
