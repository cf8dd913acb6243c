//! orgtree Hierarchy - the typed team hierarchy over an edge-list graph
//!
//! Teams form an Organization → BusinessUnit → Division → Department → Group
//! hierarchy that is stored as `ParentOf` edges rather than as a tree:
//! - Kind legality is a single static table ([`validator`])
//! - A team without a stored parent edge is read as a child of the root
//!   ([`graph`])
//! - Independent per-team upward walks are merged into one forest of
//!   tree views ([`tree`])
//! - Roles and domain are inherited one hop from active parents
//!   ([`inheritance`])
//! - Create/update/delete validate before persisting and repair orphans
//!   after a delete ([`lifecycle`])

pub mod graph;
pub mod inheritance;
pub mod lifecycle;
pub mod tree;
pub mod validator;

pub use graph::{HierarchyGraph, TeamFields, TeamFilter};
pub use inheritance::{RoleAggregator, RoleInheritanceResolver};
pub use lifecycle::{ChangeSummary, DeleteMode, LifecycleManager, OrganizationSettings, StagedTeams};
pub use tree::{HierarchyTreeBuilder, TreeView};
pub use validator::HierarchyValidator;

use orgtree_model::{EntityId, EntityType, TeamKind};
use orgtree_store::StoreError;
use thiserror::Error;

/// Which Group-kind invariant a mutation would break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRule {
    ChildrenNotAllowed,
    KindChangeFromGroup,
    KindChangeToGroupWithChildren,
}

impl std::fmt::Display for GroupRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            GroupRule::ChildrenNotAllowed => {
                "Team of type Group can't have children of type team. Only users are allowed as part of the team"
            }
            GroupRule::KindChangeFromGroup => "Team of type Group cannot be updated to another type",
            GroupRule::KindChangeToGroupWithChildren => {
                "Team with child teams cannot be updated to type Group"
            }
        })
    }
}

/// Errors originating from the hierarchy layer.
#[derive(Error, Debug)]
pub enum HierarchyError {
    #[error("Team {parent} of type {parent_kind} can't be parent of team {child} of type {child_kind}")]
    InvalidParentKind {
        parent: String,
        parent_kind: TeamKind,
        child: String,
        child_kind: TeamKind,
    },

    #[error("Team {parent} of type {parent_kind} can't have child team {child} of type {child_kind}")]
    InvalidChildKind {
        parent: String,
        parent_kind: TeamKind,
        child: String,
        child_kind: TeamKind,
    },

    #[error("Team {team} of type {kind} must have {expected} parent, got {got}")]
    InvalidParentCount {
        team: String,
        kind: TeamKind,
        expected: usize,
        got: usize,
    },

    #[error("Team {parent} can't be parent of team {team}: it lies in the subtree of {team}")]
    CyclicParent { team: String, parent: String },

    #[error("Team {0} of type Organization can't have a parent team")]
    UnexpectedParent(String),

    #[error("Team {0} can't be of type Organization: the organization already exists")]
    DuplicateOrganization(String),

    #[error("Team {0} is the organization and can't change its type")]
    RootKindChange(String),

    #[error("{rule} (team {team})")]
    GroupMutationRejected { team: String, rule: GroupRule },

    #[error("Can not delete the organization team {0}")]
    DeleteRootRejected(String),

    #[error("Dangling reference: {entity_type} {id} does not exist, even as deleted")]
    DanglingReference { entity_type: EntityType, id: EntityId },

    #[error("Team not found: {0}")]
    TeamNotFound(String),

    #[error("{entity_type} not found: {name}")]
    EntityNotFound { entity_type: EntityType, name: String },

    #[error("Team name already in use: {0}")]
    DuplicateName(String),

    #[error("Unknown team field: {0}")]
    UnknownField(String),

    #[error("Unexpected error occurred while building the teams hierarchy: {0}")]
    HierarchyInconsistent(String),

    #[error("Hierarchy depth exceeded maximum of {0}")]
    MaxDepthExceeded(usize),

    #[error(transparent)]
    Store(#[from] StoreError),
}
