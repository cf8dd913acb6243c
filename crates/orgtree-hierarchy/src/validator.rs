//! Kind legality for parent/child links.
//!
//! One static table answers "may a team of kind P be the parent of a team
//! of kind C". Allowed child kinds are derived from it by reading the table
//! in the other direction, so the two can never drift apart:
//!
//! | kind                | legal parent kinds                               |
//! |---------------------|--------------------------------------------------|
//! | Group, Department   | Department, Division, BusinessUnit, Organization (at most 1) |
//! | Division            | Division, BusinessUnit, Organization (exactly 1) |
//! | BusinessUnit        | BusinessUnit, Organization (exactly 1)           |
//! | Organization        | none                                             |
//!
//! A Group never has children, whatever their kind. No team has more than
//! one parent; a team with no explicit parent sits under the root.

use std::ops::RangeInclusive;

use orgtree_model::{Team, TeamKind};

use crate::{GroupRule, HierarchyError};

const UNDER_DEPARTMENT: &[TeamKind] = &[
    TeamKind::Department,
    TeamKind::Division,
    TeamKind::BusinessUnit,
    TeamKind::Organization,
];
const UNDER_DIVISION: &[TeamKind] = &[TeamKind::Division, TeamKind::BusinessUnit, TeamKind::Organization];
const UNDER_BUSINESS_UNIT: &[TeamKind] = &[TeamKind::BusinessUnit, TeamKind::Organization];

/// Kinds a team of `kind` may have as parents.
pub fn allowed_parent_kinds(kind: TeamKind) -> &'static [TeamKind] {
    match kind {
        TeamKind::Group | TeamKind::Department => UNDER_DEPARTMENT,
        TeamKind::Division => UNDER_DIVISION,
        TeamKind::BusinessUnit => UNDER_BUSINESS_UNIT,
        TeamKind::Organization => &[],
    }
}

/// Kinds a team of `kind` may have as children.
pub fn allowed_child_kinds(kind: TeamKind) -> Vec<TeamKind> {
    TeamKind::ALL
        .into_iter()
        .filter(|child| can_be_parent(kind, *child))
        .collect()
}

pub fn can_be_parent(parent: TeamKind, child: TeamKind) -> bool {
    allowed_parent_kinds(child).contains(&parent)
}

/// How many explicit parents a team of `kind` may be given.
pub fn parent_count_range(kind: TeamKind) -> RangeInclusive<usize> {
    match kind {
        TeamKind::Division | TeamKind::BusinessUnit => 1..=1,
        TeamKind::Group | TeamKind::Department => 0..=1,
        TeamKind::Organization => 0..=0,
    }
}

/// Pure structural checks; never touches storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchyValidator;

impl HierarchyValidator {
    pub fn new() -> Self {
        Self
    }

    /// Check that `parents` may all be parents of `team` and that their
    /// number fits the team's kind.
    pub fn validate_parents(&self, team: &Team, parents: &[Team]) -> Result<(), HierarchyError> {
        let range = parent_count_range(team.kind);
        if !range.contains(&parents.len()) {
            if team.kind == TeamKind::Organization {
                return Err(HierarchyError::UnexpectedParent(team.name.clone()));
            }
            return Err(HierarchyError::InvalidParentCount {
                team: team.name.clone(),
                kind: team.kind,
                expected: *range.end(),
                got: parents.len(),
            });
        }

        match parents.iter().find(|p| !can_be_parent(p.kind, team.kind)) {
            Some(parent) => Err(HierarchyError::InvalidParentKind {
                parent: parent.name.clone(),
                parent_kind: parent.kind,
                child: team.name.clone(),
                child_kind: team.kind,
            }),
            None => Ok(()),
        }
    }

    /// Check that `children` may all be children of `team`.
    pub fn validate_children(&self, team: &Team, children: &[Team]) -> Result<(), HierarchyError> {
        if team.kind == TeamKind::Group && !children.is_empty() {
            return Err(HierarchyError::GroupMutationRejected {
                team: team.name.clone(),
                rule: GroupRule::ChildrenNotAllowed,
            });
        }

        match children.iter().find(|c| !can_be_parent(team.kind, c.kind)) {
            Some(child) => Err(HierarchyError::InvalidChildKind {
                parent: team.name.clone(),
                parent_kind: team.kind,
                child: child.name.clone(),
                child_kind: child.kind,
            }),
            None => Ok(()),
        }
    }

    /// Check a kind change on update against the Group invariants.
    pub fn validate_kind_change(
        &self,
        original: &Team,
        new_kind: TeamKind,
        has_children: bool,
    ) -> Result<(), HierarchyError> {
        if original.kind == new_kind {
            return Ok(());
        }
        let rule = if original.kind == TeamKind::Group {
            GroupRule::KindChangeFromGroup
        } else if has_children && new_kind == TeamKind::Group {
            GroupRule::KindChangeToGroupWithChildren
        } else {
            return Ok(());
        };
        Err(HierarchyError::GroupMutationRejected {
            team: original.name.clone(),
            rule,
        })
    }
}
