//! Tests for the kind legality table.
//!
//! Every (parent, child) pair of the five kinds is checked against the
//! expected verdict, and the parent and child directions must agree.

use orgtree_hierarchy::validator::{allowed_child_kinds, allowed_parent_kinds, can_be_parent};
use orgtree_hierarchy::{GroupRule, HierarchyError, HierarchyValidator};
use orgtree_model::{Team, TeamKind};

use orgtree_model::TeamKind::{BusinessUnit, Department, Division, Group, Organization};

/// (parent, child, legal)
const MATRIX: [(TeamKind, TeamKind, bool); 25] = [
    (Organization, Organization, false),
    (Organization, BusinessUnit, true),
    (Organization, Division, true),
    (Organization, Department, true),
    (Organization, Group, true),
    (BusinessUnit, Organization, false),
    (BusinessUnit, BusinessUnit, true),
    (BusinessUnit, Division, true),
    (BusinessUnit, Department, true),
    (BusinessUnit, Group, true),
    (Division, Organization, false),
    (Division, BusinessUnit, false),
    (Division, Division, true),
    (Division, Department, true),
    (Division, Group, true),
    (Department, Organization, false),
    (Department, BusinessUnit, false),
    (Department, Division, false),
    (Department, Department, true),
    (Department, Group, true),
    (Group, Organization, false),
    (Group, BusinessUnit, false),
    (Group, Division, false),
    (Group, Department, false),
    (Group, Group, false),
];

// ═══════════════════════════════════════════════════════════════
// Legality table
// ═══════════════════════════════════════════════════════════════

#[test]
fn all_kind_pairs_match_the_table() {
    for (parent, child, legal) in MATRIX {
        assert_eq!(can_be_parent(parent, child), legal, "{parent} -> {child}");
    }
}

#[test]
fn parent_and_child_views_agree() {
    for (parent, child, legal) in MATRIX {
        assert_eq!(allowed_parent_kinds(child).contains(&parent), legal);
        assert_eq!(allowed_child_kinds(parent).contains(&child), legal);
    }
    assert!(allowed_child_kinds(Group).is_empty());
    assert!(allowed_parent_kinds(Organization).is_empty());
}

#[test]
fn validate_parents_enforces_every_pair() {
    let validator = HierarchyValidator::new();
    for (parent_kind, child_kind, legal) in MATRIX {
        let parent = Team::new("parent", parent_kind);
        let child = Team::new("child", child_kind);
        let result = validator.validate_parents(&child, &[parent]);
        match (child_kind, legal) {
            (Organization, _) => assert!(matches!(result, Err(HierarchyError::UnexpectedParent(_)))),
            (_, true) => assert!(result.is_ok(), "{parent_kind} -> {child_kind}"),
            (_, false) => assert!(
                matches!(result, Err(HierarchyError::InvalidParentKind { .. })),
                "{parent_kind} -> {child_kind}"
            ),
        }
    }
}

#[test]
fn validate_children_enforces_every_pair() {
    let validator = HierarchyValidator::new();
    for (parent_kind, child_kind, legal) in MATRIX {
        let parent = Team::new("parent", parent_kind);
        let child = Team::new("child", child_kind);
        let result = validator.validate_children(&parent, &[child]);
        match (parent_kind, legal) {
            (Group, _) => assert!(matches!(
                result,
                Err(HierarchyError::GroupMutationRejected { rule: GroupRule::ChildrenNotAllowed, .. })
            )),
            (_, true) => assert!(result.is_ok()),
            (_, false) => assert!(matches!(result, Err(HierarchyError::InvalidChildKind { .. }))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Parent counts
// ═══════════════════════════════════════════════════════════════

#[test]
fn departments_and_groups_take_at_most_one_parent() {
    let validator = HierarchyValidator::new();
    let parents = [Team::new("a", Department), Team::new("b", Division)];
    for kind in [Department, Group] {
        let team = Team::new("t", kind);
        assert!(validator.validate_parents(&team, &[]).is_ok());
        assert!(validator.validate_parents(&team, &parents[..1]).is_ok());
        let err = validator.validate_parents(&team, &parents).unwrap_err();
        assert!(matches!(err, HierarchyError::InvalidParentCount { expected: 1, got: 2, .. }));
    }
}

#[test]
fn count_is_checked_before_kind() {
    let validator = HierarchyValidator::new();
    let parents = [Team::new("a", Group), Team::new("b", Group)];
    let err = validator
        .validate_parents(&Team::new("div", Division), &parents)
        .unwrap_err();
    assert!(matches!(err, HierarchyError::InvalidParentCount { expected: 1, got: 2, .. }));

    let err = validator
        .validate_parents(&Team::new("bu", BusinessUnit), &[])
        .unwrap_err();
    assert!(matches!(err, HierarchyError::InvalidParentCount { got: 0, .. }));
}

#[test]
fn rejection_messages_name_both_teams() {
    let validator = HierarchyValidator::new();
    let err = validator
        .validate_parents(&Team::new("Platform2", Division), &[Team::new("Ops", Group)])
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Team Ops of type Group can't be parent of team Platform2 of type Division"
    );
}
