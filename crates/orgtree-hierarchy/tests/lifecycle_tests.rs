//! Tests for team creation, update and deletion.
//!
//! Verifies:
//! - The end-to-end Eng / Platform / CoreInfra hierarchy walk-through
//! - Orphan repair after hard and soft deletes
//! - Group mutation rules and kind changes on update
//! - Incremental edge sync and the change summary
//! - Reference validation and the organization bootstrap

use std::sync::Arc;

use orgtree_hierarchy::{
    DeleteMode, GroupRule, HierarchyError, LifecycleManager, OrganizationSettings, TeamFields,
};
use orgtree_model::{Edge, EntityId, EntityRef, EntityType, Include, Team, TeamKind};
use orgtree_store::{EntityStore, MemoryStore, RelationshipStore};

fn setup() -> (Arc<MemoryStore>, LifecycleManager<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let manager = LifecycleManager::init_organization(Arc::clone(&store), &OrganizationSettings::default()).unwrap();
    (store, manager)
}

fn create(manager: &LifecycleManager<MemoryStore>, name: &str, kind: TeamKind, parents: &[&Team]) -> Team {
    let team = Team::new(name, kind).with_parents(parents.iter().map(|p| p.entity_ref()).collect());
    manager.create(team).unwrap()
}

fn try_create(
    manager: &LifecycleManager<MemoryStore>,
    name: &str,
    kind: TeamKind,
    parents: &[&Team],
) -> Result<Team, HierarchyError> {
    manager.create(Team::new(name, kind).with_parents(parents.iter().map(|p| p.entity_ref()).collect()))
}

fn names(refs: &[EntityRef]) -> Vec<&str> {
    refs.iter().map(|r| r.name.as_str()).collect()
}

fn register(store: &MemoryStore, entity_type: EntityType, name: &str) -> EntityRef {
    let entity = EntityRef::new(EntityId::generate(), entity_type, name);
    store.register_entity(entity.clone()).unwrap();
    entity
}

// ═══════════════════════════════════════════════════════════════
// Walk-through
// ═══════════════════════════════════════════════════════════════

#[test]
fn hierarchy_walk_through_with_hard_delete() {
    let (_store, manager) = setup();
    let graph = manager.graph();

    let eng = create(&manager, "Eng", TeamKind::BusinessUnit, &[]);
    assert_eq!(names(&graph.parents_of(eng.id).unwrap()), vec!["Organization"]);

    let platform = create(&manager, "Platform", TeamKind::Division, &[&eng]);
    assert_eq!(names(&graph.parents_of(platform.id).unwrap()), vec!["Eng"]);

    let ops = create(&manager, "Ops", TeamKind::Group, &[]);
    let err = try_create(&manager, "Platform2", TeamKind::Division, &[&ops]).unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::InvalidParentKind { parent_kind: TeamKind::Group, child_kind: TeamKind::Division, .. }
    ));

    let core = create(&manager, "CoreInfra", TeamKind::Group, &[&platform]);
    let err = try_create(&manager, "Leaf", TeamKind::Group, &[&core]).unwrap_err();
    assert!(matches!(err, HierarchyError::InvalidParentKind { .. }));

    let mut with_child = graph.get(core.id, Include::NonDeleted, TeamFields::all()).unwrap();
    with_child.children = vec![ops.entity_ref()];
    let err = manager.update(with_child).unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::GroupMutationRejected { rule: GroupRule::ChildrenNotAllowed, .. }
    ));

    manager.delete(platform.id, DeleteMode::Hard).unwrap();
    assert_eq!(names(&graph.parents_of(core.id).unwrap()), vec!["Organization"]);
    assert!(manager.graph().store().find_team(platform.id, Include::All).unwrap().is_none());

    let root_children = graph.children_of(manager.root().id()).unwrap();
    assert_eq!(names(&root_children), vec!["CoreInfra", "Eng", "Ops"]);
}

#[test]
fn soft_delete_reparents_children_under_root() {
    let (store, manager) = setup();
    let graph = manager.graph();
    let eng = create(&manager, "Eng", TeamKind::BusinessUnit, &[]);
    let platform = create(&manager, "Platform", TeamKind::Division, &[&eng]);
    let core = create(&manager, "CoreInfra", TeamKind::Group, &[&platform]);

    manager.delete(platform.id, DeleteMode::Soft).unwrap();

    assert_eq!(names(&graph.parents_of(core.id).unwrap()), vec!["Organization"]);
    assert_eq!(names(&graph.active_parents_of(core.id).unwrap()), vec!["Organization"]);
    assert_eq!(names(&graph.parents_of(platform.id).unwrap()), vec!["Eng"]);
    assert!(store.find_team(platform.id, Include::Deleted).unwrap().is_some());
    assert!(graph.get(platform.id, Include::NonDeleted, TeamFields::none()).is_err());
}

#[test]
fn delete_only_detaches_a_child_with_another_stored_parent() {
    let (store, manager) = setup();
    let graph = manager.graph();
    let a = create(&manager, "A", TeamKind::Department, &[]);
    let b = create(&manager, "B", TeamKind::Department, &[]);
    let shared = create(&manager, "Shared", TeamKind::Group, &[&a]);
    // Second parent edge written straight to the store, bypassing validation.
    store.add_edge(Edge::parent_of(b.id, shared.id)).unwrap();
    let edges_before = store.edge_count().unwrap();

    assert_eq!(manager.delete(a.id, DeleteMode::Soft).unwrap().name, "A");

    assert_eq!(names(&graph.parents_of(shared.id).unwrap()), vec!["B"]);
    assert_eq!(store.edge_count().unwrap(), edges_before - 1);
}

#[test]
fn deleting_the_organization_is_rejected() {
    let (store, manager) = setup();
    let root = manager.root().id();
    let err = manager.delete(root, DeleteMode::Hard).unwrap_err();
    assert!(matches!(err, HierarchyError::DeleteRootRejected(name) if name == "Organization"));
    assert!(store.find_team(root, Include::NonDeleted).unwrap().is_some());
}

// ═══════════════════════════════════════════════════════════════
// Creation rules
// ═══════════════════════════════════════════════════════════════

#[test]
fn create_rejects_duplicate_names_and_second_organization() {
    let (_store, manager) = setup();
    create(&manager, "Eng", TeamKind::BusinessUnit, &[]);

    let err = try_create(&manager, "Eng", TeamKind::Department, &[]).unwrap_err();
    assert!(matches!(err, HierarchyError::DuplicateName(name) if name == "Eng"));

    let err = try_create(&manager, "Acme", TeamKind::Organization, &[]).unwrap_err();
    assert!(matches!(err, HierarchyError::DuplicateOrganization(_)));
}

#[test]
fn business_unit_with_two_parents_is_rejected() {
    let (_store, manager) = setup();
    let a = create(&manager, "A", TeamKind::BusinessUnit, &[]);
    let b = create(&manager, "B", TeamKind::BusinessUnit, &[]);
    let err = try_create(&manager, "C", TeamKind::BusinessUnit, &[&a, &b]).unwrap_err();
    assert!(matches!(err, HierarchyError::InvalidParentCount { expected: 1, got: 2, .. }));
}

#[test]
fn create_fills_root_parent_without_an_edge() {
    let (store, manager) = setup();
    let eng = create(&manager, "Eng", TeamKind::BusinessUnit, &[]);
    assert_eq!(names(&eng.parents), vec!["Organization"]);
    assert!(manager.graph().stored_parents_of(eng.id).unwrap().is_empty());
    assert_eq!(store.edge_count().unwrap(), 0);
}

#[test]
fn create_rejects_unknown_user() {
    let (_store, manager) = setup();
    let ghost = EntityRef::new(EntityId::generate(), EntityType::User, "ghost");
    let err = manager
        .create(Team::new("Eng", TeamKind::Department).with_users(vec![ghost]))
        .unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::EntityNotFound { entity_type: EntityType::User, name } if name == "ghost"
    ));
}

#[test]
fn create_stores_association_edges() {
    let (store, manager) = setup();
    let alice = register(&store, EntityType::User, "alice");
    let reader = register(&store, EntityType::Role, "Reader");
    let mut team = Team::new("Eng", TeamKind::Department)
        .with_users(vec![alice.clone()])
        .with_default_roles(vec![reader.clone()]);
    team.owner = Some(alice.clone());
    let eng = manager.create(team).unwrap();

    let loaded = manager.graph().get(eng.id, Include::NonDeleted, TeamFields::all()).unwrap();
    assert_eq!(names(&loaded.users), vec!["alice"]);
    assert_eq!(names(&loaded.default_roles), vec!["Reader"]);
    assert_eq!(loaded.owner.map(|o| o.name), Some("alice".to_string()));
    assert_eq!(loaded.user_count, Some(1));
    assert_eq!(store.edge_count().unwrap(), 3);
}

// ═══════════════════════════════════════════════════════════════
// Updates
// ═══════════════════════════════════════════════════════════════

#[test]
fn update_moves_team_and_reports_changes() {
    let (store, manager) = setup();
    let graph = manager.graph();
    let eng = create(&manager, "Eng", TeamKind::BusinessUnit, &[]);
    let sales = create(&manager, "Sales", TeamKind::BusinessUnit, &[]);
    let data = create(&manager, "Data", TeamKind::Department, &[&eng]);

    let mut moved = graph.get(data.id, Include::NonDeleted, TeamFields::all()).unwrap();
    moved.parents = vec![sales.entity_ref()];
    moved.description = Some("Analytics".to_string());
    moved.name = "Renamed".to_string();
    let (updated, summary) = manager.update(moved).unwrap();

    assert_eq!(updated.name, "Data");
    assert_eq!(names(&graph.stored_parents_of(data.id).unwrap()), vec!["Sales"]);
    assert_eq!(summary.fields_updated, vec!["parents"]);
    assert_eq!(summary.fields_added, vec!["description"]);
    assert!(summary.fields_deleted.is_empty());
    assert_eq!(store.edge_count().unwrap(), 1);
}

#[test]
fn update_back_to_root_removes_parent_edge() {
    let (store, manager) = setup();
    let graph = manager.graph();
    let eng = create(&manager, "Eng", TeamKind::BusinessUnit, &[]);
    let data = create(&manager, "Data", TeamKind::Department, &[&eng]);

    let mut moved = graph.get(data.id, Include::NonDeleted, TeamFields::all()).unwrap();
    moved.parents.clear();
    manager.update(moved).unwrap();

    assert_eq!(store.edge_count().unwrap(), 0);
    assert_eq!(names(&graph.parents_of(data.id).unwrap()), vec!["Organization"]);
}

#[test]
fn update_without_changes_reports_nothing() {
    let (_store, manager) = setup();
    let eng = create(&manager, "Eng", TeamKind::BusinessUnit, &[]);
    let loaded = manager.graph().get(eng.id, Include::NonDeleted, TeamFields::all()).unwrap();
    let (_, summary) = manager.update(loaded).unwrap();
    assert!(summary.is_empty());
}

#[test]
fn update_normalizes_empty_email() {
    let (store, manager) = setup();
    let eng = create(&manager, "Eng", TeamKind::BusinessUnit, &[]);
    let mut loaded = manager.graph().get(eng.id, Include::NonDeleted, TeamFields::all()).unwrap();
    loaded.email = Some("  ".to_string());
    manager.update(loaded).unwrap();
    assert_eq!(store.find_team(eng.id, Include::NonDeleted).unwrap().unwrap().email, None);
}

#[test]
fn group_kind_changes_are_rejected() {
    let (_store, manager) = setup();
    let graph = manager.graph();
    let dept = create(&manager, "Dept", TeamKind::Department, &[]);
    let group = create(&manager, "Crew", TeamKind::Group, &[&dept]);

    let mut from_group = graph.get(group.id, Include::NonDeleted, TeamFields::all()).unwrap();
    from_group.kind = TeamKind::Department;
    assert!(matches!(
        manager.update(from_group).unwrap_err(),
        HierarchyError::GroupMutationRejected { rule: GroupRule::KindChangeFromGroup, .. }
    ));

    let mut to_group = graph.get(dept.id, Include::NonDeleted, TeamFields::all()).unwrap();
    to_group.kind = TeamKind::Group;
    assert!(matches!(
        manager.update(to_group).unwrap_err(),
        HierarchyError::GroupMutationRejected { rule: GroupRule::KindChangeToGroupWithChildren, .. }
    ));

    let lone = create(&manager, "Lone", TeamKind::Department, &[]);
    let mut to_group = graph.get(lone.id, Include::NonDeleted, TeamFields::all()).unwrap();
    to_group.kind = TeamKind::Group;
    let (updated, summary) = manager.update(to_group).unwrap();
    assert_eq!(updated.kind, TeamKind::Group);
    assert_eq!(summary.fields_updated, vec!["teamType"]);
}

#[test]
fn update_rejects_parent_from_own_subtree() {
    let (_store, manager) = setup();
    let top = create(&manager, "Top", TeamKind::Department, &[]);
    let mid = create(&manager, "Mid", TeamKind::Department, &[&top]);
    let low = create(&manager, "Low", TeamKind::Department, &[&mid]);

    let mut looped = manager.graph().get(top.id, Include::NonDeleted, TeamFields::all()).unwrap();
    looped.parents = vec![low.entity_ref()];
    looped.children.clear();
    let err = manager.update(looped).unwrap_err();
    assert!(matches!(err, HierarchyError::CyclicParent { parent, .. } if parent == "Low"));

    let mut own = manager.graph().get(mid.id, Include::NonDeleted, TeamFields::all()).unwrap();
    own.parents = vec![mid.entity_ref()];
    assert!(matches!(manager.update(own).unwrap_err(), HierarchyError::CyclicParent { .. }));
}

// ═══════════════════════════════════════════════════════════════
// Single parent
// ═══════════════════════════════════════════════════════════════

fn assert_single_parents(manager: &LifecycleManager<MemoryStore>) {
    let graph = manager.graph();
    for team in graph.store().list_teams(Include::NonDeleted).unwrap() {
        if manager.root().is_root(team.id) {
            continue;
        }
        let parents = graph.parents_of(team.id).unwrap();
        assert_eq!(parents.len(), 1, "team {} has parents {:?}", team.name, names(&parents));
    }
}

#[test]
fn departments_and_groups_take_one_parent() {
    let (_store, manager) = setup();
    let a = create(&manager, "A", TeamKind::Department, &[]);
    let b = create(&manager, "B", TeamKind::Department, &[]);

    for kind in [TeamKind::Group, TeamKind::Department] {
        let err = try_create(&manager, "Shared", kind, &[&a, &b]).unwrap_err();
        assert!(matches!(err, HierarchyError::InvalidParentCount { expected: 1, got: 2, .. }));
    }
    assert!(manager.graph().get_by_name("Shared", Include::All, TeamFields::none()).is_err());
}

#[test]
fn listing_a_child_moves_it_from_its_previous_parent() {
    let (_store, manager) = setup();
    let graph = manager.graph();
    let a = create(&manager, "A", TeamKind::BusinessUnit, &[]);
    let d = create(&manager, "D", TeamKind::Division, &[&a]);

    let c = manager
        .create(Team::new("C", TeamKind::BusinessUnit).with_children(vec![d.entity_ref()]))
        .unwrap();

    assert_eq!(names(&graph.parents_of(d.id).unwrap()), vec!["C"]);
    assert!(graph.children_of(a.id).unwrap().is_empty());
    assert_eq!(names(&graph.children_of(c.id).unwrap()), vec!["D"]);
}

#[test]
fn update_of_children_moves_and_releases_teams() {
    let (store, manager) = setup();
    let graph = manager.graph();
    let a = create(&manager, "A", TeamKind::BusinessUnit, &[]);
    let c = create(&manager, "C", TeamKind::BusinessUnit, &[]);
    let d = create(&manager, "D", TeamKind::Division, &[&a]);

    let mut adopting = graph.get(c.id, Include::NonDeleted, TeamFields::all()).unwrap();
    adopting.children.push(d.entity_ref());
    let (_, summary) = manager.update(adopting).unwrap();
    assert_eq!(summary.fields_added, vec!["children"]);
    assert_eq!(names(&graph.parents_of(d.id).unwrap()), vec!["C"]);
    assert_eq!(store.edge_count().unwrap(), 1);

    let mut releasing = graph.get(c.id, Include::NonDeleted, TeamFields::all()).unwrap();
    releasing.children.clear();
    manager.update(releasing).unwrap();
    assert_eq!(names(&graph.parents_of(d.id).unwrap()), vec!["Organization"]);
    assert_eq!(store.edge_count().unwrap(), 0);
}

#[test]
fn listing_an_ancestor_as_child_is_rejected() {
    let (_store, manager) = setup();
    let top = create(&manager, "Top", TeamKind::Department, &[]);
    let mid = create(&manager, "Mid", TeamKind::Department, &[&top]);

    let mut looped = manager.graph().get(mid.id, Include::NonDeleted, TeamFields::all()).unwrap();
    looped.children.push(top.entity_ref());
    let err = manager.update(looped).unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::CyclicParent { team, parent } if team == "Top" && parent == "Mid"
    ));
    assert_eq!(names(&manager.graph().parents_of(top.id).unwrap()), vec!["Organization"]);
}

#[test]
fn organization_keeps_its_kind_and_has_no_parent() {
    let (_store, manager) = setup();
    let graph = manager.graph();
    let root = manager.root().id();
    let eng = create(&manager, "Eng", TeamKind::BusinessUnit, &[]);

    let mut demoted = graph.get(root, Include::NonDeleted, TeamFields::all()).unwrap();
    demoted.kind = TeamKind::BusinessUnit;
    assert!(matches!(
        manager.update(demoted).unwrap_err(),
        HierarchyError::RootKindChange(name) if name == "Organization"
    ));

    for parent in [eng.entity_ref(), manager.root().entity_ref()] {
        let mut nested = graph.get(root, Include::NonDeleted, TeamFields::all()).unwrap();
        nested.parents = vec![parent];
        assert!(matches!(
            manager.update(nested).unwrap_err(),
            HierarchyError::UnexpectedParent(_)
        ));
    }

    let stored = graph.get(root, Include::NonDeleted, TeamFields::all()).unwrap();
    assert_eq!(stored.kind, TeamKind::Organization);
    assert!(stored.parents.is_empty());
}

#[test]
fn every_structural_mutation_keeps_one_parent() {
    let (_store, manager) = setup();
    let graph = manager.graph();
    let eng = create(&manager, "Eng", TeamKind::BusinessUnit, &[]);
    let sales = create(&manager, "Sales", TeamKind::BusinessUnit, &[]);
    let platform = create(&manager, "Platform", TeamKind::Division, &[&eng]);
    let data = create(&manager, "Data", TeamKind::Department, &[&eng]);
    create(&manager, "CoreInfra", TeamKind::Group, &[&platform]);
    let ml = create(&manager, "Ml", TeamKind::Group, &[&data]);
    assert_single_parents(&manager);

    manager
        .create(Team::new("Infra", TeamKind::Division).with_children(vec![platform.entity_ref()]))
        .unwrap();
    assert_single_parents(&manager);
    assert_eq!(names(&graph.parents_of(platform.id).unwrap()), vec!["Infra"]);

    let mut moved = graph.get(data.id, Include::NonDeleted, TeamFields::all()).unwrap();
    moved.parents = vec![sales.entity_ref()];
    manager.update(moved).unwrap();
    assert_single_parents(&manager);

    let mut adopting = graph.get(sales.id, Include::NonDeleted, TeamFields::all()).unwrap();
    adopting.children.push(ml.entity_ref());
    manager.update(adopting).unwrap();
    assert_single_parents(&manager);
    assert_eq!(names(&graph.parents_of(ml.id).unwrap()), vec!["Sales"]);

    manager.delete(platform.id, DeleteMode::Soft).unwrap();
    assert_single_parents(&manager);

    manager.delete(sales.id, DeleteMode::Hard).unwrap();
    assert_single_parents(&manager);
    assert_eq!(names(&graph.parents_of(ml.id).unwrap()), vec!["Organization"]);
    assert_eq!(names(&graph.parents_of(data.id).unwrap()), vec!["Organization"]);
}

// ═══════════════════════════════════════════════════════════════
// Bootstrap and inheritance
// ═══════════════════════════════════════════════════════════════

#[test]
fn init_organization_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    register(&store, EntityType::Role, "DataConsumer");
    let settings = OrganizationSettings::default();

    let first = LifecycleManager::init_organization(Arc::clone(&store), &settings).unwrap();
    let second = LifecycleManager::init_organization(Arc::clone(&store), &settings).unwrap();
    assert_eq!(first.root().id(), second.root().id());
    assert_eq!(store.list_teams(Include::All).unwrap().len(), 1);

    let root = first
        .graph()
        .get(first.root().id(), Include::NonDeleted, TeamFields::all())
        .unwrap();
    assert_eq!(names(&root.default_roles), vec!["DataConsumer"]);
    assert!(root.policies.is_empty());
    assert!(root.parents.is_empty());
}

#[test]
fn roles_are_inherited_one_hop() {
    let store = Arc::new(MemoryStore::new());
    register(&store, EntityType::Role, "DataConsumer");
    let manager = LifecycleManager::init_organization(Arc::clone(&store), &OrganizationSettings::default()).unwrap();
    let steward = register(&store, EntityType::Role, "DataSteward");

    let eng = manager
        .create(Team::new("Eng", TeamKind::BusinessUnit).with_default_roles(vec![steward]))
        .unwrap();
    let platform = create(&manager, "Platform", TeamKind::Division, &[&eng]);
    let core = create(&manager, "CoreInfra", TeamKind::Group, &[&platform]);

    let fields = TeamFields {
        default_roles: true,
        ..TeamFields::none()
    };
    let graph = manager.graph();
    let eng = graph.get(eng.id, Include::NonDeleted, fields).unwrap();
    let platform = graph.get(platform.id, Include::NonDeleted, fields).unwrap();
    let core = graph.get(core.id, Include::NonDeleted, fields).unwrap();

    assert_eq!(names(&eng.inherited_roles), vec!["DataConsumer"]);
    assert_eq!(names(&platform.inherited_roles), vec!["DataSteward"]);
    assert!(core.inherited_roles.is_empty());
}

#[test]
fn soft_deleted_parent_roles_are_not_inherited() {
    let (store, manager) = setup();
    let steward = register(&store, EntityType::Role, "DataSteward");
    let dept = manager
        .create(Team::new("Dept", TeamKind::Department).with_default_roles(vec![steward]))
        .unwrap();
    let crew = create(&manager, "Crew", TeamKind::Group, &[&dept]);

    manager.delete(dept.id, DeleteMode::Soft).unwrap();
    let crew = manager
        .graph()
        .get(crew.id, Include::NonDeleted, TeamFields::all())
        .unwrap();
    assert!(crew.inherited_roles.is_empty());
    assert_eq!(names(&crew.parents), vec!["Organization"]);
}
