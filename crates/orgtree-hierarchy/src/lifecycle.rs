//! Create, update and delete of teams.
//!
//! Every mutation validates the full structural picture before anything
//! is persisted: parents (with the root fallback), children, and the
//! associative references. Relationships are synchronized only after the
//! attributes are stored. A delete is refused for the root and repairs
//! orphans afterwards, so no team is ever left without a reachable parent.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use orgtree_model::{
    Edge, EntityId, EntityRef, EntityType, Include, Relationship, RootRef, Team, TeamKind,
    ADMIN_USER_NAME, DEFAULT_ORGANIZATION_DESCRIPTION, DEFAULT_ORGANIZATION_POLICY,
    DEFAULT_ORGANIZATION_ROLE, MAX_HIERARCHY_DEPTH, ORGANIZATION_NAME,
};
use orgtree_store::{EntityStore, RelationshipStore};

use crate::graph::{HierarchyGraph, TeamFields};
use crate::validator::HierarchyValidator;
use crate::HierarchyError;

/// Teams validated but not yet committed, keyed by name.
///
/// Dry-run imports stage teams here so later records can name them as
/// parents before they exist in the store.
pub type StagedTeams = HashMap<String, Team>;

/// How the root team is bootstrapped.
#[derive(Debug, Clone)]
pub struct OrganizationSettings {
    pub name: String,
    pub description: String,
    /// Role names attached to the root when it is first created.
    pub default_roles: Vec<String>,
    /// Policy names attached to the root when it is first created.
    pub default_policies: Vec<String>,
    pub updated_by: String,
    /// Recursion guard for subtree walks.
    pub max_depth: usize,
}

impl Default for OrganizationSettings {
    fn default() -> Self {
        Self {
            name: ORGANIZATION_NAME.to_string(),
            description: DEFAULT_ORGANIZATION_DESCRIPTION.to_string(),
            default_roles: vec![DEFAULT_ORGANIZATION_ROLE.to_string()],
            default_policies: vec![DEFAULT_ORGANIZATION_POLICY.to_string()],
            updated_by: ADMIN_USER_NAME.to_string(),
            max_depth: MAX_HIERARCHY_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteMode {
    /// Mark the record deleted; its edges stay in place.
    Soft,
    /// Remove the record and every edge touching it.
    Hard,
}

/// Fields that changed in an update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSummary {
    pub fields_added: Vec<String>,
    pub fields_updated: Vec<String>,
    pub fields_deleted: Vec<String>,
}

impl ChangeSummary {
    pub fn is_empty(&self) -> bool {
        self.fields_added.is_empty() && self.fields_updated.is_empty() && self.fields_deleted.is_empty()
    }

    fn record<T: PartialEq>(&mut self, field: &str, old: Option<T>, new: Option<T>) {
        match (old, new) {
            (None, Some(_)) => self.fields_added.push(field.to_string()),
            (Some(_), None) => self.fields_deleted.push(field.to_string()),
            (Some(a), Some(b)) if a != b => self.fields_updated.push(field.to_string()),
            _ => {}
        }
    }

    fn record_refs(&mut self, field: &str, old: &[EntityRef], new: &[EntityRef]) {
        let ids = |refs: &[EntityRef]| -> Option<HashSet<EntityId>> {
            (!refs.is_empty()).then(|| refs.iter().map(|r| r.id).collect())
        };
        self.record(field, ids(old), ids(new));
    }

    fn between(original: &Team, updated: &Team) -> Self {
        let mut summary = Self::default();
        summary.record("displayName", original.display_name.as_ref(), updated.display_name.as_ref());
        summary.record("description", original.description.as_ref(), updated.description.as_ref());
        summary.record("teamType", Some(original.kind), Some(updated.kind));
        summary.record("isJoinable", Some(original.is_joinable), Some(updated.is_joinable));
        summary.record("email", original.email.as_ref(), updated.email.as_ref());
        summary.record("profile", original.profile.as_ref(), updated.profile.as_ref());
        summary.record("domain", original.domain.as_ref().map(|d| d.id), updated.domain.as_ref().map(|d| d.id));
        summary.record("owner", original.owner.as_ref().map(|o| o.id), updated.owner.as_ref().map(|o| o.id));
        summary.record_refs("users", &original.users, &updated.users);
        summary.record_refs("defaultRoles", &original.default_roles, &updated.default_roles);
        summary.record_refs("parents", &original.parents, &updated.parents);
        summary.record_refs("children", &original.children, &updated.children);
        summary.record_refs("policies", &original.policies, &updated.policies);
        summary
    }
}

/// Orchestrates validation, persistence and structural repair of teams.
pub struct LifecycleManager<S> {
    graph: HierarchyGraph<S>,
    validator: HierarchyValidator,
}

impl<S: RelationshipStore + EntityStore> LifecycleManager<S> {
    pub fn new(graph: HierarchyGraph<S>) -> Self {
        Self {
            graph,
            validator: HierarchyValidator::new(),
        }
    }

    /// Load the root team, creating it on first start.
    ///
    /// Default roles and policies that do not resolve by name are skipped
    /// with a warning rather than failing the bootstrap.
    pub fn init_organization(store: Arc<S>, settings: &OrganizationSettings) -> Result<Self, HierarchyError> {
        if let Some(existing) = store.find_team_by_name(&settings.name, Include::All)? {
            tracing::info!(organization = %existing.name, id = %existing.id, "Organization is already initialized");
            let graph = HierarchyGraph::new(store, RootRef::new(existing.entity_ref()))
                .with_max_depth(settings.max_depth);
            return Ok(Self::new(graph));
        }

        tracing::debug!(organization = %settings.name, "Organization is not initialized");
        let mut team = Team::new(settings.name.clone(), TeamKind::Organization);
        team.display_name = Some(settings.name.clone());
        team.description = Some(settings.description.clone());
        team.updated_by = settings.updated_by.clone();
        team.default_roles = resolve_names(store.as_ref(), EntityType::Role, &settings.default_roles)?;
        team.policies = resolve_names(store.as_ref(), EntityType::Policy, &settings.default_policies)?;

        let graph = HierarchyGraph::new(store, RootRef::new(team.entity_ref())).with_max_depth(settings.max_depth);
        let manager = Self::new(graph);
        manager.graph.store().create_team(&team)?;
        manager.store_relationships(&team)?;
        tracing::info!(organization = %team.name, id = %team.id, "Organization is successfully initialized");
        Ok(manager)
    }

    pub fn graph(&self) -> &HierarchyGraph<S> {
        &self.graph
    }

    pub fn root(&self) -> &RootRef {
        self.graph.root()
    }

    /// Validate `team` against the stored hierarchy, filling in the root as
    /// parent when none is given.
    pub fn prepare(&self, team: &mut Team) -> Result<(), HierarchyError> {
        self.prepare_staged(team, &StagedTeams::new())
    }

    /// Like [`prepare`](Self::prepare), resolving references to staged
    /// teams by name before consulting the store.
    pub fn prepare_staged(&self, team: &mut Team, staged: &StagedTeams) -> Result<(), HierarchyError> {
        if team.kind == TeamKind::Organization && !self.root().is_root(team.id) {
            return Err(HierarchyError::DuplicateOrganization(team.name.clone()));
        }
        self.populate_parents(team, staged)?;
        self.populate_children(team, staged)?;
        self.validate_references(team)
    }

    fn populate_parents(&self, team: &mut Team, staged: &StagedTeams) -> Result<(), HierarchyError> {
        if self.root().is_root(team.id) {
            if !team.parents.is_empty() {
                return Err(HierarchyError::UnexpectedParent(team.name.clone()));
            }
            return Ok(());
        }
        if team.parents.is_empty() {
            team.parents = vec![self.root().entity_ref()];
            return Ok(());
        }

        let parents = self.resolve_staged(&team.parents, staged)?;
        self.validator.validate_parents(team, &parents)?;
        for parent in &parents {
            let below = parent.id == team.id || self.graph.is_in_team(&team.name, &parent.entity_ref())?;
            if below && !self.root().is_root(parent.id) {
                return Err(HierarchyError::CyclicParent {
                    team: team.name.clone(),
                    parent: parent.name.clone(),
                });
            }
        }
        team.parents = parents.iter().map(Team::entity_ref).collect();
        Ok(())
    }

    fn populate_children(&self, team: &mut Team, staged: &StagedTeams) -> Result<(), HierarchyError> {
        if team.children.is_empty() {
            return Ok(());
        }
        let children = self.resolve_staged(&team.children, staged)?;
        self.validator.validate_children(team, &children)?;
        for child in &children {
            if self.lies_under(team, child)? {
                return Err(HierarchyError::CyclicParent {
                    team: child.name.clone(),
                    parent: team.name.clone(),
                });
            }
        }
        team.children = children.iter().map(Team::entity_ref).collect();
        Ok(())
    }

    /// Whether `team`, through its already populated parents, sits inside
    /// the subtree of `ancestor`.
    fn lies_under(&self, team: &Team, ancestor: &Team) -> Result<bool, HierarchyError> {
        if team.id == ancestor.id {
            return Ok(true);
        }
        for parent in &team.parents {
            if parent.id == ancestor.id || self.graph.is_in_team(&ancestor.name, parent)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Make `parent` the only stored parent of `child`, dropping any edge
    /// from a previous parent.
    fn adopt(&self, parent: EntityId, child: &EntityRef) -> Result<(), HierarchyError> {
        let store = self.graph.store();
        for previous in self.graph.stored_parents_of(child.id)? {
            if previous.id != parent {
                store.remove_edge(&Edge::parent_of(previous.id, child.id))?;
                tracing::debug!(team = %child.name, from = %previous.name, "Detached team from previous parent");
            }
        }
        store.add_edge(Edge::parent_of(parent, child.id))?;
        Ok(())
    }

    fn resolve_staged(&self, refs: &[EntityRef], staged: &StagedTeams) -> Result<Vec<Team>, HierarchyError> {
        let mut teams = Vec::with_capacity(refs.len());
        for reference in refs {
            match staged.get(&reference.name) {
                Some(team) => teams.push(team.clone()),
                None => teams.extend(self.graph.resolve_teams(std::slice::from_ref(reference))?),
            }
        }
        Ok(teams)
    }

    fn validate_references(&self, team: &Team) -> Result<(), HierarchyError> {
        let store = self.graph.store();
        let typed = [
            (EntityType::User, &team.users),
            (EntityType::Role, &team.default_roles),
            (EntityType::Policy, &team.policies),
        ];
        let singles = team.owner.iter().chain(team.domain.iter());
        let all = typed
            .iter()
            .flat_map(|(entity_type, refs)| refs.iter().map(move |r| (*entity_type, r)))
            .chain(singles.map(|r| (r.entity_type, r)));

        for (entity_type, reference) in all {
            if store.find_entity(entity_type, reference.id)?.is_none() {
                return Err(HierarchyError::EntityNotFound {
                    entity_type,
                    name: reference.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Write the edges implied by the team's reference lists.
    ///
    /// A parent edge to the root is never materialized: with no stored
    /// parent the root is already the parent on read. A listed child is
    /// moved here from whatever parent it had.
    pub fn store_relationships(&self, team: &Team) -> Result<(), HierarchyError> {
        let store = self.graph.store();
        let has = |to: &EntityRef, to_type| Edge::new(team.id, to.id, EntityType::Team, to_type, Relationship::Has);

        for user in &team.users {
            store.add_edge(has(user, EntityType::User))?;
        }
        for role in &team.default_roles {
            store.add_edge(has(role, EntityType::Role))?;
        }
        for parent in team.parents.iter().filter(|p| !self.root().is_root(p.id)) {
            store.add_edge(Edge::parent_of(parent.id, team.id))?;
        }
        for child in &team.children {
            self.adopt(team.id, child)?;
        }
        for policy in &team.policies {
            store.add_edge(has(policy, EntityType::Policy))?;
        }
        if let Some(owner) = &team.owner {
            store.add_edge(owner_edge(owner, team.id))?;
        }
        Ok(())
    }

    /// Validate and persist a new team.
    pub fn create(&self, mut team: Team) -> Result<Team, HierarchyError> {
        if self.graph.store().find_team_by_name(&team.name, Include::All)?.is_some() {
            return Err(HierarchyError::DuplicateName(team.name));
        }
        team.updated_at = Utc::now();
        self.prepare(&mut team)?;
        self.graph.store().create_team(&team)?;
        self.store_relationships(&team)?;
        tracing::info!(team = %team.name, kind = %team.kind, "Created team");
        Ok(team)
    }

    /// Validate an update of `original` to `updated` without persisting it.
    ///
    /// Restores the immutable attributes of `updated` and applies the Group
    /// kind-change rules before the regular prepare.
    pub fn check_update(
        &self,
        original: &Team,
        updated: &mut Team,
        staged: &StagedTeams,
    ) -> Result<(), HierarchyError> {
        updated.id = original.id;
        updated.name = original.name.clone();
        updated.inherited_roles = original.inherited_roles.clone();
        if self.root().is_root(original.id) && updated.kind != original.kind {
            return Err(HierarchyError::RootKindChange(original.name.clone()));
        }
        self.validator
            .validate_kind_change(original, updated.kind, !original.children.is_empty())?;
        if updated.email.as_deref().is_some_and(|e| e.trim().is_empty()) {
            updated.email = None;
        }
        updated.updated_at = Utc::now();
        self.prepare_staged(updated, staged)
    }

    /// Validate and persist an update, then sync each relation list by diff.
    pub fn update(&self, mut updated: Team) -> Result<(Team, ChangeSummary), HierarchyError> {
        let original = self.graph.get(updated.id, Include::NonDeleted, TeamFields::all())?;
        self.check_update(&original, &mut updated, &StagedTeams::new())?;
        self.graph.store().update_team(&updated)?;

        let id = original.id;
        let root = self.root().clone();
        let has = |to_type| move |r: &EntityRef| Edge::new(id, r.id, EntityType::Team, to_type, Relationship::Has);
        self.sync_edges(&original.users, &updated.users, has(EntityType::User), |_| true)?;
        self.sync_edges(&original.default_roles, &updated.default_roles, has(EntityType::Role), |_| true)?;
        self.sync_edges(
            &original.parents,
            &updated.parents,
            |p| Edge::parent_of(p.id, id),
            |p| !root.is_root(p.id),
        )?;
        self.sync_edges(&original.children, &updated.children, |c| Edge::parent_of(id, c.id), |_| false)?;
        let old_children: HashSet<EntityId> = original.children.iter().map(|c| c.id).collect();
        for child in updated.children.iter().filter(|c| !old_children.contains(&c.id)) {
            self.adopt(id, child)?;
        }
        self.sync_edges(&original.policies, &updated.policies, has(EntityType::Policy), |_| true)?;
        let owners = |t: &Team| t.owner.iter().cloned().collect::<Vec<_>>();
        self.sync_edges(&owners(&original), &owners(&updated), |o| owner_edge(o, id), |_| true)?;

        let summary = ChangeSummary::between(&original, &updated);
        tracing::info!(
            team = %original.name,
            updated = ?summary.fields_updated,
            added = ?summary.fields_added,
            deleted = ?summary.fields_deleted,
            "Updated team"
        );
        let team = self.graph.get(id, Include::NonDeleted, TeamFields::all())?;
        Ok((team, summary))
    }

    fn sync_edges<F, M>(
        &self,
        old: &[EntityRef],
        new: &[EntityRef],
        edge: F,
        materialize: M,
    ) -> Result<(), HierarchyError>
    where
        F: Fn(&EntityRef) -> Edge,
        M: Fn(&EntityRef) -> bool,
    {
        let store = self.graph.store();
        let old_ids: HashSet<EntityId> = old.iter().map(|r| r.id).collect();
        let new_ids: HashSet<EntityId> = new.iter().map(|r| r.id).collect();
        for removed in old.iter().filter(|r| !new_ids.contains(&r.id)) {
            store.remove_edge(&edge(removed))?;
        }
        for added in new.iter().filter(|r| !old_ids.contains(&r.id) && materialize(r)) {
            store.add_edge(edge(added))?;
        }
        Ok(())
    }

    /// Refuse to delete the root.
    pub fn pre_delete(&self, team: &Team) -> Result<(), HierarchyError> {
        if self.root().is_root(team.id) {
            return Err(HierarchyError::DeleteRootRejected(team.name.clone()));
        }
        Ok(())
    }

    /// Delete a team and reparent the children it leaves without a parent.
    ///
    /// If the repair fails the team is restored and the error returned: a
    /// failed delete is preferable to an orphaned subtree.
    pub fn delete(&self, id: EntityId, mode: DeleteMode) -> Result<Team, HierarchyError> {
        let fields = TeamFields {
            children: true,
            ..TeamFields::none()
        };
        let team = self.graph.get(id, Include::NonDeleted, fields)?;
        self.pre_delete(&team)?;

        let store = self.graph.store();
        store.delete_team(id, false)?;
        let repaired = match self.cleanup(&team) {
            Ok(repaired) => repaired,
            Err(e) => {
                tracing::error!(team = %team.name, error = %e, "Orphan repair failed, restoring team");
                store.update_team(&team)?;
                return Err(e);
            }
        };
        if mode == DeleteMode::Hard {
            store.remove_edges_of(id)?;
            store.delete_team(id, true)?;
        }

        tracing::info!(team = %team.name, mode = ?mode, repaired, "Deleted team");
        Ok(team)
    }

    /// Detach the children of a deleted `team` and attach to the root every
    /// child whose only parent it was. Returns the number of children moved.
    ///
    /// The edge from `team` is removed before the root edge is added, so a
    /// failure in between leaves the child under the root by fallback.
    pub fn cleanup(&self, team: &Team) -> Result<usize, HierarchyError> {
        let store = self.graph.store();
        let mut repaired = 0;
        for child in &team.children {
            let parents = self.graph.parents_of(child.id)?;
            store.remove_edge(&Edge::parent_of(team.id, child.id))?;
            if parents.len() == 1 && parents[0].id == team.id {
                store.add_edge(Edge::parent_of(self.root().id(), child.id))?;
                tracing::info!(team = %child.name, from = %team.name, "Moving parent of team to organization");
                repaired += 1;
            }
        }
        Ok(repaired)
    }
}

fn owner_edge(owner: &EntityRef, team: EntityId) -> Edge {
    Edge::new(owner.id, team, owner.entity_type, EntityType::Team, Relationship::Owns)
}

fn resolve_names<S: EntityStore>(
    store: &S,
    entity_type: EntityType,
    names: &[String],
) -> Result<Vec<EntityRef>, HierarchyError> {
    let mut refs = Vec::with_capacity(names.len());
    for name in names {
        match store.find_entity_by_name(entity_type, name)? {
            Some(reference) => refs.push(reference),
            None => tracing::warn!(%entity_type, %name, "Default reference not found, skipping"),
        }
    }
    Ok(refs)
}
