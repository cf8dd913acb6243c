//! Domain queries over the relationship store.
//!
//! Every read of the hierarchy goes through [`HierarchyGraph`], which owns
//! the implicit-root rule: a non-root team with no stored `ParentOf` edge
//! has exactly one parent, the root, and the root's children are exactly
//! the teams with no parent edge other than one from the root. Tree views,
//! role inheritance and export all observe the same semantics because none
//! of them reimplement the fallback.

use std::collections::HashSet;
use std::sync::Arc;

use orgtree_model::{
    Edge, EntityId, EntityRef, EntityType, Include, Relationship, RootRef, Team, TeamKind,
    MAX_HIERARCHY_DEPTH,
};
use orgtree_store::{EntityStore, RelationshipStore};

use crate::inheritance::RoleInheritanceResolver;
use crate::HierarchyError;

/// Selects which derived fields are populated when a team is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeamFields {
    pub users: bool,
    pub owns: bool,
    /// Also populates `inherited_roles`.
    pub default_roles: bool,
    pub parents: bool,
    pub children: bool,
    pub policies: bool,
    pub child_count: bool,
    pub user_count: bool,
}

impl TeamFields {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            users: true,
            owns: true,
            default_roles: true,
            parents: true,
            children: true,
            policies: true,
            child_count: true,
            user_count: true,
        }
    }

    /// Parse a comma-separated field list such as `"parents,userCount"`.
    pub fn parse(list: &str) -> Result<Self, HierarchyError> {
        let mut fields = Self::none();
        for field in list.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            match field {
                "users" => fields.users = true,
                "owns" => fields.owns = true,
                "defaultRoles" => fields.default_roles = true,
                "parents" => fields.parents = true,
                "children" => fields.children = true,
                "policies" => fields.policies = true,
                "childrenCount" => fields.child_count = true,
                "userCount" => fields.user_count = true,
                other => return Err(HierarchyError::UnknownField(other.to_string())),
            }
        }
        Ok(fields)
    }
}

/// Restricts a team listing.
#[derive(Debug, Clone, Default)]
pub struct TeamFilter {
    pub include: Include,
    pub kind: Option<TeamKind>,
    /// Only direct children of the named team.
    pub parent_team: Option<String>,
}

impl TeamFilter {
    pub fn children_of(parent: impl Into<String>) -> Self {
        Self {
            parent_team: Some(parent.into()),
            ..Self::default()
        }
    }
}

/// Read-side accessor for the team hierarchy.
pub struct HierarchyGraph<S> {
    store: Arc<S>,
    root: RootRef,
    max_depth: usize,
}

impl<S> Clone for HierarchyGraph<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            root: self.root.clone(),
            max_depth: self.max_depth,
        }
    }
}

impl<S: RelationshipStore + EntityStore> HierarchyGraph<S> {
    pub fn new(store: Arc<S>, root: RootRef) -> Self {
        Self {
            store,
            root,
            max_depth: MAX_HIERARCHY_DEPTH,
        }
    }

    /// Override the recursion guard for subtree walks.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn root(&self) -> &RootRef {
        &self.root
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Resolve an id found on an edge. An id that does not exist even as a
    /// deleted record is a consistency fault.
    fn resolve(&self, entity_type: EntityType, id: EntityId) -> Result<EntityRef, HierarchyError> {
        self.store
            .find_entity(entity_type, id)?
            .ok_or(HierarchyError::DanglingReference { entity_type, id })
    }

    fn resolve_all<I>(&self, entity_type: EntityType, ids: I) -> Result<Vec<EntityRef>, HierarchyError>
    where
        I: IntoIterator<Item = EntityId>,
    {
        ids.into_iter().map(|id| self.resolve(entity_type, id)).collect()
    }

    fn targets(&self, id: EntityId, relation: Relationship, to_type: Option<EntityType>) -> Result<Vec<Edge>, HierarchyError> {
        Ok(self.store.find_targets(id, EntityType::Team, relation, to_type)?)
    }

    /// Teams stored as parents of `id`, without the implicit-root fallback.
    pub fn stored_parents_of(&self, id: EntityId) -> Result<Vec<EntityRef>, HierarchyError> {
        let edges = self
            .store
            .find_sources(id, EntityType::Team, Relationship::ParentOf, EntityType::Team)?;
        self.resolve_all(EntityType::Team, edges.into_iter().map(|e| e.from))
    }

    /// Parents of `id`. Never empty for a non-root team: with no stored
    /// parent edge, the root is the parent.
    pub fn parents_of(&self, id: EntityId) -> Result<Vec<EntityRef>, HierarchyError> {
        let parents = self.stored_parents_of(id)?;
        Ok(self.with_root_fallback(id, parents))
    }

    /// Like [`parents_of`](Self::parents_of) but ignoring soft-deleted
    /// parents, falling back to the root when none remain.
    pub fn active_parents_of(&self, id: EntityId) -> Result<Vec<EntityRef>, HierarchyError> {
        let parents = self
            .stored_parents_of(id)?
            .into_iter()
            .filter(|p| !p.deleted)
            .collect();
        Ok(self.with_root_fallback(id, parents))
    }

    fn with_root_fallback(&self, id: EntityId, parents: Vec<EntityRef>) -> Vec<EntityRef> {
        if parents.is_empty() && !self.root.is_root(id) {
            vec![self.root.entity_ref()]
        } else {
            parents
        }
    }

    /// Children of `id`. For the root these are the parentless teams.
    pub fn children_of(&self, id: EntityId) -> Result<Vec<EntityRef>, HierarchyError> {
        if self.root.is_root(id) {
            let ids = self.store.list_parentless(EntityType::Team, id)?;
            return self.resolve_all(EntityType::Team, ids);
        }
        let edges = self.targets(id, Relationship::ParentOf, Some(EntityType::Team))?;
        self.resolve_all(EntityType::Team, edges.into_iter().map(|e| e.to))
    }

    /// Child count, reusing `team.children` when it is already populated.
    pub fn child_count(&self, team: &Team) -> Result<usize, HierarchyError> {
        if !team.children.is_empty() {
            return Ok(team.children.len());
        }
        Ok(self.children_of(team.id)?.len())
    }

    pub fn users_of(&self, id: EntityId) -> Result<Vec<EntityRef>, HierarchyError> {
        let edges = self.targets(id, Relationship::Has, Some(EntityType::User))?;
        self.resolve_all(EntityType::User, edges.into_iter().map(|e| e.to))
    }

    pub fn default_roles_of(&self, id: EntityId) -> Result<Vec<EntityRef>, HierarchyError> {
        let edges = self.targets(id, Relationship::Has, Some(EntityType::Role))?;
        self.resolve_all(EntityType::Role, edges.into_iter().map(|e| e.to))
    }

    pub fn policies_of(&self, id: EntityId) -> Result<Vec<EntityRef>, HierarchyError> {
        let edges = self.targets(id, Relationship::Has, Some(EntityType::Policy))?;
        self.resolve_all(EntityType::Policy, edges.into_iter().map(|e| e.to))
    }

    /// Everything the team owns, of any type.
    pub fn owns_of(&self, id: EntityId) -> Result<Vec<EntityRef>, HierarchyError> {
        self.targets(id, Relationship::Owns, None)?
            .into_iter()
            .map(|e| self.resolve(e.to_type, e.to))
            .collect()
    }

    /// The principal owning `id`, if any.
    pub fn owner_of(&self, id: EntityId) -> Result<Option<EntityRef>, HierarchyError> {
        for from_type in [EntityType::User, EntityType::Team] {
            let edges = self
                .store
                .find_sources(id, EntityType::Team, Relationship::Owns, from_type)?;
            if let Some(edge) = edges.first() {
                return self.resolve(from_type, edge.from).map(Some);
            }
        }
        Ok(None)
    }

    /// Distinct users directly associated with `id` or any active team below it.
    pub fn user_count(&self, id: EntityId) -> Result<usize, HierarchyError> {
        let mut users = HashSet::new();
        self.collect_users(id, 0, &mut users)?;
        Ok(users.len())
    }

    fn collect_users(
        &self,
        id: EntityId,
        depth: usize,
        users: &mut HashSet<EntityId>,
    ) -> Result<(), HierarchyError> {
        if depth > self.max_depth {
            return Err(HierarchyError::MaxDepthExceeded(self.max_depth));
        }
        for edge in self.targets(id, Relationship::Has, Some(EntityType::User))? {
            users.insert(edge.to);
        }
        for child in self.children_of(id)? {
            if !child.deleted {
                self.collect_users(child.id, depth + 1, users)?;
            }
        }
        Ok(())
    }

    /// Whether `team` is `ancestor` itself or sits somewhere below it.
    pub fn is_in_team(&self, ancestor: &str, team: &EntityRef) -> Result<bool, HierarchyError> {
        if team.name == ancestor || ancestor == self.root.name() {
            return Ok(true);
        }
        let mut frontier = vec![team.id];
        let mut seen = HashSet::new();
        for _ in 0..=self.max_depth {
            let mut next = Vec::new();
            for id in frontier {
                for parent in self.parents_of(id)? {
                    if parent.name == ancestor {
                        return Ok(true);
                    }
                    if seen.insert(parent.id) {
                        next.push(parent.id);
                    }
                }
            }
            if next.is_empty() {
                return Ok(false);
            }
            frontier = next;
        }
        Err(HierarchyError::MaxDepthExceeded(self.max_depth))
    }

    /// Load the teams behind `refs`.
    ///
    /// A reference to a soft-deleted team is tolerated and skipped, since
    /// edges are not cleaned up when a team is soft-deleted. A reference that
    /// does not resolve at all is a [`HierarchyError::DanglingReference`].
    pub fn resolve_teams(&self, refs: &[EntityRef]) -> Result<Vec<Team>, HierarchyError> {
        let mut teams = Vec::with_capacity(refs.len());
        for reference in refs {
            if let Some(team) = self.store.find_team(reference.id, Include::NonDeleted)? {
                teams.push(team);
            } else if self.store.find_team(reference.id, Include::Deleted)?.is_some() {
                tracing::debug!(
                    team = %reference.name,
                    id = %reference.id,
                    "Skipping reference to soft-deleted team"
                );
            } else {
                return Err(HierarchyError::DanglingReference {
                    entity_type: EntityType::Team,
                    id: reference.id,
                });
            }
        }
        Ok(teams)
    }

    /// Load a team by id with the selected fields populated.
    pub fn get(&self, id: EntityId, include: Include, fields: TeamFields) -> Result<Team, HierarchyError> {
        let mut team = self
            .store
            .find_team(id, include)?
            .ok_or_else(|| HierarchyError::TeamNotFound(id.to_string()))?;
        self.set_fields(&mut team, fields)?;
        Ok(team)
    }

    /// Load a team by name with the selected fields populated.
    pub fn get_by_name(&self, name: &str, include: Include, fields: TeamFields) -> Result<Team, HierarchyError> {
        let mut team = self
            .store
            .find_team_by_name(name, include)?
            .ok_or_else(|| HierarchyError::TeamNotFound(name.to_string()))?;
        self.set_fields(&mut team, fields)?;
        Ok(team)
    }

    /// List up to `limit` teams matching `filter`, ordered by name.
    pub fn list(&self, filter: &TeamFilter, limit: usize, fields: TeamFields) -> Result<Vec<Team>, HierarchyError> {
        let mut teams = match &filter.parent_team {
            Some(parent) => {
                let parent = self.get_by_name(parent, Include::All, TeamFields::none())?;
                let mut teams = Vec::new();
                for child in self.children_of(parent.id)? {
                    if let Some(team) = self.store.find_team(child.id, filter.include)? {
                        teams.push(team);
                    }
                }
                teams.sort_by(|a, b| a.name.cmp(&b.name));
                teams
            }
            None => self.store.list_teams(filter.include)?,
        };
        teams.retain(|t| filter.kind.map_or(true, |k| t.kind == k));
        teams.truncate(limit);
        for team in &mut teams {
            self.set_fields(team, fields)?;
        }
        Ok(teams)
    }

    /// Populate the selected derived fields of `team` from the store.
    pub fn set_fields(&self, team: &mut Team, fields: TeamFields) -> Result<(), HierarchyError> {
        if fields.users {
            team.users = self.users_of(team.id)?;
        }
        if fields.owns {
            team.owns = self.owns_of(team.id)?;
        }
        if fields.parents {
            team.parents = self.parents_of(team.id)?;
        }
        if fields.children {
            team.children = self.children_of(team.id)?;
        }
        if fields.policies {
            team.policies = self.policies_of(team.id)?;
        }
        if fields.default_roles {
            team.default_roles = self.default_roles_of(team.id)?;
            team.inherited_roles = RoleInheritanceResolver::new(self).inherited_roles(team.id)?;
        }
        team.owner = self.owner_of(team.id)?;
        if fields.child_count {
            team.child_count = Some(self.child_count(team)?);
        }
        if fields.user_count {
            team.user_count = Some(self.user_count(team.id)?);
        }
        Ok(())
    }

    /// Drop every derived field that `fields` does not select.
    pub fn clear_fields(team: &mut Team, fields: TeamFields) {
        if !fields.users {
            team.users.clear();
        }
        if !fields.owns {
            team.owns.clear();
        }
        if !fields.default_roles {
            team.default_roles.clear();
            team.inherited_roles.clear();
        }
        if !fields.parents {
            team.parents.clear();
        }
        if !fields.children {
            team.children.clear();
        }
        if !fields.policies {
            team.policies.clear();
        }
        if !fields.child_count {
            team.child_count = None;
        }
        if !fields.user_count {
            team.user_count = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fields() {
        let fields = TeamFields::parse("parents, userCount").unwrap();
        assert!(fields.parents && fields.user_count);
        assert!(!fields.users);
        assert!(matches!(
            TeamFields::parse("parents,bogus"),
            Err(HierarchyError::UnknownField(f)) if f == "bogus"
        ));
    }

    #[test]
    fn test_clear_fields_keeps_selected() {
        let mut team = Team::new("Eng", TeamKind::BusinessUnit);
        team.parents = vec![EntityRef::new(EntityId::generate(), EntityType::Team, "Organization")];
        team.user_count = Some(4);
        let fields = TeamFields {
            parents: true,
            ..TeamFields::none()
        };
        HierarchyGraph::<orgtree_store::MemoryStore>::clear_fields(&mut team, fields);
        assert_eq!(team.parents.len(), 1);
        assert!(team.user_count.is_none());
    }
}
