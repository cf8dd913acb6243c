//! Attributes a team inherits from its parents.
//!
//! Inheritance is one hop: roles come from the immediate non-deleted
//! parents only (the root when there are none), and a team without a
//! domain takes the domain of its first parent.

use std::collections::HashSet;

use orgtree_model::{EntityId, EntityRef, Include, Team};
use orgtree_store::{EntityStore, RelationshipStore};

use crate::graph::HierarchyGraph;
use crate::HierarchyError;

/// Collects the roles attached to a set of teams.
pub trait RoleAggregator {
    fn roles_for_teams(&self, teams: &[EntityRef]) -> Result<Vec<EntityRef>, HierarchyError>;
}

/// Union of the default roles stored directly on each team, first-seen order.
impl<S: RelationshipStore + EntityStore> RoleAggregator for HierarchyGraph<S> {
    fn roles_for_teams(&self, teams: &[EntityRef]) -> Result<Vec<EntityRef>, HierarchyError> {
        let mut seen = HashSet::new();
        let mut roles = Vec::new();
        for team in teams {
            for role in self.default_roles_of(team.id)? {
                if seen.insert(role.id) {
                    roles.push(role);
                }
            }
        }
        Ok(roles)
    }
}

pub struct RoleInheritanceResolver<'a, S> {
    graph: &'a HierarchyGraph<S>,
    aggregator: &'a dyn RoleAggregator,
}

impl<'a, S: RelationshipStore + EntityStore> RoleInheritanceResolver<'a, S> {
    /// Resolver that aggregates roles straight from the graph.
    pub fn new(graph: &'a HierarchyGraph<S>) -> Self {
        Self {
            graph,
            aggregator: graph,
        }
    }

    pub fn with_aggregator(graph: &'a HierarchyGraph<S>, aggregator: &'a dyn RoleAggregator) -> Self {
        Self { graph, aggregator }
    }

    /// Roles inherited from the immediate, non-deleted parents of `id`.
    pub fn inherited_roles(&self, id: EntityId) -> Result<Vec<EntityRef>, HierarchyError> {
        let parents = self.graph.active_parents_of(id)?;
        self.aggregator.roles_for_teams(&parents)
    }

    /// Fill `inherited_roles`, and `domain` when the team has none.
    pub fn inherit_fields(&self, team: &mut Team) -> Result<(), HierarchyError> {
        team.inherited_roles = self.inherited_roles(team.id)?;
        if team.domain.is_none() {
            if let Some(parent) = self.graph.parents_of(team.id)?.first() {
                team.domain = self
                    .graph
                    .store()
                    .find_team(parent.id, Include::All)?
                    .and_then(|p| p.domain);
            }
        }
        Ok(())
    }
}
