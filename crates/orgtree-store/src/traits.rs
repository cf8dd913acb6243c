use orgtree_model::{Edge, EntityId, EntityRef, EntityType, Include, Relationship, Team};

use crate::StoreError;

/// Durable store of directed typed edges. Every call is its own transaction.
pub trait RelationshipStore: Send + Sync {
    /// Insert an edge. Returns `false` if an identical edge already existed.
    fn add_edge(&self, edge: Edge) -> Result<bool, StoreError>;

    /// Remove an edge. Returns `false` if it was not present.
    fn remove_edge(&self, edge: &Edge) -> Result<bool, StoreError>;

    /// Remove every edge with `id` on either end, returning how many were dropped.
    fn remove_edges_of(&self, id: EntityId) -> Result<usize, StoreError>;

    /// Edges leaving `from` of the given relation, optionally restricted to
    /// one target type. Insertion order is preserved.
    fn find_targets(
        &self,
        from: EntityId,
        from_type: EntityType,
        relation: Relationship,
        to_type: Option<EntityType>,
    ) -> Result<Vec<Edge>, StoreError>;

    /// Edges arriving at `to` of the given relation from one source type.
    fn find_sources(
        &self,
        to: EntityId,
        to_type: EntityType,
        relation: Relationship,
        from_type: EntityType,
    ) -> Result<Vec<Edge>, StoreError>;

    /// Entities of `entity_type` (other than `root`) that have no incoming
    /// `ParentOf` edge, plus those with an explicit edge from `root`.
    fn list_parentless(&self, entity_type: EntityType, root: EntityId) -> Result<Vec<EntityId>, StoreError>;
}

/// Store of entity records.
pub trait EntityStore: Send + Sync {
    /// Persist a new team. Fails if the id or the name is taken.
    fn create_team(&self, team: &Team) -> Result<(), StoreError>;

    /// Replace the stored attributes of an existing team.
    fn update_team(&self, team: &Team) -> Result<(), StoreError>;

    fn find_team(&self, id: EntityId, include: Include) -> Result<Option<Team>, StoreError>;

    fn find_team_by_name(&self, name: &str, include: Include) -> Result<Option<Team>, StoreError>;

    /// All teams admitted by `include`, ordered by name.
    fn list_teams(&self, include: Include) -> Result<Vec<Team>, StoreError>;

    /// Soft delete marks the record deleted; hard delete removes it.
    fn delete_team(&self, id: EntityId, hard: bool) -> Result<(), StoreError>;

    /// Register a non-team entity (user, role, policy, domain, asset).
    fn register_entity(&self, entity: EntityRef) -> Result<(), StoreError>;

    /// Resolve any entity by id, teams included.
    fn find_entity(&self, entity_type: EntityType, id: EntityId) -> Result<Option<EntityRef>, StoreError>;

    /// Resolve any entity by name, teams included.
    fn find_entity_by_name(&self, entity_type: EntityType, name: &str) -> Result<Option<EntityRef>, StoreError>;
}
