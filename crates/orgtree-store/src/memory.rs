//! In-process backend for both store traits.
//!
//! Teams, other entities and edges live behind a single `RwLock`, so every
//! trait call observes and produces a consistent snapshot. Edges keep their
//! insertion order, which makes parent lists deterministic.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use orgtree_model::{Edge, EntityId, EntityRef, EntityType, Include, Relationship, Team};

use crate::traits::{EntityStore, RelationshipStore};
use crate::StoreError;

#[derive(Default)]
struct MemoryState {
    teams: HashMap<EntityId, Team>,
    entities: HashMap<EntityId, EntityRef>,
    edges: Vec<Edge>,
}

/// In-memory relationship and entity store.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, StoreError> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, StoreError> {
        self.state.write().map_err(|_| StoreError::Poisoned)
    }

    /// Total number of stored edges.
    pub fn edge_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.edges.len())
    }

    /// Snapshot of every stored edge, in insertion order.
    pub fn edges(&self) -> Result<Vec<Edge>, StoreError> {
        Ok(self.read()?.edges.clone())
    }
}

impl RelationshipStore for MemoryStore {
    fn add_edge(&self, edge: Edge) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        if state.edges.contains(&edge) {
            return Ok(false);
        }
        state.edges.push(edge);
        Ok(true)
    }

    fn remove_edge(&self, edge: &Edge) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        let before = state.edges.len();
        state.edges.retain(|e| e != edge);
        Ok(state.edges.len() != before)
    }

    fn remove_edges_of(&self, id: EntityId) -> Result<usize, StoreError> {
        let mut state = self.write()?;
        let before = state.edges.len();
        state.edges.retain(|e| !e.touches(id));
        Ok(before - state.edges.len())
    }

    fn find_targets(
        &self,
        from: EntityId,
        from_type: EntityType,
        relation: Relationship,
        to_type: Option<EntityType>,
    ) -> Result<Vec<Edge>, StoreError> {
        let state = self.read()?;
        Ok(state
            .edges
            .iter()
            .filter(|e| {
                e.from == from
                    && e.from_type == from_type
                    && e.relation == relation
                    && to_type.map_or(true, |t| e.to_type == t)
            })
            .copied()
            .collect())
    }

    fn find_sources(
        &self,
        to: EntityId,
        to_type: EntityType,
        relation: Relationship,
        from_type: EntityType,
    ) -> Result<Vec<Edge>, StoreError> {
        let state = self.read()?;
        Ok(state
            .edges
            .iter()
            .filter(|e| {
                e.to == to && e.to_type == to_type && e.relation == relation && e.from_type == from_type
            })
            .copied()
            .collect())
    }

    fn list_parentless(&self, entity_type: EntityType, root: EntityId) -> Result<Vec<EntityId>, StoreError> {
        let state = self.read()?;
        let mut with_parent = HashSet::new();
        let mut under_root = HashSet::new();
        for edge in state.edges.iter().filter(|e| {
            e.relation == Relationship::ParentOf && e.from_type == entity_type && e.to_type == entity_type
        }) {
            if edge.from == root {
                under_root.insert(edge.to);
            } else {
                with_parent.insert(edge.to);
            }
        }

        let mut ids: Vec<&Team> = match entity_type {
            EntityType::Team => state
                .teams
                .values()
                .filter(|t| t.id != root)
                .filter(|t| !with_parent.contains(&t.id) || under_root.contains(&t.id))
                .collect(),
            _ => Vec::new(),
        };
        ids.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(ids.into_iter().map(|t| t.id).collect())
    }
}

impl EntityStore for MemoryStore {
    fn create_team(&self, team: &Team) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.teams.contains_key(&team.id) || state.teams.values().any(|t| t.name == team.name) {
            return Err(StoreError::AlreadyExists {
                entity_type: EntityType::Team,
                name: team.name.clone(),
            });
        }
        state.teams.insert(team.id, team.stored_form());
        Ok(())
    }

    fn update_team(&self, team: &Team) -> Result<(), StoreError> {
        let mut state = self.write()?;
        match state.teams.get_mut(&team.id) {
            Some(stored) => {
                *stored = team.stored_form();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity_type: EntityType::Team,
                id: team.id,
            }),
        }
    }

    fn find_team(&self, id: EntityId, include: Include) -> Result<Option<Team>, StoreError> {
        let state = self.read()?;
        Ok(state
            .teams
            .get(&id)
            .filter(|t| include.admits(t.deleted))
            .cloned())
    }

    fn find_team_by_name(&self, name: &str, include: Include) -> Result<Option<Team>, StoreError> {
        let state = self.read()?;
        Ok(state
            .teams
            .values()
            .find(|t| t.name == name && include.admits(t.deleted))
            .cloned())
    }

    fn list_teams(&self, include: Include) -> Result<Vec<Team>, StoreError> {
        let state = self.read()?;
        let mut teams: Vec<Team> = state
            .teams
            .values()
            .filter(|t| include.admits(t.deleted))
            .cloned()
            .collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(teams)
    }

    fn delete_team(&self, id: EntityId, hard: bool) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let missing = StoreError::NotFound {
            entity_type: EntityType::Team,
            id,
        };
        if hard {
            state.teams.remove(&id).map(|_| ()).ok_or(missing)
        } else {
            match state.teams.get_mut(&id) {
                Some(team) => {
                    team.deleted = true;
                    Ok(())
                }
                None => Err(missing),
            }
        }
    }

    fn register_entity(&self, entity: EntityRef) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let clash = state
            .entities
            .values()
            .any(|e| e.entity_type == entity.entity_type && e.name == entity.name);
        if clash || entity.entity_type == EntityType::Team {
            return Err(StoreError::AlreadyExists {
                entity_type: entity.entity_type,
                name: entity.name,
            });
        }
        state.entities.insert(entity.id, entity);
        Ok(())
    }

    fn find_entity(&self, entity_type: EntityType, id: EntityId) -> Result<Option<EntityRef>, StoreError> {
        let state = self.read()?;
        if entity_type == EntityType::Team {
            return Ok(state.teams.get(&id).map(Team::entity_ref));
        }
        Ok(state
            .entities
            .get(&id)
            .filter(|e| e.entity_type == entity_type)
            .cloned())
    }

    fn find_entity_by_name(&self, entity_type: EntityType, name: &str) -> Result<Option<EntityRef>, StoreError> {
        let state = self.read()?;
        if entity_type == EntityType::Team {
            return Ok(state.teams.values().find(|t| t.name == name).map(Team::entity_ref));
        }
        Ok(state
            .entities
            .values()
            .find(|e| e.entity_type == entity_type && e.name == name)
            .cloned())
    }
}
