use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ModelError;

/// Opaque unique identifier for any entity (team, user, role, policy, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EntityId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ModelError::InvalidEntityId(s.to_string()))
    }
}

/// The type axis used on both ends of a stored edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    Team,
    User,
    Role,
    Policy,
    Domain,
    /// Any resource a team can own (tables, dashboards, ...).
    Asset,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Team => "team",
            EntityType::User => "user",
            EntityType::Role => "role",
            EntityType::Policy => "policy",
            EntityType::Domain => "domain",
            EntityType::Asset => "asset",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "team" => Ok(EntityType::Team),
            "user" => Ok(EntityType::User),
            "role" => Ok(EntityType::Role),
            "policy" => Ok(EntityType::Policy),
            "domain" => Ok(EntityType::Domain),
            "asset" => Ok(EntityType::Asset),
            other => Err(ModelError::UnknownEntityType(other.to_string())),
        }
    }
}

/// A lightweight, resolved reference to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub id: EntityId,
    pub entity_type: EntityType,
    pub name: String,
    /// Whether the referenced entity is soft-deleted.
    #[serde(default)]
    pub deleted: bool,
}

impl EntityRef {
    pub fn new(id: EntityId, entity_type: EntityType, name: impl Into<String>) -> Self {
        Self {
            id,
            entity_type,
            name: name.into(),
            deleted: false,
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.name)
    }
}

/// Handle to the single Organization root team.
///
/// Obtained once when the organization is bootstrapped and handed to every
/// component that needs to apply the implicit-root rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootRef(EntityRef);

impl RootRef {
    pub fn new(reference: EntityRef) -> Self {
        Self(reference)
    }

    pub fn id(&self) -> EntityId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn is_root(&self, id: EntityId) -> bool {
        self.0.id == id
    }

    pub fn entity_ref(&self) -> EntityRef {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_parse_roundtrip() {
        let id = EntityId::generate();
        let parsed: EntityId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<EntityId>().is_err());
    }

    #[test]
    fn test_entity_type_from_str() {
        assert_eq!("policy".parse::<EntityType>().unwrap(), EntityType::Policy);
        assert_eq!(
            "widget".parse::<EntityType>(),
            Err(ModelError::UnknownEntityType("widget".into()))
        );
    }

    #[test]
    fn test_root_ref_identity() {
        let root = RootRef::new(EntityRef::new(EntityId::generate(), EntityType::Team, "Organization"));
        assert!(root.is_root(root.id()));
        assert!(!root.is_root(EntityId::generate()));
        assert_eq!(root.name(), "Organization");
    }
}
