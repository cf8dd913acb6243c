use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::ADMIN_USER_NAME;
use crate::error::ModelError;
use crate::identity::{EntityId, EntityRef, EntityType};

/// Kind of a team, ordered from the top of the hierarchy downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TeamKind {
    Organization,
    BusinessUnit,
    Division,
    Department,
    Group,
}

impl TeamKind {
    pub const ALL: [TeamKind; 5] = [
        TeamKind::Organization,
        TeamKind::BusinessUnit,
        TeamKind::Division,
        TeamKind::Department,
        TeamKind::Group,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TeamKind::Organization => "Organization",
            TeamKind::BusinessUnit => "BusinessUnit",
            TeamKind::Division => "Division",
            TeamKind::Department => "Department",
            TeamKind::Group => "Group",
        }
    }
}

impl std::fmt::Display for TeamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TeamKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TeamKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ModelError::UnknownTeamKind(s.to_string()))
    }
}

/// Kind of a stored directed edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relationship {
    /// parent team -> child team
    ParentOf,
    /// team -> user / role / policy
    Has,
    /// team -> owned asset
    Owns,
}

/// Which records a lookup should admit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Include {
    #[default]
    NonDeleted,
    Deleted,
    All,
}

impl Include {
    pub fn admits(&self, deleted: bool) -> bool {
        match self {
            Include::NonDeleted => !deleted,
            Include::Deleted => deleted,
            Include::All => true,
        }
    }
}

/// A directed typed edge `(from, to, relation)` as held by the relationship store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: EntityId,
    pub from_type: EntityType,
    pub to: EntityId,
    pub to_type: EntityType,
    pub relation: Relationship,
}

impl Edge {
    pub fn new(
        from: EntityId,
        to: EntityId,
        from_type: EntityType,
        to_type: EntityType,
        relation: Relationship,
    ) -> Self {
        Self {
            from,
            from_type,
            to,
            to_type,
            relation,
        }
    }

    /// Hierarchy edge from `parent` to `child`.
    pub fn parent_of(parent: EntityId, child: EntityId) -> Self {
        Self::new(parent, child, EntityType::Team, EntityType::Team, Relationship::ParentOf)
    }

    pub fn touches(&self, id: EntityId) -> bool {
        self.from == id || self.to == id
    }
}

/// A team in the organizational hierarchy.
///
/// Relationship lists (`users`, `parents`, ...) are not part of the stored
/// record: they are rebuilt from edges on read and written back as edges on
/// store. `child_count` and `user_count` are derived on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: EntityId,
    /// Unique across the hierarchy; the stable external key.
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "teamType")]
    pub kind: TeamKind,
    pub is_joinable: bool,
    pub email: Option<String>,
    pub profile: Option<serde_json::Value>,
    pub domain: Option<EntityRef>,
    pub owner: Option<EntityRef>,
    #[serde(default)]
    pub users: Vec<EntityRef>,
    #[serde(default)]
    pub owns: Vec<EntityRef>,
    #[serde(default)]
    pub default_roles: Vec<EntityRef>,
    #[serde(default)]
    pub inherited_roles: Vec<EntityRef>,
    #[serde(default)]
    pub parents: Vec<EntityRef>,
    #[serde(default)]
    pub children: Vec<EntityRef>,
    #[serde(default)]
    pub policies: Vec<EntityRef>,
    pub child_count: Option<usize>,
    pub user_count: Option<usize>,
    #[serde(default)]
    pub deleted: bool,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

impl Team {
    pub fn new(name: impl Into<String>, kind: TeamKind) -> Self {
        Self {
            id: EntityId::generate(),
            name: name.into(),
            display_name: None,
            description: None,
            kind,
            is_joinable: true,
            email: None,
            profile: None,
            domain: None,
            owner: None,
            users: Vec::new(),
            owns: Vec::new(),
            default_roles: Vec::new(),
            inherited_roles: Vec::new(),
            parents: Vec::new(),
            children: Vec::new(),
            policies: Vec::new(),
            child_count: None,
            user_count: None,
            deleted: false,
            updated_by: ADMIN_USER_NAME.to_string(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_parents(mut self, parents: Vec<EntityRef>) -> Self {
        self.parents = parents;
        self
    }

    pub fn with_children(mut self, children: Vec<EntityRef>) -> Self {
        self.children = children;
        self
    }

    pub fn with_users(mut self, users: Vec<EntityRef>) -> Self {
        self.users = users;
        self
    }

    pub fn with_default_roles(mut self, roles: Vec<EntityRef>) -> Self {
        self.default_roles = roles;
        self
    }

    pub fn with_policies(mut self, policies: Vec<EntityRef>) -> Self {
        self.policies = policies;
        self
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef {
            id: self.id,
            entity_type: EntityType::Team,
            name: self.name.clone(),
            deleted: self.deleted,
        }
    }

    /// Display name, falling back to the name.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// The attribute-only form that is persisted; relations live as edges.
    pub fn stored_form(&self) -> Team {
        Team {
            owner: None,
            users: Vec::new(),
            owns: Vec::new(),
            default_roles: Vec::new(),
            inherited_roles: Vec::new(),
            parents: Vec::new(),
            children: Vec::new(),
            policies: Vec::new(),
            child_count: None,
            user_count: None,
            ..self.clone()
        }
    }
}

/// Category of a per-record problem found while importing flat records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CsvErrorType {
    /// The first record is not the expected header row.
    InvalidHeader,
    /// A record has a different number of fields than the header.
    FieldCount,
    InvalidField,
    /// A referenced user, role, policy or team does not exist.
    UnknownEntity,
}

impl CsvErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CsvErrorType::InvalidHeader => "INVALID_HEADER",
            CsvErrorType::FieldCount => "FIELD_COUNT",
            CsvErrorType::InvalidField => "INVALID_FIELD",
            CsvErrorType::UnknownEntity => "UNKNOWN_ENTITY",
        }
    }
}

impl std::fmt::Display for CsvErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
