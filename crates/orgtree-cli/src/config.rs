//! Configuration loading from TOML and environment variables.
//!
//! The CLI reads its configuration from:
//! 1. A TOML config file (optional, `-c FILE`)
//! 2. Environment variables (override TOML values)
//! 3. Command-line flags (override both)
//!
//! Environment variable prefix: ORGTREE_

use std::path::Path;

use serde::{Deserialize, Serialize};

use orgtree_hierarchy::OrganizationSettings;
use orgtree_model::{
    ADMIN_USER_NAME, DEFAULT_LIST_LIMIT, DEFAULT_ORGANIZATION_DESCRIPTION, DEFAULT_ORGANIZATION_POLICY,
    DEFAULT_ORGANIZATION_ROLE, MAX_HIERARCHY_DEPTH, ORGANIZATION_NAME,
};

/// Top-level CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrgtreeConfig {
    /// Root team bootstrap.
    #[serde(default)]
    pub organization: OrganizationConfig,
    /// Traversal and listing limits.
    #[serde(default)]
    pub hierarchy: HierarchyConfig,
    /// Users, roles and policies known to the deployment.
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the Organization root is created on first start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationConfig {
    #[serde(default = "default_organization_name")]
    pub name: String,
    #[serde(default = "default_organization_description")]
    pub description: String,
    /// Role names attached to the root. Names missing from the directory are skipped.
    #[serde(default = "default_organization_roles")]
    pub default_roles: Vec<String>,
    /// Policy names attached to the root. Names missing from the directory are skipped.
    #[serde(default = "default_organization_policies")]
    pub default_policies: Vec<String>,
    /// Principal recorded on bootstrapped and imported teams.
    #[serde(default = "default_updated_by")]
    pub updated_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Recursion guard for subtree walks.
    #[serde(default = "default_max_traversal_depth")]
    pub max_traversal_depth: usize,
    /// Cap on the number of teams in a hierarchy listing.
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
}

/// Seed entities registered into the store at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_users")]
    pub users: Vec<String>,
    #[serde(default = "default_organization_roles")]
    pub roles: Vec<String>,
    #[serde(default = "default_organization_policies")]
    pub policies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "orgtree_hierarchy=debug").
    #[serde(default = "default_log_level")]
    pub level: String,
}

// -- Defaults --

fn default_organization_name() -> String {
    ORGANIZATION_NAME.to_string()
}
fn default_organization_description() -> String {
    DEFAULT_ORGANIZATION_DESCRIPTION.to_string()
}
fn default_organization_roles() -> Vec<String> {
    vec![DEFAULT_ORGANIZATION_ROLE.to_string()]
}
fn default_organization_policies() -> Vec<String> {
    vec![DEFAULT_ORGANIZATION_POLICY.to_string()]
}
fn default_updated_by() -> String {
    ADMIN_USER_NAME.to_string()
}
fn default_max_traversal_depth() -> usize {
    MAX_HIERARCHY_DEPTH
}
fn default_list_limit() -> usize {
    DEFAULT_LIST_LIMIT
}
fn default_users() -> Vec<String> {
    vec![ADMIN_USER_NAME.to_string()]
}
fn default_log_level() -> String {
    "info".to_string()
}

// -- Trait impls --

impl Default for OrganizationConfig {
    fn default() -> Self {
        Self {
            name: default_organization_name(),
            description: default_organization_description(),
            default_roles: default_organization_roles(),
            default_policies: default_organization_policies(),
            updated_by: default_updated_by(),
        }
    }
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_traversal_depth: default_max_traversal_depth(),
            list_limit: default_list_limit(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            users: default_users(),
            roles: default_organization_roles(),
            policies: default_organization_policies(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl OrgtreeConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: OrgtreeConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from an optional TOML file, with environment
    /// variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, anyhow::Error> {
        let mut config = if let Some(path) = path {
            if path.exists() {
                Self::from_file(path)?
            } else {
                tracing::warn!(
                    path = %path.display(),
                    "Config file not found, using defaults"
                );
                Self::default()
            }
        } else {
            Self::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ORGTREE_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("ORGTREE_ORGANIZATION_NAME") {
            self.organization.name = val;
        }
        if let Ok(val) = std::env::var("ORGTREE_MAX_TRAVERSAL_DEPTH") {
            if let Ok(depth) = val.parse() {
                self.hierarchy.max_traversal_depth = depth;
            }
        }
        if let Ok(val) = std::env::var("ORGTREE_UPDATED_BY") {
            self.organization.updated_by = val;
        }
    }

    /// Bootstrap settings for the root team.
    pub fn organization_settings(&self) -> OrganizationSettings {
        OrganizationSettings {
            name: self.organization.name.clone(),
            description: self.organization.description.clone(),
            default_roles: self.organization.default_roles.clone(),
            default_policies: self.organization.default_policies.clone(),
            updated_by: self.organization.updated_by.clone(),
            max_depth: self.hierarchy.max_traversal_depth,
        }
    }
}
