//! In-memory deployment behind every CLI command.
//!
//! A deployment is a fresh [`MemoryStore`] seeded from the `[directory]`
//! section, with the Organization root bootstrapped from
//! `[organization]`. Records files are loaded into it through the bulk
//! import path, so a file the CLI accepts is exactly what an import
//! would accept.

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use orgtree_hierarchy::{
    HierarchyTreeBuilder, LifecycleManager, RoleInheritanceResolver, TeamFields, TeamFilter, TreeView,
};
use orgtree_model::{EntityId, EntityRef, EntityType, Include};
use orgtree_store::{EntityStore, MemoryStore, StoreError};
use orgtree_transfer::{BulkTransferEngine, ImportResult, ImportStatus};

use crate::config::OrgtreeConfig;

/// Roles attached to a team, split by where they come from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleReport {
    pub team: String,
    pub default_roles: Vec<String>,
    pub inherited_roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

pub struct Deployment {
    config: OrgtreeConfig,
    store: Arc<MemoryStore>,
    manager: LifecycleManager<MemoryStore>,
}

impl Deployment {
    /// Seed the directory and bootstrap the root team.
    pub fn new(config: OrgtreeConfig) -> anyhow::Result<Self> {
        let store = Arc::new(MemoryStore::new());
        let directory = &config.directory;
        for (entity_type, names) in [
            (EntityType::User, &directory.users),
            (EntityType::Role, &directory.roles),
            (EntityType::Policy, &directory.policies),
        ] {
            for name in names {
                match store.register_entity(EntityRef::new(EntityId::generate(), entity_type, name.as_str())) {
                    Ok(()) => {}
                    Err(StoreError::AlreadyExists { .. }) => {
                        tracing::warn!(%entity_type, name = %name, "Duplicate directory entry ignored");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        tracing::debug!(
            users = directory.users.len(),
            roles = directory.roles.len(),
            policies = directory.policies.len(),
            "Directory seeded"
        );

        let manager = LifecycleManager::init_organization(Arc::clone(&store), &config.organization_settings())?;
        Ok(Self {
            config,
            store,
            manager,
        })
    }

    pub fn config(&self) -> &OrgtreeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn manager(&self) -> &LifecycleManager<MemoryStore> {
        &self.manager
    }

    pub fn engine(&self) -> BulkTransferEngine<'_, MemoryStore> {
        BulkTransferEngine::new(&self.manager)
            .with_list_limit(self.config.hierarchy.list_limit)
            .with_updated_by(self.config.organization.updated_by.clone())
    }

    /// Import a records document under the root. Row failures are logged
    /// and the load carries on; a rejected header fails the load.
    pub fn load_records(&self, text: &str) -> anyhow::Result<ImportResult> {
        let root = self.manager.root().name().to_string();
        let result = self.engine().import_subtree(&root, text, false)?;
        if result.status == ImportStatus::Aborted {
            let reason = result
                .abort_reason
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            anyhow::bail!("Records rejected: {reason}");
        }
        for row in result.failures() {
            for diagnostic in &row.diagnostics {
                tracing::warn!(row = row.row, team = %row.name, %diagnostic, "Record skipped");
            }
        }
        tracing::info!(
            created = result.created,
            updated = result.updated,
            failed = result.rows_failed,
            "Records loaded"
        );
        Ok(result)
    }

    /// Read a records file and load it under the root.
    pub fn load_file(&self, path: &std::path::Path) -> anyhow::Result<ImportResult> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        self.load_records(&text)
    }

    /// Consolidated forest of every non-deleted team.
    pub fn tree(&self, joinable_only: bool, limit: Option<usize>) -> anyhow::Result<Vec<TreeView>> {
        let limit = limit.unwrap_or(self.config.hierarchy.list_limit);
        let forest =
            HierarchyTreeBuilder::list_hierarchy(self.manager.graph(), &TeamFilter::default(), limit, joinable_only)?;
        Ok(forest)
    }

    /// Default and inherited roles of the named team.
    pub fn roles(&self, team_name: &str) -> anyhow::Result<RoleReport> {
        let graph = self.manager.graph();
        let mut team = graph.get_by_name(
            team_name,
            Include::NonDeleted,
            TeamFields {
                default_roles: true,
                ..TeamFields::none()
            },
        )?;
        RoleInheritanceResolver::new(graph).inherit_fields(&mut team)?;
        let names = |refs: &[EntityRef]| -> Vec<String> { refs.iter().map(|r| r.name.clone()).collect() };
        Ok(RoleReport {
            team: team.name.clone(),
            default_roles: names(&team.default_roles),
            inherited_roles: names(&team.inherited_roles),
            domain: team.domain.as_ref().map(|d| d.name.clone()),
        })
    }
}
