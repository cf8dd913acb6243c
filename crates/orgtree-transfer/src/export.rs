//! Subtree export.

use std::collections::HashSet;

use orgtree_hierarchy::{HierarchyError, TeamFields, TeamFilter};
use orgtree_model::{EntityId, Include, Team};
use orgtree_store::{EntityStore, RelationshipStore};

use crate::engine::BulkTransferEngine;
use crate::record::{to_document, TeamRecord};
use crate::TransferError;

impl<S: RelationshipStore + EntityStore> BulkTransferEngine<'_, S> {
    /// Records for every active team below `team_name`, each parent ahead
    /// of its children. A team reachable through several parents appears
    /// once.
    pub fn export_subtree(&self, team_name: &str) -> Result<Vec<TeamRecord>, TransferError> {
        self.manager
            .graph()
            .get_by_name(team_name, Include::NonDeleted, TeamFields::none())?;

        let mut seen = HashSet::new();
        let mut teams = Vec::new();
        self.collect(team_name, 0, &mut seen, &mut teams)?;
        tracing::info!(team = %team_name, count = teams.len(), "Exported team subtree");
        Ok(teams.iter().map(TeamRecord::from_team).collect())
    }

    /// The subtree as a record document, header row first.
    pub fn export_document(&self, team_name: &str) -> Result<String, TransferError> {
        Ok(to_document(&self.export_subtree(team_name)?))
    }

    fn collect(
        &self,
        parent: &str,
        depth: usize,
        seen: &mut HashSet<EntityId>,
        out: &mut Vec<Team>,
    ) -> Result<(), TransferError> {
        let graph = self.manager.graph();
        if depth > graph.max_depth() {
            return Err(HierarchyError::MaxDepthExceeded(graph.max_depth()).into());
        }
        let fields = TeamFields {
            parents: true,
            default_roles: true,
            policies: true,
            ..TeamFields::none()
        };
        for child in graph.list(&TeamFilter::children_of(parent), self.list_limit, fields)? {
            if seen.insert(child.id) {
                let name = child.name.clone();
                out.push(child);
                self.collect(&name, depth + 1, seen, out)?;
            }
        }
        Ok(())
    }
}
