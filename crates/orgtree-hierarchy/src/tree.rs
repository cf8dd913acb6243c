//! Consolidated forest views of the hierarchy.
//!
//! Each candidate team is walked upwards until its first parent is the
//! root, producing a single-branch chain. Chains rediscover shared
//! ancestors, so they are merged by node identity into one tree per
//! top-level team: a multi-child ancestor appears once with every branch
//! attached instead of once per descendant leaf.
//!
//! Views are immutable values. Merging builds a new tree and never mutates
//! either input, so an ancestor that shows up in several walk results is
//! never aliased.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use orgtree_model::{EntityId, Team, TeamKind, MAX_HIERARCHY_DEPTH};
use orgtree_store::{EntityStore, RelationshipStore};
use serde::{Deserialize, Serialize};

use crate::graph::{HierarchyGraph, TeamFields, TeamFilter};
use crate::HierarchyError;

/// Read-only projection of a team and its descendants, built per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeView {
    pub id: EntityId,
    #[serde(rename = "teamType")]
    pub kind: TeamKind,
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub is_joinable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeView>>,
}

impl TreeView {
    /// View of `team` with no children attached.
    pub fn leaf(team: &Team) -> Self {
        Self {
            id: team.id,
            kind: team.kind,
            name: team.name.clone(),
            display_name: team.display_name.clone(),
            description: team.description.clone(),
            is_joinable: team.is_joinable,
            children: None,
        }
    }

    pub fn with_children(mut self, children: Vec<TreeView>) -> Self {
        self.children = Some(children);
        self
    }

    /// Merge identity: two views are the same node iff they share an id.
    pub fn same_node(&self, other: &TreeView) -> bool {
        self.id == other.id
    }

    pub fn children(&self) -> &[TreeView] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Merge two views of the same node.
    ///
    /// Children present on both sides are merged recursively; children on
    /// only one side are carried over. `self`'s children keep their order and
    /// `other`'s extra children follow in theirs.
    pub fn merge(&self, other: &TreeView) -> TreeView {
        if self.children.is_none() && other.children.is_none() {
            return self.clone();
        }
        let mut children: Vec<TreeView> = self
            .children()
            .iter()
            .map(|mine| match other.children().iter().find(|theirs| mine.same_node(theirs)) {
                Some(theirs) => mine.merge(theirs),
                None => mine.clone(),
            })
            .collect();
        children.extend(
            other
                .children()
                .iter()
                .filter(|theirs| !self.children().iter().any(|mine| mine.same_node(theirs)))
                .cloned(),
        );
        TreeView {
            children: Some(children),
            ..self.clone()
        }
    }

    /// Ids of every node in this tree.
    pub fn node_ids(&self) -> HashSet<EntityId> {
        let mut ids = HashSet::new();
        self.visit(&mut |view| {
            ids.insert(view.id);
        });
        ids
    }

    /// Ids of the nodes without children.
    pub fn leaf_ids(&self) -> HashSet<EntityId> {
        let mut ids = HashSet::new();
        self.visit(&mut |view| {
            if view.children().is_empty() {
                ids.insert(view.id);
            }
        });
        ids
    }

    fn visit(&self, f: &mut dyn FnMut(&TreeView)) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }
}

/// Builds the consolidated forest from a flat snapshot of teams.
#[derive(Debug, Clone)]
pub struct HierarchyTreeBuilder {
    root_name: String,
    max_depth: usize,
}

impl HierarchyTreeBuilder {
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            root_name: root_name.into(),
            max_depth: MAX_HIERARCHY_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Build trees keyed by their top-level team id.
    ///
    /// `teams` must carry resolved `parents` and must contain every ancestor
    /// reachable below the root; the build makes no store calls.
    pub fn build(
        &self,
        teams: &[Team],
        joinable_only: bool,
    ) -> Result<HashMap<EntityId, TreeView>, HierarchyError> {
        let index: HashMap<EntityId, &Team> = teams.iter().map(|t| (t.id, t)).collect();
        let mut forest: HashMap<EntityId, TreeView> = HashMap::new();

        let candidates = teams
            .iter()
            .filter(|t| !joinable_only || t.is_joinable)
            .filter(|t| t.name != self.root_name);

        for team in candidates {
            let mut current = team;
            let mut view = TreeView::leaf(team);
            let mut steps = 0;

            while let Some(parent_ref) = current.parents.first().filter(|p| p.name != self.root_name) {
                steps += 1;
                if steps > self.max_depth {
                    return Err(HierarchyError::MaxDepthExceeded(self.max_depth));
                }
                let parent = index.get(&parent_ref.id).copied().ok_or_else(|| {
                    HierarchyError::HierarchyInconsistent(format!(
                        "parent {} of team {} is not in the listing",
                        parent_ref.name, current.name
                    ))
                })?;
                view = TreeView::leaf(parent).with_children(vec![view]);
                if let Some(existing) = forest.get(&parent.id) {
                    view = existing.merge(&view);
                }
                current = parent;
            }

            match forest.entry(view.id) {
                Entry::Occupied(mut slot) => {
                    let merged = slot.get().merge(&view);
                    slot.insert(merged);
                }
                Entry::Vacant(slot) => {
                    slot.insert(view);
                }
            }
        }

        Ok(forest)
    }

    /// Build the forest and order it by top-level team name.
    pub fn build_forest(&self, teams: &[Team], joinable_only: bool) -> Result<Vec<TreeView>, HierarchyError> {
        let mut forest: Vec<TreeView> = self.build(teams, joinable_only)?.into_values().collect();
        forest.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(forest)
    }

    /// List teams through `graph` and build their forest.
    ///
    /// Parents are read through the active view so a soft-deleted parent
    /// never leaves a dangling walk.
    pub fn list_hierarchy<S: RelationshipStore + EntityStore>(
        graph: &HierarchyGraph<S>,
        filter: &TeamFilter,
        limit: usize,
        joinable_only: bool,
    ) -> Result<Vec<TreeView>, HierarchyError> {
        let mut teams = graph.list(filter, limit, TeamFields::none())?;
        for team in &mut teams {
            team.parents = graph.active_parents_of(team.id)?;
        }
        HierarchyTreeBuilder::new(graph.root().name())
            .with_max_depth(graph.max_depth())
            .build_forest(&teams, joinable_only)
    }
}
