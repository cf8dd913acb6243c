use orgtree_hierarchy::LifecycleManager;
use orgtree_model::{ADMIN_USER_NAME, DEFAULT_LIST_LIMIT};
use orgtree_store::{EntityStore, RelationshipStore};

/// Exports and imports team subtrees as flat records.
///
/// Reads go through the manager's graph; every write goes through the
/// manager so imported teams get the same validation as any other change.
pub struct BulkTransferEngine<'a, S> {
    pub(crate) manager: &'a LifecycleManager<S>,
    /// Cap on each child-scoped listing during export.
    pub(crate) list_limit: usize,
    pub(crate) updated_by: String,
}

impl<'a, S: RelationshipStore + EntityStore> BulkTransferEngine<'a, S> {
    pub fn new(manager: &'a LifecycleManager<S>) -> Self {
        Self {
            manager,
            list_limit: DEFAULT_LIST_LIMIT,
            updated_by: ADMIN_USER_NAME.to_string(),
        }
    }

    pub fn with_list_limit(mut self, list_limit: usize) -> Self {
        self.list_limit = list_limit;
        self
    }

    /// Principal recorded on teams created or updated by an import.
    pub fn with_updated_by(mut self, updated_by: impl Into<String>) -> Self {
        self.updated_by = updated_by.into();
        self
    }

    pub fn manager(&self) -> &LifecycleManager<S> {
        self.manager
    }
}
