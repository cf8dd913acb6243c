/// Name of the single Organization-kind root team.
pub const ORGANIZATION_NAME: &str = "Organization";

/// Description given to the root team when it is bootstrapped.
pub const DEFAULT_ORGANIZATION_DESCRIPTION: &str =
    "Organization under which all the other team hierarchy is created";

/// Default role attached to the root team at bootstrap.
pub const DEFAULT_ORGANIZATION_ROLE: &str = "DataConsumer";

/// Default policy attached to the root team at bootstrap.
pub const DEFAULT_ORGANIZATION_POLICY: &str = "OrganizationPolicy";

/// Principal recorded as `updated_by` for system-initiated changes.
pub const ADMIN_USER_NAME: &str = "admin";

/// Upper bound on recursive subtree walks.
///
/// The kind ordering caps nominal depth at five levels, but Department and
/// Division may nest under themselves, so walks still need a guard.
pub const MAX_HIERARCHY_DEPTH: usize = 64;

/// Default cap on the number of teams listed for a hierarchy view.
pub const DEFAULT_LIST_LIMIT: usize = 10_000;

/// Separator between fields of a flat team record.
pub const FIELD_DELIMITER: char = ',';

/// Separator between entries of a list-valued field.
pub const LIST_DELIMITER: char = ';';
