//! Tests for the CLI deployment wiring.
//!
//! Verifies:
//! - Directory seeding and the organization bootstrap follow the config
//! - Records files load under the root, skipping bad rows
//! - Tree, export, import and roles answers over a loaded deployment

use orgtree_cli::{Deployment, OrgtreeConfig};
use orgtree_hierarchy::TreeView;
use orgtree_model::{EntityType, Include};
use orgtree_store::EntityStore;
use orgtree_transfer::{ImportStatus, RowStatus};

const HEADER: &str = "name,displayName,description,teamType,parents,owner,isJoinable,defaultRoles,policies";

fn config() -> OrgtreeConfig {
    toml::from_str(
        r#"
        [organization]
        name = "Acme"

        [directory]
        users = ["admin", "alice"]
        roles = ["DataConsumer", "DataSteward"]
        "#,
    )
    .unwrap()
}

fn records(rows: &[&str]) -> String {
    let mut text = HEADER.to_string();
    for row in rows {
        text.push('\n');
        text.push_str(row);
    }
    text
}

fn loaded() -> Deployment {
    let deployment = Deployment::new(config()).unwrap();
    let result = deployment
        .load_records(&records(&[
            "Platform,,,Division,Engineering,,,,",
            "Engineering,Engineering,,BusinessUnit,,alice,true,DataSteward,",
            "Sales,,,BusinessUnit,,,false,,",
        ]))
        .unwrap();
    assert_eq!(result.status, ImportStatus::Success);
    deployment
}

fn all_names(views: &[TreeView]) -> Vec<String> {
    let mut names = Vec::new();
    for view in views {
        names.push(view.name.clone());
        names.extend(all_names(view.children()));
    }
    names.sort();
    names
}

// ═══════════════════════════════════════════════════════════════
// Bootstrap
// ═══════════════════════════════════════════════════════════════

#[test]
fn deployment_seeds_directory_and_root() {
    let deployment = Deployment::new(config()).unwrap();
    let store = deployment.store();

    assert!(store.find_entity_by_name(EntityType::User, "alice").unwrap().is_some());
    assert!(store.find_entity_by_name(EntityType::Role, "DataSteward").unwrap().is_some());
    assert!(store.find_entity_by_name(EntityType::Policy, "OrganizationPolicy").unwrap().is_some());

    assert_eq!(deployment.manager().root().name(), "Acme");
    let root = store.find_team_by_name("Acme", Include::All).unwrap().unwrap();
    assert_eq!(root.kind, orgtree_model::TeamKind::Organization);
}

#[test]
fn duplicate_directory_entries_are_ignored() {
    let mut config = OrgtreeConfig::default();
    config.directory.users = vec!["alice".into(), "alice".into()];
    let deployment = Deployment::new(config).unwrap();
    assert!(deployment
        .store()
        .find_entity_by_name(EntityType::User, "alice")
        .unwrap()
        .is_some());
}

#[test]
fn root_roles_missing_from_directory_are_skipped() {
    let mut config = OrgtreeConfig::default();
    config.directory.roles.clear();
    let deployment = Deployment::new(config).unwrap();
    let report = deployment.roles("Organization").unwrap();
    assert!(report.default_roles.is_empty());
}

// ═══════════════════════════════════════════════════════════════
// Loading records
// ═══════════════════════════════════════════════════════════════

#[test]
fn bad_rows_are_skipped_during_load() {
    let deployment = Deployment::new(config()).unwrap();
    let result = deployment
        .load_records(&records(&["Engineering,,,BusinessUnit,,,,,", "Stray,,,Division,Nowhere,,,,"]))
        .unwrap();
    assert_eq!(result.status, ImportStatus::PartialSuccess);
    assert_eq!(result.row("Engineering").unwrap().status, RowStatus::Created);
    assert_eq!(result.row("Stray").unwrap().status, RowStatus::Failed);
}

#[test]
fn rejected_header_fails_the_load() {
    let deployment = Deployment::new(config()).unwrap();
    let err = deployment.load_records("name,kind\nEngineering,BusinessUnit").unwrap_err();
    assert!(err.to_string().starts_with("Records rejected: #INVALID_HEADER"));
}

#[test]
fn missing_records_file_is_an_error() {
    let deployment = Deployment::new(config()).unwrap();
    assert!(deployment
        .load_file(std::path::Path::new("/nonexistent/teams.csv"))
        .is_err());
}

// ═══════════════════════════════════════════════════════════════
// Commands
// ═══════════════════════════════════════════════════════════════

#[test]
fn tree_lists_loaded_hierarchy() {
    let deployment = loaded();

    let forest = deployment.tree(false, None).unwrap();
    let tops: Vec<&str> = forest.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tops, vec!["Engineering", "Sales"]);
    assert_eq!(forest[0].children()[0].name, "Platform");

    let joinable = deployment.tree(true, None).unwrap();
    assert_eq!(all_names(&joinable), vec!["Engineering", "Platform"]);
}

#[test]
fn export_prints_subtree_records() {
    let deployment = loaded();
    let document = deployment.engine().export_document("Engineering").unwrap();
    let lines: Vec<&str> = document.lines().collect();
    assert_eq!(lines, vec![HEADER, "Platform,,,Division,Engineering,,true,,"]);

    let document = deployment.engine().export_document("Acme").unwrap();
    assert_eq!(document.lines().count(), 4);
    assert!(document
        .lines()
        .any(|l| l == "Engineering,Engineering,,BusinessUnit,Acme,alice,true,DataSteward,"));
}

#[test]
fn dry_run_import_over_base_writes_nothing() {
    let deployment = loaded();
    let result = deployment
        .engine()
        .import_subtree("Engineering", &records(&["Web,,,Department,Platform,,,,"]), true)
        .unwrap();
    assert!(result.dry_run);
    assert_eq!(result.status, ImportStatus::Success);
    assert_eq!(result.created, 1);
    assert!(deployment
        .store()
        .find_team_by_name("Web", Include::All)
        .unwrap()
        .is_none());
}

#[test]
fn roles_report_splits_default_and_inherited() {
    let deployment = loaded();

    let engineering = deployment.roles("Engineering").unwrap();
    assert_eq!(engineering.default_roles, vec!["DataSteward"]);
    assert_eq!(engineering.inherited_roles, vec!["DataConsumer"]);

    let platform = deployment.roles("Platform").unwrap();
    assert!(platform.default_roles.is_empty());
    assert_eq!(platform.inherited_roles, vec!["DataSteward"]);

    assert!(deployment.roles("Nobody").is_err());
}
