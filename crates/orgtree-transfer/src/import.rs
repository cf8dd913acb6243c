//! Subtree import.
//!
//! Rows are parsed in input order and committed in dependency order, so a
//! row may name as parent a team created by a later row. Each row succeeds
//! or fails on its own: a failure is reported against that row and the
//! rest of the batch carries on. In dry-run mode nothing is written; teams
//! that would be created are staged so later rows still see them.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use orgtree_hierarchy::{HierarchyError, StagedTeams, TeamFields};
use orgtree_model::{CsvErrorType, EntityRef, EntityType, Include, Team};
use orgtree_store::{EntityStore, RelationshipStore};

use crate::engine::BulkTransferEngine;
use crate::record::{field, header_fields, parse_records, ImportDiagnostic, TeamRecord, HEADERS};
use crate::TransferError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportStatus {
    Success,
    PartialSuccess,
    /// Every row failed.
    Failure,
    /// The header row was rejected; no row was looked at.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowStatus {
    Created,
    Updated,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowResult {
    /// 1-based position in the document; the header is row 1.
    pub row: usize,
    pub name: String,
    pub status: RowStatus,
    pub diagnostics: Vec<ImportDiagnostic>,
}

impl RowResult {
    fn failed(row: usize, name: String, diagnostics: Vec<ImportDiagnostic>) -> Self {
        Self {
            row,
            name,
            status: RowStatus::Failed,
            diagnostics,
        }
    }
}

/// Outcome of one import batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub dry_run: bool,
    pub status: ImportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<ImportDiagnostic>,
    pub rows_processed: usize,
    pub rows_passed: usize,
    pub rows_failed: usize,
    pub created: usize,
    pub updated: usize,
    pub rows: Vec<RowResult>,
}

impl ImportResult {
    fn aborted(dry_run: bool, reason: ImportDiagnostic) -> Self {
        Self {
            dry_run,
            status: ImportStatus::Aborted,
            abort_reason: Some(reason),
            rows_processed: 0,
            rows_passed: 0,
            rows_failed: 0,
            created: 0,
            updated: 0,
            rows: Vec::new(),
        }
    }

    fn from_rows(dry_run: bool, rows: Vec<RowResult>) -> Self {
        let count = |status: RowStatus| rows.iter().filter(|r| r.status == status).count();
        let rows_failed = count(RowStatus::Failed);
        let created = count(RowStatus::Created);
        let updated = count(RowStatus::Updated);
        let rows_passed = rows.len() - rows_failed;
        let status = if rows_failed == 0 {
            ImportStatus::Success
        } else if rows_passed == 0 {
            ImportStatus::Failure
        } else {
            ImportStatus::PartialSuccess
        };
        Self {
            dry_run,
            status,
            abort_reason: None,
            rows_processed: rows.len(),
            rows_passed,
            rows_failed,
            created,
            updated,
            rows,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &RowResult> {
        self.rows.iter().filter(|r| r.status == RowStatus::Failed)
    }

    pub fn row(&self, name: &str) -> Option<&RowResult> {
        self.rows.iter().find(|r| r.name == name)
    }
}

/// A parsed data row and its 1-based position.
type Row = (usize, TeamRecord);

/// References of a row resolved against the store and the staged teams.
struct Resolved {
    parents: Vec<EntityRef>,
    owner: Option<EntityRef>,
    default_roles: Vec<EntityRef>,
    policies: Vec<EntityRef>,
}

impl<S: RelationshipStore + EntityStore> BulkTransferEngine<'_, S> {
    /// Import a record document under `team_name`.
    ///
    /// Only a document that cannot be split into rows, or an import team
    /// that does not exist, fails the call; everything else is reported in
    /// the result.
    pub fn import_subtree(&self, team_name: &str, text: &str, dry_run: bool) -> Result<ImportResult, TransferError> {
        let import_team = self
            .manager
            .graph()
            .get_by_name(team_name, Include::NonDeleted, TeamFields::none())?;

        let mut rows = parse_records(text)?.into_iter();
        let header = rows.next().unwrap_or_default();
        if !header.iter().map(|h| h.trim()).eq(HEADERS.iter().map(|h| h.name)) {
            let reason = ImportDiagnostic::record(
                CsvErrorType::InvalidHeader,
                format!(
                    "Header [{}] does not match the expected header [{}]",
                    header.join(","),
                    header_fields().join(",")
                ),
            );
            tracing::warn!(team = %team_name, %reason, "Import aborted");
            return Ok(ImportResult::aborted(dry_run, reason));
        }

        let mut results = Vec::new();
        let mut parsed = Vec::new();
        for (index, fields) in rows.enumerate() {
            let row = index + 2;
            match TeamRecord::from_fields(&fields) {
                Ok(record) => parsed.push((row, record)),
                Err(diagnostics) => {
                    let name = fields.first().cloned().unwrap_or_default();
                    results.push(self.reject(row, name, diagnostics));
                }
            }
        }

        let (ordered, rejected) = dependency_order(parsed);
        for (row, record, diagnostic) in rejected {
            results.push(self.reject(row, record.name, vec![diagnostic]));
        }

        let mut staged = StagedTeams::new();
        for (row, record) in ordered {
            let name = record.name.clone();
            let result = match self.import_record(&import_team, record, &mut staged, dry_run) {
                Ok(status) => RowResult {
                    row,
                    name,
                    status,
                    diagnostics: Vec::new(),
                },
                Err(diagnostics) => self.reject(row, name, diagnostics),
            };
            results.push(result);
        }

        results.sort_by_key(|r| r.row);
        let result = ImportResult::from_rows(dry_run, results);
        tracing::info!(
            team = %team_name,
            dry_run,
            status = ?result.status,
            passed = result.rows_passed,
            failed = result.rows_failed,
            "Imported team records"
        );
        Ok(result)
    }

    fn reject(&self, row: usize, name: String, diagnostics: Vec<ImportDiagnostic>) -> RowResult {
        let rendered: Vec<String> = diagnostics.iter().map(ToString::to_string).collect();
        tracing::warn!(row, team = %name, errors = ?rendered, "Team record rejected");
        RowResult::failed(row, name, diagnostics)
    }

    fn import_record(
        &self,
        import_team: &Team,
        record: TeamRecord,
        staged: &mut StagedTeams,
        dry_run: bool,
    ) -> Result<RowStatus, Vec<ImportDiagnostic>> {
        let as_diagnostics = |e: HierarchyError| vec![diagnostic_for(&e)];
        let resolved = self.resolve(import_team, &record, staged).map_err(as_diagnostics)??;

        let graph = self.manager.graph();
        let existing = graph
            .store()
            .find_team_by_name(&record.name, Include::All)
            .map_err(|e| as_diagnostics(e.into()))?;

        let (team, status) = match existing {
            Some(found) if found.deleted => {
                return Err(vec![ImportDiagnostic::field(
                    CsvErrorType::InvalidField,
                    field::NAME,
                    format!("Team {} is deleted", found.name),
                )]);
            }
            Some(found) => {
                let original = graph
                    .get(found.id, Include::NonDeleted, TeamFields::all())
                    .map_err(as_diagnostics)?;
                let mut updated = original.clone();
                self.apply(&mut updated, &record, resolved);
                let team = if dry_run {
                    self.manager
                        .check_update(&original, &mut updated, staged)
                        .map_err(as_diagnostics)?;
                    updated
                } else {
                    self.manager.update(updated).map_err(as_diagnostics)?.0
                };
                (team, RowStatus::Updated)
            }
            None => {
                let mut team = Team::new(record.name.clone(), record.kind);
                self.apply(&mut team, &record, resolved);
                let team = if dry_run {
                    self.manager.prepare_staged(&mut team, staged).map_err(as_diagnostics)?;
                    team
                } else {
                    self.manager.create(team).map_err(as_diagnostics)?
                };
                (team, RowStatus::Created)
            }
        };

        staged.insert(team.name.clone(), team);
        Ok(status)
    }

    fn apply(&self, team: &mut Team, record: &TeamRecord, resolved: Resolved) {
        team.display_name = record.display_name.clone();
        team.description = record.description.clone();
        team.kind = record.kind;
        team.is_joinable = record.is_joinable;
        team.parents = resolved.parents;
        team.owner = resolved.owner;
        team.default_roles = resolved.default_roles;
        team.policies = resolved.policies;
        team.updated_by = self.updated_by.clone();
    }

    /// Resolve every name in `record`. The outer error is a storage fault;
    /// the inner one lists the names that did not resolve.
    fn resolve(
        &self,
        import_team: &Team,
        record: &TeamRecord,
        staged: &StagedTeams,
    ) -> Result<Result<Resolved, Vec<ImportDiagnostic>>, HierarchyError> {
        let mut diagnostics = Vec::new();
        let parents = self.resolve_parents(import_team, record, staged, &mut diagnostics)?;
        let owner = match &record.owner {
            Some(name) => self
                .resolve_entities(EntityType::User, field::OWNER, std::slice::from_ref(name), &mut diagnostics)?
                .pop(),
            None => None,
        };
        let default_roles =
            self.resolve_entities(EntityType::Role, field::DEFAULT_ROLES, &record.default_roles, &mut diagnostics)?;
        let policies = self.resolve_entities(EntityType::Policy, field::POLICIES, &record.policies, &mut diagnostics)?;

        if !diagnostics.is_empty() {
            return Ok(Err(diagnostics));
        }
        Ok(Ok(Resolved {
            parents,
            owner,
            default_roles,
            policies,
        }))
    }

    /// A parent must be the import team, a team staged earlier in the
    /// batch, or an existing team somewhere under the import team.
    fn resolve_parents(
        &self,
        import_team: &Team,
        record: &TeamRecord,
        staged: &StagedTeams,
        diagnostics: &mut Vec<ImportDiagnostic>,
    ) -> Result<Vec<EntityRef>, HierarchyError> {
        if record.parents.is_empty() {
            return Ok(vec![import_team.entity_ref()]);
        }

        let graph = self.manager.graph();
        let mut parents = Vec::with_capacity(record.parents.len());
        for name in &record.parents {
            if *name == import_team.name {
                parents.push(import_team.entity_ref());
                continue;
            }
            if let Some(team) = staged.get(name) {
                parents.push(team.entity_ref());
                continue;
            }
            match graph.store().find_team_by_name(name, Include::NonDeleted)? {
                Some(team) if graph.is_in_team(&import_team.name, &team.entity_ref())? => {
                    parents.push(team.entity_ref());
                }
                Some(_) => diagnostics.push(ImportDiagnostic::invalid_parent(
                    field::PARENTS,
                    &import_team.name,
                    &record.name,
                    name,
                )),
                None => diagnostics.push(ImportDiagnostic::field(
                    CsvErrorType::UnknownEntity,
                    field::PARENTS,
                    format!("team {name} not found"),
                )),
            }
        }
        Ok(parents)
    }

    fn resolve_entities(
        &self,
        entity_type: EntityType,
        column: usize,
        names: &[String],
        diagnostics: &mut Vec<ImportDiagnostic>,
    ) -> Result<Vec<EntityRef>, HierarchyError> {
        let store = self.manager.graph().store();
        let mut refs = Vec::with_capacity(names.len());
        for name in names {
            match store.find_entity_by_name(entity_type, name)? {
                Some(reference) => refs.push(reference),
                None => diagnostics.push(ImportDiagnostic::field(
                    CsvErrorType::UnknownEntity,
                    column,
                    format!("{entity_type} {name} not found"),
                )),
            }
        }
        Ok(refs)
    }
}

/// Map a validation failure to the column it concerns.
fn diagnostic_for(error: &HierarchyError) -> ImportDiagnostic {
    let (error_type, column) = match error {
        HierarchyError::InvalidParentKind { .. }
        | HierarchyError::InvalidParentCount { .. }
        | HierarchyError::UnexpectedParent(_)
        | HierarchyError::CyclicParent { .. } => (CsvErrorType::InvalidField, Some(field::PARENTS)),
        HierarchyError::InvalidChildKind { .. }
        | HierarchyError::GroupMutationRejected { .. }
        | HierarchyError::DuplicateOrganization(_)
        | HierarchyError::RootKindChange(_) => (CsvErrorType::InvalidField, Some(field::TEAM_TYPE)),
        HierarchyError::DuplicateName(_) => (CsvErrorType::InvalidField, Some(field::NAME)),
        HierarchyError::EntityNotFound { .. } | HierarchyError::TeamNotFound(_) => (CsvErrorType::UnknownEntity, None),
        _ => (CsvErrorType::InvalidField, None),
    };
    ImportDiagnostic {
        error_type,
        field: column,
        message: error.to_string(),
    }
}

/// Order rows so every row comes after the rows creating its parents,
/// keeping input order otherwise. Rows repeating an earlier name, and rows
/// caught in a parent cycle within the batch, are rejected.
fn dependency_order(parsed: Vec<Row>) -> (Vec<Row>, Vec<(usize, TeamRecord, ImportDiagnostic)>) {
    let mut rejected = Vec::new();
    let mut unique: Vec<Row> = Vec::with_capacity(parsed.len());
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for (row, record) in parsed {
        if by_name.contains_key(&record.name) {
            let diagnostic = ImportDiagnostic::field(
                CsvErrorType::InvalidField,
                field::NAME,
                format!("Team {} appears more than once in the imported records", record.name),
            );
            rejected.push((row, record, diagnostic));
            continue;
        }
        by_name.insert(record.name.clone(), unique.len());
        unique.push((row, record));
    }

    let mut pending = vec![0usize; unique.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); unique.len()];
    for (i, (_, record)) in unique.iter().enumerate() {
        for parent in &record.parents {
            if let Some(&j) = by_name.get(parent) {
                pending[i] += 1;
                dependents[j].push(i);
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..unique.len()).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(unique.len());
    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &dependent in &dependents[i] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    let mut slots: Vec<Option<Row>> = unique.into_iter().map(Some).collect();
    let ordered = order.iter().filter_map(|&i| slots[i].take()).collect();
    for (row, record) in slots.into_iter().flatten() {
        let diagnostic = ImportDiagnostic::field(
            CsvErrorType::InvalidField,
            field::PARENTS,
            format!("Parents of imported team {} form a cycle within the imported records", record.name),
        );
        rejected.push((row, record, diagnostic));
    }
    (ordered, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgtree_model::TeamKind;

    fn row(index: usize, name: &str, parents: &[&str]) -> Row {
        (index, TeamRecord::new(name, TeamKind::Department).with_parents(parents))
    }

    fn names(rows: &[Row]) -> Vec<&str> {
        rows.iter().map(|(_, r)| r.name.as_str()).collect()
    }

    #[test]
    fn test_children_wait_for_their_parents() {
        let (ordered, rejected) = dependency_order(vec![
            row(2, "Leaf", &["Mid"]),
            row(3, "Solo", &[]),
            row(4, "Mid", &["Top"]),
            row(5, "Top", &["Elsewhere"]),
        ]);
        assert!(rejected.is_empty());
        assert_eq!(names(&ordered), vec!["Solo", "Top", "Mid", "Leaf"]);
    }

    #[test]
    fn test_independent_rows_keep_input_order() {
        let (ordered, _) = dependency_order(vec![row(2, "B", &[]), row(3, "A", &[]), row(4, "C", &["X"])]);
        assert_eq!(names(&ordered), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_cycles_and_duplicates_are_rejected() {
        let (ordered, rejected) = dependency_order(vec![
            row(2, "A", &["B"]),
            row(3, "B", &["A"]),
            row(4, "Self", &["Self"]),
            row(5, "Ok", &[]),
            row(6, "Ok", &[]),
        ]);
        assert_eq!(names(&ordered), vec!["Ok"]);
        let mut rejected_rows: Vec<usize> = rejected.iter().map(|(row, _, _)| *row).collect();
        rejected_rows.sort_unstable();
        assert_eq!(rejected_rows, vec![2, 3, 4, 6]);
        assert!(rejected.iter().all(|(_, _, d)| d.error_type == CsvErrorType::InvalidField));
    }
}
