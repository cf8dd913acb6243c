//! Flat team records and their line codec.
//!
//! A record document is a header row followed by one row per team. Fields
//! are separated by [`FIELD_DELIMITER`]; list-valued fields separate their
//! entries with [`LIST_DELIMITER`]. A field containing the field
//! delimiter, a quote or a line break is wrapped in double quotes with
//! inner quotes doubled. Empty optional fields are empty strings.

use serde::{Deserialize, Serialize, Serializer};

use orgtree_model::{CsvErrorType, EntityRef, EntityType, Team, TeamKind, FIELD_DELIMITER, LIST_DELIMITER};

use crate::TransferError;

/// One column of the record document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvHeader {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

/// Column order of the record document.
pub const HEADERS: [CsvHeader; 9] = [
    CsvHeader {
        name: "name",
        required: true,
        description: "Unique name of the team",
    },
    CsvHeader {
        name: "displayName",
        required: false,
        description: "Display name of the team",
    },
    CsvHeader {
        name: "description",
        required: false,
        description: "Description of the team",
    },
    CsvHeader {
        name: "teamType",
        required: true,
        description: "One of Organization, BusinessUnit, Division, Department or Group",
    },
    CsvHeader {
        name: "parents",
        required: true,
        description: "Parent team names separated by ';'. Empty means the team the records are imported into",
    },
    CsvHeader {
        name: "owner",
        required: false,
        description: "Name of the user owning the team",
    },
    CsvHeader {
        name: "isJoinable",
        required: false,
        description: "true or false. Empty means true",
    },
    CsvHeader {
        name: "defaultRoles",
        required: false,
        description: "Role names separated by ';'",
    },
    CsvHeader {
        name: "policies",
        required: false,
        description: "Policy names separated by ';'",
    },
];

/// Zero-based column indexes into [`HEADERS`].
pub mod field {
    pub const NAME: usize = 0;
    pub const DISPLAY_NAME: usize = 1;
    pub const DESCRIPTION: usize = 2;
    pub const TEAM_TYPE: usize = 3;
    pub const PARENTS: usize = 4;
    pub const OWNER: usize = 5;
    pub const IS_JOINABLE: usize = 6;
    pub const DEFAULT_ROLES: usize = 7;
    pub const POLICIES: usize = 8;
}

/// A problem with one record. Renders as
/// `#<ErrorType>: Field <n> error - <message>` with a 1-based field number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDiagnostic {
    pub error_type: CsvErrorType,
    /// Zero-based column, when the problem is tied to one.
    pub field: Option<usize>,
    pub message: String,
}

impl ImportDiagnostic {
    pub fn field(error_type: CsvErrorType, field: usize, message: impl Into<String>) -> Self {
        Self {
            error_type,
            field: Some(field),
            message: message.into(),
        }
    }

    pub fn record(error_type: CsvErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            field: None,
            message: message.into(),
        }
    }

    pub fn invalid_parent(field: usize, import_team: &str, team: &str, parent: &str) -> Self {
        Self::field(
            CsvErrorType::InvalidField,
            field,
            format!("Parent {parent} of imported team {team} is not under {import_team} team hierarchy"),
        )
    }
}

impl std::fmt::Display for ImportDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.field {
            Some(field) => write!(f, "#{}: Field {} error - {}", self.error_type, field + 1, self.message),
            None => write!(f, "#{}: {}", self.error_type, self.message),
        }
    }
}

impl Serialize for ImportDiagnostic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One team as a flat record; references are by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRecord {
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "teamType")]
    pub kind: TeamKind,
    pub parents: Vec<String>,
    pub owner: Option<String>,
    pub is_joinable: bool,
    pub default_roles: Vec<String>,
    pub policies: Vec<String>,
}

impl TeamRecord {
    pub fn new(name: impl Into<String>, kind: TeamKind) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
            kind,
            parents: Vec::new(),
            owner: None,
            is_joinable: true,
            default_roles: Vec::new(),
            policies: Vec::new(),
        }
    }

    pub fn with_parents(mut self, parents: &[&str]) -> Self {
        self.parents = parents.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Record for a team read with parents, roles and policies populated.
    ///
    /// Soft-deleted parents are left out; only a user owner is carried.
    pub fn from_team(team: &Team) -> Self {
        let names = |refs: &[EntityRef]| -> Vec<String> { refs.iter().map(|r| r.name.clone()).collect() };
        Self {
            name: team.name.clone(),
            display_name: team.display_name.clone(),
            description: team.description.clone(),
            kind: team.kind,
            parents: team.parents.iter().filter(|p| !p.deleted).map(|p| p.name.clone()).collect(),
            owner: team
                .owner
                .as_ref()
                .filter(|o| o.entity_type == EntityType::User)
                .map(|o| o.name.clone()),
            is_joinable: team.is_joinable,
            default_roles: names(&team.default_roles),
            policies: names(&team.policies),
        }
    }

    pub fn to_fields(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.display_name.clone().unwrap_or_default(),
            self.description.clone().unwrap_or_default(),
            self.kind.to_string(),
            join_list(&self.parents),
            self.owner.clone().unwrap_or_default(),
            self.is_joinable.to_string(),
            join_list(&self.default_roles),
            join_list(&self.policies),
        ]
    }

    /// Parse one data row. Every field-level problem is reported, not just
    /// the first.
    pub fn from_fields(fields: &[String]) -> Result<Self, Vec<ImportDiagnostic>> {
        if fields.len() != HEADERS.len() {
            return Err(vec![ImportDiagnostic::record(
                CsvErrorType::FieldCount,
                format!(
                    "Field count {} does not match the header count {}",
                    fields.len(),
                    HEADERS.len()
                ),
            )]);
        }

        let mut diagnostics = Vec::new();
        let name = fields[field::NAME].trim().to_string();
        if name.is_empty() {
            diagnostics.push(ImportDiagnostic::field(
                CsvErrorType::InvalidField,
                field::NAME,
                "Field is required",
            ));
        }
        let kind = match fields[field::TEAM_TYPE].trim().parse::<TeamKind>() {
            Ok(kind) => Some(kind),
            Err(e) => {
                diagnostics.push(ImportDiagnostic::field(
                    CsvErrorType::InvalidField,
                    field::TEAM_TYPE,
                    e.to_string(),
                ));
                None
            }
        };
        let is_joinable = match parse_bool(&fields[field::IS_JOINABLE]) {
            Some(value) => value,
            None => {
                diagnostics.push(ImportDiagnostic::field(
                    CsvErrorType::InvalidField,
                    field::IS_JOINABLE,
                    format!("Value {} is not a boolean, expected true or false", fields[field::IS_JOINABLE]),
                ));
                true
            }
        };

        match kind {
            Some(kind) if diagnostics.is_empty() => Ok(Self {
                name,
                display_name: optional(&fields[field::DISPLAY_NAME]),
                description: optional(&fields[field::DESCRIPTION]),
                kind,
                parents: split_list(&fields[field::PARENTS]),
                owner: optional(&fields[field::OWNER]),
                is_joinable,
                default_roles: split_list(&fields[field::DEFAULT_ROLES]),
                policies: split_list(&fields[field::POLICIES]),
            }),
            _ => Err(diagnostics),
        }
    }
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "" => Some(true),
        v if v.eq_ignore_ascii_case("true") => Some(true),
        v if v.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

pub fn join_list(items: &[String]) -> String {
    items.join(&LIST_DELIMITER.to_string())
}

/// Split a list-valued field, dropping empty entries.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(LIST_DELIMITER)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Quote `value` when it would otherwise break the row.
pub fn encode_field(value: &str) -> String {
    if value.contains(&[FIELD_DELIMITER, '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn encode_record(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| encode_field(f))
        .collect::<Vec<_>>()
        .join(&FIELD_DELIMITER.to_string())
}

pub fn header_fields() -> Vec<String> {
    HEADERS.iter().map(|h| h.name.to_string()).collect()
}

/// Render the header row and one row per record.
pub fn to_document(records: &[TeamRecord]) -> String {
    let mut document = encode_record(&header_fields());
    document.push('\n');
    for record in records {
        document.push_str(&encode_record(&record.to_fields()));
        document.push('\n');
    }
    document
}

/// Split a document into rows of raw fields. Blank lines are skipped;
/// quoted fields may span lines.
pub fn parse_records(text: &str) -> Result<Vec<Vec<String>>, TransferError> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut quote_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => {
                in_quotes = true;
                quote_line = line;
            }
            FIELD_DELIMITER => row.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                line += 1;
                finish_row(&mut rows, &mut row, &mut field);
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(TransferError::Malformed {
            line: quote_line,
            message: "unterminated quoted field".to_string(),
        });
    }
    finish_row(&mut rows, &mut row, &mut field);
    Ok(rows)
}

fn finish_row(rows: &mut Vec<Vec<String>>, row: &mut Vec<String>, field: &mut String) {
    row.push(std::mem::take(field));
    let row = std::mem::take(row);
    if !(row.len() == 1 && row[0].trim().is_empty()) {
        rows.push(row);
    }
}
