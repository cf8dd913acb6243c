use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown team type: {0}")]
    UnknownTeamKind(String),

    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("Invalid entity ID: {0}")]
    InvalidEntityId(String),
}
