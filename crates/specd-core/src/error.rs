use crate::delta::Section;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecdError {
    #[error("not initialized: run 'specd init'")]
    NotInitialized,

    #[error("change not found: {0}")]
    ChangeNotFound(String),

    #[error("spec not found: {0}")]
    SpecNotFound(String),

    #[error("invalid id '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidId(String),

    #[error("archive destination already exists: {0}")]
    ArchiveExists(String),

    // -----------------------------------------------------------------------
    // Document structure
    // -----------------------------------------------------------------------
    #[error("spec has no '## Requirements' section")]
    MalformedSpec,

    #[error("delta declares no operations: expected at least one ADDED, MODIFIED, REMOVED, or RENAMED requirement")]
    EmptyDelta,

    #[error("malformed delta at line {line}: {reason}")]
    MalformedDelta { line: usize, reason: String },

    // -----------------------------------------------------------------------
    // Plan validation
    // -----------------------------------------------------------------------
    #[error("{spec} validation failed - duplicate requirement in {section} for header \"### Requirement: {name}\"")]
    DuplicateRequirement {
        spec: String,
        section: Section,
        name: String,
    },

    #[error("{spec} validation failed - requirement present in multiple sections ({first} and {second}) for header \"### Requirement: {name}\"")]
    CrossSectionConflict {
        spec: String,
        name: String,
        first: Section,
        second: Section,
    },

    #[error("{spec} validation failed - when a rename exists, MODIFIED must reference the new header \"### Requirement: {to}\" instead of \"{from}\"")]
    RenameModifyOrder {
        spec: String,
        from: String,
        to: String,
    },

    #[error("{spec} validation failed - RENAMED TO header collides with ADDED for \"### Requirement: {to}\"")]
    RenameAddCollision { spec: String, to: String },

    #[error("{spec}: target spec does not exist; only ADDED requirements are allowed for new specs ({operation} found)")]
    NewSpecInvalidOperation { spec: String, operation: Section },

    // -----------------------------------------------------------------------
    // Plan application
    // -----------------------------------------------------------------------
    #[error("{spec} RENAMED failed for header \"### Requirement: {name}\" - source not found")]
    RenameSourceMissing { spec: String, name: String },

    #[error("{spec} RENAMED failed for header \"### Requirement: {name}\" - target already exists")]
    RenameTargetExists { spec: String, name: String },

    #[error("{spec} REMOVED failed for header \"### Requirement: {name}\" - not found")]
    RemovalTargetMissing { spec: String, name: String },

    #[error("{spec} MODIFIED failed for header \"### Requirement: {name}\" - not found")]
    ModifyTargetMissing { spec: String, name: String },

    #[error("{spec} MODIFIED failed for header \"### Requirement: {key}\" - header mismatch in content (found \"{header}\")")]
    HeaderKeyMismatch {
        spec: String,
        key: String,
        header: String,
    },

    #[error("{spec} ADDED failed for header \"### Requirement: {name}\" - already exists")]
    DuplicateAddition { spec: String, name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

pub type Result<T> = std::result::Result<T, SpecdError>;
