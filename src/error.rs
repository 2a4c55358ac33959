//! Error types for the circulation desk

use thiserror::Error;

use crate::schema::EntityKind;

/// Result type for circulation operations
pub type Result<T> = std::result::Result<T, CirculationError>;

/// Circulation errors
#[derive(Error, Debug)]
pub enum CirculationError {
    /// The kind has no resolved address, or the resolved address no longer opens.
    #[error("{kind} resource is unavailable: {reason}. Run discovery to locate it again")]
    ResourceUnavailable { kind: EntityKind, reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("No {kind} resource found with a name starting with '{prefix}'")]
    ResourceNotFound { kind: EntityKind, prefix: String },

    #[error("Validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("Invalid {entity} record {id}: {reason}")]
    InvalidRecord {
        entity: &'static str,
        id: String,
        reason: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Lock poisoned during {0}")]
    LockPoisoned(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl CirculationError {
    /// Stable code for the error category, surfaced to callers alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            CirculationError::ResourceUnavailable { .. } => "RESOURCE_UNAVAILABLE",
            CirculationError::NotFound { .. } | CirculationError::ResourceNotFound { .. } => {
                "NOT_FOUND"
            }
            CirculationError::ValidationFailed(_) => "VALIDATION_FAILED",
            CirculationError::PreconditionFailed(_) => "PRECONDITION_FAILED",
            CirculationError::InvalidRecord { .. } => "INVALID_RECORD",
            CirculationError::Storage(_)
            | CirculationError::LockPoisoned(_)
            | CirculationError::Io(_)
            | CirculationError::Csv(_)
            | CirculationError::TomlParse(_)
            | CirculationError::TomlSerialize(_) => "STORAGE",
        }
    }

    pub(crate) fn unavailable(kind: EntityKind, reason: impl Into<String>) -> Self {
        CirculationError::ResourceUnavailable {
            kind,
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CirculationError::NotFound {
            entity,
            id: id.into(),
        }
    }
}
