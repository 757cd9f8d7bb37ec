//! Export error taxonomy

use thiserror::Error;

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;

/// Errors raised while resolving fields or producing CSV output.
///
/// Errors are cloneable so a resolution failure can be cached and handed
/// back unchanged on every later access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    #[error("Unresolved field '{field}' on {kind}: no handler and no matching attribute")]
    UnresolvedField { kind: &'static str, field: String },

    #[error("Duplicate field '{field}' in export columns")]
    DuplicateField { field: String },

    #[error("No CSV adapter registered for {kind}")]
    AdapterNotRegistered { kind: &'static str },

    #[error("CSV encoding failed: {0}")]
    Encoding(String),
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        ExportError::Encoding(err.to_string())
    }
}
