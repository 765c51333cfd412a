use crate::state::machine::Phase;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CsvImportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid file format. Please upload a CSV file.")]
    InvalidFileFormat { file_name: String },

    #[error("Row limit exceeded: the file contains more than 10,000 rows.")]
    RowLimitExceeded { rows: usize, max: usize },

    #[error("Invalid headers: {}", .invalid_headers.join(", "))]
    SchemaMismatch { invalid_headers: Vec<String> },

    #[error("Error fetching object fields: {0}")]
    SchemaFetchError(String),

    #[error("Error processing CSV data: {0}")]
    ProcessingError(String),

    #[error("Cannot {action} while importer is {from}")]
    InvalidTransition { from: Phase, action: &'static str },

    #[error("Import is not available: no valid file has been validated")]
    ImportNotReady,

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

pub type Result<T> = std::result::Result<T, CsvImportError>;

/// Coarse classification attached to errors reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The caller asked for something the file or importer state does not allow.
    Request,
    SchemaFetch,
    Processing,
    Internal,
}

impl CsvImportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CsvImportError::InvalidFileFormat { .. }
            | CsvImportError::RowLimitExceeded { .. }
            | CsvImportError::SchemaMismatch { .. }
            | CsvImportError::InvalidTransition { .. }
            | CsvImportError::ImportNotReady
            | CsvImportError::SessionNotFound(_)
            | CsvImportError::FileNotFound(_) => ErrorKind::Request,
            CsvImportError::SchemaFetchError(_) => ErrorKind::SchemaFetch,
            CsvImportError::ProcessingError(_)
            | CsvImportError::HttpError(_)
            | CsvImportError::JsonError(_) => ErrorKind::Processing,
            _ => ErrorKind::Internal,
        }
    }

    /// Processing failures can be resubmitted without choosing another file.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Processing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_mismatch_lists_headers_in_order() {
        let err = CsvImportError::SchemaMismatch {
            invalid_headers: vec!["phone".to_string(), "fax".to_string()],
        };
        assert_eq!(err.to_string(), "Invalid headers: phone, fax");
        assert_eq!(err.kind(), ErrorKind::Request);
    }

    #[test]
    fn only_processing_errors_are_recoverable() {
        assert!(CsvImportError::ProcessingError("timeout".into()).is_recoverable());
        assert!(!CsvImportError::InvalidFileFormat {
            file_name: "data.txt".into()
        }
        .is_recoverable());
        assert!(!CsvImportError::RowLimitExceeded {
            rows: 10_001,
            max: 10_000
        }
        .is_recoverable());
    }

    #[test]
    fn state_errors_are_request_errors() {
        assert_eq!(CsvImportError::ImportNotReady.kind(), ErrorKind::Request);
        assert_eq!(
            CsvImportError::SessionNotFound("s1".into()).kind(),
            ErrorKind::Request
        );
        assert_eq!(
            CsvImportError::DatabaseError("locked".into()).kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            serde_json::to_value(ErrorKind::SchemaFetch).unwrap(),
            "schema_fetch"
        );
    }
}
