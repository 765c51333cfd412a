pub mod config;
pub mod errors;

pub use config::{AppConfig, ComponentConfig};
pub use errors::{CsvImportError, ErrorKind, Result};

/// Trim surrounding whitespace and lowercase, the comparison form of headers
/// and schema field names.
pub fn normalize_token(value: &str) -> String {
    value.trim().to_lowercase()
}
