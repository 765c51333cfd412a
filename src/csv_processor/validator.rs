use crate::csv_processor::reader::RawFile;
use crate::utils::{normalize_token, CsvImportError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Maximum number of lines in a file, header included.
pub const MAX_ROWS: usize = 10_000;

/// Normalized field names of one entity type, in fetch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaFieldSet {
    fields: Vec<String>,
    lookup: HashSet<String>,
}

impl SchemaFieldSet {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for field in fields {
            let normalized = normalize_token(field.as_ref());
            if set.lookup.insert(normalized.clone()) {
                set.fields.push(normalized);
            }
        }
        set
    }

    pub fn contains(&self, header: &str) -> bool {
        self.lookup.contains(&normalize_token(header))
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub normalized_headers: Vec<String>,
    pub invalid_headers: Vec<String>,
    pub error_messages: Vec<String>,
}

impl ValidationResult {
    fn failed(error: &CsvImportError) -> Self {
        Self {
            valid: false,
            normalized_headers: Vec::new(),
            invalid_headers: Vec::new(),
            error_messages: vec![error.to_string()],
        }
    }

    /// Result for a file rejected by the extension check; headers are never read.
    pub fn rejected_format(file_name: &str) -> Self {
        Self::failed(&CsvImportError::InvalidFileFormat {
            file_name: file_name.to_string(),
        })
    }
}

/// Number of lines as the validator counts them; a trailing newline adds an
/// empty last line.
pub fn row_count(content: &str) -> usize {
    content.split('\n').count()
}

pub fn validate(content: &str, schema: &SchemaFieldSet) -> ValidationResult {
    let rows = row_count(content);
    if rows > MAX_ROWS {
        return ValidationResult::failed(&CsvImportError::RowLimitExceeded {
            rows,
            max: MAX_ROWS,
        });
    }

    let header_row = content.split('\n').next().unwrap_or_default();
    let normalized_headers: Vec<String> = header_row.split(',').map(normalize_token).collect();

    let invalid_headers: Vec<String> = normalized_headers
        .iter()
        .filter(|h| !schema.contains(h))
        .cloned()
        .collect();

    let error_messages = if invalid_headers.is_empty() {
        Vec::new()
    } else {
        vec![CsvImportError::SchemaMismatch {
            invalid_headers: invalid_headers.clone(),
        }
        .to_string()]
    };

    ValidationResult {
        valid: invalid_headers.is_empty(),
        normalized_headers,
        invalid_headers,
        error_messages,
    }
}

/// Extension check followed by [`validate`].
pub fn validate_file(file: &RawFile, schema: &SchemaFieldSet) -> ValidationResult {
    if !file.has_csv_extension() {
        return ValidationResult::rejected_format(file.name());
    }
    validate(&file.text(), schema)
}
