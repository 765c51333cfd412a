use crate::utils::{CsvImportError, Result};
use csv::StringRecord;
use std::path::Path;

pub const CSV_EXTENSION: &str = ".csv";

/// A file picked by the user, held only for one validation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    name: String,
    bytes: Vec<u8>,
}

impl RawFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, text.into().into_bytes())
    }

    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !file_exists(path) {
            return Err(CsvImportError::FileNotFound(path.display().to_string()));
        }

        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self { name, bytes })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decodes as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn has_csv_extension(&self) -> bool {
        has_csv_extension(&self.name)
    }
}

/// Extension check is case-insensitive: `report.CSV` is accepted.
pub fn has_csv_extension(file_name: &str) -> bool {
    file_name.to_lowercase().ends_with(CSV_EXTENSION)
}

pub fn file_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}

/// Records parsed with full CSV quoting rules, used when content is persisted.
#[derive(Debug, Clone)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub records: Vec<ParsedRecord>,
}

#[derive(Debug, Clone)]
pub struct ParsedRecord {
    /// 1-based line of the record in the source, header is line 1.
    pub line: u64,
    pub fields: Vec<String>,
}

pub fn parse_records(content: &str) -> Result<ParsedCsv> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = string_record_to_vec(reader.headers()?);

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        records.push(ParsedRecord {
            line,
            fields: string_record_to_vec(&record),
        });
    }

    Ok(ParsedCsv { headers, records })
}

pub fn string_record_to_vec(record: &StringRecord) -> Vec<String> {
    record.iter().map(|s| s.to_string()).collect()
}
