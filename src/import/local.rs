use crate::csv_processor::parse_records;
use crate::import::ports::{ImportOutcome, ImportProcessor, ImportRequest, SchemaSource};
use crate::state::{ImportRecord, ImportStore};
use crate::utils::{normalize_token, CsvImportError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::info;
use uuid::Uuid;

/// Field names read from the `[schema.entities]` table of the config.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaSource {
    entities: HashMap<String, Vec<String>>,
}

impl StaticSchemaSource {
    pub fn new(entities: HashMap<String, Vec<String>>) -> Self {
        Self { entities }
    }

    pub fn with_entity(mut self, name: impl Into<String>, fields: &[&str]) -> Self {
        self.entities
            .insert(name.into(), fields.iter().map(|f| f.to_string()).collect());
        self
    }
}

#[async_trait]
impl SchemaSource for StaticSchemaSource {
    async fn field_names(&self, target_entity_type: &str) -> Result<Vec<String>> {
        self.entities
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(target_entity_type))
            .map(|(_, fields)| fields.clone())
            .ok_or_else(|| {
                CsvImportError::SchemaFetchError(format!(
                    "Unknown object: {}",
                    target_entity_type
                ))
            })
    }
}

/// Parses the content and stores it in the embedded import store. The whole
/// file is rejected if two columns normalize to the same name or any record
/// has a different field count than the header.
#[derive(Clone)]
pub struct LocalImportProcessor {
    store: ImportStore,
}

impl LocalImportProcessor {
    pub fn new(store: ImportStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ImportStore {
        &self.store
    }
}

#[async_trait]
impl ImportProcessor for LocalImportProcessor {
    async fn process(&self, request: &ImportRequest) -> Result<ImportOutcome> {
        let parsed = parse_records(request.content())?;
        let headers: Vec<String> = parsed.headers.iter().map(|h| normalize_token(h)).collect();

        let duplicates = duplicate_columns(&headers);
        if !duplicates.is_empty() {
            return Ok(ImportOutcome::failed(
                "Import failed: the file has duplicate columns.",
                vec![format!("Duplicate columns: {}", duplicates.join(", "))],
            ));
        }

        let error_messages: Vec<String> = parsed
            .records
            .iter()
            .filter(|r| r.fields.len() != headers.len())
            .map(|r| {
                format!(
                    "Row {}: expected {} fields, found {}",
                    r.line,
                    headers.len(),
                    r.fields.len()
                )
            })
            .collect();

        if !error_messages.is_empty() {
            return Ok(ImportOutcome::failed(
                format!(
                    "Import failed with {}.",
                    count_of(error_messages.len(), "invalid row")
                ),
                error_messages,
            ));
        }

        let rows: Vec<BTreeMap<String, String>> = parsed
            .records
            .into_iter()
            .map(|r| headers.iter().cloned().zip(r.fields).collect())
            .collect();
        let row_count = rows.len();

        let record = ImportRecord {
            import_id: Uuid::new_v4().to_string(),
            target_entity_type: request.target_entity_type().to_string(),
            batch_id: request.batch_id().map(String::from),
            headers,
            rows,
            imported_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        };

        let store = self.store.clone();
        let saved = record.clone();
        tokio::task::spawn_blocking(move || store.save_import(&saved))
            .await
            .map_err(|e| CsvImportError::DatabaseError(e.to_string()))??;

        info!(
            import_id = %record.import_id,
            entity = %record.target_entity_type,
            rows = row_count,
            "Stored import"
        );

        Ok(ImportOutcome::succeeded(format!(
            "Imported {}.",
            count_of(row_count, "record")
        )))
    }
}

/// Each repeated column name once, in order of first repetition.
fn duplicate_columns(headers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    for header in headers {
        if !seen.insert(header.as_str()) && !duplicates.contains(header) {
            duplicates.push(header.clone());
        }
    }
    duplicates
}

fn count_of(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", n, noun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_processor::{validate, RawFile, SchemaFieldSet};

    fn request(content: &str, batch_id: Option<&str>) -> ImportRequest {
        let file = RawFile::from_text("c.csv", content);
        let result = validate(&file.text(), &SchemaFieldSet::new(["name", "email"]));
        ImportRequest::from_validation(&file, &result, "Contact", batch_id.map(String::from))
            .unwrap()
    }

    fn processor(dir: &tempfile::TempDir) -> LocalImportProcessor {
        LocalImportProcessor::new(ImportStore::new(&dir.path().join("imports.redb")).unwrap())
    }

    #[tokio::test]
    async fn static_schema_lookup_ignores_case() {
        let source = StaticSchemaSource::default().with_entity("Contact", &["Name"]);
        assert_eq!(source.field_names("contact").await.unwrap(), vec!["Name"]);
        assert!(matches!(
            source.field_names("Account").await,
            Err(CsvImportError::SchemaFetchError(_))
        ));
    }

    #[tokio::test]
    async fn stores_rows_keyed_by_normalized_header() {
        let dir = tempfile::tempdir().unwrap();
        let processor = processor(&dir);

        let outcome = processor
            .process(&request("Name, Email\nJohn,j@x.com\nJane,j2@x.com\n", Some("b1")))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.message, "Imported 2 records.");

        let stored = processor.store().imports_for_batch("b1").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].headers, vec!["name", "email"]);
        assert_eq!(stored[0].rows[1]["email"], "j2@x.com");
    }

    #[tokio::test]
    async fn ragged_rows_fail_without_storing() {
        let dir = tempfile::tempdir().unwrap();
        let processor = processor(&dir);

        let outcome = processor
            .process(&request("Name,Email\nJohn\nJane,j@x.com,extra", None))
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(
            outcome.error_messages,
            vec![
                "Row 2: expected 2 fields, found 1",
                "Row 3: expected 2 fields, found 3"
            ]
        );
        assert!(processor.store().list_imports().unwrap().is_empty());
    }

    #[tokio::test]
    async fn columns_that_normalize_alike_fail_without_storing() {
        let dir = tempfile::tempdir().unwrap();
        let processor = processor(&dir);

        let outcome = processor
            .process(&request(
                "Name, name ,Email,EMAIL,NAME\nAlice,Bob,a@x.com,b@x.com,Carol",
                None,
            ))
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.error_messages, vec!["Duplicate columns: name, email"]);
        assert!(processor.store().list_imports().unwrap().is_empty());
    }

    #[tokio::test]
    async fn single_row_messages_are_singular() {
        let dir = tempfile::tempdir().unwrap();
        let processor = processor(&dir);

        let stored = processor
            .process(&request("Name,Email\nJohn,j@x.com", None))
            .await
            .unwrap();
        assert_eq!(stored.message, "Imported 1 record.");

        let rejected = processor
            .process(&request("Name,Email\nJohn", None))
            .await
            .unwrap();
        assert_eq!(rejected.message, "Import failed with 1 invalid row.");
    }
}
