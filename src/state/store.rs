use crate::utils::{CsvImportError, Result};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

const IMPORTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("imports");

/// One accepted import as persisted by the local processor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportRecord {
    pub import_id: String,
    pub target_entity_type: String,
    pub batch_id: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<BTreeMap<String, String>>,
    pub imported_at: u64,
}

#[derive(Clone)]
pub struct ImportStore {
    db: Arc<Database>,
}

impl ImportStore {
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(db_path)
            .map_err(|e| CsvImportError::DatabaseError(e.to_string()))?;

        let write_txn = db
            .begin_write()
            .map_err(|e| CsvImportError::DatabaseError(e.to_string()))?;
        {
            let _ = write_txn
                .open_table(IMPORTS_TABLE)
                .map_err(|e| CsvImportError::DatabaseError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| CsvImportError::DatabaseError(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    pub fn save_import(&self, record: &ImportRecord) -> Result<()> {
        let data = serde_json::to_vec(record)
            .map_err(|e| CsvImportError::SerializationError(e.to_string()))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| CsvImportError::DatabaseError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(IMPORTS_TABLE)
                .map_err(|e| CsvImportError::DatabaseError(e.to_string()))?;
            table
                .insert(record.import_id.as_str(), data.as_slice())
                .map_err(|e| CsvImportError::DatabaseError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| CsvImportError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    pub fn load_import(&self, import_id: &str) -> Result<Option<ImportRecord>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| CsvImportError::DatabaseError(e.to_string()))?;

        let table = read_txn
            .open_table(IMPORTS_TABLE)
            .map_err(|e| CsvImportError::DatabaseError(e.to_string()))?;

        match table.get(import_id) {
            Ok(Some(data)) => {
                let record: ImportRecord = serde_json::from_slice(data.value())
                    .map_err(|e| CsvImportError::SerializationError(e.to_string()))?;
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(CsvImportError::DatabaseError(e.to_string())),
        }
    }

    pub fn list_imports(&self) -> Result<Vec<String>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| CsvImportError::DatabaseError(e.to_string()))?;

        let table = read_txn
            .open_table(IMPORTS_TABLE)
            .map_err(|e| CsvImportError::DatabaseError(e.to_string()))?;

        let mut imports = Vec::new();
        let iter = table
            .iter()
            .map_err(|e| CsvImportError::DatabaseError(e.to_string()))?;

        for result in iter {
            let (key, _) = result.map_err(|e| CsvImportError::DatabaseError(e.to_string()))?;
            imports.push(key.value().to_string());
        }

        Ok(imports)
    }

    /// Imports routed to one batch, oldest first.
    pub fn imports_for_batch(&self, batch_id: &str) -> Result<Vec<ImportRecord>> {
        let mut records = Vec::new();
        for import_id in self.list_imports()? {
            if let Some(record) = self.load_import(&import_id)? {
                if record.batch_id.as_deref() == Some(batch_id) {
                    records.push(record);
                }
            }
        }
        records.sort_by_key(|r| r.imported_at);
        Ok(records)
    }
}
