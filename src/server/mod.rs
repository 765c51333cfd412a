pub mod http;
pub mod tools;

pub use http::http_router;
pub use tools::CsvImporterServer;

use crate::import::{
    HttpImportProcessor, HttpSchemaSource, ImportProcessor, LocalImportProcessor, SchemaSource,
    StaticSchemaSource,
};
use crate::state::ImportStore;
use crate::utils::{AppConfig, Result};
use std::sync::Arc;
use tracing::info;

/// Schema source and processor shared by every importer the server creates.
/// `store` is set when imports are kept locally.
#[derive(Clone)]
pub struct Backends {
    pub schema_source: Arc<dyn SchemaSource>,
    pub processor: Arc<dyn ImportProcessor>,
    pub store: Option<ImportStore>,
}

impl Backends {
    pub fn local(schema_source: Arc<dyn SchemaSource>, store: ImportStore) -> Self {
        Self {
            schema_source,
            processor: Arc::new(LocalImportProcessor::new(store.clone())),
            store: Some(store),
        }
    }
}

impl Backends {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let schema_source: Arc<dyn SchemaSource> = match &config.schema.endpoint {
            Some(endpoint) => {
                info!(endpoint = %endpoint, "Using remote schema source");
                Arc::new(HttpSchemaSource::new(
                    endpoint.clone(),
                    config.schema.timeout_seconds,
                )?)
            }
            None => {
                info!(
                    entities = config.schema.entities.len(),
                    "Using configured schema entities"
                );
                Arc::new(StaticSchemaSource::new(config.schema.entities.clone()))
            }
        };

        match &config.processor.endpoint {
            Some(endpoint) => {
                info!(endpoint = %endpoint, "Using remote import processor");
                Ok(Self {
                    schema_source,
                    processor: Arc::new(HttpImportProcessor::new(
                        endpoint.clone(),
                        config.processor.timeout_seconds,
                    )?),
                    store: None,
                })
            }
            None => {
                info!(db_path = %config.processor.db_path.display(), "Using local import store");
                Ok(Self::local(
                    schema_source,
                    ImportStore::new(&config.processor.db_path)?,
                ))
            }
        }
    }
}
