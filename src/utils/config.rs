use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

pub const DEFAULT_BATCH_REVIEW_URL_TEMPLATE: &str =
    "/apex/npsp__BDI_DataImport?batchId={batch_id}&retURL=/{batch_id}";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub schema: SchemaConfig,
    pub processor: ProcessorConfig,
    pub importer: ImporterDefaults,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
}

/// Where field names come from. When `endpoint` is set the remote source is
/// used and `entities` is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub endpoint: Option<String>,
    pub timeout_seconds: u64,
    pub entities: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub endpoint: Option<String>,
    pub timeout_seconds: u64,
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImporterDefaults {
    pub batch_review_url_template: String,
    pub reupload_after_failure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "csv-import-mcp".to_string(),
            version: "0.1.0".to_string(),
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_seconds: 30,
            entities: HashMap::new(),
        }
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_seconds: 120,
            db_path: PathBuf::from("./data/imports.redb"),
        }
    }
}

impl Default for ImporterDefaults {
    fn default() -> Self {
        Self {
            batch_review_url_template: DEFAULT_BATCH_REVIEW_URL_TEMPLATE.to_string(),
            reupload_after_failure: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &str) -> crate::utils::errors::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::utils::errors::CsvImportError::ConfigError(e.to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> crate::utils::errors::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::utils::errors::CsvImportError::ConfigError(e.to_string()))
    }

    pub fn load_or_default(path: Option<&str>) -> Self {
        if let Some(p) = path {
            Self::load_from_file(p).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    /// Per-instance configuration for a new importer, seeded from the
    /// `[importer]` defaults.
    pub fn component(&self, object_api_name: impl Into<String>) -> ComponentConfig {
        ComponentConfig {
            object_api_name: object_api_name.into(),
            is_file_valid: false,
            import_complete: false,
            batch_id: None,
            reupload_after_failure: self.importer.reupload_after_failure,
            batch_review_url_template: self.importer.batch_review_url_template.clone(),
        }
    }
}

/// Inputs supplied by the host when an importer is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub object_api_name: String,
    pub is_file_valid: bool,
    pub import_complete: bool,
    pub batch_id: Option<String>,
    pub reupload_after_failure: bool,
    pub batch_review_url_template: String,
}

impl ComponentConfig {
    pub fn new(object_api_name: impl Into<String>) -> Self {
        AppConfig::default().component(object_api_name)
    }

    pub fn with_batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    /// Blank batch ids count as absent.
    pub fn batch_id(&self) -> Option<&str> {
        self.batch_id.as_deref().filter(|b| !b.trim().is_empty())
    }

    pub fn batch_review_url(&self, batch_id: &str) -> String {
        self.batch_review_url_template.replace("{batch_id}", batch_id)
    }
}
