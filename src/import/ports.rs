use crate::csv_processor::{RawFile, ValidationResult};
use crate::utils::{CsvImportError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Validated content on its way to an import processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRequest {
    #[serde(rename = "csvContent")]
    content: String,
    #[serde(rename = "objectApiName")]
    target_entity_type: String,
    #[serde(rename = "batchId", skip_serializing_if = "Option::is_none")]
    batch_id: Option<String>,
}

impl ImportRequest {
    /// Refuses files whose latest validation did not pass.
    pub fn from_validation(
        file: &RawFile,
        validation: &ValidationResult,
        target_entity_type: impl Into<String>,
        batch_id: Option<String>,
    ) -> Result<Self> {
        if !validation.valid {
            return Err(CsvImportError::ImportNotReady);
        }

        Ok(Self {
            content: file.text(),
            target_entity_type: target_entity_type.into(),
            batch_id,
        })
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn target_entity_type(&self) -> &str {
        &self.target_entity_type
    }

    pub fn batch_id(&self) -> Option<&str> {
        self.batch_id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub success: bool,
    #[serde(default)]
    pub error_messages: Vec<String>,
    #[serde(default)]
    pub message: String,
}

impl ImportOutcome {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            error_messages: Vec::new(),
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>, error_messages: Vec<String>) -> Self {
        Self {
            success: false,
            error_messages,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub variant: Variant,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            title: "Success".to_string(),
            message: message.into(),
            variant: Variant::Success,
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            variant: Variant::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NavigationTarget {
    Finish,
    Redirect { url: String },
}

#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn field_names(&self, target_entity_type: &str) -> Result<Vec<String>>;
}

/// An `Err` is a transport-level failure; `Ok` with `success == false` is an
/// application-level one.
#[async_trait]
pub trait ImportProcessor: Send + Sync {
    async fn process(&self, request: &ImportRequest) -> Result<ImportOutcome>;
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

pub trait WorkflowNavigator: Send + Sync {
    fn finish(&self);
    fn redirect(&self, url: &str);
}
