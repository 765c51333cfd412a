use crate::import::ports::{ImportOutcome, ImportProcessor, ImportRequest, SchemaSource};
use crate::utils::{CsvImportError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::warn;

fn build_client(timeout_seconds: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()?)
}

async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("endpoint returned {}: {}", status, body)
}

/// Fetches field names with `GET {endpoint}?objectName={entity}`.
pub struct HttpSchemaSource {
    client: Client,
    endpoint: String,
}

impl HttpSchemaSource {
    pub fn new(endpoint: impl Into<String>, timeout_seconds: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_seconds)?,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl SchemaSource for HttpSchemaSource {
    async fn field_names(&self, target_entity_type: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("objectName", target_entity_type)])
            .send()
            .await
            .map_err(|e| CsvImportError::SchemaFetchError(e.to_string()))?;

        if !response.status().is_success() {
            let err = error_body(response).await;
            warn!(entity = %target_entity_type, error = %err, "Schema endpoint rejected request");
            return Err(CsvImportError::SchemaFetchError(err));
        }

        response
            .json::<Vec<String>>()
            .await
            .map_err(|e| CsvImportError::SchemaFetchError(e.to_string()))
    }
}

/// Posts `{csvContent, objectApiName, batchId}` and reads back
/// `{success, errorMessages, message}`.
pub struct HttpImportProcessor {
    client: Client,
    endpoint: String,
}

impl HttpImportProcessor {
    pub fn new(endpoint: impl Into<String>, timeout_seconds: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_seconds)?,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ImportProcessor for HttpImportProcessor {
    async fn process(&self, request: &ImportRequest) -> Result<ImportOutcome> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CsvImportError::ProcessingError(error_body(response).await));
        }

        let outcome: ImportOutcome = response.json().await?;
        Ok(outcome)
    }
}
