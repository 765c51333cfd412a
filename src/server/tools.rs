use crate::csv_processor::RawFile;
use crate::import::{Collaborators, CsvImporter, RecordingNavigator, RecordingNotifier};
use crate::server::Backends;
use crate::state::{AppState, ImporterSession, SharedSession};
use crate::utils::{CsvImportError, ErrorKind};
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
    ErrorData as McpError,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "Parameters for creating an importer for one target object")]
pub struct OpenImporterParams {
    #[schemars(description = "API name of the object being imported (e.g., 'Contact')")]
    pub object_api_name: String,
    #[schemars(description = "Data import batch id; when set, advancing redirects to the batch review page")]
    pub batch_id: Option<String>,
    #[schemars(description = "Initial file validity flag supplied by the host (default: false)")]
    pub is_file_valid: Option<bool>,
    #[schemars(description = "Initial import completion flag supplied by the host (default: false)")]
    pub import_complete: Option<bool>,
    #[schemars(description = "Allow choosing a new file after a failed import (default: from config)")]
    pub reupload_after_failure: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "Parameters for choosing the CSV file to validate")]
pub struct UploadCsvParams {
    #[schemars(description = "Session ID returned by open_importer")]
    pub session_id: String,
    #[schemars(description = "Absolute path of the file to read")]
    pub file_path: Option<String>,
    #[schemars(description = "File name, required when content is given inline")]
    pub file_name: Option<String>,
    #[schemars(description = "File content, as an alternative to file_path")]
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "Parameters for listing locally stored imports")]
pub struct BatchImportsParams {
    #[schemars(description = "Data import batch id the imports were routed to")]
    pub batch_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "Parameters identifying an importer session")]
pub struct SessionParams {
    #[schemars(description = "Session ID returned by open_importer")]
    pub session_id: String,
}

fn to_mcp_error(e: CsvImportError) -> McpError {
    let kind = e.kind();
    let data = Some(serde_json::json!({
        "kind": kind,
        "recoverable": e.is_recoverable(),
    }));
    match kind {
        ErrorKind::Request => McpError::invalid_params(e.to_string(), data),
        _ => McpError::internal_error(e.to_string(), data),
    }
}

fn respond(value: serde_json::Value) -> Result<CallToolResult, McpError> {
    let json_result = serde_json::to_string_pretty(&value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json_result)]))
}

#[derive(Clone)]
pub struct CsvImporterServer {
    state: AppState,
    backends: Backends,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl CsvImporterServer {
    pub fn new(state: AppState, backends: Backends) -> Self {
        Self {
            state,
            backends,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "open_importer",
        description = "Create a CSV importer for an object. Fetches the object's field names, which every uploaded header is checked against. Returns session_id and the importer status."
    )]
    async fn open_importer_tool(
        &self,
        params: Parameters<OpenImporterParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.open_importer(params.0).await?)
    }

    #[tool(
        name = "upload_csv",
        description = "Choose the CSV file for a session, by path or inline content. Checks the .csv extension, the 10,000 row limit and that every header is a field of the object. Returns the validation result."
    )]
    async fn upload_csv_tool(
        &self,
        params: Parameters<UploadCsvParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.upload_csv(params.0).await?)
    }

    #[tool(
        name = "import_csv",
        description = "Submit the validated file to the import processor. Only available after a successful upload_csv, or to retry after a failed import."
    )]
    async fn import_csv_tool(
        &self,
        params: Parameters<SessionParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.import_csv(params.0).await?)
    }

    #[tool(
        name = "advance_workflow",
        description = "Move the host workflow on: finish it when no batch id is set, otherwise redirect to the batch review page."
    )]
    async fn advance_workflow_tool(
        &self,
        params: Parameters<SessionParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.advance_workflow(params.0).await?)
    }

    #[tool(
        name = "get_import_status",
        description = "Get the current phase, flags and messages of an importer session."
    )]
    async fn get_import_status_tool(
        &self,
        params: Parameters<SessionParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.get_import_status(params.0).await?)
    }

    #[tool(
        name = "close_importer",
        description = "Discard an importer session and its file content."
    )]
    async fn close_importer_tool(
        &self,
        params: Parameters<SessionParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.close_importer(params.0).await?)
    }

    #[tool(
        name = "list_batch_imports",
        description = "List the imports stored for a batch id. Only available when imports are kept in the local store."
    )]
    async fn list_batch_imports_tool(
        &self,
        params: Parameters<BatchImportsParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.list_batch_imports(params.0).await?)
    }

    pub fn router(&self) -> &ToolRouter<Self> {
        &self.tool_router
    }
}

impl CsvImporterServer {
    async fn session(&self, session_id: &str) -> Result<SharedSession, McpError> {
        self.state
            .get(session_id)
            .await
            .ok_or_else(|| to_mcp_error(CsvImportError::SessionNotFound(session_id.to_string())))
    }

    pub async fn open_importer(
        &self,
        params: OpenImporterParams,
    ) -> Result<serde_json::Value, McpError> {
        let mut config = self.state.config.component(params.object_api_name);
        config.batch_id = params.batch_id;
        config.is_file_valid = params.is_file_valid.unwrap_or(false);
        config.import_complete = params.import_complete.unwrap_or(false);
        if let Some(reupload) = params.reupload_after_failure {
            config.reupload_after_failure = reupload;
        }

        let notifier = RecordingNotifier::new();
        let navigator = RecordingNavigator::new();
        let collaborators = Collaborators {
            schema_source: self.backends.schema_source.clone(),
            processor: self.backends.processor.clone(),
            notifier: Arc::new(notifier.clone()),
            navigator: Arc::new(navigator.clone()),
        };

        let importer = CsvImporter::connect(config, collaborators).await;
        let status = importer.status();

        let session_id = Uuid::new_v4().to_string();
        self.state
            .insert(
                session_id.clone(),
                ImporterSession {
                    importer: Mutex::new(importer),
                    notifier: notifier.clone(),
                    navigator,
                },
            )
            .await;

        let open_sessions = self.state.len().await;
        tracing::info!(
            session_id = %session_id,
            entity = %status.object_api_name,
            open_sessions,
            "Opened importer"
        );

        Ok(serde_json::json!({
            "session_id": session_id,
            "status": status,
            "notifications": notifier.drain(),
        }))
    }

    pub async fn upload_csv(&self, params: UploadCsvParams) -> Result<serde_json::Value, McpError> {
        let session = self.session(&params.session_id).await?;
        let mut importer = session.importer.lock().await;

        let validation = match (params.file_path, params.content) {
            (Some(path), None) => importer.select_path(path).await,
            (None, Some(content)) => {
                let file_name = params.file_name.ok_or_else(|| {
                    McpError::invalid_params("file_name is required with inline content", None)
                })?;
                importer.select_file(RawFile::from_text(file_name, content))
            }
            _ => {
                return Err(McpError::invalid_params(
                    "Provide exactly one of file_path or content",
                    None,
                ))
            }
        }
        .map_err(to_mcp_error)?
        .clone();

        Ok(serde_json::json!({
            "validation": validation,
            "status": importer.status(),
            "notifications": session.notifier.drain(),
        }))
    }

    pub async fn import_csv(&self, params: SessionParams) -> Result<serde_json::Value, McpError> {
        let session = self.session(&params.session_id).await?;

        let (request, processor) = {
            let mut importer = session.importer.lock().await;
            let request = importer.begin_import().map_err(to_mcp_error)?;
            (request, importer.processor())
        };

        // The lock is released while the processor runs. The spawned task
        // finishes the import even if this call is dropped.
        let task_session = session.clone();
        let (outcome, status) = tokio::spawn(async move {
            let reply = processor.process(&request).await;
            let mut importer = task_session.importer.lock().await;
            let outcome = importer.finish_import(reply)?.clone();
            Ok::<_, CsvImportError>((outcome, importer.status()))
        })
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?
        .map_err(to_mcp_error)?;

        tracing::info!(
            session_id = %params.session_id,
            success = outcome.success,
            "Import finished"
        );

        Ok(serde_json::json!({
            "outcome": outcome,
            "status": status,
            "notifications": session.notifier.drain(),
        }))
    }

    pub async fn advance_workflow(
        &self,
        params: SessionParams,
    ) -> Result<serde_json::Value, McpError> {
        let session = self.session(&params.session_id).await?;
        let importer = session.importer.lock().await;

        let target = importer.advance();

        Ok(serde_json::json!({
            "navigation": target,
            "notifications": session.notifier.drain(),
        }))
    }

    pub async fn get_import_status(
        &self,
        params: SessionParams,
    ) -> Result<serde_json::Value, McpError> {
        let session = self.session(&params.session_id).await?;
        let importer = session.importer.lock().await;

        Ok(serde_json::json!({
            "status": importer.status(),
            "last_navigation": session.navigator.last(),
            "pending_notifications": session.notifier.snapshot(),
        }))
    }

    pub async fn close_importer(
        &self,
        params: SessionParams,
    ) -> Result<serde_json::Value, McpError> {
        self.state
            .remove(&params.session_id)
            .await
            .ok_or_else(|| to_mcp_error(CsvImportError::SessionNotFound(params.session_id.clone())))?;

        let open_sessions = self.state.len().await;
        tracing::info!(
            session_id = %params.session_id,
            open_sessions,
            "Closed importer"
        );

        Ok(serde_json::json!({
            "session_id": params.session_id,
            "status": "closed",
        }))
    }

    pub async fn list_batch_imports(
        &self,
        params: BatchImportsParams,
    ) -> Result<serde_json::Value, McpError> {
        let store = self.backends.store.clone().ok_or_else(|| {
            McpError::invalid_params("Imports are only listed from the local import store", None)
        })?;

        let batch_id = params.batch_id.clone();
        let records = tokio::task::spawn_blocking(move || store.imports_for_batch(&batch_id))
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?
            .map_err(to_mcp_error)?;

        let imports: Vec<serde_json::Value> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "import_id": r.import_id,
                    "object_api_name": r.target_entity_type,
                    "headers": r.headers,
                    "row_count": r.rows.len(),
                    "imported_at": r.imported_at,
                })
            })
            .collect();

        Ok(serde_json::json!({
            "batch_id": params.batch_id,
            "imports": imports,
        }))
    }
}

#[tool_handler]
impl rmcp::handler::server::ServerHandler for CsvImporterServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                r#"CSV Import MCP Server

Workflow:
1. open_importer - Create an importer for an object (e.g. Contact), get session_id
2. upload_csv - Choose the CSV file; headers are checked against the object's fields
3. import_csv - Submit the validated file (retry here after a failed import)
4. advance_workflow - Finish, or get the batch review URL when a batch id is set
5. list_batch_imports - List the imports stored locally for a batch id

Only one import per session runs at a time; import_csv fails while another is in progress.

Files must end in .csv and contain at most 10,000 lines including the header."#
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{ImportOutcome, ImportProcessor, ImportRequest, StaticSchemaSource};
    use crate::state::ImportStore;
    use crate::utils::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn contacts() -> StaticSchemaSource {
        StaticSchemaSource::default().with_entity("Contact", &["Name", "Email"])
    }

    fn server(dir: &tempfile::TempDir) -> CsvImporterServer {
        let backends = Backends::local(
            Arc::new(contacts()),
            ImportStore::new(&dir.path().join("imports.redb")).unwrap(),
        );
        CsvImporterServer::new(AppState::default(), backends)
    }

    /// Takes a while to answer and then reports a server error.
    #[derive(Default)]
    struct SlowFailingProcessor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ImportProcessor for SlowFailingProcessor {
        async fn process(&self, _request: &ImportRequest) -> Result<ImportOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(200)).await;
            Err(CsvImportError::ProcessingError("gateway timeout".to_string()))
        }
    }

    async fn open(server: &CsvImporterServer, batch_id: Option<&str>) -> String {
        let opened = server
            .open_importer(OpenImporterParams {
                object_api_name: "Contact".to_string(),
                batch_id: batch_id.map(String::from),
                is_file_valid: None,
                import_complete: None,
                reupload_after_failure: None,
            })
            .await
            .unwrap();
        opened["session_id"].as_str().unwrap().to_string()
    }

    fn inline(session_id: &str, file_name: &str, content: &str) -> UploadCsvParams {
        UploadCsvParams {
            session_id: session_id.to_string(),
            file_path: None,
            file_name: Some(file_name.to_string()),
            content: Some(content.to_string()),
        }
    }

    #[tokio::test]
    async fn upload_then_import_then_advance() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(&dir);
        let session_id = open(&server, None).await;

        let uploaded = server
            .upload_csv(inline(&session_id, "c.csv", "Name,Email\nJohn,j@x.com"))
            .await
            .unwrap();
        assert_eq!(uploaded["validation"]["valid"], true);
        assert_eq!(uploaded["status"]["show_import_button"], true);
        assert_eq!(uploaded["notifications"].as_array().unwrap().len(), 1);

        let imported = server
            .import_csv(SessionParams {
                session_id: session_id.clone(),
            })
            .await
            .unwrap();
        assert_eq!(imported["outcome"]["success"], true);
        assert_eq!(imported["status"]["import_complete"], true);
        assert_eq!(imported["status"]["disable_upload_input"], true);

        let advanced = server
            .advance_workflow(SessionParams { session_id })
            .await
            .unwrap();
        assert_eq!(advanced["navigation"]["action"], "finish");
    }

    #[tokio::test]
    async fn import_before_valid_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(&dir);
        let session_id = open(&server, Some("b1")).await;

        server
            .upload_csv(inline(&session_id, "c.csv", "Name,Phone\nJohn,555"))
            .await
            .unwrap();

        assert!(server
            .import_csv(SessionParams {
                session_id: session_id.clone()
            })
            .await
            .is_err());

        let advanced = server
            .advance_workflow(SessionParams { session_id })
            .await
            .unwrap();
        assert_eq!(
            advanced["navigation"]["url"],
            "/apex/npsp__BDI_DataImport?batchId=b1&retURL=/b1"
        );
    }

    #[tokio::test]
    async fn upload_needs_exactly_one_source() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(&dir);
        let session_id = open(&server, None).await;

        let result = server
            .upload_csv(UploadCsvParams {
                session_id,
                file_path: Some("/tmp/a.csv".to_string()),
                file_name: None,
                content: Some("Name".to_string()),
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn closed_session_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(&dir);
        let session_id = open(&server, None).await;

        server
            .close_importer(SessionParams {
                session_id: session_id.clone(),
            })
            .await
            .unwrap();
        assert_eq!(server.state.len().await, 0);

        let err = server
            .get_import_status(SessionParams { session_id })
            .await
            .unwrap_err();
        let data = err.data.unwrap();
        assert_eq!(data["kind"], "request");
        assert_eq!(data["recoverable"], false);
    }

    #[tokio::test]
    async fn second_import_is_rejected_while_first_is_outstanding() {
        let processor = Arc::new(SlowFailingProcessor::default());
        let backends = Backends {
            schema_source: Arc::new(contacts()),
            processor: processor.clone(),
            store: None,
        };
        let server = CsvImporterServer::new(AppState::default(), backends);
        let session_id = open(&server, None).await;
        server
            .upload_csv(inline(&session_id, "c.csv", "Name,Email\nJohn,j@x.com"))
            .await
            .unwrap();

        let first = tokio::spawn({
            let server = server.clone();
            let params = SessionParams {
                session_id: session_id.clone(),
            };
            async move { server.import_csv(params).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let during = server
            .get_import_status(SessionParams {
                session_id: session_id.clone(),
            })
            .await
            .unwrap();
        assert_eq!(during["status"]["import_in_progress"], true);
        assert_eq!(during["status"]["disable_import_button"], true);
        assert_eq!(during["status"]["disable_upload_input"], true);

        let err = server
            .import_csv(SessionParams {
                session_id: session_id.clone(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.data.unwrap()["kind"], "request");
        assert!(server
            .upload_csv(inline(&session_id, "d.csv", "Name\nJane"))
            .await
            .is_err());

        let finished = first.await.unwrap().unwrap();
        assert_eq!(finished["outcome"]["success"], false);
        assert_eq!(
            finished["outcome"]["message"],
            "Error processing CSV data: gateway timeout"
        );
        assert_eq!(finished["status"]["import_in_progress"], false);
        assert_eq!(finished["status"]["disable_import_button"], false);
        assert_eq!(processor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn batch_imports_are_listed_from_the_local_store() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(&dir);
        let session_id = open(&server, Some("b7")).await;

        server
            .upload_csv(inline(&session_id, "c.csv", "Name,Email\nJohn,j@x.com\nJane,k@x.com"))
            .await
            .unwrap();
        server
            .import_csv(SessionParams { session_id })
            .await
            .unwrap();

        let listed = server
            .list_batch_imports(BatchImportsParams {
                batch_id: "b7".to_string(),
            })
            .await
            .unwrap();
        let imports = listed["imports"].as_array().unwrap();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0]["object_api_name"], "Contact");
        assert_eq!(imports[0]["row_count"], 2);

        let other = server
            .list_batch_imports(BatchImportsParams {
                batch_id: "b8".to_string(),
            })
            .await
            .unwrap();
        assert!(other["imports"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_listing_needs_the_local_store() {
        let backends = Backends {
            schema_source: Arc::new(contacts()),
            processor: Arc::new(SlowFailingProcessor::default()),
            store: None,
        };
        let server = CsvImporterServer::new(AppState::default(), backends);

        assert!(server
            .list_batch_imports(BatchImportsParams {
                batch_id: "b1".to_string(),
            })
            .await
            .is_err());
    }
}
