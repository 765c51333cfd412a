pub mod client;
pub mod local;
pub mod notify;
pub mod ports;

pub use client::{HttpImportProcessor, HttpSchemaSource};
pub use local::{LocalImportProcessor, StaticSchemaSource};
pub use notify::{RecordingNavigator, RecordingNotifier};
pub use ports::{
    ImportOutcome, ImportProcessor, ImportRequest, NavigationTarget, Notification,
    NotificationSink, SchemaSource, Variant, WorkflowNavigator,
};

use crate::csv_processor::{validate_file, RawFile, SchemaFieldSet, ValidationResult};
use crate::state::{ImportMachine, Phase, Transition};
use crate::utils::{ComponentConfig, CsvImportError, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub const VALID_FILE_MESSAGE: &str = "File is valid and ready for processing.";
pub const IMPORT_SUCCESS_MESSAGE: &str = "CSV Imported Successfully!";

/// The host-provided services an importer talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub schema_source: Arc<dyn SchemaSource>,
    pub processor: Arc<dyn ImportProcessor>,
    pub notifier: Arc<dyn NotificationSink>,
    pub navigator: Arc<dyn WorkflowNavigator>,
}

/// One CSV import component: validates a chosen file against the entity's
/// fields and forwards it to the processor on request.
pub struct CsvImporter {
    config: ComponentConfig,
    collaborators: Collaborators,
    schema: SchemaFieldSet,
    machine: ImportMachine,
    file: Option<RawFile>,
    validation: Option<ValidationResult>,
    last_outcome: Option<ImportOutcome>,
    error_messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImporterStatus {
    pub object_api_name: String,
    pub batch_id: Option<String>,
    pub phase: Phase,
    pub file_name: Option<String>,
    pub schema_field_count: usize,
    pub is_file_valid: bool,
    pub import_complete: bool,
    pub import_in_progress: bool,
    pub show_import_button: bool,
    pub disable_upload_input: bool,
    pub disable_import_button: bool,
    pub is_batch_id_null: bool,
    pub error_messages: Vec<String>,
    pub last_outcome: Option<ImportOutcome>,
}

impl CsvImporter {
    pub fn new(config: ComponentConfig, collaborators: Collaborators) -> Self {
        let machine = ImportMachine::resume(config.reupload_after_failure, config.import_complete);
        Self {
            config,
            collaborators,
            schema: SchemaFieldSet::default(),
            machine,
            file: None,
            validation: None,
            last_outcome: None,
            error_messages: Vec::new(),
        }
    }

    /// Creates the importer and fetches its schema.
    pub async fn connect(config: ComponentConfig, collaborators: Collaborators) -> Self {
        let mut importer = Self::new(config, collaborators);
        importer.load_schema().await;
        importer
    }

    /// On failure the schema stays empty, so every header fails validation
    /// until a later fetch succeeds.
    pub async fn load_schema(&mut self) {
        let entity = self.config.object_api_name.clone();
        match self.collaborators.schema_source.field_names(&entity).await {
            Ok(fields) => {
                self.schema = SchemaFieldSet::new(fields);
                info!(entity = %entity, fields = self.schema.len(), "Loaded schema");
            }
            Err(e) => {
                warn!(entity = %entity, error = %e, "Failed to fetch schema");
                let message = match e {
                    CsvImportError::SchemaFetchError(msg) => msg,
                    other => other.to_string(),
                };
                self.collaborators
                    .notifier
                    .notify(Notification::error("Error fetching object fields", message));
            }
        }
    }

    pub async fn select_path(&mut self, path: impl AsRef<Path>) -> Result<&ValidationResult> {
        self.machine.ensure(Transition::SelectFile)?;
        let file = RawFile::open(path).await?;
        self.select_file(file)
    }

    /// Runs the extension, row-limit and header checks and emits one
    /// notification. Only fails when file selection is currently disabled.
    pub fn select_file(&mut self, file: RawFile) -> Result<&ValidationResult> {
        self.machine.apply(Transition::SelectFile)?;

        let result = validate_file(&file, &self.schema);
        self.machine.apply(Transition::Validated {
            valid: result.valid,
        })?;

        info!(
            file = %file.name(),
            bytes = file.len(),
            valid = result.valid,
            invalid_headers = result.invalid_headers.len(),
            "Validated file"
        );

        self.error_messages = result.error_messages.clone();
        self.last_outcome = None;
        self.file = Some(file);

        let notification = if result.valid {
            Notification::success(VALID_FILE_MESSAGE)
        } else {
            Notification::error("Error", result.error_messages.join("; "))
        };
        self.collaborators.notifier.notify(notification);

        Ok(self.validation.insert(result))
    }

    /// Moves into the submitting phase and returns the request to send.
    /// Submission stays disabled until [`CsvImporter::finish_import`] runs.
    pub fn begin_import(&mut self) -> Result<ImportRequest> {
        let request = match (&self.file, &self.validation) {
            (Some(file), Some(validation)) => ImportRequest::from_validation(
                file,
                validation,
                self.config.object_api_name.clone(),
                self.config.batch_id().map(String::from),
            )?,
            _ => return Err(CsvImportError::ImportNotReady),
        };

        self.machine.apply(Transition::Submit)?;
        info!(
            entity = %request.target_entity_type(),
            batch_id = ?request.batch_id(),
            "Submitting import"
        );
        Ok(request)
    }

    /// Records the processor's reply and leaves the submitting phase.
    /// Transport failures are folded into a failed outcome.
    pub fn finish_import(&mut self, reply: Result<ImportOutcome>) -> Result<&ImportOutcome> {
        let outcome = match reply {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Import processor failed");
                let message = match e {
                    CsvImportError::ProcessingError(_) => e.to_string(),
                    other => CsvImportError::ProcessingError(other.to_string()).to_string(),
                };
                ImportOutcome::failed(message.clone(), vec![message])
            }
        };

        self.machine.apply(Transition::Finish {
            success: outcome.success,
        })?;

        if outcome.success {
            self.collaborators
                .notifier
                .notify(Notification::success(IMPORT_SUCCESS_MESSAGE));
        } else {
            self.error_messages = outcome.error_messages.clone();
            let message = if outcome.message.is_empty() {
                outcome.error_messages.join("; ")
            } else {
                outcome.message.clone()
            };
            self.collaborators
                .notifier
                .notify(Notification::error("Error", message));
        }

        Ok(self.last_outcome.insert(outcome))
    }

    /// Submits the validated file and waits for the processor.
    pub async fn import(&mut self) -> Result<&ImportOutcome> {
        let request = self.begin_import()?;
        let reply = self.collaborators.processor.process(&request).await;
        self.finish_import(reply)
    }

    /// Finishes the host workflow, or sends the user to the batch review page
    /// when a batch id is set.
    pub fn advance(&self) -> NavigationTarget {
        match self.config.batch_id() {
            None => {
                self.collaborators.navigator.finish();
                NavigationTarget::Finish
            }
            Some(batch_id) => {
                let url = self.config.batch_review_url(batch_id);
                self.collaborators.navigator.redirect(&url);
                NavigationTarget::Redirect { url }
            }
        }
    }

    pub fn processor(&self) -> Arc<dyn ImportProcessor> {
        self.collaborators.processor.clone()
    }

    pub fn config(&self) -> &ComponentConfig {
        &self.config
    }

    pub fn schema(&self) -> &SchemaFieldSet {
        &self.schema
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    pub fn validation(&self) -> Option<&ValidationResult> {
        self.validation.as_ref()
    }

    pub fn last_outcome(&self) -> Option<&ImportOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn error_messages(&self) -> &[String] {
        &self.error_messages
    }

    /// Falls back to the host-supplied flag until a file has been checked.
    pub fn is_file_valid(&self) -> bool {
        self.validation
            .as_ref()
            .map(|v| v.valid)
            .unwrap_or(self.config.is_file_valid)
    }

    pub fn import_complete(&self) -> bool {
        self.machine.complete()
    }

    pub fn import_in_progress(&self) -> bool {
        self.machine.in_progress()
    }

    pub fn show_import_button(&self) -> bool {
        self.machine.submit_enabled()
    }

    pub fn disable_upload_input(&self) -> bool {
        !self.machine.upload_enabled()
    }

    pub fn disable_import_button(&self) -> bool {
        self.import_in_progress() || !self.show_import_button()
    }

    pub fn is_batch_id_null(&self) -> bool {
        self.config.batch_id().is_none()
    }

    pub fn status(&self) -> ImporterStatus {
        ImporterStatus {
            object_api_name: self.config.object_api_name.clone(),
            batch_id: self.config.batch_id().map(String::from),
            phase: self.phase(),
            file_name: self.file.as_ref().map(|f| f.name().to_string()),
            schema_field_count: self.schema.len(),
            is_file_valid: self.is_file_valid(),
            import_complete: self.import_complete(),
            import_in_progress: self.import_in_progress(),
            show_import_button: self.show_import_button(),
            disable_upload_input: self.disable_upload_input(),
            disable_import_button: self.disable_import_button(),
            is_batch_id_null: self.is_batch_id_null(),
            error_messages: self.error_messages.clone(),
            last_outcome: self.last_outcome.clone(),
        }
    }
}
