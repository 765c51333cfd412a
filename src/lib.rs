pub mod csv_processor;
pub mod import;
pub mod server;
pub mod state;
pub mod utils;

pub use csv_processor::{validate, RawFile, SchemaFieldSet, ValidationResult};
pub use import::{Collaborators, CsvImporter, ImportOutcome, ImportRequest, NavigationTarget};
pub use server::{Backends, CsvImporterServer};
pub use state::{AppState, ImportStore, Phase};
pub use utils::{AppConfig, ComponentConfig, CsvImportError, Result};
