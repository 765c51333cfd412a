pub mod machine;
pub mod store;

pub use machine::{ImportMachine, Phase, Transition};
pub use store::{ImportRecord, ImportStore};

use crate::import::{CsvImporter, RecordingNavigator, RecordingNotifier};
use crate::utils::AppConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// One importer with the recorders its notifications and navigation go to.
pub struct ImporterSession {
    pub importer: Mutex<CsvImporter>,
    pub notifier: RecordingNotifier,
    pub navigator: RecordingNavigator,
}

pub type SharedSession = Arc<ImporterSession>;

#[derive(Clone, Default)]
pub struct AppState {
    pub config: AppConfig,
    pub sessions: Arc<RwLock<HashMap<String, SharedSession>>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn insert(&self, session_id: String, session: ImporterSession) -> SharedSession {
        let shared = Arc::new(session);
        self.sessions
            .write()
            .await
            .insert(session_id, shared.clone());
        shared
    }

    pub async fn get(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn remove(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions.write().await.remove(session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
