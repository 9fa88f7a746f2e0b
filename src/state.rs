// Application state for interview-assist
//
// Constructed once at startup and passed by reference to whatever needs it.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::account::AccountFlags;
use crate::assistant::providers::GeminiProvider;
use crate::assistant::{AnswerProvider, AssistantClient};
use crate::config::{AssistantConfig, CaptureStrategy};
use crate::database::DatabaseManager;
use crate::recording::LiveSessionStore;
use crate::speech::{EngineFactory, SpeechCapture};

pub struct AppState {
    database: Arc<DatabaseManager>,
    engine_factory: Arc<dyn EngineFactory>,
    pub account: AccountFlags,
    pub assistant: AssistantClient,
    pub live_sessions: LiveSessionStore,
}

impl AppState {
    /// Wire everything around an opened database, using the Gemini provider
    pub fn initialize(database: Arc<DatabaseManager>, engine_factory: Arc<dyn EngineFactory>) -> Result<Self> {
        let config = AssistantConfig::load(&database)?;
        let provider = GeminiProvider::new(config).context("Failed to build Gemini provider")?;
        Self::with_provider(database, engine_factory, Arc::new(provider))
    }

    pub fn with_provider(
        database: Arc<DatabaseManager>,
        engine_factory: Arc<dyn EngineFactory>,
        provider: Arc<dyn AnswerProvider>,
    ) -> Result<Self> {
        let account = AccountFlags::load(database.clone())?;
        let assistant = AssistantClient::new(provider, account.clone());
        let live_sessions = LiveSessionStore::new(database.clone());

        log::info!("Application state initialized");
        Ok(Self {
            database,
            engine_factory,
            account,
            assistant,
            live_sessions,
        })
    }

    pub fn database(&self) -> &DatabaseManager {
        &self.database
    }

    /// Start a capture using the persisted strategy (or an explicit preset)
    pub fn spawn_capture(&self, preset: Option<&str>) -> SpeechCapture {
        let strategy = preset
            .and_then(CaptureStrategy::preset)
            .unwrap_or_else(|| CaptureStrategy::load(&self.database));
        SpeechCapture::spawn(self.engine_factory.clone(), strategy)
    }
}
