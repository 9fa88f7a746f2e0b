//! Runtime configuration: capture strategy presets and assistant settings
//!
//! Both are persisted in the settings table; the assistant API key may also
//! come from the environment.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::database::DatabaseManager;

const CAPTURE_STRATEGY_KEY: &str = "capture_strategy";
const ASSISTANT_CONFIG_KEY: &str = "assistant_config";
const API_KEY_SETTING: &str = "assistant_api_key";
const API_KEY_ENV_VARS: [&str; 2] = ["INTERVIEW_ASSIST_API_KEY", "GEMINI_API_KEY"];

/// Tuning knobs for the speech capture pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureStrategy {
    /// Deliver provisional hypotheses to the transcript
    pub interim_results_enabled: bool,
    /// Minimum spacing between processed interim-only updates
    pub throttle_ms: u64,
    /// Network retry attempts before the session fails
    pub max_retries: u32,
    /// Delay before re-arming after the engine ends on its own
    pub auto_restart_delay_ms: u64,
    /// Delay between network retry attempts
    pub network_retry_delay_ms: u64,
    /// Hard listening deadline; None disables it
    pub session_timeout_ms: Option<u64>,
    /// Number of prior final texts remembered for duplicate suppression
    pub dedup_window: usize,
    /// Finals must be longer than this many characters
    pub min_final_chars: usize,
    /// Confidence assigned to interim entries
    pub interim_confidence: f32,
    /// BCP-47 language tag handed to the engine
    pub language: String,
}

impl Default for CaptureStrategy {
    fn default() -> Self {
        Self::balanced()
    }
}

impl CaptureStrategy {
    pub fn balanced() -> Self {
        Self {
            interim_results_enabled: true,
            throttle_ms: 150,
            max_retries: 3,
            auto_restart_delay_ms: 300,
            network_retry_delay_ms: 2000,
            session_timeout_ms: Some(30_000),
            dedup_window: 5,
            min_final_chars: 2,
            interim_confidence: 0.75,
            language: "en-US".to_string(),
        }
    }

    /// Fast interim feedback, quick restarts
    pub fn low_latency() -> Self {
        Self {
            throttle_ms: 100,
            auto_restart_delay_ms: 100,
            session_timeout_ms: Some(15_000),
            interim_confidence: 0.7,
            ..Self::balanced()
        }
    }

    /// Finals only; slower restart to avoid clipping the next utterance
    pub fn accurate() -> Self {
        Self {
            interim_results_enabled: false,
            throttle_ms: 200,
            auto_restart_delay_ms: 1000,
            dedup_window: 8,
            interim_confidence: 0.8,
            ..Self::balanced()
        }
    }

    /// Long-running multi-viewer sessions. The deadline is re-armed on every
    /// engine start, so it only bounds a single engine run.
    pub fn live_recording() -> Self {
        Self {
            throttle_ms: 200,
            auto_restart_delay_ms: 500,
            session_timeout_ms: Some(30_000),
            ..Self::balanced()
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "balanced" => Some(Self::balanced()),
            "low_latency" => Some(Self::low_latency()),
            "accurate" => Some(Self::accurate()),
            "live_recording" => Some(Self::live_recording()),
            _ => None,
        }
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn auto_restart_delay(&self) -> Duration {
        Duration::from_millis(self.auto_restart_delay_ms)
    }

    pub fn network_retry_delay(&self) -> Duration {
        Duration::from_millis(self.network_retry_delay_ms)
    }

    pub fn session_timeout(&self) -> Option<Duration> {
        self.session_timeout_ms.map(Duration::from_millis)
    }

    /// Load the persisted strategy; falls back to the default preset
    pub fn load(db: &DatabaseManager) -> Self {
        match db.get_setting(CAPTURE_STRATEGY_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Self>(&raw) {
                Ok(strategy) => strategy,
                Err(e) => {
                    warn!("Stored capture strategy is invalid ({}), using defaults", e);
                    Self::default()
                }
            },
            Ok(None) => Self::default(),
            Err(e) => {
                warn!("Failed to read capture strategy: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, db: &DatabaseManager) -> Result<()> {
        let raw = serde_json::to_string(self).context("Failed to serialize capture strategy")?;
        db.set_setting(CAPTURE_STRATEGY_KEY, &raw, "json")?;
        info!("Capture strategy saved");
        Ok(())
    }
}

/// Settings for the generative-AI collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssistantConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Never persisted inside this struct; see `load`
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-flash".to_string(),
            timeout_secs: 60,
            temperature: 0.7,
            max_output_tokens: 1024,
            api_key: None,
        }
    }
}

impl AssistantConfig {
    /// Load persisted settings, then resolve the API key (environment wins
    /// over the settings table)
    pub fn load(db: &DatabaseManager) -> Result<Self> {
        let mut config = match db.get_setting(ASSISTANT_CONFIG_KEY)? {
            Some(raw) => serde_json::from_str::<Self>(&raw)
                .context("Failed to parse stored assistant config")?,
            None => Self::default(),
        };

        config.api_key = api_key_from_env().or(db.get_setting(API_KEY_SETTING)?);
        if config.api_key.is_none() {
            warn!("No assistant API key configured");
        }
        Ok(config)
    }

    pub fn save(&self, db: &DatabaseManager) -> Result<()> {
        let raw = serde_json::to_string(self).context("Failed to serialize assistant config")?;
        db.set_setting(ASSISTANT_CONFIG_KEY, &raw, "json")?;
        if let Some(key) = &self.api_key {
            db.set_setting(API_KEY_SETTING, key, "secret")?;
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn api_key_from_env() -> Option<String> {
    API_KEY_ENV_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}
