// interview-assist - core of a live interview assistant
//
// - Continuous speech capture with auto-restart, retry and de-duplication
// - AI assistance (answers, code samples, summaries, tips) over the transcript
// - Simulated account / premium flags
// - Live recording sessions shared through the local store

pub mod account;
pub mod assistant;
pub mod config;
pub mod database;
pub mod recording;
pub mod speech;
pub mod state;

pub use account::{AccountFlags, AccountState};
pub use assistant::{AssistError, AssistKind, AssistantClient, MeetingContext};
pub use config::{AssistantConfig, CaptureStrategy};
pub use database::DatabaseManager;
pub use speech::{CaptureError, CaptureSnapshot, CaptureState, SpeechCapture, TranscriptEntry};
pub use state::AppState;

/// Initialize env_logger on stderr. `RUST_LOG` overrides the default `info` level.
pub fn init_logging() {
    let result = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();

    if result.is_err() {
        log::debug!("Logger already initialized");
    }
}
