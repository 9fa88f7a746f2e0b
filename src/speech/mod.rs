// speech/mod.rs
//
// Continuous speech capture: engine boundary, session wrapper, result
// reconciliation, lifecycle/retry control and the public capture handle.
//
// Module structure:
// - engine.rs: EngineFactory / RecognitionEngine traits, event types
// - mock.rs: scripted engine for tests and demos
// - session.rs: one engine instance per listening period, generation tagging
// - reconciler.rs: interim/final merging, throttling, duplicate suppression
// - transcript.rs: ordered transcript with a single trailing interim entry
// - controller.rs: Idle/Listening/Restarting/Error state machine
// - capture.rs: SpeechCapture, the single-writer async handle
// - errors.rs: capture error taxonomy
// - text.rs: utterance normalization
// - types.rs: result batches and transcript entries

pub mod capture;
pub mod controller;
pub mod engine;
pub mod errors;
pub mod mock;
pub mod reconciler;
pub mod session;
pub mod text;
pub mod transcript;
pub mod types;

pub use capture::{CaptureSnapshot, SpeechCapture};
pub use controller::{CaptureState, LifecycleController};
pub use engine::{EngineConfig, EngineEvent, EngineFactory, EngineFailure, EventSink, RecognitionEngine};
pub use errors::{CaptureError, EngineErrorCode};
pub use mock::ScriptedEngineFactory;
pub use transcript::TranscriptStore;
pub use types::{EntryKind, RecognitionAlternative, RecognitionResult, ResultBatch, TranscriptEntry};
