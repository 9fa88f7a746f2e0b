// Database models
//
// - settings.rs: typed application settings rows
// - live_session.rs: serialized live-recording session state
// - profile.rs: saved interview profiles

mod settings;
mod live_session;
mod profile;

pub use settings::Setting;
pub use live_session::{LiveSession, LIVE_SESSION_PREFIX};
pub use profile::{InterviewProfile, SaveInterviewProfile};
