//! Live recording: a host publishes its transcript under `live_session:<id>`,
//! viewers poll and re-read it.
//!
//! The host is the only writer of its key; viewers are eventually consistent.

pub mod host;
pub mod store;
pub mod viewer;

pub use host::LiveSessionHost;
pub use store::LiveSessionStore;
pub use viewer::LiveSessionViewer;
