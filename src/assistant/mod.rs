//! Interview assistance: prompt construction and the generative-AI client
//!
//! - `context`: the interview setup supplied by the user
//! - `provider`: the `AnswerProvider` trait, request and error types
//! - `prompts`: per-kind system and user prompts
//! - `client`: `AssistantClient`, gating, question selection and cancellation
//! - `providers`: concrete HTTP backends

pub mod client;
pub mod context;
pub mod prompts;
pub mod provider;
pub mod providers;

pub use client::{resolve_question, AssistantClient};
pub use context::MeetingContext;
pub use provider::{AnswerProvider, AnswerRequest, AssistError, AssistKind};
