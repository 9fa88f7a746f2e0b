//! Concrete answer providers

pub mod gemini;

pub use gemini::GeminiProvider;
