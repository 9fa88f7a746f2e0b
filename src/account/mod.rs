//! Simulated account: sign-in state and the premium flag

pub mod flags;

pub use flags::{AccountFlags, AccountState};
