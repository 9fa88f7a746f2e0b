//! Observable account flags backed by the settings table
//!
//! There is no real identity provider or payment processor: signing in only
//! records an email, and upgrading flips the premium flag as if checkout had
//! succeeded. Every change is persisted and then broadcast through a `watch`
//! channel so observers never need to poll.

use anyhow::{Context, Result};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

use crate::database::DatabaseManager;

const EMAIL_KEY: &str = "account_email";
const PREMIUM_KEY: &str = "account_premium";

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    pub is_authenticated: bool,
    pub user_email: Option<String>,
    pub is_premium: bool,
}

/// Cheap to clone; all clones share one state and one channel
#[derive(Clone)]
pub struct AccountFlags {
    db: Arc<DatabaseManager>,
    state: Arc<watch::Sender<AccountState>>,
}

impl AccountFlags {
    /// Restore the persisted flags
    pub fn load(db: Arc<DatabaseManager>) -> Result<Self> {
        let user_email = db.get_setting(EMAIL_KEY)?;
        let is_premium = user_email.is_some() && db.get_bool_setting(PREMIUM_KEY, false)?;
        let initial = AccountState {
            is_authenticated: user_email.is_some(),
            user_email,
            is_premium,
        };
        let (tx, _rx) = watch::channel(initial);
        Ok(Self { db, state: Arc::new(tx) })
    }

    pub fn state(&self) -> AccountState {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated
    }

    pub fn is_premium(&self) -> bool {
        self.state.borrow().is_premium
    }

    pub fn user_email(&self) -> Option<String> {
        self.state.borrow().user_email.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AccountState> {
        self.state.subscribe()
    }

    pub fn sign_in(&self, email: &str) -> Result<()> {
        let email = email.trim().to_lowercase();
        if !EMAIL_RE.is_match(&email) {
            return Err(anyhow::anyhow!("Invalid email address: {}", email));
        }

        self.db.set_setting(EMAIL_KEY, &email, "string")
            .context("Failed to persist sign-in")?;
        let is_premium = self.db.get_bool_setting(PREMIUM_KEY, false)?;

        info!("Signed in as {}", email);
        self.publish(AccountState {
            is_authenticated: true,
            user_email: Some(email),
            is_premium,
        });
        Ok(())
    }

    /// Clears the session and the premium flag
    pub fn sign_out(&self) -> Result<()> {
        self.db.delete_setting(EMAIL_KEY)?;
        self.db.delete_setting(PREMIUM_KEY)?;
        info!("Signed out");
        self.publish(AccountState::default());
        Ok(())
    }

    /// Simulated successful checkout
    pub fn upgrade_premium(&self) -> Result<()> {
        if !self.is_authenticated() {
            return Err(anyhow::anyhow!("Sign in before upgrading to premium"));
        }
        self.set_premium(true)
    }

    pub fn downgrade_premium(&self) -> Result<()> {
        self.set_premium(false)
    }

    fn set_premium(&self, value: bool) -> Result<()> {
        self.db.set_bool_setting(PREMIUM_KEY, value)
            .context("Failed to persist premium flag")?;
        info!("Premium {}", if value { "enabled" } else { "disabled" });
        let mut next = self.state();
        next.is_premium = value;
        self.publish(next);
        Ok(())
    }

    fn publish(&self, next: AccountState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}
