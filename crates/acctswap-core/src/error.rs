//! Error types for account snapshot operations.

use thiserror::Error;

/// A cookie that could not be written back during a switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieFailure {
    pub name: String,
    pub domain: String,
    pub reason: String,
}

impl std::fmt::Display for CookieFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{} ({})", self.name, self.domain, self.reason)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Account name is empty")]
    EmptyAccountName,

    #[error("Nothing to save: no cookies and no local storage")]
    EmptySnapshot,

    #[error("Account not found: {account} on {domain}")]
    AccountNotFound { domain: String, account: String },

    #[error("Persistence error: {0}")]
    PersistenceFailure(String),

    #[error("Host call failed: {0}")]
    HostCallFailure(String),

    #[error("{}", rewrite_message(.failed, .rolled_back))]
    CookieRewrite {
        failed: Vec<CookieFailure>,
        rolled_back: bool,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

fn rewrite_message(failed: &[CookieFailure], rolled_back: &bool) -> String {
    let mut msg = format!("{} cookie(s) failed to restore", failed.len());
    if *rolled_back {
        msg.push_str(", previous state restored");
    }
    msg
}
