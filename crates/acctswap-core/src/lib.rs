//! Account snapshot core: error taxonomy and configuration.

pub mod config;
pub mod error;

pub use config::{CookieScope, ManagerConfig, RewritePolicy, DEFAULT_STORAGE_KEY};
pub use error::{CookieFailure, Error, Result};
