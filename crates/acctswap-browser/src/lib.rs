//! Account snapshots for browser sites: save, switch and delete named
//! captures of a domain's cookies and local storage.
//!
//! The manager is written against abstract host capabilities (cookie jar,
//! page storage, persistent key-value store, active tab), see [`host`].

pub mod domain;
pub mod file_kv;
pub mod filter;
pub mod host;
pub mod locks;
pub mod manager;
pub mod memory;
pub mod popup;
pub mod registry;
pub mod types;

pub use domain::Domain;
pub use file_kv::FileKv;
pub use host::{
    ActivePage, CookieStore, CookieWrite, Notice, NoticeLevel, PageStorage, PersistentKv,
    UserPrompt,
};
pub use manager::{AccountManager, Host};
pub use popup::{AccountListing, AccountPopup, Outcome, NO_ACCOUNTS_PLACEHOLDER};
pub use registry::RegistryStore;
pub use types::*;
