//! Host capabilities the account manager is layered over.
//!
//! A browser extension backs these with its cookie, scripting, storage and
//! tabs APIs; tests use the doubles in [`crate::memory`].

use async_trait::async_trait;

use acctswap_core::Result;

use crate::types::{ActiveTab, CookieRecord, PageHandle, SameSite, StorageMap};

/// A cookie write request, as the browser cookie API expects it.
#[derive(Debug, Clone, PartialEq)]
pub struct CookieWrite {
    /// Origin URL the cookie is set for. Never contains a leading dot.
    pub url: String,
    pub name: String,
    pub value: String,
    /// Explicit domain attribute; `None` writes a host-only cookie.
    pub domain: Option<String>,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
    pub expiration_date: Option<f64>,
}

impl CookieWrite {
    pub fn from_record(record: &CookieRecord) -> Self {
        let domain = record
            .domain
            .starts_with('.')
            .then(|| record.domain.clone());
        Self {
            url: cookie_url(record),
            name: record.name.clone(),
            value: record.value.clone(),
            domain,
            path: record.path.clone(),
            secure: record.secure,
            http_only: record.http_only,
            same_site: record.same_site,
            expiration_date: record.expiration_date,
        }
    }
}

/// Origin URL for a cookie: scheme from `secure`, dot-stripped domain, path.
pub fn cookie_url(record: &CookieRecord) -> String {
    let scheme = if record.secure { "https" } else { "http" };
    let path = if record.path.is_empty() { "/" } else { &record.path };
    format!("{}://{}{}", scheme, record.bare_domain(), path)
}

/// Browser cookie jar.
#[async_trait]
pub trait CookieStore: Send + Sync {
    /// All cookies whose domain matches `domain` or is a subdomain of it.
    /// A leading dot on the filter is ignored.
    async fn list(&self, domain: &str) -> Result<Vec<CookieRecord>>;

    async fn set(&self, cookie: &CookieWrite) -> Result<()>;

    async fn remove(&self, name: &str, url: &str) -> Result<()>;
}

/// Local storage of a page.
#[async_trait]
pub trait PageStorage: Send + Sync {
    async fn read_all(&self, page: PageHandle) -> Result<StorageMap>;

    async fn clear(&self, page: PageHandle) -> Result<()>;

    /// Replace the page's local storage with `items`.
    async fn write_all(&self, page: PageHandle, items: &StorageMap) -> Result<()>;
}

/// Extension-local key-value store holding JSON blobs.
#[async_trait]
pub trait PersistentKv: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()>;
}

/// The tab the popup belongs to.
#[async_trait]
pub trait ActivePage: Send + Sync {
    async fn current(&self) -> Result<ActiveTab>;

    async fn reload(&self, page: PageHandle) -> Result<()>;
}

/// Severity of a user notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// A human-readable message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }
}

/// Confirmation dialogs and notifications shown by the popup.
#[async_trait]
pub trait UserPrompt: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;

    async fn notify(&self, notice: Notice);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_keeps_dotted_domain_attribute() {
        let mut record = CookieRecord::new("sid", "x1", ".v2ex.com");
        record.secure = true;
        let write = CookieWrite::from_record(&record);
        assert_eq!(write.url, "https://v2ex.com/");
        assert_eq!(write.domain.as_deref(), Some(".v2ex.com"));
    }

    #[test]
    fn test_write_host_only_cookie() {
        let mut record = CookieRecord::new("t", "y", "www.v2ex.com");
        record.path = "/app".into();
        let write = CookieWrite::from_record(&record);
        assert_eq!(write.url, "http://www.v2ex.com/app");
        assert_eq!(write.domain, None);
        assert_eq!(write.path, "/app");
    }

    #[test]
    fn test_empty_path_defaults_to_root() {
        let mut record = CookieRecord::new("t", "y", ".x.com");
        record.path = String::new();
        assert_eq!(cookie_url(&record), "http://x.com/");
    }
}
