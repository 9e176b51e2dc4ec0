//! Account snapshot types, shaped like the extension's persisted blob.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Cookie `sameSite` attribute as reported by the browser cookie API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameSite {
    NoRestriction,
    Lax,
    Strict,
    Unspecified,
}

/// One captured cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    /// May carry a leading `.` for a parent-domain cookie.
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, rename = "httpOnly")]
    pub http_only: bool,
    #[serde(skip_serializing_if = "Option::is_none", rename = "sameSite")]
    pub same_site: Option<SameSite>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "expirationDate")]
    pub expiration_date: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "hostOnly")]
    pub host_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "storeId")]
    pub store_id: Option<String>,
}

impl CookieRecord {
    /// A minimal cookie, mostly for hosts and tests.
    pub fn new(name: &str, value: &str, domain: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            domain: domain.to_string(),
            path: "/".to_string(),
            secure: false,
            http_only: false,
            same_site: None,
            expiration_date: None,
            host_only: None,
            session: None,
            store_id: None,
        }
    }

    /// Domain with any leading `.` removed.
    pub fn bare_domain(&self) -> &str {
        self.domain.strip_prefix('.').unwrap_or(&self.domain)
    }

    /// Identity of a cookie inside a jar.
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.name, &self.domain, &self.path)
    }
}

/// Full local storage snapshot of a page.
pub type StorageMap = HashMap<String, String>;

/// A named capture of cookies and local storage for one domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    #[serde(default)]
    pub cookies: Vec<CookieRecord>,
    #[serde(default, rename = "localStorage")]
    pub local_storage: StorageMap,
    #[serde(skip_serializing_if = "Option::is_none", rename = "savedAt")]
    pub saved_at: Option<String>,
}

impl AccountSnapshot {
    pub fn new(cookies: Vec<CookieRecord>, local_storage: StorageMap) -> Self {
        Self {
            cookies,
            local_storage,
            saved_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.local_storage.is_empty()
    }
}

/// Accounts saved for a single domain, keyed by account name.
pub type DomainAccounts = BTreeMap<String, AccountSnapshot>;

/// The whole persisted state: domain → account name → snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registry {
    pub domains: BTreeMap<String, DomainAccounts>,
}

impl Registry {
    /// Account names for a domain, empty if the domain is unknown.
    pub fn account_names(&self, domain: &str) -> Vec<String> {
        self.domains
            .get(domain)
            .map(|accounts| accounts.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, domain: &str, account: &str) -> Option<&AccountSnapshot> {
        self.domains.get(domain)?.get(account)
    }

    /// Insert or fully overwrite an account snapshot.
    pub fn upsert(&mut self, domain: &str, account: &str, snapshot: AccountSnapshot) {
        self.domains
            .entry(domain.to_string())
            .or_default()
            .insert(account.to_string(), snapshot);
    }

    /// Remove an account, dropping the domain entry once it is empty.
    pub fn remove(&mut self, domain: &str, account: &str) -> Option<AccountSnapshot> {
        let accounts = self.domains.get_mut(domain)?;
        let removed = accounts.remove(account);
        if accounts.is_empty() {
            self.domains.remove(domain);
        }
        removed
    }
}

/// Opaque reference to a browser page (tab).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageHandle(pub u64);

/// The page the popup was opened on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTab {
    pub handle: PageHandle,
    pub url: Option<String>,
}

/// Outcome of switching to an account.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwitchReport {
    pub account: String,
    /// Cookies removed from the live jar before rewriting.
    pub removed: usize,
    /// Cookies written back from the snapshot.
    pub restored: usize,
    pub failed: Vec<acctswap_core::CookieFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_blob_layout() {
        let mut registry = Registry::default();
        let mut storage = StorageMap::new();
        storage.insert("theme".into(), "dark".into());
        let mut cookie = CookieRecord::new("sid", "x1", ".v2ex.com");
        cookie.http_only = true;
        cookie.same_site = Some(SameSite::Lax);
        registry.upsert(
            "www.v2ex.com",
            "work",
            AccountSnapshot {
                cookies: vec![cookie],
                local_storage: storage,
                saved_at: None,
            },
        );

        let json = serde_json::to_value(&registry).unwrap();
        let account = &json["www.v2ex.com"]["work"];
        assert_eq!(account["cookies"][0]["name"], "sid");
        assert_eq!(account["cookies"][0]["httpOnly"], true);
        assert_eq!(account["cookies"][0]["sameSite"], "lax");
        assert_eq!(account["localStorage"]["theme"], "dark");
        assert!(account.get("savedAt").is_none());
    }

    #[test]
    fn test_reads_extension_cookie_objects() {
        let blob = serde_json::json!({
            "www.v2ex.com": {
                "work": {
                    "cookies": [{
                        "name": "A2",
                        "value": "abc",
                        "domain": ".v2ex.com",
                        "path": "/",
                        "secure": true,
                        "httpOnly": true,
                        "sameSite": "no_restriction",
                        "expirationDate": 1893456000.5,
                        "hostOnly": false,
                        "session": false,
                        "storeId": "0"
                    }],
                    "localStorage": {}
                }
            }
        });
        let registry: Registry = serde_json::from_value(blob).unwrap();
        let snapshot = registry.get("www.v2ex.com", "work").unwrap();
        let cookie = &snapshot.cookies[0];
        assert_eq!(cookie.same_site, Some(SameSite::NoRestriction));
        assert_eq!(cookie.expiration_date, Some(1893456000.5));
        assert_eq!(cookie.store_id.as_deref(), Some("0"));
        assert!(snapshot.saved_at.is_none());
    }

    #[test]
    fn test_remove_drops_empty_domain() {
        let mut registry = Registry::default();
        let cookies = vec![CookieRecord::new("a", "1", ".x.com")];
        let snap = AccountSnapshot::new(cookies, StorageMap::new());
        registry.upsert("www.x.com", "one", snap.clone());
        registry.upsert("www.x.com", "two", snap);

        assert!(registry.remove("www.x.com", "one").is_some());
        assert_eq!(registry.account_names("www.x.com"), vec!["two".to_string()]);
        assert!(registry.remove("www.x.com", "two").is_some());
        assert!(!registry.domains.contains_key("www.x.com"));
        assert!(registry.remove("www.x.com", "two").is_none());
    }

    #[test]
    fn test_bare_domain() {
        assert_eq!(CookieRecord::new("a", "1", ".x.com").bare_domain(), "x.com");
        assert_eq!(CookieRecord::new("a", "1", "www.x.com").bare_domain(), "www.x.com");
    }
}
