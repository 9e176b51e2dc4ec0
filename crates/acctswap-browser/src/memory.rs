//! In-memory host implementations.
//!
//! They follow the browser semantics the manager relies on: domain-filtered
//! cookie listing, `url`-addressed removal, per-page local storage. Each
//! double can be told to fail specific calls.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use acctswap_core::{Error, Result};

use crate::host::{
    ActivePage, CookieStore, CookieWrite, Notice, PageStorage, PersistentKv, UserPrompt,
};
use crate::types::{ActiveTab, CookieRecord, PageHandle, StorageMap};

// ---------------------------------------------------------------
// Cookie jar
// ---------------------------------------------------------------

/// Cookie jar keyed by (name, domain, path).
#[derive(Default)]
pub struct MemoryCookieJar {
    cookies: RwLock<Vec<CookieRecord>>,
    /// Cookie names whose writes are rejected.
    reject_names: RwLock<HashSet<String>>,
    fail_lists: RwLock<bool>,
    /// Removals allowed before every further one fails.
    remove_budget: RwLock<Option<usize>>,
    list_calls: AtomicUsize,
    set_calls: AtomicUsize,
    remove_calls: AtomicUsize,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a cookie straight into the jar, replacing one with the same key.
    pub fn insert(&self, cookie: CookieRecord) {
        let mut cookies = self.cookies.write();
        cookies.retain(|c| c.key() != cookie.key());
        cookies.push(cookie);
    }

    pub fn all(&self) -> Vec<CookieRecord> {
        self.cookies.read().clone()
    }

    pub fn find(&self, name: &str, domain: &str) -> Option<CookieRecord> {
        self.cookies
            .read()
            .iter()
            .find(|c| c.name == name && c.domain == domain)
            .cloned()
    }

    /// Make every later `set` for this cookie name fail.
    pub fn reject_writes_for(&self, name: &str) {
        self.reject_names.write().insert(name.to_string());
    }

    /// Make every later `list` fail.
    pub fn fail_lists(&self, fail: bool) {
        *self.fail_lists.write() = fail;
    }

    /// Let `allowed` more removals succeed, then fail the rest.
    pub fn fail_removes_after(&self, allowed: usize) {
        *self.remove_budget.write() = Some(allowed);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }
}

fn domain_matches(cookie_domain: &str, filter: &str) -> bool {
    let cookie_domain = cookie_domain.strip_prefix('.').unwrap_or(cookie_domain);
    let filter = filter.strip_prefix('.').unwrap_or(filter);
    cookie_domain == filter || cookie_domain.ends_with(&format!(".{filter}"))
}

#[async_trait]
impl CookieStore for MemoryCookieJar {
    async fn list(&self, domain: &str) -> Result<Vec<CookieRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_lists.read() {
            return Err(Error::HostCallFailure("cookie jar unavailable".into()));
        }
        Ok(self
            .cookies
            .read()
            .iter()
            .filter(|c| domain_matches(&c.domain, domain))
            .cloned()
            .collect())
    }

    async fn set(&self, cookie: &CookieWrite) -> Result<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_names.read().contains(&cookie.name) {
            return Err(Error::HostCallFailure(format!(
                "cookie {} rejected by jar",
                cookie.name
            )));
        }
        let url = url::Url::parse(&cookie.url).map_err(|e| {
            Error::HostCallFailure(format!("bad cookie url {}: {}", cookie.url, e))
        })?;
        let host = url.host_str().ok_or_else(|| {
            Error::HostCallFailure(format!("cookie url without host: {}", cookie.url))
        })?;

        let (domain, host_only) = match &cookie.domain {
            Some(d) if d.starts_with('.') => (d.clone(), false),
            Some(d) => (format!(".{d}"), false),
            None => (host.to_string(), true),
        };
        let path = if cookie.path.is_empty() {
            url.path().to_string()
        } else {
            cookie.path.clone()
        };

        self.insert(CookieRecord {
            name: cookie.name.clone(),
            value: cookie.value.clone(),
            domain,
            path,
            secure: cookie.secure,
            http_only: cookie.http_only,
            same_site: cookie.same_site,
            expiration_date: cookie.expiration_date,
            host_only: Some(host_only),
            session: Some(cookie.expiration_date.is_none()),
            store_id: None,
        });
        Ok(())
    }

    async fn remove(&self, name: &str, url: &str) -> Result<()> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut budget = self.remove_budget.write();
            match budget.as_mut() {
                Some(0) => {
                    return Err(Error::HostCallFailure(format!("cannot remove cookie {name}")))
                }
                Some(n) => *n -= 1,
                None => {}
            }
        }
        let url = url::Url::parse(url)
            .map_err(|e| Error::HostCallFailure(format!("bad cookie url {url}: {e}")))?;
        let host = url.host_str().unwrap_or_default().to_string();
        let path = url.path().to_string();
        self.cookies
            .write()
            .retain(|c| !(c.name == name && c.bare_domain() == host && c.path == path));
        Ok(())
    }
}

// ---------------------------------------------------------------
// Page + local storage
// ---------------------------------------------------------------

/// A single tab with its own local storage.
pub struct MemoryPage {
    handle: PageHandle,
    url: RwLock<Option<String>>,
    storage: RwLock<StorageMap>,
    fail_reads: RwLock<bool>,
    fail_clear: RwLock<bool>,
    fail_writes: RwLock<bool>,
    reloads: AtomicUsize,
}

impl MemoryPage {
    pub fn new(url: &str) -> Self {
        Self {
            handle: PageHandle(1),
            url: RwLock::new(Some(url.to_string())),
            storage: RwLock::new(StorageMap::new()),
            fail_reads: RwLock::new(false),
            fail_clear: RwLock::new(false),
            fail_writes: RwLock::new(false),
            reloads: AtomicUsize::new(0),
        }
    }

    /// A tab without a URL, e.g. a browser-internal page.
    pub fn blank() -> Self {
        let page = Self::new("");
        *page.url.write() = None;
        page
    }

    pub fn handle(&self) -> PageHandle {
        self.handle
    }

    pub fn navigate(&self, url: &str) {
        *self.url.write() = Some(url.to_string());
    }

    pub fn set_item(&self, key: &str, value: &str) {
        self.storage.write().insert(key.to_string(), value.to_string());
    }

    pub fn storage(&self) -> StorageMap {
        self.storage.read().clone()
    }

    /// Make script injection for reads fail, as on restricted pages.
    pub fn fail_reads(&self, fail: bool) {
        *self.fail_reads.write() = fail;
    }

    pub fn fail_clear(&self, fail: bool) {
        *self.fail_clear.write() = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.write() = fail;
    }

    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    fn check(&self, page: PageHandle) -> Result<()> {
        if page == self.handle {
            Ok(())
        } else {
            Err(Error::HostCallFailure(format!("no such page: {}", page.0)))
        }
    }
}

#[async_trait]
impl PageStorage for MemoryPage {
    async fn read_all(&self, page: PageHandle) -> Result<StorageMap> {
        self.check(page)?;
        if *self.fail_reads.read() {
            return Err(Error::HostCallFailure("cannot inject script into page".into()));
        }
        Ok(self.storage.read().clone())
    }

    async fn clear(&self, page: PageHandle) -> Result<()> {
        self.check(page)?;
        if *self.fail_clear.read() {
            return Err(Error::HostCallFailure("cannot inject script into page".into()));
        }
        self.storage.write().clear();
        Ok(())
    }

    async fn write_all(&self, page: PageHandle, items: &StorageMap) -> Result<()> {
        self.check(page)?;
        if *self.fail_writes.read() {
            return Err(Error::HostCallFailure("cannot inject script into page".into()));
        }
        let mut storage = self.storage.write();
        storage.clear();
        storage.extend(items.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }
}

#[async_trait]
impl ActivePage for MemoryPage {
    async fn current(&self) -> Result<ActiveTab> {
        Ok(ActiveTab {
            handle: self.handle,
            url: self.url.read().clone(),
        })
    }

    async fn reload(&self, page: PageHandle) -> Result<()> {
        self.check(page)?;
        self.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------
// Persistent key-value store
// ---------------------------------------------------------------

#[derive(Default)]
pub struct MemoryKv {
    values: RwLock<HashMap<String, serde_json::Value>>,
    fail_writes: RwLock<bool>,
    writes: AtomicUsize,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.write() = fail;
    }

    /// Number of successful `set` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn raw(&self, key: &str) -> Option<serde_json::Value> {
        self.values.read().get(key).cloned()
    }
}

#[async_trait]
impl PersistentKv for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        if *self.fail_writes.read() {
            return Err(Error::HostCallFailure("storage quota exceeded".into()));
        }
        self.values.write().insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------
// User prompt
// ---------------------------------------------------------------

/// Answers confirmations with a fixed reply and records notices.
pub struct ScriptedPrompt {
    answer: bool,
    asked: Mutex<Vec<String>>,
    notices: Mutex<Vec<Notice>>,
}

impl ScriptedPrompt {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            asked: Mutex::new(Vec::new()),
            notices: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn last_notice(&self) -> Option<Notice> {
        self.notices.lock().last().cloned()
    }
}

#[async_trait]
impl UserPrompt for ScriptedPrompt {
    async fn confirm(&self, message: &str) -> bool {
        self.asked.lock().push(message.to_string());
        self.answer
    }

    async fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}
