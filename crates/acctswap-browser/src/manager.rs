//! Account manager: list, save, switch and delete named account snapshots.

use std::sync::Arc;

use acctswap_core::{CookieFailure, Error, ManagerConfig, Result, RewritePolicy};
use tracing::{info, warn};

use crate::domain::Domain;
use crate::filter::applicable_cookies;
use crate::host::{cookie_url, ActivePage, CookieStore, CookieWrite, PageStorage, PersistentKv};
use crate::locks::DomainLocks;
use crate::registry::RegistryStore;
use crate::types::{AccountSnapshot, CookieRecord, PageHandle, StorageMap, SwitchReport};

/// Host capabilities the manager is built from.
#[derive(Clone)]
pub struct Host {
    pub cookies: Arc<dyn CookieStore>,
    pub storage: Arc<dyn PageStorage>,
    pub kv: Arc<dyn PersistentKv>,
    pub page: Arc<dyn ActivePage>,
}

/// Saves, switches and deletes account snapshots per domain.
pub struct AccountManager {
    host: Host,
    config: ManagerConfig,
    registry: RegistryStore,
    locks: DomainLocks,
}

impl AccountManager {
    pub fn new(host: Host, config: ManagerConfig) -> Self {
        let registry = RegistryStore::new(host.kv.clone(), config.storage_key.clone());
        Self {
            host,
            config,
            registry,
            locks: DomainLocks::new(),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    // ---------------------------------------------------------------
    // Listing
    // ---------------------------------------------------------------

    /// Account names saved for `domain`.
    ///
    /// Names come back in lexicographic order, not in the order they were
    /// saved, so a picker built from this list is stable across reloads.
    pub async fn list(&self, domain: &Domain) -> Result<Vec<String>> {
        Ok(self.registry.load().await?.account_names(domain.as_str()))
    }

    /// The saved snapshot for an account, if any.
    pub async fn snapshot(
        &self,
        domain: &Domain,
        account: &str,
    ) -> Result<Option<AccountSnapshot>> {
        Ok(self.registry.load().await?.get(domain.as_str(), account).cloned())
    }

    // ---------------------------------------------------------------
    // Save
    // ---------------------------------------------------------------

    /// Capture the domain's cookies and the page's local storage under
    /// `account`, overwriting any previous snapshot with that name.
    pub async fn save(
        &self,
        page: PageHandle,
        domain: &Domain,
        account: &str,
    ) -> Result<AccountSnapshot> {
        let account = account.trim();
        if account.is_empty() {
            return Err(Error::EmptyAccountName);
        }
        let _guard = self.locks.acquire(domain).await;

        let scope = self.config.cookie_scope;
        let cookies = applicable_cookies(self.host.cookies.as_ref(), domain, scope).await?;
        let local_storage = match self.host.storage.read_all(page).await {
            Ok(items) => items,
            Err(e) => {
                warn!("Reading local storage for {} failed, saving cookies only: {}", domain, e);
                StorageMap::new()
            }
        };

        let snapshot = AccountSnapshot::new(cookies, local_storage);
        if snapshot.is_empty() {
            return Err(Error::EmptySnapshot);
        }

        self.registry
            .modify(|registry| {
                registry.upsert(domain.as_str(), account, snapshot.clone());
                Ok(())
            })
            .await?;

        info!(
            "Saved account {} for {}: {} cookies, {} storage keys",
            account,
            domain,
            snapshot.cookies.len(),
            snapshot.local_storage.len()
        );
        Ok(snapshot)
    }

    // ---------------------------------------------------------------
    // Switch
    // ---------------------------------------------------------------

    /// Replace the domain's live cookies and the page's local storage with
    /// a saved account, then reload the page.
    ///
    /// Under [`RewritePolicy::Transactional`] any failure after the live
    /// state has been captured puts the previous cookies and storage back.
    pub async fn switch(
        &self,
        page: PageHandle,
        domain: &Domain,
        account: &str,
    ) -> Result<SwitchReport> {
        let _guard = self.locks.acquire(domain).await;

        let snapshot = self
            .registry
            .load()
            .await?
            .get(domain.as_str(), account)
            .filter(|s| !s.is_empty())
            .cloned()
            .ok_or_else(|| Error::AccountNotFound {
                domain: domain.to_string(),
                account: account.to_string(),
            })?;

        let scope = self.config.cookie_scope;
        let live = applicable_cookies(self.host.cookies.as_ref(), domain, scope).await?;
        let previous_storage = match self.config.rewrite_policy {
            RewritePolicy::Transactional => Some(self.host.storage.read_all(page).await?),
            RewritePolicy::BestEffort => None,
        };

        let mut written = Vec::with_capacity(snapshot.cookies.len());
        let applied = self
            .apply_snapshot(page, &live, &snapshot, &mut written, previous_storage.is_some())
            .await;

        let failed = match (applied, previous_storage) {
            (Ok(failed), None) => failed,
            (Ok(failed), Some(_)) if failed.is_empty() => failed,
            (Err(e), None) => return Err(e),
            (outcome, Some(previous_storage)) => {
                let rollback = self.roll_back(page, &written, &live, &previous_storage).await;
                let restored = match rollback {
                    Ok(unrestored) => {
                        for f in &unrestored {
                            warn!("Rollback could not put back cookie {} for {}", f, domain);
                        }
                        unrestored.is_empty()
                    }
                    Err(e) => {
                        warn!("Rollback of switch on {} failed: {}", domain, e);
                        false
                    }
                };
                warn!(
                    "Switch to {} on {} rolled back (complete: {})",
                    account, domain, restored
                );
                return Err(match outcome {
                    Ok(failed) => Error::CookieRewrite {
                        failed,
                        rolled_back: restored,
                    },
                    Err(e) => e,
                });
            }
        };

        if self.config.reload_after_switch {
            self.host.page.reload(page).await?;
        }

        info!(
            "Switched {} to account {}: removed {}, restored {}, failed {}",
            domain,
            account,
            live.len(),
            written.len(),
            failed.len()
        );
        Ok(SwitchReport {
            account: account.to_string(),
            removed: live.len(),
            restored: written.len(),
            failed,
        })
    }

    /// Remove the live cookies, clear storage, then write the snapshot.
    /// Cookies written so far are pushed to `written`. With `stop_on_failure`
    /// storage is left cleared when a cookie write fails.
    async fn apply_snapshot(
        &self,
        page: PageHandle,
        live: &[CookieRecord],
        snapshot: &AccountSnapshot,
        written: &mut Vec<CookieRecord>,
        stop_on_failure: bool,
    ) -> Result<Vec<CookieFailure>> {
        self.remove_cookies(live).await?;
        self.host.storage.clear(page).await?;

        let failed = self.write_cookies(&snapshot.cookies, written).await;
        for f in &failed {
            warn!("Restoring cookie {} failed", f);
        }
        if stop_on_failure && !failed.is_empty() {
            return Ok(failed);
        }

        self.host.storage.write_all(page, &snapshot.local_storage).await?;
        Ok(failed)
    }

    async fn remove_cookies(&self, cookies: &[CookieRecord]) -> Result<()> {
        for cookie in cookies {
            self.host.cookies.remove(&cookie.name, &cookie_url(cookie)).await?;
        }
        Ok(())
    }

    /// Write cookies one by one. Successes go to `written`; failures are returned.
    async fn write_cookies(
        &self,
        cookies: &[CookieRecord],
        written: &mut Vec<CookieRecord>,
    ) -> Vec<CookieFailure> {
        let mut failed = Vec::new();
        for cookie in cookies {
            match self.host.cookies.set(&CookieWrite::from_record(cookie)).await {
                Ok(()) => written.push(cookie.clone()),
                Err(e) => failed.push(CookieFailure {
                    name: cookie.name.clone(),
                    domain: cookie.domain.clone(),
                    reason: e.to_string(),
                }),
            }
        }
        failed
    }

    /// Undo a partial switch. Returns the previous cookies that could not
    /// be put back.
    async fn roll_back(
        &self,
        page: PageHandle,
        written: &[CookieRecord],
        previous: &[CookieRecord],
        previous_storage: &StorageMap,
    ) -> Result<Vec<CookieFailure>> {
        if let Err(e) = self.remove_cookies(written).await {
            warn!("Rollback could not remove the cookies it wrote: {}", e);
        }
        let mut restored = Vec::with_capacity(previous.len());
        let unrestored = self.write_cookies(previous, &mut restored).await;
        self.host.storage.write_all(page, previous_storage).await?;
        Ok(unrestored)
    }

    // ---------------------------------------------------------------
    // Delete
    // ---------------------------------------------------------------

    /// Delete a saved account. The domain entry goes away with its last account.
    pub async fn delete(&self, domain: &Domain, account: &str) -> Result<()> {
        let _guard = self.locks.acquire(domain).await;
        self.registry
            .modify(|registry| {
                registry
                    .remove(domain.as_str(), account)
                    .map(|_| ())
                    .ok_or_else(|| Error::AccountNotFound {
                        domain: domain.to_string(),
                        account: account.to_string(),
                    })
            })
            .await?;
        info!("Deleted account {} for {}", account, domain);
        Ok(())
    }
}
