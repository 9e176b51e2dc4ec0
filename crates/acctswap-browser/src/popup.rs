//! Popup boundary: resolves the active page, asks for confirmation, and
//! turns every operation result into a user notice. Errors stop here.

use std::sync::Arc;

use acctswap_core::{Error, Result};
use tracing::{error, warn};

use crate::domain::Domain;
use crate::host::{Notice, UserPrompt};
use crate::manager::AccountManager;
use crate::types::{AccountSnapshot, ActiveTab, PageHandle, SwitchReport};

/// Shown in place of an empty account list.
pub const NO_ACCOUNTS_PLACEHOLDER: &str = "-- no saved accounts --";

/// Accounts saved for the current domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountListing {
    pub domain: Option<Domain>,
    pub names: Vec<String>,
}

impl AccountListing {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Entries for the account picker: the names, or the placeholder.
    pub fn display_entries(&self) -> Vec<String> {
        if self.names.is_empty() {
            vec![NO_ACCOUNTS_PLACEHOLDER.to_string()]
        } else {
            self.names.clone()
        }
    }
}

/// How a user action ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// The user declined the confirmation.
    Cancelled,
    Failed,
}

/// What the extension popup drives.
pub struct AccountPopup {
    manager: Arc<AccountManager>,
    prompt: Arc<dyn UserPrompt>,
}

impl AccountPopup {
    pub fn new(manager: Arc<AccountManager>, prompt: Arc<dyn UserPrompt>) -> Self {
        Self { manager, prompt }
    }

    async fn active(&self) -> Result<(PageHandle, Domain)> {
        let ActiveTab { handle, url } = self.manager.host().page.current().await?;
        let url = url.ok_or_else(|| Error::InvalidDomain("page has no URL".into()))?;
        Ok((handle, Domain::from_url(&url)?))
    }

    /// Domain of the active page, if it has one.
    pub async fn current_domain(&self) -> Option<Domain> {
        match self.active().await {
            Ok((_, domain)) => Some(domain),
            Err(e) => {
                warn!("No usable domain for the active page: {}", e);
                None
            }
        }
    }

    /// Accounts for the active page's domain. Failures show as an empty list.
    pub async fn accounts(&self) -> AccountListing {
        let Some(domain) = self.current_domain().await else {
            return AccountListing::default();
        };
        match self.manager.list(&domain).await {
            Ok(names) => AccountListing {
                domain: Some(domain),
                names,
            },
            Err(e) => {
                error!("Listing accounts for {} failed: {}", domain, e);
                AccountListing {
                    domain: Some(domain),
                    names: Vec::new(),
                }
            }
        }
    }

    pub async fn save(&self, account: &str) -> Outcome {
        let account = account.trim();
        match self.save_active(account).await {
            Ok(_) => self.done(format!("Saved cookies and local storage for \"{account}\".")).await,
            Err(e) => self.fail("save", account, e).await,
        }
    }

    pub async fn switch(&self, account: &str) -> Outcome {
        if account.is_empty() {
            return self.fail("switch", account, Error::EmptyAccountName).await;
        }
        match self.switch_active(account).await {
            Ok(report) if report.failed.is_empty() => {
                let message = if self.manager.config().reload_after_switch {
                    format!("Switched to \"{account}\"; the page has been reloaded.")
                } else {
                    format!("Switched to \"{account}\". Reload the page to see the change.")
                };
                self.done(message).await
            }
            Ok(report) => {
                let names: Vec<String> = report.failed.iter().map(|f| f.to_string()).collect();
                warn!("Switch to {} left {} cookies unrestored", account, names.len());
                self.prompt
                    .notify(Notice::warning(format!(
                        "Switched to \"{}\", but {} cookie(s) could not be restored: {}",
                        account,
                        names.len(),
                        names.join(", ")
                    )))
                    .await;
                Outcome::Done
            }
            Err(e) => self.fail("switch", account, e).await,
        }
    }

    pub async fn delete(&self, account: &str) -> Outcome {
        if account.is_empty() {
            return self.fail("delete", account, Error::EmptyAccountName).await;
        }
        let domain = match self.active().await {
            Ok((_, domain)) => domain,
            Err(e) => return self.fail("delete", account, e).await,
        };
        let question = format!(
            "Delete the saved cookies and local storage for \"{account}\"? This cannot be undone."
        );
        if !self.prompt.confirm(&question).await {
            return Outcome::Cancelled;
        }
        match self.manager.delete(&domain, account).await {
            Ok(()) => self.done(format!("Deleted \"{account}\".")).await,
            Err(e) => self.fail("delete", account, e).await,
        }
    }

    async fn save_active(&self, account: &str) -> Result<AccountSnapshot> {
        let (page, domain) = self.active().await?;
        self.manager.save(page, &domain, account).await
    }

    async fn switch_active(&self, account: &str) -> Result<SwitchReport> {
        let (page, domain) = self.active().await?;
        self.manager.switch(page, &domain, account).await
    }

    async fn done(&self, message: String) -> Outcome {
        self.prompt.notify(Notice::success(message)).await;
        Outcome::Done
    }

    async fn fail(&self, action: &str, account: &str, e: Error) -> Outcome {
        error!("{} of account {:?} failed: {}", action, account, e);
        self.prompt.notify(Notice::error(user_message(action, &e))).await;
        Outcome::Failed
    }
}

fn user_message(action: &str, e: &Error) -> String {
    match e {
        Error::InvalidDomain(_) => {
            format!("This page has no usable domain; cannot {action} accounts here.")
        }
        Error::EmptyAccountName if action == "save" => "Please enter an account name.".into(),
        Error::EmptyAccountName => "Please choose an account.".into(),
        Error::EmptySnapshot => "This site has no cookies or local storage to save.".into(),
        Error::AccountNotFound { account, .. } => {
            format!("No saved data found for \"{account}\".")
        }
        other => format!("Could not {action} the account: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NoticeLevel;
    use crate::manager::Host;
    use crate::memory::{MemoryCookieJar, MemoryKv, MemoryPage, ScriptedPrompt};
    use crate::types::CookieRecord;
    use acctswap_core::ManagerConfig;

    type Setup = (AccountPopup, Arc<MemoryCookieJar>, Arc<MemoryPage>, Arc<ScriptedPrompt>);

    fn setup(page: MemoryPage, answer: bool) -> Setup {
        setup_with(page, answer, ManagerConfig::default())
    }

    fn setup_with(page: MemoryPage, answer: bool, config: ManagerConfig) -> Setup {
        let jar = Arc::new(MemoryCookieJar::new());
        let page = Arc::new(page);
        let host = Host {
            cookies: jar.clone(),
            storage: page.clone(),
            kv: Arc::new(MemoryKv::new()),
            page: page.clone(),
        };
        let prompt = Arc::new(ScriptedPrompt::answering(answer));
        let manager = Arc::new(AccountManager::new(host, config));
        (AccountPopup::new(manager, prompt.clone()), jar, page, prompt)
    }

    #[test]
    fn test_placeholder_listing() {
        let listing = AccountListing::default();
        assert_eq!(listing.display_entries(), vec![NO_ACCOUNTS_PLACEHOLDER.to_string()]);
    }

    #[tokio::test]
    async fn test_blank_page_is_invalid_domain() {
        let (popup, jar, _page, prompt) = setup(MemoryPage::blank(), true);
        jar.insert(CookieRecord::new("sid", "1", ".v2ex.com"));

        assert_eq!(popup.save("work").await, Outcome::Failed);
        let notice = prompt.last_notice().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.message.contains("no usable domain"));
        assert!(popup.current_domain().await.is_none());
        assert!(popup.accounts().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_list() {
        let (popup, jar, _page, prompt) = setup(MemoryPage::new("https://www.v2ex.com/"), true);
        jar.insert(CookieRecord::new("sid", "1", ".v2ex.com"));

        assert_eq!(popup.save(" work ").await, Outcome::Done);
        assert_eq!(prompt.last_notice().unwrap().level, NoticeLevel::Success);
        let listing = popup.accounts().await;
        assert_eq!(listing.names, vec!["work"]);
        assert_eq!(listing.domain.unwrap().as_str(), "www.v2ex.com");
    }

    #[tokio::test]
    async fn test_save_without_name() {
        let (popup, _jar, _page, prompt) = setup(MemoryPage::new("https://www.v2ex.com/"), true);
        assert_eq!(popup.save("  ").await, Outcome::Failed);
        assert_eq!(prompt.last_notice().unwrap().message, "Please enter an account name.");
    }

    #[tokio::test]
    async fn test_delete_declined() {
        let (popup, jar, _page, prompt) = setup(MemoryPage::new("https://www.v2ex.com/"), false);
        jar.insert(CookieRecord::new("sid", "1", ".v2ex.com"));
        popup.save("work").await;

        assert_eq!(popup.delete("work").await, Outcome::Cancelled);
        assert_eq!(prompt.asked().len(), 1);
        assert_eq!(popup.accounts().await.names, vec!["work"]);
    }

    #[tokio::test]
    async fn test_delete_confirmed() {
        let (popup, jar, _page, prompt) = setup(MemoryPage::new("https://www.v2ex.com/"), true);
        jar.insert(CookieRecord::new("sid", "1", ".v2ex.com"));
        popup.save("work").await;

        assert_eq!(popup.delete("work").await, Outcome::Done);
        assert!(popup.accounts().await.is_empty());
        assert_eq!(popup.delete("work").await, Outcome::Failed);
        assert_eq!(prompt.last_notice().unwrap().message, "No saved data found for \"work\".");
    }

    #[tokio::test]
    async fn test_switch_partial_failure_warns() {
        let (popup, jar, page, prompt) = setup(MemoryPage::new("https://www.v2ex.com/"), true);
        jar.insert(CookieRecord::new("sid", "1", ".v2ex.com"));
        jar.insert(CookieRecord::new("csrf", "2", ".v2ex.com"));
        popup.save("work").await;
        jar.reject_writes_for("csrf");

        assert_eq!(popup.switch("work").await, Outcome::Done);
        let notice = prompt.last_notice().unwrap();
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert!(notice.message.contains("csrf"));
        assert_eq!(page.reloads(), 1);
    }

    #[tokio::test]
    async fn test_switch_without_selection() {
        let (popup, _jar, _page, prompt) = setup(MemoryPage::new("https://www.v2ex.com/"), true);
        assert_eq!(popup.switch("").await, Outcome::Failed);
        assert_eq!(prompt.last_notice().unwrap().message, "Please choose an account.");
    }

    #[tokio::test]
    async fn test_switch_message_follows_reload_setting() {
        let url = "https://www.v2ex.com/";
        let (popup, jar, page, prompt) = setup(MemoryPage::new(url), true);
        jar.insert(CookieRecord::new("sid", "1", ".v2ex.com"));
        popup.save("work").await;
        assert_eq!(popup.switch("work").await, Outcome::Done);
        assert!(prompt.last_notice().unwrap().message.contains("has been reloaded"));
        assert_eq!(page.reloads(), 1);

        let config = ManagerConfig {
            reload_after_switch: false,
            ..ManagerConfig::default()
        };
        let (popup, jar, page, prompt) = setup_with(MemoryPage::new(url), true, config);
        jar.insert(CookieRecord::new("sid", "1", ".v2ex.com"));
        popup.save("work").await;
        assert_eq!(popup.switch("work").await, Outcome::Done);
        let message = prompt.last_notice().unwrap().message;
        assert!(!message.contains("reloaded"));
        assert!(message.contains("Reload the page"));
        assert_eq!(page.reloads(), 0);
    }
}
