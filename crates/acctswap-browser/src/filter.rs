//! Which cookies in the jar belong to a domain.
//!
//! Cookies are looked up under the parent domain (`.example.com` for
//! `www.example.com`) and kept when they are unscoped, scoped to the parent
//! itself, or scoped to a domain that contains the target host. Cookies
//! scoped to sibling subdomains are dropped.

use std::collections::HashSet;

use acctswap_core::{CookieScope, Result};
use tracing::debug;

use crate::domain::Domain;
use crate::host::CookieStore;
use crate::types::CookieRecord;

/// Whether `cookie` applies to `domain`, given the domain's parent.
pub fn is_applicable(domain: &Domain, parent: &str, cookie: &CookieRecord) -> bool {
    if cookie.domain.is_empty() {
        return true;
    }
    let bare = cookie.bare_domain();
    bare == parent || domain.is_within(bare)
}

/// Keep only the cookies that apply to `domain`.
pub fn filter_applicable(domain: &Domain, cookies: Vec<CookieRecord>) -> Vec<CookieRecord> {
    let Some(parent) = domain.parent() else {
        return Vec::new();
    };
    cookies
        .into_iter()
        .filter(|c| is_applicable(domain, parent, c))
        .collect()
}

/// Fetch the cookies that belong to `domain` from the live jar.
pub async fn applicable_cookies(
    jar: &dyn CookieStore,
    domain: &Domain,
    scope: CookieScope,
) -> Result<Vec<CookieRecord>> {
    let mut cookies = match domain.parent() {
        Some(parent) => {
            let fetched = jar.list(&format!(".{parent}")).await?;
            let total = fetched.len();
            let kept = filter_applicable(domain, fetched);
            debug!(
                "{}: kept {} of {} cookies under .{}",
                domain,
                kept.len(),
                total,
                parent
            );
            kept
        }
        None => Vec::new(),
    };

    if scope == CookieScope::ParentAndHost {
        let mut seen: HashSet<(String, String, String)> = cookies
            .iter()
            .map(|c| (c.name.clone(), c.domain.clone(), c.path.clone()))
            .collect();
        for cookie in jar.list(domain.as_str()).await? {
            if !domain.is_within(cookie.bare_domain()) {
                continue;
            }
            if seen.insert((cookie.name.clone(), cookie.domain.clone(), cookie.path.clone())) {
                cookies.push(cookie);
            }
        }
    }

    Ok(cookies)
}
