//! Per-domain mutual exclusion for account operations.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::Domain;

/// Hands out one async lock per domain.
#[derive(Default)]
pub struct DomainLocks {
    locks: Mutex<HashMap<Domain, Arc<AsyncMutex<()>>>>,
}

impl DomainLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other operation holds `domain`.
    ///
    /// Locks nobody holds or waits on are dropped on the way in, so the map
    /// only grows with the number of domains in use at once.
    pub async fn acquire(&self, domain: &Domain) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(domain.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of domains with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_domain_is_exclusive() {
        let locks = Arc::new(DomainLocks::new());
        let d = Domain::parse("www.x.com").unwrap();
        let guard = locks.acquire(&d).await;

        let waiter = {
            let locks = locks.clone();
            let d = d.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(&d).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_domains_do_not_block() {
        let locks = DomainLocks::new();
        let a = Domain::parse("www.a.com").unwrap();
        let b = Domain::parse("www.b.com").unwrap();
        let _ga = locks.acquire(&a).await;
        let gb = tokio::time::timeout(Duration::from_secs(1), locks.acquire(&b)).await;
        assert!(gb.is_ok());
    }

    #[tokio::test]
    async fn test_idle_locks_are_pruned() {
        let locks = DomainLocks::new();
        for host in ["www.a.com", "www.b.com", "www.c.com"] {
            let _g = locks.acquire(&Domain::parse(host).unwrap()).await;
        }
        assert_eq!(locks.len(), 1);

        let held = locks.acquire(&Domain::parse("www.d.com").unwrap()).await;
        let other = locks.acquire(&Domain::parse("www.e.com").unwrap()).await;
        assert_eq!(locks.len(), 2);
        drop(held);
        drop(other);

        let _f = locks.acquire(&Domain::parse("www.f.com").unwrap()).await;
        assert_eq!(locks.len(), 1);
    }
}
