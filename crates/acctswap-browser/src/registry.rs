//! Registry persistence: the whole account map lives in one JSON blob.

use std::sync::Arc;

use acctswap_core::{Error, Result};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::host::PersistentKv;
use crate::types::Registry;

/// Owns the single persisted key and serializes read-modify-write cycles.
pub struct RegistryStore {
    kv: Arc<dyn PersistentKv>,
    key: String,
    write_lock: Mutex<()>,
}

impl RegistryStore {
    pub fn new(kv: Arc<dyn PersistentKv>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the registry. A missing key yields an empty registry.
    pub async fn load(&self) -> Result<Registry> {
        let value = self
            .kv
            .get(&self.key)
            .await
            .map_err(|e| Error::PersistenceFailure(format!("read {}: {}", self.key, e)))?;
        match value {
            None | Some(serde_json::Value::Null) => Ok(Registry::default()),
            Some(blob) => serde_json::from_value(blob).map_err(|e| {
                warn!("Registry under {} is malformed: {}", self.key, e);
                Error::PersistenceFailure(format!("decode {}: {}", self.key, e))
            }),
        }
    }

    async fn store(&self, registry: &Registry) -> Result<()> {
        let blob = serde_json::to_value(registry)?;
        self.kv
            .set(&self.key, blob)
            .await
            .map_err(|e| Error::PersistenceFailure(format!("write {}: {}", self.key, e)))
    }

    /// Run `f` against the current registry and persist the result.
    ///
    /// Nothing is written when `f` fails. Concurrent calls are applied one
    /// at a time so no update is lost.
    pub async fn modify<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Registry) -> Result<T>,
    {
        let _guard = self.write_lock.lock().await;
        let mut registry = self.load().await?;
        let out = f(&mut registry)?;
        self.store(&registry).await?;
        debug!("Registry {} persisted ({} domains)", self.key, registry.domains.len());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryKv;
    use crate::types::{AccountSnapshot, CookieRecord, StorageMap};

    fn snapshot(value: &str) -> AccountSnapshot {
        AccountSnapshot::new(vec![CookieRecord::new("sid", value, ".x.com")], StorageMap::new())
    }

    #[tokio::test]
    async fn test_load_empty() {
        let kv = Arc::new(MemoryKv::new());
        let store = RegistryStore::new(kv, "cookieAccounts");
        assert!(store.load().await.unwrap().domains.is_empty());
    }

    #[tokio::test]
    async fn test_modify_persists() {
        let kv = Arc::new(MemoryKv::new());
        let store = RegistryStore::new(kv.clone(), "cookieAccounts");
        store
            .modify(|r| {
                r.upsert("www.x.com", "a", snapshot("1"));
                Ok(())
            })
            .await
            .unwrap();

        let raw = kv.raw("cookieAccounts").unwrap();
        assert_eq!(raw["www.x.com"]["a"]["cookies"][0]["value"], "1");
        assert_eq!(store.load().await.unwrap().account_names("www.x.com"), vec!["a"]);
    }

    #[tokio::test]
    async fn test_failed_modify_writes_nothing() {
        let kv = Arc::new(MemoryKv::new());
        let store = RegistryStore::new(kv.clone(), "cookieAccounts");
        let result: Result<()> = store
            .modify(|_| Err(Error::AccountNotFound {
                domain: "www.x.com".into(),
                account: "a".into(),
            }))
            .await;
        assert!(matches!(result, Err(Error::AccountNotFound { .. })));
        assert_eq!(kv.writes(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_is_persistence_error() {
        let kv = Arc::new(MemoryKv::new());
        kv.fail_writes(true);
        let store = RegistryStore::new(kv, "cookieAccounts");
        let result = store
            .modify(|r| {
                r.upsert("www.x.com", "a", snapshot("1"));
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(Error::PersistenceFailure(_))));
    }

    #[tokio::test]
    async fn test_malformed_blob() {
        let kv = Arc::new(MemoryKv::new());
        kv.set("cookieAccounts", serde_json::json!([1, 2, 3])).await.unwrap();
        let store = RegistryStore::new(kv, "cookieAccounts");
        assert!(matches!(store.load().await, Err(Error::PersistenceFailure(_))));
    }

    #[tokio::test]
    async fn test_concurrent_modifications_are_not_lost() {
        let kv = Arc::new(MemoryKv::new());
        let store = Arc::new(RegistryStore::new(kv, "cookieAccounts"));

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .modify(|r| {
                        r.upsert(&format!("www.site{i}.com"), "a", snapshot("1"));
                        Ok(())
                    })
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(store.load().await.unwrap().domains.len(), 8);
    }
}
