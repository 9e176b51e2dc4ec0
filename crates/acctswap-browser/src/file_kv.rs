//! JSON-file backed persistent store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::warn;

use acctswap_core::Result;

use crate::host::PersistentKv;

/// Keeps every key in one JSON object on disk.
pub struct FileKv {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileKv {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_object(&self) -> Result<Map<String, Value>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<Value>(&data)? {
            Value::Object(map) => Ok(map),
            _ => {
                warn!("{} does not hold a JSON object, starting fresh", self.path.display());
                Ok(Map::new())
            }
        }
    }
}

#[async_trait]
impl PersistentKv for FileKv {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_object().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut object = self.read_object().await?;
        object.insert(key.to_string(), value);
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&Value::Object(object))?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}
