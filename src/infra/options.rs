//! Persisted key/value stores for lastmod values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::repos::{OptionStore, RepoError};

use super::error::InfraError;

/// Process-local store.
#[derive(Default)]
pub struct InMemoryOptionStore {
    values: DashMap<String, String>,
}

impl InMemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl OptionStore for InMemoryOptionStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>, RepoError> {
        Ok(self.value(key))
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), RepoError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a single JSON object on disk.
///
/// Every write rewrites the file through a sibling temp file and a rename, so a
/// crash never leaves a truncated document behind. Writers are serialized on their
/// own lock; the value map is only locked for in-memory access, so reads never wait
/// on disk I/O.
pub struct JsonFileOptionStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
    writes: Mutex<()>,
}

impl JsonFileOptionStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, InfraError> {
        let path = path.into();
        let values = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| {
                InfraError::store(format!("failed to parse {}: {err}", path.display()))
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(InfraError::Io(err)),
        };

        debug!(
            target = "infra::options::JsonFileOptionStore",
            path = %path.display(),
            entries = values.len(),
            "lastmod store opened"
        );

        Ok(Self {
            path,
            values: Mutex::new(values),
            writes: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), RepoError> {
        let body = serde_json::to_vec_pretty(values).map_err(RepoError::from_persistence)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(RepoError::from_persistence)?;
        }
        tokio::fs::write(&tmp, body)
            .await
            .map_err(RepoError::from_persistence)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(RepoError::from_persistence)
    }
}

#[async_trait]
impl OptionStore for JsonFileOptionStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>, RepoError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), RepoError> {
        let _writer = self.writes.lock().await;
        let (previous, snapshot) = {
            let mut values = self.values.lock().await;
            let previous = values.insert(key.to_string(), value.to_string());
            (previous, values.clone())
        };

        if let Err(err) = self.persist(&snapshot).await {
            // Still the only writer, so nothing newer can be clobbered here.
            let mut values = self.values.lock().await;
            match previous {
                Some(previous) => values.insert(key.to_string(), previous),
                None => values.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }
}
