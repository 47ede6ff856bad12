//! Namespaced key-value store emulating the platform KV API.
//!
//! Two persistence modes exist:
//!
//! - [`KvPersistence::Memory`]: state lives for the lifetime of the process,
//!   optionally seeded once from a project file at startup.
//! - [`KvPersistence::File`]: the whole namespace map is written back to disk
//!   after every mutation so it survives sandbox restarts.
//!
//! A missing key is reported as `Ok(None)`. Values are never "undefined": an
//! empty string is a stored value and is returned as `Some`.

use crate::cache::Headers;
use crate::error::{MockError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

type Namespaces = BTreeMap<String, BTreeMap<String, KvValue>>;

/// Response-like object captured by `put` as `{body, headers, status}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub body: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default = "default_status")]
    pub status: u16,
}

fn default_status() -> u16 {
    200
}

/// A stored KV value, tagged with the shape it was written in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum KvValue {
    Text(String),
    Bytes(Vec<u8>),
    Response(ResponseSnapshot),
}

impl KvValue {
    fn decode(&self, key: &str, ty: KvGetType) -> Result<KvOutput> {
        match ty {
            KvGetType::Text => Ok(KvOutput::Text(self.as_text()?)),
            KvGetType::ArrayBuffer => Ok(KvOutput::Bytes(self.as_bytes()?)),
            KvGetType::Json => {
                let value = match self {
                    KvValue::Response(snapshot) => serde_json::to_value(snapshot)?,
                    _ => serde_json::from_slice(&self.as_bytes()?).map_err(|source| {
                        MockError::InvalidJson {
                            key: key.to_string(),
                            source,
                        }
                    })?,
                };
                Ok(KvOutput::Json(value))
            }
        }
    }

    fn as_text(&self) -> Result<String> {
        Ok(match self {
            KvValue::Text(text) => text.clone(),
            KvValue::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            KvValue::Response(snapshot) => serde_json::to_string(snapshot)?,
        })
    }

    fn as_bytes(&self) -> Result<Vec<u8>> {
        Ok(match self {
            KvValue::Text(text) => text.as_bytes().to_vec(),
            KvValue::Bytes(bytes) => bytes.clone(),
            KvValue::Response(snapshot) => serde_json::to_vec(snapshot)?,
        })
    }
}

/// Decodings accepted by `get(key, {type})`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KvGetType {
    #[default]
    Text,
    Json,
    ArrayBuffer,
}

impl FromStr for KvGetType {
    type Err = MockError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(KvGetType::Text),
            "json" => Ok(KvGetType::Json),
            "arrayBuffer" => Ok(KvGetType::ArrayBuffer),
            other => Err(MockError::UnsupportedType(other.to_string())),
        }
    }
}

/// Decoded result of a successful `get`.
#[derive(Debug, Clone, PartialEq)]
pub enum KvOutput {
    Text(String),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
}

/// Where the store keeps its state between mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvPersistence {
    Memory,
    File(PathBuf),
}

/// Mock KV store shared by every namespace of one session.
#[derive(Debug)]
pub struct MockKv {
    namespaces: RwLock<Namespaces>,
    persistence: KvPersistence,
}

impl MockKv {
    /// Empty memory-only store.
    pub fn in_memory() -> Self {
        Self {
            namespaces: RwLock::new(Namespaces::new()),
            persistence: KvPersistence::Memory,
        }
    }

    /// Memory-only store seeded once from a project file.
    ///
    /// The seed file maps `namespace -> key -> value`; string values are stored
    /// as text and any other JSON value is stored as its serialized text. A
    /// missing seed file yields an empty store.
    pub fn seeded(path: &Path) -> Result<Self> {
        let store = Self::in_memory();
        if !path.exists() {
            return Ok(store);
        }

        let content = std::fs::read_to_string(path).map_err(|e| MockError::Seed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let seed: BTreeMap<String, BTreeMap<String, serde_json::Value>> =
            serde_json::from_str(&content).map_err(|e| MockError::Seed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        {
            let mut namespaces = store.namespaces.write();
            for (namespace, entries) in seed {
                let target = namespaces.entry(namespace).or_default();
                for (key, value) in entries {
                    let text = match value {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    target.insert(key, KvValue::Text(text));
                }
            }
        }

        tracing::debug!(path = %path.display(), "seeded mock KV store");
        Ok(store)
    }

    /// File-backed store. Existing state is loaded from `path`; an unreadable
    /// or corrupt file is treated as empty.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let namespaces = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<Namespaces>(&bytes).unwrap_or_else(|e| {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "mock KV store file is corrupt, starting empty"
                );
                Namespaces::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Namespaces::new(),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to read mock KV store file, starting empty"
                );
                Namespaces::new()
            }
        };

        Self {
            namespaces: RwLock::new(namespaces),
            persistence: KvPersistence::File(path),
        }
    }

    pub fn persistence(&self) -> &KvPersistence {
        &self.persistence
    }

    /// Read `key` from `namespace`, decoded as `ty`.
    ///
    /// Returns `Ok(None)` for a missing key.
    pub fn get(&self, namespace: &str, key: &str, ty: KvGetType) -> Result<Option<KvOutput>> {
        match self.get_raw(namespace, key) {
            Some(value) => value.decode(key, ty).map(Some),
            None => Ok(None),
        }
    }

    /// The stored value as written, without decoding.
    pub fn get_raw(&self, namespace: &str, key: &str) -> Option<KvValue> {
        self.namespaces
            .read()
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .cloned()
    }

    pub fn put(&self, namespace: &str, key: &str, value: KvValue) -> Result<()> {
        self.mutate(|namespaces| {
            namespaces
                .entry(namespace.to_string())
                .or_default()
                .insert(key.to_string(), value);
            ((), true)
        })
    }

    /// Remove `key`. Returns whether a value was removed.
    pub fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        self.mutate(|namespaces| {
            let removed = namespaces
                .get_mut(namespace)
                .map(|entries| entries.remove(key).is_some())
                .unwrap_or(false);
            if namespaces.get(namespace).is_some_and(BTreeMap::is_empty) {
                namespaces.remove(namespace);
            }
            (removed, removed)
        })
    }

    /// Apply `change` under the write lock. `change` reports whether it
    /// modified anything.
    ///
    /// File-backed stores apply it to a copy, which replaces the live map only
    /// once it was written, so a failed write leaves memory and file in step.
    fn mutate<R>(&self, change: impl FnOnce(&mut Namespaces) -> (R, bool)) -> Result<R> {
        let mut namespaces = self.namespaces.write();
        if self.persistence == KvPersistence::Memory {
            return Ok(change(&mut namespaces).0);
        }

        let mut next = namespaces.clone();
        let (result, changed) = change(&mut next);
        if changed {
            self.persist(&next)?;
            *namespaces = next;
        }
        Ok(result)
    }

    /// Keys stored in `namespace`, sorted.
    pub fn keys(&self, namespace: &str) -> Vec<String> {
        self.namespaces
            .read()
            .get(namespace)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Write the full map to disk. Callers hold the write lock so concurrent
    /// mutations serialize their writes.
    fn persist(&self, namespaces: &Namespaces) -> Result<()> {
        let KvPersistence::File(path) = &self.persistence else {
            return Ok(());
        };

        let json = serde_json::to_vec_pretty(namespaces)?;
        let persist_err = |source| MockError::Persist {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(persist_err)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(persist_err)?;
        std::fs::rename(&tmp, path).map_err(persist_err)?;
        Ok(())
    }
}

impl Default for MockKv {
    fn default() -> Self {
        Self::in_memory()
    }
}
