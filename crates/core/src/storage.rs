//! Durable client-side storage
//!
//! A small string key-value store with the semantics of browser local
//! storage: every write is persisted immediately, reads come from memory.
//! Two keys are used by the client:
//! - [`TOKEN_KEY`]: the bearer credential
//! - [`BATTLE_MARKER_KEY`]: the stage guard marker

use crate::error::Result;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const TOKEN_KEY: &str = "token";
pub const BATTLE_MARKER_KEY: &str = "battleId";

/// String key-value store shared by the session store and the stage guard
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

pub type SharedStore = Arc<dyn StateStore>;

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Non-persistent store, used by tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

// ============================================================================
// FILE STORE
// ============================================================================

/// JSON-object file store, rewritten on every mutation
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, loading existing entries if the file exists.
    ///
    /// A missing file starts empty; an unreadable or malformed file is
    /// logged and also starts empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let entries = load_entries(&path);
        debug!(path = %path.display(), keys = entries.len(), "Opened state store");

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let object: Map<String, Value> = entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        let json = serde_json::to_string_pretty(&Value::Object(object))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

fn load_entries(path: &Path) -> BTreeMap<String, String> {
    let data = match fs::read_to_string(path) {
        Ok(d) => d,
        Err(_) => {
            info!("No client state found (path = {})", path.display());
            return BTreeMap::new();
        }
    };

    let json: Value = match serde_json::from_str(&data) {
        Ok(j) => j,
        Err(e) => {
            warn!("Failed to parse client state JSON: {e}");
            return BTreeMap::new();
        }
    };

    match json {
        Value::Object(obj) => obj
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k, s)),
                other => {
                    warn!(key = %k, "Ignoring non-string state entry: {other}");
                    None
                }
            })
            .collect(),
        _ => {
            warn!("Client state is not a JSON object, ignoring");
            BTreeMap::new()
        }
    }
}
