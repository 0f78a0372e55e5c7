//! File backend
//!
//! Durable host store kept as one JSON object on disk. Every mutation rewrites
//! the file through a temporary sibling and a rename, so a crash leaves either
//! the old or the new contents.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{item_bytes, BackendError, StorageBackend, StorageEstimate, TabId};

// == File Backend ==
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
    capacity: Option<u64>,
    tab: TabId,
}

impl FileBackend {
    /// Opens (or creates on first write) the store at `path`.
    ///
    /// A file that does not parse is moved aside to `<path>.corrupt` and the
    /// store starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let path = path.into();
        let items = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(items) => items,
                Err(e) => {
                    let aside = path.with_extension("corrupt");
                    warn!(
                        "Store file {} is unreadable ({}), moving it to {}",
                        path.display(),
                        e,
                        aside.display()
                    );
                    fs::rename(&path, &aside)?;
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!("Opened store file {} with {} items", path.display(), items.len());

        Ok(Self {
            path,
            items: Mutex::new(items),
            capacity: None,
            tab: Uuid::new_v4(),
        })
    }

    /// Limits the store to `bytes` (UTF-16 accounting) and reports that limit
    /// as the host estimate.
    pub fn with_capacity(mut self, bytes: u64) -> Self {
        self.capacity = Some(bytes);
        self
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> Result<(), BackendError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(items)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let mut items = self.items.lock();
        if let Some(capacity) = self.capacity {
            let used: u64 = items.iter().map(|(k, v)| item_bytes(k, v)).sum();
            let replaced = items.get(key).map_or(0, |old| item_bytes(key, old));
            if used - replaced + item_bytes(key, value) > capacity {
                return Err(BackendError::QuotaExceeded);
            }
        }

        let previous = items.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(&items) {
            // Keep memory and disk in step
            match previous {
                Some(old) => items.insert(key.to_string(), old),
                None => items.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), BackendError> {
        let mut items = self.items.lock();
        let Some(old) = items.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.persist(&items) {
            items.insert(key.to_string(), old);
            return Err(e);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.items.lock().keys().cloned().collect())
    }

    fn clear(&self) -> Result<(), BackendError> {
        let mut items = self.items.lock();
        let previous = std::mem::take(&mut *items);
        if let Err(e) = self.persist(&items) {
            *items = previous;
            return Err(e);
        }
        Ok(())
    }

    fn estimate(&self) -> Option<StorageEstimate> {
        let quota = self.capacity?;
        let usage = self.items.lock().iter().map(|(k, v)| item_bytes(k, v)).sum();
        Some(StorageEstimate { usage, quota })
    }

    fn tab_id(&self) -> TabId {
        self.tab
    }
}
