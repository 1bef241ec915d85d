use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use super::error::{PendingError, Result};
use super::model::PendingRequest;
use crate::shared::paths;

const LOCK_RETRY_COUNT: u32 = 10;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(50);

type Items = BTreeMap<String, Vec<PendingRequest>>;

/// Identity of the file contents last read: modification time and length.
type Stamp = Option<(SystemTime, u64)>;

fn stamp(path: &Path) -> Stamp {
    let meta = fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

struct Cached {
    stamp: Stamp,
    items: Items,
}

/// Persisted per-category lists of pending requests.
///
/// Other processes may write the same file, so reads reload it whenever it
/// changed on disk and every mutation re-reads it under the exclusive lock
/// before applying the change. A failed write leaves the file untouched.
pub struct PendingStore {
    path: PathBuf,
    cache: Mutex<Option<Cached>>,
}

impl PendingStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    /// Store at `~/.config/partdb/pending.json`.
    pub fn default_location() -> Result<Self> {
        let dir = paths::config_base().ok_or(PendingError::ConfigDirNotFound)?;
        Ok(Self::open(dir.join("pending.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_items<R>(&self, f: impl FnOnce(&Items) -> R) -> R {
        let mut guard = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let current = stamp(&self.path);
        let cached = match guard.take() {
            Some(cached) if cached.stamp == current => cached,
            _ => Cached {
                stamp: current,
                items: load(&self.path),
            },
        };
        f(&guard.insert(cached).items)
    }

    /// Requests of a category, oldest first.
    pub fn list_for(&self, category: &str) -> Vec<PendingRequest> {
        self.with_items(|items| items.get(category).cloned().unwrap_or_default())
    }

    pub fn has_any(&self, category: &str) -> bool {
        self.with_items(|items| items.get(category).is_some_and(|v| !v.is_empty()))
    }

    pub fn is_empty(&self) -> bool {
        self.with_items(|items| items.values().all(Vec::is_empty))
    }

    pub fn items_by_category(&self) -> BTreeMap<String, Vec<PendingRequest>> {
        self.with_items(Items::clone)
    }

    /// Append a request to its category.
    pub fn add(&self, category: &str, request: PendingRequest) -> Result<()> {
        self.update(|items| {
            items.entry(category.to_string()).or_default().push(request);
        })
    }

    /// Replace the list of a category. An empty list removes the category.
    pub fn set_items(&self, category: &str, list: Vec<PendingRequest>) -> Result<()> {
        self.update(|items| {
            if list.is_empty() {
                items.remove(category);
            } else {
                items.insert(category.to_string(), list);
            }
        })
    }

    pub fn clear(&self, category: &str) -> Result<()> {
        self.set_items(category, Vec::new())
    }

    fn update(&self, change: impl FnOnce(&mut Items)) -> Result<()> {
        let mut guard = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let storage = |source| PendingError::Storage {
            path: self.path.clone(),
            source,
        };

        let dir = self
            .path
            .parent()
            .ok_or_else(|| storage(std::io::Error::other("no parent directory")))?;
        fs::create_dir_all(dir).map_err(storage)?;
        let lock_file = open_lock_file(&self.path).map_err(storage)?;
        acquire_lock(&lock_file, false)?;

        let current = parse(&self.path, read_file(&self.path));
        let mut next = current.clone();
        change(&mut next);
        let items = if next == current {
            current
        } else {
            write_file(&self.path, dir, &next)?;
            next
        };
        *guard = Some(Cached {
            stamp: stamp(&self.path),
            items,
        });
        Ok(())
    }
}

fn lock_path(path: &Path) -> PathBuf {
    path.with_extension("json.lock")
}

fn open_lock_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path(path))
}

fn acquire_lock(file: &File, shared: bool) -> Result<()> {
    for attempt in 0..LOCK_RETRY_COUNT {
        let result = if shared {
            file.try_lock_shared()
        } else {
            file.try_lock()
        };
        match result {
            Ok(()) => return Ok(()),
            Err(TryLockError::WouldBlock) => {
                if attempt < LOCK_RETRY_COUNT - 1 {
                    std::thread::sleep(LOCK_RETRY_DELAY);
                }
            }
            Err(TryLockError::Error(e)) => return Err(e.into()),
        }
    }
    Err(PendingError::LockTimeout(LOCK_RETRY_DELAY * LOCK_RETRY_COUNT).into())
}

/// Read the store file under a shared lock.
fn load(path: &Path) -> Items {
    if !path.exists() {
        return Items::new();
    }
    let content = open_lock_file(path)
        .map_err(anyhow::Error::from)
        .and_then(|lock_file| acquire_lock(&lock_file, true))
        .and_then(|()| read_file(path));
    parse(path, content)
}

fn read_file(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// A missing, unreadable or corrupted file yields an empty store; the next
/// write replaces it.
fn parse(path: &Path, content: Result<Option<String>>) -> Items {
    let content = match content {
        Ok(Some(content)) => content,
        Ok(None) => return Items::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), "failed to read pending requests: {e:#}");
            return Items::new();
        }
    };

    match serde_json::from_str::<Items>(&content) {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(path = %path.display(), "pending requests file is corrupted: {e}");
            Items::new()
        }
    }
}

/// Replace the store file. Callers hold the exclusive lock.
fn write_file(path: &Path, dir: &Path, items: &Items) -> Result<()> {
    let storage = |source| PendingError::Storage {
        path: path.to_path_buf(),
        source,
    };
    let content = serde_json::to_string_pretty(items)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(storage)?;
    tmp.write_all(content.as_bytes()).map_err(storage)?;
    tmp.as_file().sync_all().map_err(storage)?;
    tmp.persist(path).map_err(|e| storage(e.error))?;
    Ok(())
}
