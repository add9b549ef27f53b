//! Durable storage for cache namespaces
//!
//! A namespace is persisted as one unit: the whole map of entry key to
//! `{data, timestamp}` is serialized to JSON and written to a single slot
//! named after the namespace. Failures never escape this module; a broken
//! or missing slot reads back as an empty namespace.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

/// A cached payload together with the instant it was written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The fetched result, stored as JSON
    pub data: serde_json::Value,
    /// When the entry was written, in milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// All entries of one namespace, keyed by entry key
pub type NamespaceMap = BTreeMap<String, CacheEntry>;

/// A synchronous, process-local, string-keyed persistent store
///
/// Each slot holds one UTF-8 string. Implementations report I/O problems;
/// deciding what to do about them is left to [`NamespaceStore`].
pub trait SlotStore {
    /// Reads a slot, returning `Ok(None)` if it has never been written
    fn get(&self, slot: &str) -> io::Result<Option<String>>;

    /// Replaces the contents of a slot
    fn set(&self, slot: &str, value: &str) -> io::Result<()>;

    /// Deletes a slot; removing a missing slot is not an error
    fn remove(&self, slot: &str) -> io::Result<()>;
}

/// Stores each slot as a JSON file in a cache directory
///
/// Uses the XDG cache directory (`~/.cache/stockfolio/` on Linux) unless a
/// directory is given explicitly. The directory is created on first write.
#[derive(Debug, Clone)]
pub struct FileSlotStore {
    /// Directory where slot files are stored
    cache_dir: PathBuf,
}

impl FileSlotStore {
    /// Creates a store in the XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "stockfolio")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a store rooted at a custom directory
    pub fn with_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Directory holding the slot files
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path of the file backing a slot
    ///
    /// Bytes outside `[A-Za-z0-9._-]` are percent-encoded, so every slot
    /// name maps to its own file and none can escape the cache directory.
    fn slot_path(&self, slot: &str) -> PathBuf {
        let mut file_stem = String::with_capacity(slot.len());
        for byte in slot.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
                file_stem.push(byte as char);
            } else {
                file_stem.push_str(&format!("%{:02X}", byte));
            }
        }
        self.cache_dir.join(format!("{}.json", file_stem))
    }
}

impl SlotStore for FileSlotStore {
    fn get(&self, slot: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.slot_path(slot)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&self, slot: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.cache_dir)?;
        fs::write(self.slot_path(slot), value)
    }

    fn remove(&self, slot: &str) -> io::Result<()> {
        match fs::remove_file(self.slot_path(slot)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Keeps slots in process memory
///
/// Clones share the same slots. Used when no cache directory is available
/// and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySlotStore {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySlotStore {
    /// Creates an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.slots
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory slot store poisoned"))
    }
}

impl SlotStore for MemorySlotStore {
    fn get(&self, slot: &str) -> io::Result<Option<String>> {
        Ok(self.lock()?.get(slot).cloned())
    }

    fn set(&self, slot: &str, value: &str) -> io::Result<()> {
        self.lock()?.insert(slot.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, slot: &str) -> io::Result<()> {
        self.lock()?.remove(slot);
        Ok(())
    }
}

/// Serializes whole namespaces to and from a [`SlotStore`]
#[derive(Debug, Clone)]
pub struct NamespaceStore<S> {
    slots: S,
}

impl<S: SlotStore> NamespaceStore<S> {
    /// Creates a namespace store over the given slots
    pub fn new(slots: S) -> Self {
        Self { slots }
    }

    /// The underlying slot store
    pub fn slots(&self) -> &S {
        &self.slots
    }

    /// Writes the full namespace map to the slot named `namespace`
    ///
    /// Serialization and write failures are logged and swallowed; a cache
    /// write must never abort the data fetch that produced it. Returns
    /// whether the write landed.
    pub fn persist(&self, namespace: &str, map: &NamespaceMap) -> bool {
        let json = match serde_json::to_string(map) {
            Ok(json) => json,
            Err(e) => {
                error!(namespace, error = %e, "Failed to serialize cache namespace");
                return false;
            }
        };

        match self.slots.set(namespace, &json) {
            Ok(()) => {
                debug!(namespace, entries = map.len(), "Persisted cache namespace");
                true
            }
            Err(e) => {
                error!(namespace, error = %e, "Failed to save cache namespace");
                false
            }
        }
    }

    /// Reads the namespace map stored in the slot named `namespace`
    ///
    /// An absent slot is an empty namespace. Unreadable or malformed content
    /// is logged and also treated as an empty namespace.
    pub fn load(&self, namespace: &str) -> NamespaceMap {
        let content = match self.slots.get(namespace) {
            Ok(Some(content)) => content,
            Ok(None) => return NamespaceMap::new(),
            Err(e) => {
                error!(namespace, error = %e, "Failed to read cache namespace");
                return NamespaceMap::new();
            }
        };

        if content.is_empty() {
            return NamespaceMap::new();
        }

        serde_json::from_str(&content).unwrap_or_else(|e| {
            error!(namespace, error = %e, "Failed to parse cache namespace");
            NamespaceMap::new()
        })
    }

    /// Drops every entry of a namespace by removing its slot
    pub fn clear(&self, namespace: &str) -> bool {
        match self.slots.remove(namespace) {
            Ok(()) => true,
            Err(e) => {
                error!(namespace, error = %e, "Failed to clear cache namespace");
                false
            }
        }
    }
}
