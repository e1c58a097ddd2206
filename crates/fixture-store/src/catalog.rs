use crate::{
    directory::{DirEntryInfo, DirectorySource, FsDirectory},
    ImageFormat, LoadStats, Result, StoreError,
};
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

/// One file held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub format: ImageFormat,
    pub data: Bytes,
}

impl AssetRecord {
    pub fn new(format: ImageFormat, data: impl Into<Bytes>) -> Self {
        Self {
            format,
            data: data.into(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

type AssetMap = HashMap<String, Arc<AssetRecord>>;

/// Immutable view of the catalog as produced by a single directory scan.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    assets: Arc<AssetMap>,
}

impl CatalogSnapshot {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<AssetRecord>> {
        self.assets.get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.assets.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Filenames in lexical order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.assets.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<AssetRecord>)> {
        self.assets.iter().map(|(name, record)| (name.as_str(), record))
    }
}

/// Difference between a directory listing and the catalog keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingDiff {
    /// Files in the listing that the catalog does not hold yet
    pub added: Vec<String>,
    /// Catalog keys that are no longer in the listing
    pub removed: Vec<String>,
}

impl ListingDiff {
    #[must_use]
    pub fn has_additions(&self) -> bool {
        !self.added.is_empty()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Filename-keyed collection of assets loaded from one directory.
///
/// Lookups read the currently published map. Loads build a complete map
/// first and publish it with a single swap, so a concurrent [`get`] sees
/// either the previous scan or the new one, never an empty or partial map.
///
/// [`get`]: AssetCatalog::get
pub struct AssetCatalog {
    source: Arc<dyn DirectorySource>,
    assets: RwLock<CatalogSnapshot>,
    writer: Mutex<()>,
}

impl AssetCatalog {
    /// Create an empty catalog backed by `source`. Nothing is read until [`load`](Self::load).
    pub fn new(source: Arc<dyn DirectorySource>) -> Self {
        Self {
            source,
            assets: RwLock::new(CatalogSnapshot::default()),
            writer: Mutex::new(()),
        }
    }

    pub fn open_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(Arc::new(FsDirectory::new(dir)))
    }

    #[must_use]
    pub fn location(&self) -> PathBuf {
        self.source.location()
    }

    /// Scan the directory and replace the catalog with its contents.
    ///
    /// Any listing or read failure aborts the load and leaves the
    /// previously published map untouched.
    pub fn load(&self) -> Result<LoadStats> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let start = Instant::now();

        let entries = self.list()?;
        let mut assets = AssetMap::with_capacity(entries.len());
        let mut stats = LoadStats::new();

        for entry in entries.into_iter().filter(|entry| !entry.is_dir) {
            let data = self.source.read_bytes(&entry.name).map_err(|err| {
                StoreError::io(self.location().join(&entry.name), "read file", err)
            })?;
            let format = ImageFormat::from_filename(&entry.name);
            stats.add_file(format, data.len());
            log::debug!(
                "Loaded {} ({} bytes, format {:?})",
                entry.name,
                data.len(),
                format.as_str()
            );
            assets.insert(entry.name, Arc::new(AssetRecord::new(format, data)));
        }

        self.publish(assets);
        stats.time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        log::info!(
            "Loaded {} files ({} bytes) from {} in {}ms",
            stats.files,
            stats.bytes,
            self.location().display(),
            stats.time_ms
        );
        Ok(stats)
    }

    /// Drop every entry and load the directory again.
    ///
    /// Readers keep seeing the previous scan until the new one is complete.
    pub fn rebuild(&self) -> Result<LoadStats> {
        log::debug!("Rebuilding catalog for {}", self.location().display());
        self.load()
    }

    /// Look up an asset by filename.
    pub fn get(&self, name: &str) -> Result<Arc<AssetRecord>> {
        self.snapshot()
            .get(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.publish(AssetMap::new());
    }

    #[must_use]
    pub fn snapshot(&self) -> CatalogSnapshot {
        self.assets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.snapshot().contains(name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.snapshot().names()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// List the backing directory.
    pub fn list(&self) -> Result<Vec<DirEntryInfo>> {
        self.source
            .list_entries()
            .map_err(|err| StoreError::io(self.location(), "list directory", err))
    }

    /// Compare a directory listing against the current keys. Directories are ignored.
    #[must_use]
    pub fn diff_listing(&self, entries: &[DirEntryInfo]) -> ListingDiff {
        let snapshot = self.snapshot();
        let listed: HashSet<&str> = entries
            .iter()
            .filter(|entry| !entry.is_dir)
            .map(|entry| entry.name.as_str())
            .collect();

        let mut added: Vec<String> = listed
            .iter()
            .filter(|name| !snapshot.contains(name))
            .map(|name| (*name).to_string())
            .collect();
        added.sort();

        let mut removed: Vec<String> = snapshot
            .iter()
            .map(|(name, _)| name)
            .filter(|name| !listed.contains(name))
            .map(str::to_string)
            .collect();
        removed.sort();

        ListingDiff { added, removed }
    }

    fn publish(&self, assets: AssetMap) {
        let next = CatalogSnapshot {
            assets: Arc::new(assets),
        };
        *self.assets.write().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

impl std::fmt::Debug for AssetCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetCatalog")
            .field("location", &self.location())
            .field("len", &self.len())
            .finish()
    }
}
