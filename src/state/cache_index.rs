//! Cache index (4.7): the two sets of asset names — *availables* and
//! *cached* — plus an *in-progress* set, guarded by a single mutex.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashforge_common::{AssetState, Error, Protocol, Result};
use parking_lot::Mutex;
use walkdir::WalkDir;

use crate::state::{AssetListing, AssetRecord};

struct Inner {
    availables: HashMap<String, AssetRecord>,
    cached: HashSet<String>,
    in_progress: HashMap<String, Arc<AtomicBool>>,
}

pub struct CacheIndex {
    video_dir: PathBuf,
    cache_root: PathBuf,
    inner: Mutex<Inner>,
}

impl CacheIndex {
    pub fn new(video_dir: PathBuf, cache_root: PathBuf) -> Self {
        Self {
            video_dir,
            cache_root,
            inner: Mutex::new(Inner {
                availables: HashMap::new(),
                cached: HashSet::new(),
                in_progress: HashMap::new(),
            }),
        }
    }

    /// `listAvailables` (4.7): one record per available asset, `state`
    /// derived from the cached/in-progress sets.
    pub fn list_availables(&self) -> Vec<AssetListing> {
        let inner = self.inner.lock();
        inner
            .availables
            .values()
            .map(|record| {
                let generated = inner.cached.contains(&record.name);
                let state = if generated {
                    AssetState::Generated
                } else if inner.in_progress.contains_key(&record.name) {
                    AssetState::Generating
                } else {
                    AssetState::NotGenerated
                };
                AssetListing {
                    name: record.name.clone(),
                    protocol: record.protocol,
                    path: record.path.clone(),
                    is_live: record.is_live,
                    generated,
                    state,
                }
            })
            .collect()
    }

    /// `addAvailable` (4.7). The protocol was already validated by
    /// `Protocol::from_str` at the HTTP boundary, so there is nothing left
    /// to reject here.
    pub fn add_available(&self, record: AssetRecord) {
        self.inner.lock().availables.insert(record.name.clone(), record);
    }

    /// `addFile` (4.7): synthesize a `{protocol=file, ...}` record from a
    /// path on disk.
    pub fn add_file(&self, path: &Path) {
        let name = dashforge_common::paths::asset_name(path);
        self.add_available(AssetRecord {
            name,
            protocol: Protocol::File,
            path: path.display().to_string(),
            is_live: false,
        });
    }

    /// `removeFile` (4.7): drop the asset and, if cached, delete its cache
    /// directory.
    pub fn remove_file(&self, path: &Path) -> Result<()> {
        let name = dashforge_common::paths::asset_name(path);
        let was_cached = {
            let mut inner = self.inner.lock();
            inner.availables.remove(&name);
            inner.cached.remove(&name)
        };
        if was_cached {
            self.delete_cache_dir(&name)?;
        }
        Ok(())
    }

    /// `updateFile` (4.7): cache invalidation — keep the asset available but
    /// drop its generated cache directory.
    pub fn update_file(&self, path: &Path) -> Result<()> {
        let name = dashforge_common::paths::asset_name(path);
        let was_cached = self.inner.lock().cached.remove(&name);
        if was_cached {
            self.delete_cache_dir(&name)?;
        }
        Ok(())
    }

    fn delete_cache_dir(&self, name: &str) -> Result<()> {
        let dir = self.cache_root.join(name);
        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    /// Single-flight entry into `build(name)`: fails `Conflict` if a run is
    /// already in progress, returns the stop flag the live worker (if any)
    /// will poll. Returns `None` if the asset is already cached (no-op).
    pub fn try_begin_build(&self, name: &str) -> Result<Option<Arc<AtomicBool>>> {
        let mut inner = self.inner.lock();
        if !inner.availables.contains_key(name) {
            return Err(Error::not_found(name));
        }
        if inner.cached.contains(name) {
            return Ok(None);
        }
        if inner.in_progress.contains_key(name) {
            return Err(Error::conflict(name));
        }
        let stop = Arc::new(AtomicBool::new(false));
        inner.in_progress.insert(name.to_string(), stop.clone());
        Ok(Some(stop))
    }

    /// `<protocol>://<path>` for the generation controller to open.
    pub fn source_url(&self, name: &str) -> Result<String> {
        let inner = self.inner.lock();
        let record = inner.availables.get(name).ok_or_else(|| Error::not_found(name))?;
        Ok(format!("{}://{}", record.protocol, record.path))
    }

    pub fn asset_record(&self, name: &str) -> Result<AssetRecord> {
        self.inner
            .lock()
            .availables
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(name))
    }

    /// Clears the in-progress marker and, on success, adds the asset to
    /// *cached*.
    pub fn finish_build(&self, name: &str, success: bool) {
        let mut inner = self.inner.lock();
        inner.in_progress.remove(name);
        if success {
            inner.cached.insert(name.to_string());
        }
    }

    /// `stop(name)` (4.7): signal the live worker, drop the cached flag, and
    /// remove the asset directory.
    pub fn stop(&self, name: &str) -> Result<()> {
        let stop_flag = {
            let mut inner = self.inner.lock();
            inner.cached.remove(name);
            inner.in_progress.remove(name)
        };
        if let Some(flag) = stop_flag {
            flag.store(true, Ordering::Relaxed);
        }
        self.delete_cache_dir(name)
    }

    /// `element(name, file)` (4.7). Existence is not asserted here; the HTTP
    /// layer 404s if the path does not resolve to a real file.
    pub fn element(&self, name: &str, file: &str) -> PathBuf {
        self.cache_root.join(name).join(file)
    }

    /// `BuildAvailables`: scan the video directory one level deep, adding
    /// every recognized video file as an available asset.
    pub fn build_availables(&self) {
        for entry in WalkDir::new(&self.video_dir).min_depth(1).max_depth(1) {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            if path.is_file() && dashforge_common::paths::is_video_file(path) {
                self.add_file(path);
            }
        }
    }

    /// `BuildCached`: scan the cache directory one level deep; a directory
    /// whose name matches an available asset and contains `manifest.mpd` is
    /// marked `generated`.
    pub fn build_cached(&self) {
        let mut newly_cached = Vec::new();
        {
            let inner = self.inner.lock();
            for entry in WalkDir::new(&self.cache_root).min_depth(1).max_depth(1) {
                let Ok(entry) = entry else { continue };
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                    continue;
                };
                if inner.availables.contains_key(&name) && path.join("manifest.mpd").exists() {
                    newly_cached.push(name);
                }
            }
        }
        let mut inner = self.inner.lock();
        for name in newly_cached {
            inner.cached.insert(name);
        }
    }

    /// Startup reconciliation: `BuildAvailables` then `BuildCached`.
    pub fn reconcile(&self) {
        self.build_availables();
        self.build_cached();
    }
}
