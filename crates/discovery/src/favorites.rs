//! Favorite resolution and annotation.
//!
//! The signed-in user's remote favorites win; signed-out use, or any remote
//! failure, degrades to the device-scoped store.

use crate::backend::{FavoritesBackend, FavoritesStore, SessionProvider};
use crate::error::StoreError;
use crate::model::ProximityResult;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Favorite ids plus the user they belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FavoriteSet {
    /// Signed-in user; `None` when the ids come from the device store
    pub user_id: Option<String>,
    /// Favorite record ids
    pub ids: HashSet<i64>,
}

impl FavoriteSet {
    /// Device-scoped set.
    pub fn local(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            user_id: None,
            ids: ids.into_iter().collect(),
        }
    }

    /// Whether `id` is a favorite.
    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    /// Copies `results` with `is_favorite` taken from membership alone, so
    /// applying the same set twice changes nothing.
    pub fn annotate(&self, results: &[ProximityResult]) -> Vec<ProximityResult> {
        results
            .iter()
            .map(|result| ProximityResult {
                is_favorite: self.contains(result.point.id),
                ..result.clone()
            })
            .collect()
    }
}

/// Resolves the favorite set for the current user.
pub struct FavoritesMerger<B> {
    remote: Arc<B>,
    local: Arc<dyn FavoritesStore>,
}

impl<B> Clone for FavoritesMerger<B> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            local: Arc::clone(&self.local),
        }
    }
}

impl<B> std::fmt::Debug for FavoritesMerger<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FavoritesMerger").finish_non_exhaustive()
    }
}

impl<B: SessionProvider + FavoritesBackend> FavoritesMerger<B> {
    /// Merger over a remote source and a device store.
    pub fn new(remote: Arc<B>, local: Arc<dyn FavoritesStore>) -> Self {
        Self { remote, local }
    }

    /// The device store.
    pub fn local_store(&self) -> &Arc<dyn FavoritesStore> {
        &self.local
    }

    /// Current favorites. Never fails: no session, a failed session lookup and
    /// a failed favorites lookup all yield the local set.
    pub async fn resolve(&self) -> FavoriteSet {
        let session = match self.remote.current_session().await {
            Ok(Some(session)) => session,
            Ok(None) => return self.local_set(),
            Err(e) => {
                warn!(error = %e, "Session lookup failed, using local favorites");
                return self.local_set();
            }
        };

        match self.remote.favorite_ids(&session.user_id).await {
            Ok(ids) => {
                let ids: HashSet<i64> = ids.into_iter().filter(|id| *id > 0).collect();
                debug!(user_id = %session.user_id, count = ids.len(), "Remote favorites resolved");
                FavoriteSet {
                    user_id: Some(session.user_id),
                    ids,
                }
            }
            Err(e) => {
                warn!(error = %e, "Remote favorites failed, using local favorites");
                self.local_set()
            }
        }
    }

    /// Toggles `id` in the device store.
    ///
    /// # Errors
    /// Returns the store error if the ids could not be written.
    pub fn toggle_local(&self, id: i64) -> Result<bool, StoreError> {
        self.local.toggle(id)
    }

    fn local_set(&self) -> FavoriteSet {
        FavoriteSet::local(self.local.load().into_iter().filter(|id| *id > 0))
    }
}

/// Favorites kept as a JSON array of ids on disk.
#[derive(Debug, Clone)]
pub struct FileFavoritesStore {
    path: PathBuf,
}

impl FileFavoritesStore {
    /// Store backed by `path`; the file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FavoritesStore for FileFavoritesStore {
    fn load(&self) -> Vec<i64> {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            debug!(path = %self.path.display(), error = %e, "Ignoring malformed favorites file");
            Vec::new()
        })
    }

    fn save(&self, ids: &[i64]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec(ids)?)?;
        Ok(())
    }
}

/// Process-local favorites.
#[derive(Debug, Default)]
pub struct MemoryFavoritesStore {
    ids: Mutex<Vec<i64>>,
}

impl MemoryFavoritesStore {
    /// Store seeded with `ids`.
    pub fn new(ids: Vec<i64>) -> Self {
        Self { ids: Mutex::new(ids) }
    }
}

impl FavoritesStore for MemoryFavoritesStore {
    fn load(&self) -> Vec<i64> {
        self.ids.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn save(&self, ids: &[i64]) -> Result<(), StoreError> {
        *self.ids.lock().unwrap_or_else(|e| e.into_inner()) = ids.to_vec();
        Ok(())
    }
}
