use crate::storage::{Error, ItemPath, Result, MANIFEST_FILE_NAME};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Stable identifier of a workspace item.
///
/// Opaque to this crate: minted IDs are UUID v4 strings, but IDs supplied by
/// callers (for example on import) may be any non-empty string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        ItemId(id.into())
    }

    /// Mints a fresh random ID.
    pub fn generate() -> Self {
        ItemId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        ItemId(value.to_string())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        ItemId(value)
    }
}

/// Mapping from [`ItemId`] to the item's path relative to the project root.
///
/// Persisted as `.vhq_manifest.json`, a JSON object with sorted keys. Each
/// path belongs to at most one ID.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: BTreeMap<ItemId, ItemPath>,
    by_path: HashMap<ItemPath, ItemId>,
}

impl PartialEq for Manifest {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for Manifest {}

impl Serialize for Manifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the location of the manifest file for a project root.
    pub fn file_path(project_root: &Path) -> PathBuf {
        project_root.join(MANIFEST_FILE_NAME)
    }

    /// Loads the manifest of the project at `project_root`.
    ///
    /// A missing, unreadable or malformed manifest yields an empty manifest
    /// rather than an error. The next scan then mints new IDs for all items,
    /// which callers observe as item IDs changing.
    #[instrument(skip(project_root), fields(root = %project_root.display()))]
    pub async fn load(project_root: &Path) -> Manifest {
        let path = Self::file_path(project_root);
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Manifest file does not exist, starting with an empty manifest");
                return Manifest::new();
            }
            Err(e) => {
                warn!("Failed to read manifest '{}': {}. Treating it as empty.", path.display(), e);
                return Manifest::new();
            }
        };

        match serde_json::from_slice::<BTreeMap<String, String>>(&content) {
            Ok(raw) => {
                let manifest = Self::from_raw(raw);
                debug!("Manifest loaded with {} entries", manifest.len());
                manifest
            }
            Err(e) => {
                warn!("Failed to parse manifest '{}': {}. Treating it as empty.", path.display(), e);
                Manifest::new()
            }
        }
    }

    /// Builds a manifest from raw string pairs, dropping entries that cannot
    /// be used: empty IDs, invalid or root paths, and paths already claimed by
    /// an earlier ID (in key order).
    fn from_raw(raw: BTreeMap<String, String>) -> Manifest {
        let mut manifest = Manifest::new();
        for (id, path) in raw {
            if id.is_empty() {
                warn!("Dropping manifest entry with empty id -> '{}'", path);
                continue;
            }
            let path = match ItemPath::from_stored(&path) {
                Ok(path) if !path.is_root() => path,
                _ => {
                    warn!("Dropping manifest entry '{}' with invalid path '{}'", id, path);
                    continue;
                }
            };
            if let Some(owner) = manifest.by_path.get(&path) {
                warn!("Dropping manifest entry '{}': path '{}' already belongs to '{}'", id, path, owner);
                continue;
            }
            manifest.by_path.insert(path.clone(), ItemId(id.clone()));
            manifest.entries.insert(ItemId(id), path);
        }
        manifest
    }

    /// Writes the manifest to the project root.
    ///
    /// The content goes to a hidden temporary file first, which is then
    /// renamed over the manifest. Readers see either the old or the new file.
    #[instrument(skip(self, project_root), fields(root = %project_root.display(), entries = self.len()))]
    pub async fn save(&self, project_root: &Path) -> Result<()> {
        let path = Self::file_path(project_root);
        let tmp_path = project_root.join(format!("{}.tmp", MANIFEST_FILE_NAME));
        let content = serde_json::to_string_pretty(self).map_err(Error::Manifest)?;

        fs::write(&tmp_path, content).await.map_err(Error::Io)?;
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            warn!("Failed to move manifest into place: {}", e);
            let _ = fs::remove_file(&tmp_path).await;
            return Err(Error::Io(e));
        }
        debug!("Manifest saved to {}", path.display());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &ItemId) -> Option<&ItemPath> {
        self.entries.get(id)
    }

    pub fn id_for_path(&self, path: &ItemPath) -> Option<&ItemId> {
        self.by_path.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, &ItemPath)> {
        self.entries.iter()
    }

    /// Records `id -> path`.
    ///
    /// Fails with [`Error::DuplicateId`] if the ID is already mapped. An older
    /// ID that still claims `path` is dropped.
    pub fn insert(&mut self, id: ItemId, path: ItemPath) -> Result<()> {
        if self.entries.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }
        if let Some(previous) = self.by_path.insert(path.clone(), id.clone()) {
            debug!("Path '{}' reassigned from '{}' to '{}'", path, previous, id);
            self.entries.remove(&previous);
        }
        self.entries.insert(id, path);
        Ok(())
    }

    /// Mints and records a new ID for `path`.
    pub fn mint(&mut self, path: ItemPath) -> ItemId {
        let mut id = ItemId::generate();
        while self.entries.contains_key(&id) {
            id = ItemId::generate();
        }
        if let Some(previous) = self.by_path.insert(path.clone(), id.clone()) {
            self.entries.remove(&previous);
        }
        self.entries.insert(id.clone(), path);
        id
    }

    /// Looks up `id` and checks that its path still exists under `project_root`.
    ///
    /// # Errors
    ///
    /// [`Error::ItemNotFound`] if the ID is not in the manifest,
    /// [`Error::StaleReference`] if it is but the path is gone.
    pub async fn resolve(&self, project_root: &Path, id: &ItemId) -> Result<ItemPath> {
        let path = self.entries.get(id).ok_or_else(|| Error::ItemNotFound(id.clone()))?;
        match fs::symlink_metadata(path.to_path(project_root)).await {
            Ok(_) => Ok(path.clone()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::StaleReference {
                id: id.clone(),
                path: path.clone(),
            }),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Re-roots every entry at or under `old` to `new`, keeping the IDs.
    ///
    /// Matching is segment-based, so rewriting `Notes` leaves `Notes2` alone.
    /// Returns the number of rewritten entries.
    pub fn rewrite_prefix(&mut self, old: &ItemPath, new: &ItemPath) -> usize {
        let rewritten: Vec<(ItemId, ItemPath, ItemPath)> = self
            .entries
            .iter()
            .filter_map(|(id, path)| path.rebase(old, new).map(|moved| (id.clone(), path.clone(), moved)))
            .collect();

        for (_, from, _) in &rewritten {
            self.by_path.remove(from);
        }
        for (id, _, to) in &rewritten {
            if let Some(displaced) = self.by_path.insert(to.clone(), id.clone()) {
                if &displaced != id {
                    self.entries.remove(&displaced);
                }
            }
            self.entries.insert(id.clone(), to.clone());
        }
        rewritten.len()
    }

    /// Removes every entry at or under `prefix`, returning the removed IDs.
    pub fn remove_subtree(&mut self, prefix: &ItemPath) -> Vec<ItemId> {
        let removed: Vec<ItemId> = self
            .entries
            .iter()
            .filter(|(_, path)| path.starts_with(prefix))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &removed {
            if let Some(path) = self.entries.remove(id) {
                self.by_path.remove(&path);
            }
        }
        removed
    }

    /// Drops every entry whose path is not in `keep`. Returns how many were dropped.
    pub fn retain_paths(&mut self, keep: &HashSet<ItemPath>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, path| keep.contains(path));
        self.by_path.retain(|path, _| keep.contains(path));
        before - self.entries.len()
    }
}
