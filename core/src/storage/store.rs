use crate::storage::scanner::check_project_root;
use crate::storage::{Error, ItemPath, Manifest, Project, ProjectCategory, Result, WorkspaceChange, HIDDEN_PREFIX};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, instrument};

const CHANGE_FEED_CAPACITY: usize = 256;

/// Settings shared by every project of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding the category directories.
    pub projects_root: PathBuf,
    /// Extension appended to new file names that have none.
    pub default_file_extension: Option<String>,
}

impl StoreConfig {
    pub fn new(projects_root: impl Into<PathBuf>) -> Self {
        StoreConfig {
            projects_root: projects_root.into(),
            default_file_extension: Some("md".to_string()),
        }
    }

    pub fn with_default_extension(mut self, extension: Option<impl Into<String>>) -> Self {
        self.default_file_extension = extension.map(Into::into);
        self
    }
}

/// Per-project state guarded by the project's lock.
#[derive(Debug, Default)]
pub(crate) struct ProjectState {
    /// Loaded lazily; `None` means "read from disk on next use".
    pub manifest: Option<Manifest>,
}

#[derive(Debug)]
struct StoreInner {
    config: Arc<StoreConfig>,
    // Keyed by canonical project root.
    projects: Mutex<HashMap<PathBuf, Arc<Mutex<ProjectState>>>>,
    changes: broadcast::Sender<WorkspaceChange>,
}

/// Entry point for all project operations.
///
/// Cheap to clone; clones share the same locks, cached manifests and change
/// feed. Operations on one project run one at a time, operations on
/// different projects run independently.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    inner: Arc<StoreInner>,
}

impl ProjectStore {
    pub fn new(config: StoreConfig) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        ProjectStore {
            inner: Arc::new(StoreInner {
                config: Arc::new(config),
                projects: Mutex::new(HashMap::new()),
                changes,
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn projects_root(&self) -> &Path {
        &self.inner.config.projects_root
    }

    /// Receives every change made through this store from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkspaceChange> {
        self.inner.changes.subscribe()
    }

    pub(crate) fn publish(&self, change: WorkspaceChange) {
        // No subscribers is not an error.
        let _ = self.inner.changes.send(change);
    }

    /// Normalizes a caller-visible project path.
    ///
    /// Returns the normalized path (e.g. `libros/My_Novel`) and the absolute
    /// project root. A leading segment equal to the projects root's own
    /// directory name is dropped, so `GHOST_Proyectos/libros/x` and
    /// `libros/x` name the same project. What remains must be exactly a
    /// category directory followed by a visible project name.
    pub fn resolve_project_path(&self, path: &str) -> Result<(ItemPath, PathBuf)> {
        let parsed = ItemPath::parse(path).map_err(|_| Error::InvalidPath(path.to_string()))?;
        let root_name = self.projects_root().file_name().and_then(|name| name.to_str());

        let relative = match (parsed.segments().first(), root_name) {
            (Some(first), Some(root_name)) if first == root_name && parsed.depth() > 1 => {
                parsed.segments()[1..].iter().fold(ItemPath::root(), |acc, segment| acc.join(segment))
            }
            _ => parsed,
        };
        match relative.segments() {
            [category, name]
                if ProjectCategory::from_dir_name(category).is_some() && !name.starts_with(HIDDEN_PREFIX) => {}
            _ => return Err(Error::InvalidPath(path.to_string())),
        }
        let root = relative.to_path(self.projects_root());
        Ok((relative, root))
    }

    async fn state_for(&self, root: &Path) -> Arc<Mutex<ProjectState>> {
        let key = canonical_key(root).await;
        let mut projects = self.inner.projects.lock().await;
        projects.entry(key).or_default().clone()
    }

    /// Opens the project at `path` (relative to the projects root).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPath`] for malformed paths, [`Error::ProjectNotFound`]
    /// if the directory is missing, [`Error::InvalidProject`] if it is a file.
    #[instrument(skip(self))]
    pub async fn project(&self, path: &str) -> Result<Project> {
        let (relative, root) = self.resolve_project_path(path)?;
        check_project_root(&root).await?;
        let state = self.state_for(&root).await;
        Ok(Project::new(root, relative.to_string(), state, self.clone()))
    }

    /// Forgets the cached manifest of a project; the next operation reloads it.
    #[instrument(skip(self))]
    pub async fn clear_cache(&self, path: &str) -> Result<()> {
        let (_, root) = self.resolve_project_path(path)?;
        let key = canonical_key(&root).await;
        let state = self.inner.projects.lock().await.get(&key).cloned();
        if let Some(state) = state {
            state.lock().await.manifest = None;
            debug!("Cleared cached manifest for {}", key.display());
        }
        Ok(())
    }

    /// Removes a whole project directory, including its manifest.
    ///
    /// The project's lock entry is kept, so handles opened before the delete
    /// and after a re-create still serialize on the same lock.
    #[instrument(skip(self))]
    pub async fn delete_project(&self, path: &str) -> Result<()> {
        let (relative, root) = self.resolve_project_path(path)?;
        check_project_root(&root).await?;
        let state = self.state_for(&root).await;

        let mut guard = state.lock().await;
        fs::remove_dir_all(&root).await.map_err(Error::Io)?;
        guard.manifest = None;
        drop(guard);

        debug!("Deleted project {}", root.display());
        self.publish(WorkspaceChange::ProjectDeleted { project: relative.to_string(), root });
        Ok(())
    }
}

async fn canonical_key(root: &Path) -> PathBuf {
    fs::canonicalize(root).await.unwrap_or_else(|_| root.to_path_buf())
}
