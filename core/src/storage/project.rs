use crate::storage::content::read_file_content;
use crate::storage::outline::{self, OutlineEntry};
use crate::storage::path::with_default_extension;
use crate::storage::scanner::{check_project_root, reconcile};
use crate::storage::store::ProjectState;
use crate::storage::{
    validate_name, Error, ErrorKind, FileContent, ItemId, ItemKind, ItemPath, ItemTree, Manifest, ProjectStore,
    ProjectStructure, Result, WorkspaceChange,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// One file to import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFile {
    pub name: String,
    pub content: String,
    /// Keep this ID instead of minting one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
}

impl ImportFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        ImportFile { name: name.into(), content: content.into(), id: None }
    }
}

/// What happened to one file of an import batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ImportOutcome {
    Imported { name: String, id: ItemId, path: ItemPath },
    Failed { name: String, error: ErrorKind, message: String },
}

impl ImportOutcome {
    pub fn name(&self) -> &str {
        match self {
            ImportOutcome::Imported { name, .. } | ImportOutcome::Failed { name, .. } => name,
        }
    }

    pub fn is_imported(&self) -> bool {
        matches!(self, ImportOutcome::Imported { .. })
    }
}

/// Per-file results of an import, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub outcomes: Vec<ImportOutcome>,
}

impl ImportReport {
    pub fn imported(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_imported()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.imported()
    }
}

/// Handle to one project directory.
///
/// Obtained from [`ProjectStore::project`]. Every operation takes the
/// project's lock for its whole duration, validates its input, changes the
/// filesystem, updates the manifest and returns a fresh scan.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    path: String,
    state: Arc<Mutex<ProjectState>>,
    store: ProjectStore,
}

impl Project {
    pub(crate) fn new(root: PathBuf, path: String, state: Arc<Mutex<ProjectState>>, store: ProjectStore) -> Self {
        Project { root, path, state, store }
    }

    /// Absolute path of the project directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Normalized project path relative to the projects root.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn default_extension(&self) -> Option<&str> {
        self.store.config().default_file_extension.as_deref()
    }

    /// Returns the cached manifest, loading it first if needed.
    async fn manifest<'a>(&self, state: &'a mut ProjectState) -> Result<&'a mut Manifest> {
        check_project_root(&self.root).await?;
        if state.manifest.is_none() {
            state.manifest = Some(Manifest::load(&self.root).await);
        }
        Ok(state.manifest.get_or_insert_with(Manifest::new))
    }

    /// Rescans the project and saves the manifest if it changed.
    async fn commit(&self, manifest: &mut Manifest, dirty: bool) -> Result<ItemTree> {
        let outcome = reconcile(&self.root, manifest).await?;
        if dirty || outcome.changed() {
            manifest.save(&self.root).await?;
        }
        Ok(outcome.tree)
    }

    fn publish(&self, changes: Vec<WorkspaceChange>) {
        for change in changes {
            self.store.publish(change);
        }
    }

    fn structure_of(&self, tree: &ItemTree) -> ProjectStructure {
        ProjectStructure::from_tree(&self.path, tree)
    }

    /// Resolves a parent ID to a path without checking its type.
    async fn resolve_target(&self, manifest: &Manifest, parent: Option<&ItemId>) -> Result<ItemPath> {
        match parent {
            None => Ok(ItemPath::root()),
            Some(id) => manifest.resolve(&self.root, id).await.map_err(|e| match e {
                Error::ItemNotFound(id) => Error::ParentNotFound(id),
                other => other,
            }),
        }
    }

    async fn ensure_directory(&self, path: &ItemPath) -> Result<()> {
        let meta = fs::metadata(path.to_path(&self.root)).await.map_err(Error::Io)?;
        if !meta.is_dir() {
            return Err(Error::NotADirectory(path.clone()));
        }
        Ok(())
    }

    /// Resolves the directory new items go into: the project root when
    /// `parent` is `None`.
    async fn resolve_parent(&self, manifest: &Manifest, parent: Option<&ItemId>) -> Result<ItemPath> {
        let path = self.resolve_target(manifest, parent).await?;
        self.ensure_directory(&path).await?;
        Ok(path)
    }

    async fn ensure_vacant(&self, path: &ItemPath) -> Result<()> {
        match fs::symlink_metadata(path.to_path(&self.root)).await {
            Ok(_) => Err(Error::AlreadyExists(path.clone())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Writes a new file at `path` and records its ID. Never overwrites.
    async fn write_new_file(
        &self,
        manifest: &mut Manifest,
        path: ItemPath,
        content: &str,
        id: Option<ItemId>,
    ) -> Result<(ItemId, ItemPath)> {
        if let Some(id) = &id {
            if id.as_str().trim().is_empty() {
                return Err(Error::InvalidId(id.clone()));
            }
            if manifest.contains(id) {
                return Err(Error::DuplicateId(id.clone()));
            }
        }
        let absolute = path.to_path(&self.root);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&absolute)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    Error::AlreadyExists(path.clone())
                } else {
                    Error::Io(e)
                }
            })?;
        let written = match file.write_all(content.as_bytes()).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            drop(file);
            let _ = fs::remove_file(&absolute).await;
            return Err(Error::Io(e));
        }

        let id = match id {
            Some(id) => {
                manifest.insert(id.clone(), path.clone())?;
                id
            }
            None => manifest.mint(path.clone()),
        };
        debug!("Created file {} ({})", path, id);
        Ok((id, path))
    }

    async fn create_directory(&self, manifest: &mut Manifest, path: ItemPath) -> Result<(ItemId, ItemPath)> {
        fs::create_dir(path.to_path(&self.root)).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                Error::AlreadyExists(path.clone())
            } else {
                Error::Io(e)
            }
        })?;
        let id = manifest.mint(path.clone());
        debug!("Created folder {} ({})", path, id);
        Ok((id, path))
    }

    /// Name of a new file, with the default extension applied.
    fn new_file_name(&self, name: &str) -> Result<String> {
        validate_name(name)?;
        let name = with_default_extension(name, self.default_extension());
        validate_name(&name)?;
        Ok(name)
    }

    /// Scans the project and returns its structure.
    #[instrument(skip(self), fields(project = %self.path))]
    pub async fn structure(&self) -> Result<ProjectStructure> {
        let tree = self.tree().await?;
        Ok(self.structure_of(&tree))
    }

    /// Scans the project and returns the raw item arena.
    pub async fn tree(&self) -> Result<ItemTree> {
        let mut state = self.state.lock().await;
        let manifest = self.manifest(&mut state).await?;
        self.commit(manifest, false).await
    }

    /// Creates a file named `name` under `parent` (the project root if `None`).
    ///
    /// A name without an extension gets the store's default extension.
    ///
    /// # Errors
    ///
    /// [`Error::ParentNotFound`], [`Error::NotADirectory`] if the parent is a
    /// file, [`Error::InvalidName`], [`Error::AlreadyExists`].
    #[instrument(skip(self, content), fields(project = %self.path))]
    pub async fn create_file(&self, name: &str, content: &str, parent: Option<&ItemId>) -> Result<ProjectStructure> {
        let mut state = self.state.lock().await;
        let manifest = self.manifest(&mut state).await?;

        let dir = self.resolve_parent(manifest, parent).await?;
        let name = self.new_file_name(name)?;
        let path = dir.join(&name);
        self.ensure_vacant(&path).await?;
        let (id, path) = self.write_new_file(manifest, path, content, None).await?;

        let tree = self.commit(manifest, true).await?;
        self.publish(vec![WorkspaceChange::Created {
            project: self.path.clone(),
            id,
            path,
            kind: ItemKind::File,
        }]);
        Ok(self.structure_of(&tree))
    }

    /// Creates an empty folder named `name` under `parent`.
    #[instrument(skip(self), fields(project = %self.path))]
    pub async fn create_folder(&self, name: &str, parent: Option<&ItemId>) -> Result<ProjectStructure> {
        let mut state = self.state.lock().await;
        let manifest = self.manifest(&mut state).await?;

        let dir = self.resolve_parent(manifest, parent).await?;
        validate_name(name)?;
        let path = dir.join(name);
        self.ensure_vacant(&path).await?;
        let (id, path) = self.create_directory(manifest, path).await?;

        let tree = self.commit(manifest, true).await?;
        self.publish(vec![WorkspaceChange::Created {
            project: self.path.clone(),
            id,
            path,
            kind: ItemKind::Directory,
        }]);
        Ok(self.structure_of(&tree))
    }

    /// Replaces the content of an existing file. The ID and path are kept.
    #[instrument(skip(self, content), fields(project = %self.path))]
    pub async fn update_content(&self, item: &ItemId, content: &str) -> Result<ProjectStructure> {
        let mut state = self.state.lock().await;
        let manifest = self.manifest(&mut state).await?;

        let path = manifest.resolve(&self.root, item).await?;
        let absolute = path.to_path(&self.root);
        if !fs::metadata(&absolute).await.map_err(Error::Io)?.is_file() {
            return Err(Error::NotAFile(path));
        }
        fs::write(&absolute, content).await.map_err(Error::Io)?;
        debug!("Updated content of {} ({} bytes)", path, content.len());

        let tree = self.commit(manifest, false).await?;
        self.publish(vec![WorkspaceChange::ContentUpdated {
            project: self.path.clone(),
            id: item.clone(),
            path,
        }]);
        Ok(self.structure_of(&tree))
    }

    /// Reads a file, as text when it is a text file.
    #[instrument(skip(self), fields(project = %self.path))]
    pub async fn read_content(&self, item: &ItemId) -> Result<FileContent> {
        let mut state = self.state.lock().await;
        let manifest = self.manifest(&mut state).await?;

        let path = manifest.resolve(&self.root, item).await?;
        let absolute = path.to_path(&self.root);
        if !fs::metadata(&absolute).await.map_err(Error::Io)?.is_file() {
            return Err(Error::NotAFile(path));
        }
        read_file_content(&absolute).await
    }

    /// Renames an item within its parent. The item and all its descendants
    /// keep their IDs.
    #[instrument(skip(self), fields(project = %self.path))]
    pub async fn rename(&self, item: &ItemId, new_name: &str) -> Result<ProjectStructure> {
        let mut state = self.state.lock().await;
        let manifest = self.manifest(&mut state).await?;

        let from = manifest.resolve(&self.root, item).await?;
        validate_name(new_name)?;
        let to = from.with_name(new_name);
        if to == from {
            let tree = self.commit(manifest, false).await?;
            return Ok(self.structure_of(&tree));
        }
        self.ensure_vacant(&to).await?;

        fs::rename(from.to_path(&self.root), to.to_path(&self.root)).await.map_err(Error::Io)?;
        let rewritten = manifest.rewrite_prefix(&from, &to);
        debug!("Renamed {} to {} ({} manifest entries)", from, to, rewritten);

        let tree = self.commit(manifest, true).await?;
        self.publish(vec![WorkspaceChange::Renamed {
            project: self.path.clone(),
            id: item.clone(),
            from,
            to,
        }]);
        Ok(self.structure_of(&tree))
    }

    /// Moves an item into `target` (the project root if `None`), keeping its name.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidMove`] if `target` is the item or one of its
    /// descendants, [`Error::NotADirectory`] if `target` is a file,
    /// [`Error::AlreadyExists`] if the target already holds an item with the
    /// same name.
    #[instrument(skip(self), fields(project = %self.path))]
    pub async fn move_item(&self, item: &ItemId, target: Option<&ItemId>) -> Result<ProjectStructure> {
        let mut state = self.state.lock().await;
        let manifest = self.manifest(&mut state).await?;

        let from = manifest.resolve(&self.root, item).await?;
        let target_dir = self.resolve_target(manifest, target).await?;
        if target_dir.starts_with(&from) {
            return Err(Error::InvalidMove { item: from, target: target_dir });
        }
        self.ensure_directory(&target_dir).await?;

        if from.parent().as_ref() == Some(&target_dir) {
            debug!("{} is already in {}", from, target_dir);
            let tree = self.commit(manifest, false).await?;
            return Ok(self.structure_of(&tree));
        }
        let name = from.name().ok_or_else(|| Error::InvalidPath(from.to_string()))?;
        let to = target_dir.join(name);
        self.ensure_vacant(&to).await?;

        fs::rename(from.to_path(&self.root), to.to_path(&self.root)).await.map_err(Error::Io)?;
        let rewritten = manifest.rewrite_prefix(&from, &to);
        debug!("Moved {} to {} ({} manifest entries)", from, to, rewritten);

        let tree = self.commit(manifest, true).await?;
        self.publish(vec![WorkspaceChange::Moved {
            project: self.path.clone(),
            id: item.clone(),
            from,
            to,
        }]);
        Ok(self.structure_of(&tree))
    }

    /// Deletes an item, and everything below it for folders.
    #[instrument(skip(self), fields(project = %self.path))]
    pub async fn delete(&self, item: &ItemId) -> Result<ProjectStructure> {
        let mut state = self.state.lock().await;
        let manifest = self.manifest(&mut state).await?;

        let path = manifest.resolve(&self.root, item).await?;
        let absolute = path.to_path(&self.root);
        let meta = fs::symlink_metadata(&absolute).await.map_err(Error::Io)?;
        if meta.is_dir() {
            fs::remove_dir_all(&absolute).await.map_err(Error::Io)?;
        } else {
            fs::remove_file(&absolute).await.map_err(Error::Io)?;
        }
        let removed = manifest.remove_subtree(&path);
        debug!("Deleted {} ({} manifest entries)", path, removed.len());

        let tree = self.commit(manifest, true).await?;
        self.publish(vec![WorkspaceChange::Deleted {
            project: self.path.clone(),
            id: item.clone(),
            path,
            removed,
        }]);
        Ok(self.structure_of(&tree))
    }

    /// Imports a batch of files into `parent`.
    ///
    /// Each file is created independently with the rules of
    /// [`create_file`](Self::create_file); failures are reported per file and
    /// earlier successes are kept. Only an unusable `parent` fails the whole call.
    #[instrument(skip(self, files), fields(project = %self.path, files = files.len()))]
    pub async fn import(&self, files: Vec<ImportFile>, parent: Option<&ItemId>) -> Result<(ImportReport, ProjectStructure)> {
        let mut state = self.state.lock().await;
        let manifest = self.manifest(&mut state).await?;

        let dir = self.resolve_parent(manifest, parent).await?;
        let mut report = ImportReport::default();
        let mut changes = Vec::new();

        for file in files {
            let result = match self.new_file_name(&file.name) {
                Ok(name) => {
                    let path = dir.join(&name);
                    match self.ensure_vacant(&path).await {
                        Ok(()) => self.write_new_file(manifest, path, &file.content, file.id).await,
                        Err(e) => Err(e),
                    }
                }
                Err(e) => Err(e),
            };
            match result {
                Ok((id, path)) => {
                    changes.push(WorkspaceChange::Created {
                        project: self.path.clone(),
                        id: id.clone(),
                        path: path.clone(),
                        kind: ItemKind::File,
                    });
                    report.outcomes.push(ImportOutcome::Imported { name: file.name, id, path });
                }
                Err(e) => {
                    warn!("Failed to import '{}': {}", file.name, e);
                    report.outcomes.push(ImportOutcome::Failed {
                        name: file.name,
                        error: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let tree = self.commit(manifest, !changes.is_empty()).await?;
        debug!("Imported {} of {} files", report.imported(), report.outcomes.len());
        self.publish(changes);
        Ok((report, self.structure_of(&tree)))
    }

    /// Imports a Markdown document as a tree of files, one per heading.
    ///
    /// Nothing is written if any top-level name of the outline is already
    /// taken in `parent`.
    #[instrument(skip(self, markdown), fields(project = %self.path))]
    pub async fn import_outline(&self, file_name: &str, markdown: &str, parent: Option<&ItemId>) -> Result<ProjectStructure> {
        let mut state = self.state.lock().await;
        let manifest = self.manifest(&mut state).await?;

        let dir = self.resolve_parent(manifest, parent).await?;
        let plan = outline::plan(markdown, file_name);
        for entry in plan.iter().filter(|entry| entry.path.depth() == 1) {
            self.ensure_vacant(&dir.join(entry.path.segments()[0].as_str())).await?;
        }

        let mut changes = Vec::new();
        let mut failure = None;
        for OutlineEntry { path, kind, content } in plan {
            let target = path.rebase(&ItemPath::root(), &dir).unwrap_or(path);
            let created = match kind {
                ItemKind::Directory => self.create_directory(manifest, target).await,
                ItemKind::File => self.write_new_file(manifest, target, &content, None).await,
            };
            match created {
                Ok((id, path)) => changes.push(WorkspaceChange::Created { project: self.path.clone(), id, path, kind }),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        // Persist what was created even if a later entry failed.
        let tree = self.commit(manifest, !changes.is_empty()).await?;
        debug!("Outline import created {} items", changes.len());
        self.publish(changes);
        match failure {
            Some(e) => Err(e),
            None => Ok(self.structure_of(&tree)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreConfig;
    use tempfile::{tempdir, TempDir};

    async fn setup() -> (TempDir, ProjectStore, Project) {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("libros/book")).await.unwrap();
        let store = ProjectStore::new(StoreConfig::new(dir.path()));
        let project = store.project("libros/book").await.unwrap();
        (dir, store, project)
    }

    fn id_at(structure: &ProjectStructure, path: &str) -> ItemId {
        structure.item_at(path).unwrap_or_else(|| panic!("no item at {path}")).id.clone()
    }

    #[tokio::test]
    async fn test_create_file_applies_default_extension() {
        let (dir, _store, project) = setup().await;
        let structure = project.create_file("chapter", "# One", None).await.unwrap();

        let item = structure.item_at("chapter.md").unwrap();
        assert_eq!(item.size, Some(5));
        let on_disk = fs::read_to_string(dir.path().join("libros/book/chapter.md")).await.unwrap();
        assert_eq!(on_disk, "# One");

        let manifest = Manifest::load(project.root()).await;
        assert_eq!(manifest.get(&item.id).unwrap().to_string(), "chapter.md");
    }

    #[tokio::test]
    async fn test_create_file_without_default_extension() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("scripts/s")).await.unwrap();
        let config = StoreConfig::new(dir.path()).with_default_extension(None::<String>);
        let project = ProjectStore::new(config).project("scripts/s").await.unwrap();

        let structure = project.create_file("NOTES", "", None).await.unwrap();
        assert!(structure.item_at("NOTES").is_some());
    }

    #[tokio::test]
    async fn test_create_rejects_bad_parent_and_collision() {
        let (_dir, _store, project) = setup().await;
        let structure = project.create_file("a.md", "", None).await.unwrap();
        let file_id = id_at(&structure, "a.md");

        let result = project.create_file("b.md", "", Some(&"missing".into())).await;
        assert!(matches!(result, Err(Error::ParentNotFound(_))));
        let result = project.create_folder("sub", Some(&file_id)).await;
        assert!(matches!(result, Err(Error::NotADirectory(_))));
        let result = project.create_file("a.md", "other", None).await;
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
        let result = project.create_folder("a.md", None).await;
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
        let result = project.create_file("x/y.md", "", None).await;
        assert!(matches!(result, Err(Error::InvalidName { .. })));
    }

    #[tokio::test]
    async fn test_update_and_read_content() {
        let (_dir, _store, project) = setup().await;
        let structure = project.create_folder("Drafts", None).await.unwrap();
        let drafts = id_at(&structure, "Drafts");
        let structure = project.create_file("one.md", "old", Some(&drafts)).await.unwrap();
        let one = id_at(&structure, "Drafts/one.md");

        let structure = project.update_content(&one, "new content").await.unwrap();
        assert_eq!(id_at(&structure, "Drafts/one.md"), one);
        let content = project.read_content(&one).await.unwrap();
        assert_eq!(content.as_text(), Some("new content"));

        assert!(matches!(project.update_content(&drafts, "x").await, Err(Error::NotAFile(_))));
        assert!(matches!(project.read_content(&drafts).await, Err(Error::NotAFile(_))));
        assert!(matches!(project.update_content(&"nope".into(), "x").await, Err(Error::ItemNotFound(_))));
    }

    #[tokio::test]
    async fn test_stale_reference_after_external_delete() {
        let (_dir, _store, project) = setup().await;
        let structure = project.create_file("gone.md", "", None).await.unwrap();
        let id = id_at(&structure, "gone.md");
        fs::remove_file(project.root().join("gone.md")).await.unwrap();

        let result = project.update_content(&id, "x").await;
        assert!(matches!(result, Err(Error::StaleReference { .. })));
    }

    #[tokio::test]
    async fn test_rename_to_same_name_is_noop() {
        let (_dir, _store, project) = setup().await;
        let structure = project.create_file("a.md", "", None).await.unwrap();
        let id = id_at(&structure, "a.md");
        let structure = project.rename(&id, "a.md").await.unwrap();
        assert_eq!(id_at(&structure, "a.md"), id);
        assert!(matches!(project.rename(&id, "").await, Err(Error::InvalidName { .. })));
    }

    #[tokio::test]
    async fn test_move_into_current_parent_is_noop() {
        let (_dir, _store, project) = setup().await;
        let structure = project.create_folder("A", None).await.unwrap();
        let a = id_at(&structure, "A");
        let structure = project.create_file("x.md", "", Some(&a)).await.unwrap();
        let x = id_at(&structure, "A/x.md");

        let structure = project.move_item(&x, Some(&a)).await.unwrap();
        assert_eq!(id_at(&structure, "A/x.md"), x);
        let structure = project.move_item(&a, None).await.unwrap();
        assert_eq!(id_at(&structure, "A"), a);
    }

    #[tokio::test]
    async fn test_move_into_file_is_rejected() {
        let (_dir, _store, project) = setup().await;
        project.create_folder("A", None).await.unwrap();
        let structure = project.create_file("f.md", "", None).await.unwrap();
        let a = id_at(&structure, "A");
        let f = id_at(&structure, "f.md");

        assert!(matches!(project.move_item(&a, Some(&f)).await, Err(Error::NotADirectory(_))));
        assert!(matches!(project.move_item(&f, Some(&f)).await, Err(Error::InvalidMove { .. })));
    }

    #[tokio::test]
    async fn test_import_keeps_caller_ids_and_reports_duplicates() {
        let (_dir, _store, project) = setup().await;
        let mut first = ImportFile::new("one.md", "1");
        first.id = Some("fixed-id".into());
        let mut clash = ImportFile::new("two.md", "2");
        clash.id = Some("fixed-id".into());

        let (report, structure) = project.import(vec![first, clash, ImportFile::new("three", "3")], None).await.unwrap();
        assert_eq!(report.imported(), 2);
        assert_eq!(id_at(&structure, "one.md"), ItemId::from("fixed-id"));
        assert!(structure.item_at("three.md").is_some());
        assert!(structure.item_at("two.md").is_none());
        match &report.outcomes[1] {
            ImportOutcome::Failed { error, .. } => assert_eq!(*error, ErrorKind::DuplicateId),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_import_rejects_blank_caller_ids() {
        let (_dir, store, project) = setup().await;
        let mut empty = ImportFile::new("empty.md", "1");
        empty.id = Some("".into());
        let mut blank = ImportFile::new("blank.md", "2");
        blank.id = Some("  ".into());

        let (report, structure) = project.import(vec![empty, blank, ImportFile::new("kept.md", "3")], None).await.unwrap();
        assert_eq!(report.imported(), 1);
        assert!(structure.item_at("empty.md").is_none());
        assert!(structure.item_at("blank.md").is_none());
        for outcome in &report.outcomes[..2] {
            match outcome {
                ImportOutcome::Failed { error, .. } => assert_eq!(*error, ErrorKind::InvalidRequest),
                other => panic!("unexpected outcome {other:?}"),
            }
        }

        let kept = id_at(&structure, "kept.md");
        store.clear_cache(project.path()).await.unwrap();
        assert_eq!(id_at(&project.structure().await.unwrap(), "kept.md"), kept);
    }

    #[tokio::test]
    async fn test_import_outline_into_folder() {
        let (_dir, _store, project) = setup().await;
        let structure = project.create_folder("Imported", None).await.unwrap();
        let target = id_at(&structure, "Imported");
        let markdown = "# Part 1\nIntro\n\n## Scene\nText\n\n# Part 2\nMore\n";

        let structure = project.import_outline("novel.md", markdown, Some(&target)).await.unwrap();
        assert!(structure.item_at("Imported/Part 1").unwrap().is_dir());
        assert!(structure.item_at("Imported/Part 1/Part 1.md").is_some());
        let scene = id_at(&structure, "Imported/Part 1/Scene.md");
        assert_eq!(project.read_content(&scene).await.unwrap().as_text(), Some("Text"));
        assert!(structure.item_at("Imported/Part 2.md").is_some());

        let again = project.import_outline("novel.md", markdown, Some(&target)).await;
        assert!(matches!(again, Err(Error::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_changes_are_published() {
        let (_dir, store, project) = setup().await;
        let mut changes = store.subscribe();

        let structure = project.create_folder("A", None).await.unwrap();
        let a = id_at(&structure, "A");
        project.rename(&a, "B").await.unwrap();
        project.delete(&a).await.unwrap();

        assert!(matches!(changes.recv().await.unwrap(), WorkspaceChange::Created { kind: ItemKind::Directory, .. }));
        match changes.recv().await.unwrap() {
            WorkspaceChange::Renamed { from, to, .. } => {
                assert_eq!(from.to_string(), "A");
                assert_eq!(to.to_string(), "B");
            }
            other => panic!("unexpected change {other:?}"),
        }
        match changes.recv().await.unwrap() {
            WorkspaceChange::Deleted { removed, project: p, .. } => {
                assert_eq!(removed, vec![a]);
                assert_eq!(p, "libros/book");
            }
            other => panic!("unexpected change {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_clear_cache_reloads_manifest_from_disk() {
        let (_dir, store, project) = setup().await;
        let structure = project.create_file("a.md", "", None).await.unwrap();
        let old = id_at(&structure, "a.md");

        let mut manifest = Manifest::new();
        manifest.insert("edited".into(), ItemPath::parse("a.md").unwrap()).unwrap();
        manifest.save(project.root()).await.unwrap();

        // The cached manifest still wins until the cache is cleared.
        assert_eq!(id_at(&project.structure().await.unwrap(), "a.md"), old);
        store.clear_cache("libros/book").await.unwrap();
        assert_eq!(id_at(&project.structure().await.unwrap(), "a.md"), ItemId::from("edited"));
    }
}
