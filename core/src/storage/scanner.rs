use crate::storage::{Error, ItemId, ItemKind, ItemPath, ItemTree, Manifest, Result, HIDDEN_PREFIX, MANIFEST_FILE_NAME};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument, warn};

/// Result of reconciling a project directory with its manifest.
#[derive(Debug)]
pub(crate) struct ScanOutcome {
    pub tree: ItemTree,
    pub minted: usize,
    pub pruned: usize,
}

impl ScanOutcome {
    /// True if the manifest was modified and needs saving.
    pub fn changed(&self) -> bool {
        self.minted > 0 || self.pruned > 0
    }
}

#[derive(Debug)]
struct Entry {
    name: String,
    kind: ItemKind,
    size: u64,
}

/// Scans the project at `project_root` and returns its current item tree.
///
/// Loads the manifest, mints IDs for unknown entries, prunes IDs whose paths
/// are gone, and saves the manifest if anything changed.
pub async fn scan(project_root: &Path) -> Result<ItemTree> {
    check_project_root(project_root).await?;
    let mut manifest = Manifest::load(project_root).await;
    let outcome = reconcile(project_root, &mut manifest).await?;
    if outcome.changed() {
        manifest.save(project_root).await?;
    }
    Ok(outcome.tree)
}

/// Fails with `ProjectNotFound` / `InvalidProject` unless `project_root` is a directory.
pub(crate) async fn check_project_root(project_root: &Path) -> Result<()> {
    let meta = fs::metadata(project_root).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::ProjectNotFound(project_root.to_path_buf())
        } else {
            Error::Io(e)
        }
    })?;
    if !meta.is_dir() {
        return Err(Error::InvalidProject(project_root.to_path_buf()));
    }
    Ok(())
}

/// Walks the project directory and brings `manifest` in line with it.
///
/// Does not save the manifest; callers decide when to persist.
#[instrument(skip(project_root, manifest), fields(root = %project_root.display()))]
pub(crate) async fn reconcile(project_root: &Path, manifest: &mut Manifest) -> Result<ScanOutcome> {
    check_project_root(project_root).await?;

    let mut tree = ItemTree::new(project_root.to_path_buf());
    let mut seen = HashSet::new();
    let mut minted = 0;
    // Each pending directory carries the real paths of its ancestors.
    let mut pending: Vec<(Option<ItemId>, ItemPath, Vec<PathBuf>)> = vec![(None, ItemPath::root(), Vec::new())];

    while let Some((parent, dir, mut ancestors)) = pending.pop() {
        let absolute = dir.to_path(project_root);
        // Symlinked directories are followed unless they point back at an ancestor.
        let canonical = fs::canonicalize(&absolute).await.map_err(Error::Io)?;
        if ancestors.contains(&canonical) {
            warn!("Not descending into '{}': it links back to one of its ancestors", dir);
            continue;
        }
        ancestors.push(canonical);
        let entries = read_entries(&absolute).await?;
        let mut subdirs = Vec::new();
        for entry in entries {
            let path = dir.join(&entry.name);
            let id = match manifest.id_for_path(&path) {
                Some(id) => id.clone(),
                None => {
                    minted += 1;
                    let id = manifest.mint(path.clone());
                    debug!("Minted id {} for {}", id, path);
                    id
                }
            };
            seen.insert(path.clone());
            tree.push(parent.as_ref(), id.clone(), entry.name, path.clone(), entry.kind, entry.size);
            if entry.kind == ItemKind::Directory {
                subdirs.push((Some(id), path, ancestors.clone()));
            }
        }
        // Reverse so the first subdirectory is visited first.
        pending.extend(subdirs.into_iter().rev());
    }

    let pruned = manifest.retain_paths(&seen);
    if pruned > 0 {
        debug!("Pruned {} stale manifest entries", pruned);
    }
    debug!("Scanned {} items ({} new ids)", tree.len(), minted);
    Ok(ScanOutcome { tree, minted, pruned })
}

/// Lists the visible entries of one directory: directories first, then files,
/// each group sorted by name ignoring case.
async fn read_entries(dir: &Path) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    let mut read_dir = fs::read_dir(dir).await.map_err(Error::Io)?;

    while let Some(dir_entry) = read_dir.next_entry().await.map_err(Error::Io)? {
        let name = match dir_entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!("Skipping entry with non UTF-8 name: {:?}", raw);
                continue;
            }
        };
        if name.starts_with(HIDDEN_PREFIX) || name == MANIFEST_FILE_NAME {
            continue;
        }
        // Follows symlinks; dangling links are skipped.
        let meta = match fs::metadata(dir_entry.path()).await {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Skipping unreadable entry '{}': {}", dir_entry.path().display(), e);
                continue;
            }
        };
        let (kind, size) = if meta.is_dir() {
            (ItemKind::Directory, 0)
        } else {
            (ItemKind::File, meta.len())
        };
        entries.push(Entry { name, kind, size });
    }

    entries.sort_by(|a, b| {
        let rank = |kind: ItemKind| if kind == ItemKind::Directory { 0 } else { 1 };
        rank(a.kind)
            .cmp(&rank(b.kind))
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(entries)
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn create_dummy(path: &Path, is_dir: bool) {
        if is_dir {
            fs::create_dir_all(path).await.expect("Failed to create dummy dir");
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await.expect("Failed to create parent dir");
            }
            fs::write(path, "content").await.expect("Failed to create dummy file");
        }
    }

    fn names(tree: &ItemTree) -> Vec<String> {
        tree.top_level().map(|node| node.name.clone()).collect()
    }

    #[tokio::test]
    async fn test_scan_orders_directories_first_then_case_insensitive() {
        let dir = tempdir().unwrap();
        create_dummy(&dir.path().join("zeta.txt"), false).await;
        create_dummy(&dir.path().join("Alpha"), true).await;
        create_dummy(&dir.path().join("beta.txt"), false).await;

        let tree = scan(dir.path()).await.unwrap();
        assert_eq!(names(&tree), vec!["Alpha", "beta.txt", "zeta.txt"]);
    }

    #[tokio::test]
    async fn test_scan_mixed_case_groups() {
        let dir = tempdir().unwrap();
        for name in ["b", "A", "c"] {
            create_dummy(&dir.path().join(name), true).await;
        }
        for name in ["Delta.md", "alpha.md", "Charlie.md"] {
            create_dummy(&dir.path().join(name), false).await;
        }

        let tree = scan(dir.path()).await.unwrap();
        assert_eq!(names(&tree), vec!["A", "b", "c", "alpha.md", "Charlie.md", "Delta.md"]);
    }

    #[tokio::test]
    async fn test_scan_skips_hidden_entries_and_manifest() {
        let dir = tempdir().unwrap();
        create_dummy(&dir.path().join(".git/config"), false).await;
        create_dummy(&dir.path().join(".DS_Store"), false).await;
        create_dummy(&dir.path().join("visible.md"), false).await;

        let tree = scan(dir.path()).await.unwrap();
        assert_eq!(names(&tree), vec!["visible.md"]);
        assert!(Manifest::file_path(dir.path()).exists());

        // A second scan must not list the manifest that the first one wrote.
        let tree = scan(dir.path()).await.unwrap();
        assert_eq!(tree.len(), 1);
    }

    #[tokio::test]
    async fn test_scan_persists_minted_ids_and_reuses_them() {
        let dir = tempdir().unwrap();
        create_dummy(&dir.path().join("Part/chapter.md"), false).await;

        let first = scan(dir.path()).await.unwrap();
        let chapter = first.find_by_path(&ItemPath::parse("Part/chapter.md").unwrap()).unwrap();
        let part_id = first.top_level().next().unwrap().id.clone();
        assert_eq!(chapter.parent.as_ref(), Some(&part_id));

        let manifest = Manifest::load(dir.path()).await;
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.get(&chapter.id).unwrap().to_string(), "Part/chapter.md");

        let second = scan(dir.path()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_scan_prunes_entries_for_missing_paths() {
        let dir = tempdir().unwrap();
        create_dummy(&dir.path().join("keep.md"), false).await;
        let mut manifest = Manifest::new();
        manifest.insert("gone".into(), ItemPath::parse("deleted.md").unwrap()).unwrap();
        manifest.insert("kept".into(), ItemPath::parse("keep.md").unwrap()).unwrap();
        manifest.save(dir.path()).await.unwrap();

        let tree = scan(dir.path()).await.unwrap();
        assert_eq!(tree.top_level().next().unwrap().id, ItemId::from("kept"));

        let manifest = Manifest::load(dir.path()).await;
        assert!(!manifest.contains(&"gone".into()));
        assert_eq!(manifest.len(), 1);
    }

    #[tokio::test]
    async fn test_nested_children_match_filesystem() {
        let dir = tempdir().unwrap();
        create_dummy(&dir.path().join("A/x.txt"), false).await;
        create_dummy(&dir.path().join("A/sub/y.txt"), false).await;
        create_dummy(&dir.path().join("A/empty"), true).await;

        let tree = scan(dir.path()).await.unwrap();
        let a = tree.top_level().next().unwrap();
        let children: Vec<_> = tree.children_of(&a.id).map(|n| n.name.as_str()).collect();
        assert_eq!(children, vec!["empty", "sub", "x.txt"]);
        let sub = tree.find_by_path(&ItemPath::parse("A/sub").unwrap()).unwrap();
        assert_eq!(tree.children_of(&sub.id).count(), 1);
        assert_eq!(tree.find_by_path(&ItemPath::parse("A/x.txt").unwrap()).unwrap().size, 7);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_cycle_terminates() {
        let dir = tempdir().unwrap();
        create_dummy(&dir.path().join("A/x.txt"), false).await;
        std::os::unix::fs::symlink(dir.path().join("A"), dir.path().join("A/loop")).unwrap();

        let tree = scan(dir.path()).await.unwrap();
        let looped = tree.find_by_path(&ItemPath::parse("A/loop").unwrap()).unwrap();
        assert_eq!(looped.kind, ItemKind::Directory);
        assert!(looped.children.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_sibling_keeps_target_children() {
        let dir = tempdir().unwrap();
        create_dummy(&dir.path().join("Real/x.md"), false).await;
        std::os::unix::fs::symlink(dir.path().join("Real"), dir.path().join("Alias")).unwrap();

        let first = scan(dir.path()).await.unwrap();
        assert_eq!(names(&first), vec!["Alias", "Real"]);
        let real_x = first.find_by_path(&ItemPath::parse("Real/x.md").unwrap()).unwrap().id.clone();
        assert!(first.find_by_path(&ItemPath::parse("Alias/x.md").unwrap()).is_some());

        let second = scan(dir.path()).await.unwrap();
        let again = second.find_by_path(&ItemPath::parse("Real/x.md").unwrap()).unwrap();
        assert_eq!(again.id, real_x);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_backslash_in_name_survives_reload() {
        let dir = tempdir().unwrap();
        create_dummy(&dir.path().join("a/b"), false).await;
        create_dummy(&dir.path().join("a\\b"), false).await;

        let first = scan(dir.path()).await.unwrap();
        let backslash = ItemPath::root().join("a\\b");
        let nested = ItemPath::parse("a/b").unwrap();
        let backslash_id = first.find_by_path(&backslash).unwrap().id.clone();
        let nested_id = first.find_by_path(&nested).unwrap().id.clone();

        let manifest = Manifest::load(dir.path()).await;
        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest.get(&backslash_id), Some(&backslash));
        assert_eq!(manifest.get(&nested_id), Some(&nested));

        let second = scan(dir.path()).await.unwrap();
        assert_eq!(second.find_by_path(&backslash).unwrap().id, backslash_id);
        assert_eq!(second.find_by_path(&nested).unwrap().id, nested_id);
    }

    #[tokio::test]
    async fn test_scan_missing_root() {
        let dir = tempdir().unwrap();
        let result = scan(&dir.path().join("missing")).await;
        assert!(matches!(result, Err(Error::ProjectNotFound(_))));
    }

    #[tokio::test]
    async fn test_scan_root_is_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file.md");
        create_dummy(&file, false).await;
        let result = scan(&file).await;
        assert!(matches!(result, Err(Error::InvalidProject(_))));
    }
}
