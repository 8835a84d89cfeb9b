use std::path::Path;
use tempfile::{tempdir, TempDir};
use tokio::fs;

use vhq_core::storage::{
    Error, ImportFile, ImportOutcome, ItemId, ItemKind, Manifest, Project, ProjectCategory, ProjectStore,
    ProjectStructure, StoreConfig, MANIFEST_FILE_NAME,
};

async fn create_dummy(path: &Path, is_dir: bool) {
    if is_dir {
        fs::create_dir_all(path).await.expect("Test helper: Failed to create dummy dir");
    } else {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.expect("Test helper: Failed to create parent dir");
        }
        fs::write(path, "").await.expect("Test helper: Failed to create dummy file");
    }
}

async fn new_project() -> (TempDir, ProjectStore, Project) {
    let dir = tempdir().unwrap();
    let store = ProjectStore::new(StoreConfig::new(dir.path()));
    let summary = store
        .create_project(ProjectCategory::Book, "Test_Book")
        .await
        .expect("Failed to create project");
    let project = store.project(&summary.path).await.expect("Failed to open project");
    (dir, store, project)
}

fn id_at(structure: &ProjectStructure, path: &str) -> ItemId {
    structure
        .item_at(path)
        .unwrap_or_else(|| panic!("Expected an item at '{path}'"))
        .id
        .clone()
}

fn all_ids(structure: &ProjectStructure) -> Vec<ItemId> {
    let mut ids: Vec<_> = structure.walk().map(|item| item.id.clone()).collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn integration_structure_round_trip_is_stable() {
    let (_dir, _store, project) = new_project().await;
    create_dummy(&project.root().join("Drafts/one.md"), false).await;
    create_dummy(&project.root().join("notes.txt"), false).await;

    let first = project.structure().await.unwrap();
    let second = project.structure().await.unwrap();
    assert_eq!(first, second, "Scanning twice without changes must yield the same structure");
    assert_eq!(all_ids(&first).len(), 3);
    assert!(project.root().join(MANIFEST_FILE_NAME).exists());
}

#[tokio::test]
async fn integration_ids_survive_restart() {
    let (dir, _store, project) = new_project().await;
    let structure = project.create_folder("Part", None).await.unwrap();
    let part = id_at(&structure, "Part");
    project.create_file("scene.md", "text", Some(&part)).await.unwrap();
    let before = project.structure().await.unwrap();

    // A fresh store has no cached state and must read the manifest back.
    let store = ProjectStore::new(StoreConfig::new(dir.path()));
    let reopened = store.project("libros/Test_Book").await.unwrap();
    let after = reopened.structure().await.unwrap();
    assert_eq!(all_ids(&before), all_ids(&after));
}

#[tokio::test]
async fn integration_rename_keeps_ids() {
    let (_dir, _store, project) = new_project().await;
    let structure = project.create_folder("Notes", None).await.unwrap();
    let notes = id_at(&structure, "Notes");
    let structure = project.create_file("x.txt", "", Some(&notes)).await.unwrap();
    let x = id_at(&structure, "Notes/x.txt");
    let structure = project.create_folder("Notes2", None).await.unwrap();
    let notes2 = id_at(&structure, "Notes2");

    let structure = project.rename(&notes, "Journal").await.unwrap();
    assert_eq!(id_at(&structure, "Journal"), notes);
    assert_eq!(id_at(&structure, "Journal/x.txt"), x);
    assert_eq!(id_at(&structure, "Notes2"), notes2, "Sibling with a shared name prefix must be untouched");
    assert!(structure.item_at("Notes").is_none());

    let manifest = Manifest::load(project.root()).await;
    assert_eq!(manifest.get(&x).unwrap().to_string(), "Journal/x.txt");
    assert_eq!(manifest.get(&notes2).unwrap().to_string(), "Notes2");
}

#[tokio::test]
async fn integration_move_keeps_ids() {
    let (_dir, _store, project) = new_project().await;
    let structure = project.create_folder("A", None).await.unwrap();
    let a = id_at(&structure, "A");
    let structure = project.create_folder("B", None).await.unwrap();
    let b = id_at(&structure, "B");
    let structure = project.create_file("x.txt", "payload", Some(&a)).await.unwrap();
    let x = id_at(&structure, "A/x.txt");

    let structure = project.move_item(&a, Some(&b)).await.unwrap();
    assert_eq!(id_at(&structure, "B/A"), a);
    assert_eq!(id_at(&structure, "B/A/x.txt"), x);
    assert!(structure.item_at("A").is_none());
    let content = fs::read_to_string(project.root().join("B/A/x.txt")).await.unwrap();
    assert_eq!(content, "payload");

    // Back to the project root.
    let structure = project.move_item(&a, None).await.unwrap();
    assert_eq!(id_at(&structure, "A/x.txt"), x);
}

#[tokio::test]
async fn integration_delete_cascades() {
    let (_dir, _store, project) = new_project().await;
    let structure = project.create_folder("A", None).await.unwrap();
    let a = id_at(&structure, "A");
    let structure = project.create_folder("sub", Some(&a)).await.unwrap();
    let sub = id_at(&structure, "A/sub");
    let structure = project.create_file("deep.md", "", Some(&sub)).await.unwrap();
    let deep = id_at(&structure, "A/sub/deep.md");
    let structure = project.create_file("keep.md", "", None).await.unwrap();
    let keep = id_at(&structure, "keep.md");

    let structure = project.delete(&a).await.unwrap();
    assert_eq!(all_ids(&structure), vec![keep.clone()]);
    assert!(!project.root().join("A").exists());

    let manifest = Manifest::load(project.root()).await;
    for id in [&a, &sub, &deep] {
        assert!(!manifest.contains(id), "Descendant id {id} should be gone");
    }
    assert!(manifest.contains(&keep));
    assert!(matches!(project.delete(&deep).await, Err(Error::ItemNotFound(_))));
}

#[tokio::test]
async fn integration_move_into_descendant_is_rejected() {
    let (_dir, _store, project) = new_project().await;
    let structure = project.create_folder("A", None).await.unwrap();
    let a = id_at(&structure, "A");
    let structure = project.create_folder("B", Some(&a)).await.unwrap();
    let b = id_at(&structure, "A/B");

    let before = project.structure().await.unwrap();
    assert!(matches!(project.move_item(&a, Some(&b)).await, Err(Error::InvalidMove { .. })));
    assert!(matches!(project.move_item(&a, Some(&a)).await, Err(Error::InvalidMove { .. })));
    assert_eq!(project.structure().await.unwrap(), before, "A rejected move must not change anything");
}

#[tokio::test]
async fn integration_collisions_are_rejected() {
    let (_dir, _store, project) = new_project().await;
    project.create_file("a.md", "A", None).await.unwrap();
    let structure = project.create_file("b.md", "B", None).await.unwrap();
    let b = id_at(&structure, "b.md");

    assert!(matches!(project.rename(&b, "a.md").await, Err(Error::AlreadyExists(_))));
    let content = fs::read_to_string(project.root().join("a.md")).await.unwrap();
    assert_eq!(content, "A", "Existing file must not be overwritten");

    let structure = project.create_folder("Dir", None).await.unwrap();
    let dir_id = id_at(&structure, "Dir");
    project.create_file("b.md", "other", Some(&dir_id)).await.unwrap();
    assert!(matches!(project.move_item(&b, Some(&dir_id)).await, Err(Error::AlreadyExists(_))));
    assert_eq!(id_at(&project.structure().await.unwrap(), "b.md"), b);
}

#[tokio::test]
async fn integration_listing_order_is_deterministic() {
    let (_dir, _store, project) = new_project().await;
    create_dummy(&project.root().join("zeta.txt"), false).await;
    create_dummy(&project.root().join("Alpha"), true).await;
    create_dummy(&project.root().join("beta.txt"), false).await;

    let structure = project.structure().await.unwrap();
    let names: Vec<_> = structure.items.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "beta.txt", "zeta.txt"]);
    assert_eq!(structure.items[0].kind, ItemKind::Directory);
}

#[tokio::test]
async fn integration_import_is_partial() {
    let (_dir, _store, project) = new_project().await;
    let files = vec![ImportFile::new("ok.txt", "fine"), ImportFile::new("../escape.txt", "nope")];

    let (report, structure) = project.import(files, None).await.unwrap();
    assert_eq!(report.outcomes.len(), 2);
    match &report.outcomes[0] {
        ImportOutcome::Imported { id, path, .. } => {
            assert_eq!(path.to_string(), "ok.txt");
            assert_eq!(&id_at(&structure, "ok.txt"), id);
        }
        other => panic!("Expected ok.txt to be imported, got {other:?}"),
    }
    assert!(matches!(report.outcomes[1], ImportOutcome::Failed { .. }));
    assert!(!project.root().parent().unwrap().join("escape.txt").exists());
    assert_eq!(structure.walk().count(), 1);
}

#[tokio::test]
async fn integration_corrupt_manifest_degrades_to_new_ids() {
    let (_dir, store, project) = new_project().await;
    let structure = project.create_file("a.md", "", None).await.unwrap();
    let old = id_at(&structure, "a.md");

    fs::write(project.root().join(MANIFEST_FILE_NAME), "{ not json").await.unwrap();
    store.clear_cache(project.path()).await.unwrap();

    let structure = project.structure().await.unwrap();
    let new = id_at(&structure, "a.md");
    assert_ne!(old, new);
    assert_eq!(Manifest::load(project.root()).await.get(&new).unwrap().to_string(), "a.md");
}

#[tokio::test]
async fn integration_concurrent_operations_on_one_project() {
    let (_dir, _store, project) = new_project().await;
    let mut handles = Vec::new();
    for i in 0..8 {
        let project = project.clone();
        handles.push(tokio::spawn(async move { project.create_file(&format!("file-{i}.md"), "", None).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let structure = project.structure().await.unwrap();
    assert_eq!(structure.items.len(), 8);
    assert_eq!(Manifest::load(project.root()).await.len(), 8, "No manifest update may be lost");
}
