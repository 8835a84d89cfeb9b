//! Filesystem storage for project workspaces with stable item identities.
//!
//! This module maps a logical tree of folders and files onto real project
//! directories, and keeps each item's identity stable while the files move
//! around underneath it.
//!
//! # Core Concepts
//!
//! *   **[`ProjectStore`]:** The entry point. A store knows the projects root
//!     directory, hands out [`Project`] handles and serializes all operations on
//!     a given project. Create one per process with [`ProjectStore::new`] and
//!     pass it to whoever needs it.
//! *   **[`Project`]:** A directory under the projects root holding one unit of
//!     creative work (a book, a script, a blog post). All item operations
//!     (create, rename, move, delete, import, ...) live here and return the
//!     freshly scanned [`ProjectStructure`].
//! *   **[`Manifest`]:** The per-project `.vhq_manifest.json` file mapping each
//!     [`ItemId`] to a path relative to the project root. The manifest is the
//!     only durable source of identity: paths change, IDs do not.
//! *   **[`ItemTree`] / [`WorkspaceItem`]:** The result of a scan. The tree is an
//!     arena of nodes addressed by ID, each with a back-reference to its parent
//!     ID; [`WorkspaceItem`] is the nested, serializable view of the same data.
//!
//! # Layout on disk
//!
//! ```text
//! <projects root>/
//!     libros/<project>/.vhq_manifest.json
//!     libros/<project>/Chapter 1/intro.md
//!     scripts/<project>/...
//!     blog_posts/<project>/...
//! ```
//!
//! Entries whose name starts with `.` are hidden: they never show up in a scan
//! and cannot be created through this API.
//!
//! # Consistency
//!
//! Every operation validates its input before touching the filesystem, mutates
//! the filesystem, and only then rewrites the manifest. The manifest is written
//! once per operation, via a temporary file that is renamed into place.
//!
//! A manifest that cannot be read or parsed is treated as empty. The next scan
//! mints fresh IDs for every item, so callers may observe changed item IDs
//! after such a recovery.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use vhq_core::storage::{ProjectCategory, ProjectStore, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = ProjectStore::new(StoreConfig::new("/srv/projects"));
//!     store.create_project(ProjectCategory::Book, "My_Novel").await?;
//!
//!     let project = store.project("libros/My_Novel").await?;
//!     let structure = project.create_folder("Part One", None).await?;
//!     let part = structure.item_at("Part One").unwrap().id.clone();
//!     project.create_file("chapter-1.md", "# Chapter 1", Some(&part)).await?;
//!     Ok(())
//! }
//! ```

pub use self::catalog::{Catalog, ProjectCategory, ProjectSummary};
pub use self::change::WorkspaceChange;
pub use self::content::FileContent;
pub use self::item::{ItemKind, ItemTree, ProjectStructure, TreeNode, WorkspaceItem};
pub use self::manifest::{ItemId, Manifest};
pub use self::path::{validate_name, ItemPath};
pub use self::project::{ImportFile, ImportOutcome, ImportReport, Project};
pub use self::scanner::scan;
pub use self::store::{ProjectStore, StoreConfig};

mod catalog;
mod change;
mod content;
mod item;
mod manifest;
mod outline;
mod path;
mod project;
mod scanner;
mod store;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Name of the manifest file kept at every project root.
pub const MANIFEST_FILE_NAME: &str = ".vhq_manifest.json";

/// Entries starting with this character are hidden from scans.
pub const HIDDEN_PREFIX: char = '.';

#[derive(Debug, Error)]
pub enum Error {
    #[error("Project not found: {0}")]
    ProjectNotFound(PathBuf),

    #[error("Project root is not a directory: {0}")]
    InvalidProject(PathBuf),

    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Parent not found: {0}")]
    ParentNotFound(ItemId),

    #[error("Item '{id}' refers to '{path}', which no longer exists")]
    StaleReference { id: ItemId, path: ItemPath },

    #[error("An item named '{0}' already exists")]
    AlreadyExists(ItemPath),

    #[error("Cannot move '{item}' into '{target}': target is the item itself or one of its descendants")]
    InvalidMove { item: ItemPath, target: ItemPath },

    #[error("Path is not a directory: {0}")]
    NotADirectory(ItemPath),

    #[error("Path is not a file: {0}")]
    NotAFile(ItemPath),

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Invalid path provided: {0}")]
    InvalidPath(String),

    #[error("Item id is already in use: {0}")]
    DuplicateId(ItemId),

    #[error("Item id must not be blank: '{0}'")]
    InvalidId(ItemId),

    #[error("Manifest serialization/deserialization error")]
    Manifest(#[from] serde_json::Error),

    #[error("IO error")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns the category of this error, as reported to API callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ProjectNotFound(_) => ErrorKind::ProjectNotFound,
            Error::InvalidProject(_) => ErrorKind::InvalidProject,
            Error::ItemNotFound(_) => ErrorKind::ItemNotFound,
            Error::ParentNotFound(_) => ErrorKind::ParentNotFound,
            Error::StaleReference { .. } => ErrorKind::StaleReference,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::InvalidMove { .. } => ErrorKind::InvalidMove,
            Error::NotADirectory(_) => ErrorKind::NotADirectory,
            Error::NotAFile(_) => ErrorKind::NotAFile,
            Error::InvalidName { .. } => ErrorKind::InvalidName,
            Error::InvalidPath(_) => ErrorKind::InvalidPath,
            Error::DuplicateId(_) => ErrorKind::DuplicateId,
            Error::InvalidId(_) => ErrorKind::InvalidRequest,
            Error::Manifest(_) | Error::Io(_) => ErrorKind::IoFailure,
        }
    }
}

/// Error categories, independent of the data attached to each [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    ProjectNotFound,
    InvalidProject,
    ItemNotFound,
    ParentNotFound,
    StaleReference,
    AlreadyExists,
    InvalidMove,
    NotADirectory,
    NotAFile,
    InvalidName,
    InvalidPath,
    DuplicateId,
    IoFailure,
    InvalidRequest,
}

/// Result of every storage operation.
pub type Result<T> = std::result::Result<T, Error>;
