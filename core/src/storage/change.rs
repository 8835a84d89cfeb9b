use crate::storage::{ItemId, ItemKind, ItemPath};
use serde::Serialize;
use std::path::PathBuf;

/// A successful mutation, published on the store's change feed.
///
/// Subscribers get these through [`ProjectStore::subscribe`](crate::storage::ProjectStore::subscribe).
/// Events are sent after the manifest has been saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum WorkspaceChange {
    #[serde(rename_all = "camelCase")]
    Created { project: String, id: ItemId, path: ItemPath, kind: ItemKind },
    #[serde(rename_all = "camelCase")]
    ContentUpdated { project: String, id: ItemId, path: ItemPath },
    #[serde(rename_all = "camelCase")]
    Renamed { project: String, id: ItemId, from: ItemPath, to: ItemPath },
    #[serde(rename_all = "camelCase")]
    Moved { project: String, id: ItemId, from: ItemPath, to: ItemPath },
    /// `removed` lists the item itself and every descendant.
    #[serde(rename_all = "camelCase")]
    Deleted { project: String, id: ItemId, path: ItemPath, removed: Vec<ItemId> },
    #[serde(rename_all = "camelCase")]
    ProjectCreated { project: String, root: PathBuf },
    #[serde(rename_all = "camelCase")]
    ProjectDeleted { project: String, root: PathBuf },
}

impl WorkspaceChange {
    /// Caller-visible path of the project the change happened in.
    pub fn project(&self) -> &str {
        match self {
            WorkspaceChange::Created { project, .. }
            | WorkspaceChange::ContentUpdated { project, .. }
            | WorkspaceChange::Renamed { project, .. }
            | WorkspaceChange::Moved { project, .. }
            | WorkspaceChange::Deleted { project, .. }
            | WorkspaceChange::ProjectCreated { project, .. }
            | WorkspaceChange::ProjectDeleted { project, .. } => project,
        }
    }
}
