//! Request/response model for driving a [`ProjectStore`] with JSON messages.
//!
//! A [`Request`] is tagged by its `action` field; field names are camelCase:
//!
//! ```json
//! { "action": "rename", "projectPath": "libros/My_Novel", "itemId": "…", "newName": "Part Two" }
//! ```
//!
//! [`handle`] never fails: every error is reported as a [`Response`] with
//! `success: false`, an [`ErrorKind`] and a message.

use crate::storage::{
    Catalog, Error, ErrorKind, FileContent, ImportFile, ImportReport, ItemId, ProjectCategory, ProjectStore,
    ProjectStructure, ProjectSummary,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    GetStructure {
        project_path: String,
    },
    CreateFile {
        project_path: String,
        file_name: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        parent_id: Option<ItemId>,
    },
    CreateFolder {
        project_path: String,
        folder_name: String,
        #[serde(default)]
        parent_id: Option<ItemId>,
    },
    UpdateContent {
        project_path: String,
        item_id: ItemId,
        content: String,
    },
    Rename {
        project_path: String,
        item_id: ItemId,
        new_name: String,
    },
    Delete {
        project_path: String,
        item_id: ItemId,
    },
    Move {
        project_path: String,
        item_id: ItemId,
        /// Project root when absent.
        #[serde(default)]
        target_parent_id: Option<ItemId>,
    },
    Import {
        project_path: String,
        files: Vec<ImportFile>,
        #[serde(default)]
        parent_id: Option<ItemId>,
    },
    ReadContent {
        project_path: String,
        item_id: ItemId,
    },
    ImportOutline {
        project_path: String,
        file_name: String,
        content: String,
        #[serde(default)]
        parent_id: Option<ItemId>,
    },
    ListProjects,
    CreateProject {
        category: ProjectCategory,
        name: String,
    },
    /// Deletes the whole project directory; refused unless `confirm` is true.
    DeleteProject {
        project_path: String,
        #[serde(default)]
        confirm: bool,
    },
    ClearCache {
        project_path: String,
    },
}

impl Request {
    /// Parses a JSON request body.
    pub fn from_json(json: &str) -> Result<Request, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Name of the action, as it appears in the `action` field.
    pub fn action(&self) -> &'static str {
        match self {
            Request::GetStructure { .. } => "getStructure",
            Request::CreateFile { .. } => "createFile",
            Request::CreateFolder { .. } => "createFolder",
            Request::UpdateContent { .. } => "updateContent",
            Request::Rename { .. } => "rename",
            Request::Delete { .. } => "delete",
            Request::Move { .. } => "move",
            Request::Import { .. } => "import",
            Request::ReadContent { .. } => "readContent",
            Request::ImportOutline { .. } => "importOutline",
            Request::ListProjects => "listProjects",
            Request::CreateProject { .. } => "createProject",
            Request::DeleteProject { .. } => "deleteProject",
            Request::ClearCache { .. } => "clearCache",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<ProjectStructure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<FileContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<ImportReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Catalog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectSummary>,
}

impl Response {
    fn ok(message: impl Into<String>) -> Self {
        Response { success: true, message: Some(message.into()), ..Default::default() }
    }

    fn with_structure(mut self, structure: ProjectStructure) -> Self {
        self.structure = Some(structure);
        self
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response { success: false, error: Some(kind), message: Some(message.into()), ..Default::default() }
    }

    /// Response for a body that could not be decoded into a [`Request`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::failure(ErrorKind::InvalidRequest, message)
    }
}

impl From<Error> for Response {
    fn from(error: Error) -> Self {
        Response::failure(error.kind(), error.to_string())
    }
}

/// Decodes a JSON request and handles it.
pub async fn handle_json(store: &ProjectStore, json: &str) -> Response {
    match Request::from_json(json) {
        Ok(request) => handle(store, request).await,
        Err(e) => {
            warn!("Rejected malformed request: {}", e);
            Response::invalid_request(format!("Malformed request: {}", e))
        }
    }
}

/// Executes one request against `store`.
#[instrument(skip(store, request), fields(action = request.action()))]
pub async fn handle(store: &ProjectStore, request: Request) -> Response {
    match dispatch(store, request).await {
        Ok(response) => response,
        Err(e) => {
            debug!("Request failed: {}", e);
            e.into()
        }
    }
}

async fn dispatch(store: &ProjectStore, request: Request) -> crate::storage::Result<Response> {
    let response = match request {
        Request::GetStructure { project_path } => {
            let structure = store.project(&project_path).await?.structure().await?;
            Response::ok("Structure loaded").with_structure(structure)
        }
        Request::CreateFile { project_path, file_name, content, parent_id } => {
            let project = store.project(&project_path).await?;
            let structure = project.create_file(&file_name, &content, parent_id.as_ref()).await?;
            Response::ok("File created").with_structure(structure)
        }
        Request::CreateFolder { project_path, folder_name, parent_id } => {
            let project = store.project(&project_path).await?;
            let structure = project.create_folder(&folder_name, parent_id.as_ref()).await?;
            Response::ok("Folder created").with_structure(structure)
        }
        Request::UpdateContent { project_path, item_id, content } => {
            let project = store.project(&project_path).await?;
            let structure = project.update_content(&item_id, &content).await?;
            Response::ok("Content updated").with_structure(structure)
        }
        Request::Rename { project_path, item_id, new_name } => {
            let project = store.project(&project_path).await?;
            let structure = project.rename(&item_id, &new_name).await?;
            Response::ok("Item renamed").with_structure(structure)
        }
        Request::Delete { project_path, item_id } => {
            if item_id.as_str().is_empty() {
                return Ok(Response::invalid_request(
                    "itemId is required; use deleteProject to delete a whole project",
                ));
            }
            let project = store.project(&project_path).await?;
            let structure = project.delete(&item_id).await?;
            Response::ok("Item deleted").with_structure(structure)
        }
        Request::Move { project_path, item_id, target_parent_id } => {
            let project = store.project(&project_path).await?;
            let structure = project.move_item(&item_id, target_parent_id.as_ref()).await?;
            Response::ok("Item moved").with_structure(structure)
        }
        Request::Import { project_path, files, parent_id } => {
            let project = store.project(&project_path).await?;
            let (report, structure) = project.import(files, parent_id.as_ref()).await?;
            let message = format!("Imported {} of {} files", report.imported(), report.outcomes.len());
            Response { report: Some(report), ..Response::ok(message).with_structure(structure) }
        }
        Request::ReadContent { project_path, item_id } => {
            let content = store.project(&project_path).await?.read_content(&item_id).await?;
            Response { content: Some(content), ..Response::ok("Content loaded") }
        }
        Request::ImportOutline { project_path, file_name, content, parent_id } => {
            let project = store.project(&project_path).await?;
            let structure = project.import_outline(&file_name, &content, parent_id.as_ref()).await?;
            Response::ok("Outline imported").with_structure(structure)
        }
        Request::ListProjects => {
            let catalog = store.list_projects().await?;
            Response { projects: Some(catalog), ..Response::ok("Projects listed") }
        }
        Request::CreateProject { category, name } => {
            let summary = store.create_project(category, &name).await?;
            Response { project: Some(summary), ..Response::ok("Project created") }
        }
        Request::DeleteProject { project_path, confirm } => {
            if !confirm {
                return Ok(Response::invalid_request("Deleting a whole project requires confirm: true"));
            }
            store.delete_project(&project_path).await?;
            Response::ok("Project deleted")
        }
        Request::ClearCache { project_path } => {
            store.clear_cache(&project_path).await?;
            Response::ok("Cache cleared")
        }
    };
    Ok(response)
}
