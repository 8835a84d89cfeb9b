use crate::storage::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Extensions that are always read as text.
const TEXT_EXTENSIONS: &[&str] = &[
    "md", "markdown", "mdown", "mdx", "txt", "json", "js", "ts", "jsx", "tsx", "html", "css", "scss",
    "sass", "xml", "yaml", "yml", "csv", "log",
];

/// Extension-less files up to this size are tried as text.
const MAX_UNTYPED_TEXT_SIZE: u64 = 1024 * 1024;

/// Content of a workspace file, as presented to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FileContent {
    Text { text: String },
    Binary { size: u64 },
}

impl FileContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FileContent::Text { text } => Some(text),
            FileContent::Binary { .. } => None,
        }
    }
}

fn looks_like_text(path: &Path, size: u64) -> bool {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => size < MAX_UNTYPED_TEXT_SIZE,
    }
}

/// Reads a file, returning its text if it is a text file that decodes as UTF-8.
pub(crate) async fn read_file_content(path: &Path) -> Result<FileContent> {
    let size = fs::metadata(path).await.map_err(Error::Io)?.len();
    if !looks_like_text(path, size) {
        return Ok(FileContent::Binary { size });
    }
    let bytes = fs::read(path).await.map_err(Error::Io)?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(FileContent::Text { text }),
        Err(_) => Ok(FileContent::Binary { size }),
    }
}
