use crate::storage::{Error, Result, HIDDEN_PREFIX, MANIFEST_FILE_NAME};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

// Characters that are unsafe in file names on at least one supported platform.
pub(crate) static UNSAFE_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("valid regex"));

const MAX_NAME_LEN: usize = 255;

/// A path relative to a project root, stored as a list of segments.
///
/// All prefix comparisons work on whole segments, so `Notes` is never treated
/// as a prefix of `Notes2`. The empty path is the project root itself.
/// Serialized as a `/`-separated string.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemPath {
    segments: Vec<String>,
}

impl ItemPath {
    /// The project root.
    pub fn root() -> Self {
        ItemPath { segments: Vec::new() }
    }

    /// Parses a relative path typed by a user. Both `/` and `\` separate
    /// segments; empty and `.` segments are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] for `..` segments, absolute paths and
    /// segments containing NUL.
    pub fn parse(path: &str) -> Result<Self> {
        if path.starts_with('/') || path.starts_with('\\') || has_drive_prefix(path) {
            return Err(Error::InvalidPath(path.to_string()));
        }
        Self::from_segments(path, path.split(['/', '\\']))
    }

    /// Parses the persisted form written by [`Display`](fmt::Display), where
    /// only `/` separates segments. A `\` inside an on-disk name stays part
    /// of that name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] for `..` segments, absolute paths and
    /// segments containing NUL.
    pub fn from_stored(path: &str) -> Result<Self> {
        if path.starts_with('/') {
            return Err(Error::InvalidPath(path.to_string()));
        }
        Self::from_segments(path, path.split('/'))
    }

    fn from_segments<'a>(path: &str, parts: impl Iterator<Item = &'a str>) -> Result<Self> {
        let mut segments = Vec::new();
        for segment in parts {
            match segment {
                "" | "." => continue,
                ".." => return Err(Error::InvalidPath(path.to_string())),
                s if s.contains('\0') => return Err(Error::InvalidPath(path.to_string())),
                s => segments.push(s.to_string()),
            }
        }
        Ok(ItemPath { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments; the root has depth 0.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Last segment, `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The containing directory, `None` for the root.
    pub fn parent(&self) -> Option<ItemPath> {
        if self.is_root() {
            return None;
        }
        Some(ItemPath { segments: self.segments[..self.segments.len() - 1].to_vec() })
    }

    /// Appends one segment. The caller is responsible for the segment being a
    /// single name (see [`validate_name`]).
    pub fn join(&self, name: &str) -> ItemPath {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        ItemPath { segments }
    }

    /// Replaces the last segment. The root is returned unchanged.
    pub fn with_name(&self, name: &str) -> ItemPath {
        match self.parent() {
            Some(parent) => parent.join(name),
            None => self.clone(),
        }
    }

    /// True if `prefix` equals this path or is one of its ancestors.
    pub fn starts_with(&self, prefix: &ItemPath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Replaces the leading `old` segments with `new`.
    ///
    /// Returns `None` if this path is not `old` or nested under it.
    pub fn rebase(&self, old: &ItemPath, new: &ItemPath) -> Option<ItemPath> {
        if !self.starts_with(old) {
            return None;
        }
        let mut segments = new.segments.clone();
        segments.extend_from_slice(&self.segments[old.segments.len()..]);
        Some(ItemPath { segments })
    }

    /// Absolute filesystem path under `root`.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in &self.segments {
            path.push(segment);
        }
        path
    }
}

impl fmt::Display for ItemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl TryFrom<String> for ItemPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        ItemPath::from_stored(&value)
    }
}

impl From<ItemPath> for String {
    fn from(value: ItemPath) -> Self {
        value.to_string()
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Checks that `name` is usable as a single new file or folder name.
///
/// Rejects empty names, `.` and `..`, hidden names, the manifest file name,
/// path separators and characters that are invalid on common filesystems.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason| Err(Error::InvalidName { name: name.to_string(), reason });

    if name.trim().is_empty() {
        return invalid("name is empty");
    }
    if name == "." || name == ".." {
        return invalid("name refers to a directory");
    }
    if name == MANIFEST_FILE_NAME {
        return invalid("name is reserved");
    }
    if name.starts_with(HIDDEN_PREFIX) {
        return invalid("hidden names are not allowed");
    }
    if UNSAFE_NAME_CHARS.is_match(name) {
        return invalid("name contains a path separator or reserved character");
    }
    if name != name.trim_end_matches([' ', '.']) {
        return invalid("name ends with a space or dot");
    }
    if name.len() > MAX_NAME_LEN {
        return invalid("name is too long");
    }
    Ok(())
}

/// Appends `.{extension}` to names that have none.
pub(crate) fn with_default_extension(name: &str, extension: Option<&str>) -> String {
    match extension {
        Some(ext) if Path::new(name).extension().is_none() => format!("{}.{}", name, ext),
        _ => name.to_string(),
    }
}
