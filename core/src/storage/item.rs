use crate::storage::{ItemId, ItemPath};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Directory,
}

/// One node of an [`ItemTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub id: ItemId,
    pub name: String,
    pub path: ItemPath,
    pub kind: ItemKind,
    /// File size in bytes; 0 for directories.
    pub size: u64,
    /// `None` for items directly under the project root.
    pub parent: Option<ItemId>,
    /// Ordered as produced by the scan.
    pub children: Vec<ItemId>,
}

/// Arena of scanned items addressed by ID.
///
/// Nodes refer to their parent and children by ID only, which keeps the tree
/// trivially cloneable and comparable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemTree {
    root: PathBuf,
    nodes: Vec<TreeNode>,
    index: HashMap<ItemId, usize>,
    top_level: Vec<ItemId>,
}

impl ItemTree {
    pub(crate) fn new(root: PathBuf) -> Self {
        ItemTree { root, ..Default::default() }
    }

    /// Adds a node under `parent` (or the project root), after any existing siblings.
    pub(crate) fn push(&mut self, parent: Option<&ItemId>, id: ItemId, name: String, path: ItemPath, kind: ItemKind, size: u64) {
        match parent.and_then(|p| self.index.get(p).copied()) {
            Some(parent_idx) => self.nodes[parent_idx].children.push(id.clone()),
            None => self.top_level.push(id.clone()),
        }
        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(TreeNode {
            id,
            name,
            path,
            kind,
            size,
            parent: parent.cloned(),
            children: Vec::new(),
        });
    }

    /// Absolute path of the project root this tree was scanned from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &ItemId) -> Option<&TreeNode> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn parent_of(&self, id: &ItemId) -> Option<&TreeNode> {
        self.get(id)?.parent.as_ref().and_then(|parent| self.get(parent))
    }

    pub fn children_of<'a>(&'a self, id: &ItemId) -> impl Iterator<Item = &'a TreeNode> + 'a {
        let children = self.get(id).map(|node| node.children.as_slice()).unwrap_or_default();
        children.iter().filter_map(move |child| self.get(child))
    }

    /// Items directly under the project root.
    pub fn top_level(&self) -> impl Iterator<Item = &TreeNode> {
        self.top_level.iter().filter_map(move |id| self.get(id))
    }

    pub fn find_by_path(&self, path: &ItemPath) -> Option<&TreeNode> {
        self.nodes.iter().find(|node| &node.path == path)
    }

    /// All nodes, parents before their children.
    pub fn iter(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.iter()
    }

    /// Builds the nested view of the tree.
    pub fn to_items(&self) -> Vec<WorkspaceItem> {
        self.top_level
            .iter()
            .filter_map(|id| self.get(id))
            .map(|node| self.to_item(node))
            .collect()
    }

    fn to_item(&self, node: &TreeNode) -> WorkspaceItem {
        WorkspaceItem {
            id: node.id.clone(),
            name: node.name.clone(),
            path: node.path.clone(),
            absolute_path: node.path.to_path(&self.root),
            kind: node.kind,
            size: match node.kind {
                ItemKind::File => Some(node.size),
                ItemKind::Directory => None,
            },
            children: node
                .children
                .iter()
                .filter_map(|id| self.get(id))
                .map(|child| self.to_item(child))
                .collect(),
        }
    }
}

/// Nested, serializable projection of one scanned item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceItem {
    pub id: ItemId,
    pub name: String,
    pub path: ItemPath,
    pub absolute_path: PathBuf,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default)]
    pub children: Vec<WorkspaceItem>,
}

impl WorkspaceItem {
    pub fn is_dir(&self) -> bool {
        self.kind == ItemKind::Directory
    }
}

/// Scanned state of a whole project, as returned by every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStructure {
    /// Name of the project directory.
    pub id: String,
    pub name: String,
    /// Project path as given by the caller.
    pub path: String,
    pub items: Vec<WorkspaceItem>,
}

impl ProjectStructure {
    pub(crate) fn from_tree(path: &str, tree: &ItemTree) -> Self {
        let name = tree
            .root()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        ProjectStructure {
            id: name.clone(),
            name,
            path: path.to_string(),
            items: tree.to_items(),
        }
    }

    /// Finds the item at a `/`-separated relative path.
    pub fn item_at(&self, path: &str) -> Option<&WorkspaceItem> {
        let path = ItemPath::from_stored(path).ok()?;
        let mut level = &self.items;
        let mut found = None;
        for segment in path.segments() {
            let item = level.iter().find(|item| &item.name == segment)?;
            level = &item.children;
            found = Some(item);
        }
        found
    }

    /// Depth-first iterator over every item.
    pub fn walk(&self) -> impl Iterator<Item = &WorkspaceItem> {
        let mut stack: Vec<&WorkspaceItem> = self.items.iter().rev().collect();
        std::iter::from_fn(move || {
            let item = stack.pop()?;
            stack.extend(item.children.iter().rev());
            Some(item)
        })
    }
}
