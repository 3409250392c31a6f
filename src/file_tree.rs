use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Deleted,
    Modified,
    #[default]
    #[serde(other)]
    Unknown,
}

impl FileStatus {
    pub fn symbol(self) -> char {
        match self {
            Self::Added => '+',
            Self::Deleted => '-',
            Self::Modified | Self::Unknown => '~',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    #[serde(default)]
    pub status: FileStatus,
}

impl ChangedFile {
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileTreeNodeKind {
    Folder,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTreeNode {
    pub name: String,
    pub kind: FileTreeNodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<FileStatus>,
    pub children: Vec<FileTreeNode>,
}

impl FileTreeNode {
    fn folder(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FileTreeNodeKind::Folder,
            full_path: None,
            status: None,
            children: Vec::new(),
        }
    }

    fn file(name: &str, file: &ChangedFile) -> Self {
        Self {
            name: name.to_string(),
            kind: FileTreeNodeKind::File,
            full_path: Some(file.path.clone()),
            status: Some(file.status),
            children: Vec::new(),
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == FileTreeNodeKind::Folder
    }

    pub fn symbol(&self) -> Option<char> {
        self.status.map(FileStatus::symbol)
    }
}

/// Nests a commit's changed paths into folders.
///
/// Folders and files keep the order they first appear in `files`; nothing is
/// sorted. Repeated paths become separate sibling leaves.
pub fn build_changed_file_tree(files: &[ChangedFile]) -> Vec<FileTreeNode> {
    let mut root = Vec::<FileTreeNode>::new();

    for file in files {
        let mut parts = file
            .path
            .split('/')
            .filter(|part| !part.is_empty())
            .peekable();
        let mut cursor = &mut root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                cursor.push(FileTreeNode::file(part, file));
                break;
            }

            let folder_ix = match cursor
                .iter()
                .position(|node| node.is_folder() && node.name == part)
            {
                Some(ix) => ix,
                None => {
                    cursor.push(FileTreeNode::folder(part));
                    cursor.len() - 1
                }
            };
            cursor = &mut cursor[folder_ix].children;
        }
    }

    root
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTreeRow {
    pub name: String,
    pub depth: usize,
    pub kind: FileTreeNodeKind,
    pub full_path: Option<String>,
    pub symbol: Option<char>,
}

/// Depth-first rows for list-style rendering.
pub fn flatten_file_tree_rows(nodes: &[FileTreeNode]) -> Vec<FileTreeRow> {
    let mut rows = Vec::new();
    append_file_tree_rows(nodes, 0, &mut rows);
    rows
}

fn append_file_tree_rows(nodes: &[FileTreeNode], depth: usize, rows: &mut Vec<FileTreeRow>) {
    for node in nodes {
        rows.push(FileTreeRow {
            name: node.name.clone(),
            depth,
            kind: node.kind,
            full_path: node.full_path.clone(),
            symbol: node.symbol(),
        });
        append_file_tree_rows(&node.children, depth + 1, rows);
    }
}
