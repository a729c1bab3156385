//! Project file snapshot types.
//!
//! A `FileMap` is owned by the project-state collaborator and is read-only to
//! the selection core. Keys are project-relative paths.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Path → entry snapshot of a project tree, sorted by path.
pub type FileMap = BTreeMap<String, FileEntry>;

/// Whether a snapshot entry is a regular file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Folder,
}

/// One entry of a project snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File content (empty for folders)
    #[serde(default)]
    pub content: String,

    #[serde(rename = "type")]
    pub kind: FileKind,
}

impl FileEntry {
    pub fn file(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: FileKind::File,
        }
    }

    pub fn folder() -> Self {
        Self {
            content: String::new(),
            kind: FileKind::Folder,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_wire_shape() {
        let json = serde_json::to_value(FileEntry::file("fn main() {}")).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["content"], "fn main() {}");

        let folder: FileEntry = serde_json::from_str(r#"{"type":"folder"}"#).unwrap();
        assert_eq!(folder, FileEntry::folder());
        assert!(!folder.is_file());
    }

    #[test]
    fn file_map_iterates_sorted() {
        let mut map = FileMap::new();
        map.insert("src/b.ts".into(), FileEntry::file("b"));
        map.insert("src/a.ts".into(), FileEntry::file("a"));
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["src/a.ts", "src/b.ts"]);
    }
}
