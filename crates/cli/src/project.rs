//! Project snapshot: walk a directory into a `FileMap`.

use filescope_core::files::{FileEntry, FileMap};
use filescope_selection::IgnoreFilter;
use ignore::WalkBuilder;
use std::path::Path;
use tracing::debug;

/// Files larger than this are left out of the snapshot.
pub const MAX_FILE_SIZE_BYTES: u64 = 1024 * 1024;

/// Bytes inspected when deciding whether a file is binary.
const BINARY_SNIFF_BYTES: usize = 8 * 1024;

/// Walk `root` (.gitignore aware), skipping everything `filter` ignores.
///
/// Keys are root-relative, forward-slash paths. Directories become folder
/// entries; regular text files carry their content.
pub fn scan(root: &Path, filter: &IgnoreFilter) -> Result<FileMap, std::io::Error> {
    if !root.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("project root {} is not a directory", root.display()),
        ));
    }

    let mut files = FileMap::new();
    let walk_root = root.to_path_buf();
    let walk_filter = filter.clone();

    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(false)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .require_git(false);
    builder.filter_entry(move |entry| match relative(&walk_root, entry.path()) {
        Some(rel) => !walk_filter.is_ignored(&rel),
        None => true,
    });

    for result in builder.build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        let Some(rel) = relative(root, entry.path()) else {
            continue;
        };
        let Some(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            files.insert(rel, FileEntry::folder());
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        if let Ok(meta) = entry.metadata() {
            if meta.len() > MAX_FILE_SIZE_BYTES {
                debug!(path = %rel, bytes = meta.len(), "Skipping large file");
                continue;
            }
        }

        let bytes = match std::fs::read(entry.path()) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %rel, error = %e, "Skipping unreadable file");
                continue;
            }
        };
        if bytes[..bytes.len().min(BINARY_SNIFF_BYTES)].contains(&0) {
            debug!(path = %rel, "Skipping binary file");
            continue;
        }

        files.insert(rel, FileEntry::file(String::from_utf8_lossy(&bytes).into_owned()));
    }

    Ok(files)
}

/// Root-relative forward-slash path; `None` for the root itself.
fn relative(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let rel = rel.to_string_lossy().replace('\\', "/");
    (!rel.is_empty()).then_some(rel)
}
