// In: src/bridge/walk.rs

//! Source enumeration: which files become entries, in which order, and under
//! which embedded names.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::ChromaError;

/// Lists every regular file below `root`, depth first, each directory's files
/// before its subdirectories and both in name order. A file `root` yields
/// itself. Uses an explicit work stack, so tree depth does not grow the call
/// stack. Symlinked directories are not followed.
pub fn list_files(root: impl AsRef<Path>) -> Result<Vec<PathBuf>, ChromaError> {
    let root = root.as_ref();
    let metadata = fs::metadata(root).map_err(|e| {
        ChromaError::SourceUnavailable(format!("cannot access {}: {}", root.display(), e))
    })?;
    if !metadata.is_dir() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        let mut children = Vec::new();
        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            children.push((entry.file_name(), entry.path(), entry.file_type()?));
        }
        children.sort_by(|a, b| a.0.cmp(&b.0));

        // Reversed so the smallest name is expanded next.
        let mut subdirs = Vec::new();
        for (_, child, file_type) in children {
            if file_type.is_dir() {
                subdirs.push(child);
            } else if child.is_file() {
                files.push(child);
            } else {
                log::debug!("Skipping {} (not a regular file)", child.display());
            }
        }
        stack.extend(subdirs.into_iter().rev());
    }
    Ok(files)
}

/// The embedded name of `file` when encoding `root`: for a directory root, the
/// root's own name followed by the path below it, joined with `/`; for a file
/// root, its file name. The root is canonicalized first, so `.` or `..` roots
/// are named after the directory they point at.
pub fn entry_name(root: &Path, file: &Path) -> String {
    if !root.is_dir() {
        return file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
    }
    let canonical = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let relative = file.strip_prefix(root).unwrap_or(file);

    let mut parts: Vec<String> = canonical
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .into_iter()
        .collect();
    parts.extend(relative.components().filter_map(|c| match c {
        Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
        _ => None,
    }));
    parts.join("/")
}
