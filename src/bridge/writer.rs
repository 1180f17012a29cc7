// In: src/bridge/writer.rs

//! The entry-writer boundary: where reconstructed entries leave the decoder.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::codec::framer::DecodedEntry;
use crate::error::ChromaError;

/// Decode-side collaborator: receives each entry as soon as its `FILE_END` is read.
pub trait EntrySink {
    fn write_entry(&mut self, entry: DecodedEntry) -> Result<(), ChromaError>;
}

/// Collects entries in memory.
impl EntrySink for Vec<DecodedEntry> {
    fn write_entry(&mut self, entry: DecodedEntry) -> Result<(), ChromaError> {
        self.push(entry);
        Ok(())
    }
}

/// Recreates each entry as a file below `root`, using its embedded name as a
/// relative path. Names that would escape `root` are refused.
#[derive(Debug)]
pub struct DirectoryWriter {
    root: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectoryWriter {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, ChromaError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            written: Vec::new(),
        })
    }

    /// Paths written so far, in stream order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Maps an embedded name to a path below the root.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, ChromaError> {
        let mut relative = PathBuf::new();
        for part in name.split(['/', '\\']) {
            match Path::new(part).components().next() {
                None | Some(Component::CurDir) => continue,
                Some(Component::Normal(_)) => relative.push(part),
                Some(_) => {
                    return Err(ChromaError::SourceUnavailable(format!(
                        "refusing to write entry '{}' outside the output directory",
                        name
                    )))
                }
            }
        }
        if relative.as_os_str().is_empty() {
            return Err(ChromaError::SourceUnavailable(format!(
                "entry name '{}' has no usable path component",
                name
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl EntrySink for DirectoryWriter {
    fn write_entry(&mut self, entry: DecodedEntry) -> Result<(), ChromaError> {
        let path = self.resolve(&entry.name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &entry.data).map_err(|e| {
            ChromaError::SourceUnavailable(format!("cannot write {}: {}", path.display(), e))
        })?;
        log::info!("Wrote file: {} ({} bytes)", path.display(), entry.data.len());
        self.written.push(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_nested_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DirectoryWriter::new(dir.path()).unwrap();
        writer
            .write_entry(DecodedEntry {
                name: "photos/2024/a.bin".to_string(),
                data: vec![1, 2, 3],
            })
            .unwrap();

        let expected = dir.path().join("photos").join("2024").join("a.bin");
        assert_eq!(fs::read(&expected).unwrap(), vec![1, 2, 3]);
        assert_eq!(writer.written(), &[expected]);
    }

    #[test]
    fn test_leading_separators_and_dots_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DirectoryWriter::new(dir.path()).unwrap();
        assert_eq!(
            writer.resolve("/./docs//readme.md").unwrap(),
            dir.path().join("docs").join("readme.md")
        );
    }

    #[test]
    fn test_parent_components_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DirectoryWriter::new(dir.path()).unwrap();
        let result = writer.write_entry(DecodedEntry {
            name: "../escape.txt".to_string(),
            data: vec![],
        });
        assert!(matches!(result, Err(ChromaError::SourceUnavailable(_))));
        assert!(writer.written().is_empty());
    }
}
