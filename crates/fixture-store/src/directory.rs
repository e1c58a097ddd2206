use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub is_dir: bool,
}

impl DirEntryInfo {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

/// Read-only view of the directory backing a catalog.
pub trait DirectorySource: Send + Sync {
    /// List the immediate entries of the directory (no recursion).
    fn list_entries(&self) -> io::Result<Vec<DirEntryInfo>>;

    /// Read the full contents of the entry called `name`.
    fn read_bytes(&self, name: &str) -> io::Result<Vec<u8>>;

    /// Human-readable location used in logs and errors.
    fn location(&self) -> PathBuf;
}

/// [`DirectorySource`] over a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsDirectory {
    root: PathBuf,
}

impl FsDirectory {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DirectorySource for FsDirectory {
    fn list_entries(&self) -> io::Result<Vec<DirEntryInfo>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                log::warn!(
                    "Skipping non UTF-8 entry {} in {}",
                    entry.path().display(),
                    self.root.display()
                );
                continue;
            };
            // follow symlinks so a link to a directory is treated as one
            let is_dir = match fs::metadata(entry.path()) {
                Ok(meta) => meta.is_dir(),
                Err(_) => entry.file_type()?.is_dir(),
            };
            entries.push(DirEntryInfo { name, is_dir });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read_bytes(&self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.root.join(name))
    }

    fn location(&self) -> PathBuf {
        self.root.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn lists_files_and_directories_sorted() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.png"), b"b").unwrap();
        fs::write(temp.path().join("a.jpg"), b"a").unwrap();
        fs::create_dir(temp.path().join("nested")).unwrap();

        let dir = FsDirectory::new(temp.path());
        let entries = dir.list_entries().unwrap();
        assert_eq!(
            entries,
            vec![
                DirEntryInfo::file("a.jpg"),
                DirEntryInfo::file("b.png"),
                DirEntryInfo::dir("nested"),
            ]
        );
        assert_eq!(dir.read_bytes("a.jpg").unwrap(), b"a".to_vec());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let temp = TempDir::new().unwrap();
        let dir = FsDirectory::new(temp.path().join("absent"));
        let err = dir.list_entries().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
