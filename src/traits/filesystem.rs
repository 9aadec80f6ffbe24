use anyhow::{Context, Result};
#[cfg(test)]
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
#[cfg(test)]
use std::sync::{Arc, RwLock};

/// Filesystem access used by the generator, so runs can be exercised in memory
pub trait FileSystem: Send + Sync {
    /// Read file contents as string
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Write string contents to file, creating parent directories
    fn write(&self, path: &Path, contents: &str) -> Result<()>;

    /// Create directory and all parent directories
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Remove directory and all its contents
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Remove a file
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Check if path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Check if path is a file
    fn is_file(&self, path: &Path) -> bool;

    /// Size of a file in bytes
    fn file_len(&self, path: &Path) -> Result<u64>;

    /// Direct children of a directory, sorted by path
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Real filesystem implementation using std::fs
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create parent directory: {:?}", parent))?;
        }

        std::fs::write(path, contents).with_context(|| format!("Failed to write file: {:?}", path))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {:?}", path))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {:?}", path))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).with_context(|| format!("Failed to remove file: {:?}", path))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn file_len(&self, path: &Path) -> Result<u64> {
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Failed to stat file: {:?}", path))?;
        Ok(metadata.len())
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)
            .with_context(|| format!("Failed to read directory: {:?}", path))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.context("Failed to read directory entry")?;
            paths.push(entry.path());
        }
        paths.sort();

        Ok(paths)
    }
}

/// In-memory filesystem for tests
#[cfg(test)]
pub struct MockFileSystem {
    files: Arc<RwLock<BTreeMap<PathBuf, String>>>,
    directories: Arc<RwLock<BTreeSet<PathBuf>>>,
}

#[cfg(test)]
impl MockFileSystem {
    pub fn new() -> Self {
        Self {
            files: Arc::new(RwLock::new(BTreeMap::new())),
            directories: Arc::new(RwLock::new(BTreeSet::new())),
        }
    }

    /// Captured file contents, for assertions
    pub fn get_file_contents(&self, path: &Path) -> Option<String> {
        self.files.read().unwrap().get(path).cloned()
    }

    pub fn has_file(&self, path: &Path) -> bool {
        self.files.read().unwrap().contains_key(path)
    }

    /// All files, sorted
    pub fn list_files(&self) -> Vec<PathBuf> {
        self.files.read().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.files
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .with_context(|| format!("File not found in mock filesystem: {:?}", path))
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.create_dir_all(parent)?;
        }

        self.files
            .write()
            .unwrap()
            .insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut directories = self.directories.write().unwrap();
        let mut current = Some(path);
        while let Some(dir) = current {
            if dir.as_os_str().is_empty() {
                break;
            }
            directories.insert(dir.to_path_buf());
            current = dir.parent();
        }

        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.directories
            .write()
            .unwrap()
            .retain(|dir| !dir.starts_with(path));
        self.files
            .write()
            .unwrap()
            .retain(|file_path, _| !file_path.starts_with(path));

        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.files
            .write()
            .unwrap()
            .remove(path)
            .with_context(|| format!("File not found in mock filesystem: {:?}", path))?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.directories.read().unwrap().contains(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.read().unwrap().contains_key(path)
    }

    fn file_len(&self, path: &Path) -> Result<u64> {
        self.files
            .read()
            .unwrap()
            .get(path)
            .map(|contents| contents.len() as u64)
            .with_context(|| format!("File not found in mock filesystem: {:?}", path))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let files = self.files.read().unwrap();
        let directories = self.directories.read().unwrap();

        let mut entries: Vec<PathBuf> = files
            .keys()
            .chain(directories.iter())
            .filter(|entry| entry.parent() == Some(path))
            .cloned()
            .collect();
        entries.sort();
        entries.dedup();

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_write_creates_parents() {
        let fs = MockFileSystem::new();
        fs.write(Path::new("/out/files/a.json"), "{}").unwrap();

        assert!(fs.is_dir(Path::new("/out/files")));
        assert!(fs.is_dir(Path::new("/out")));
        assert_eq!(fs.file_len(Path::new("/out/files/a.json")).unwrap(), 2);
    }

    #[test]
    fn test_mock_read_dir_is_sorted_and_shallow() {
        let fs = MockFileSystem::new();
        fs.write(Path::new("/out/b.tf"), "").unwrap();
        fs.write(Path::new("/out/a.tf"), "").unwrap();
        fs.write(Path::new("/out/files/x.json"), "").unwrap();

        let entries = fs.read_dir(Path::new("/out")).unwrap();
        assert_eq!(
            entries,
            vec![
                PathBuf::from("/out/a.tf"),
                PathBuf::from("/out/b.tf"),
                PathBuf::from("/out/files"),
            ]
        );
    }

    #[test]
    fn test_mock_remove_dir_all() {
        let fs = MockFileSystem::new();
        fs.write(Path::new("/out/files/x.json"), "").unwrap();
        fs.write(Path::new("/other/y.tf"), "").unwrap();

        fs.remove_dir_all(Path::new("/out")).unwrap();

        assert!(!fs.exists(Path::new("/out")));
        assert!(!fs.has_file(Path::new("/out/files/x.json")));
        assert!(fs.has_file(Path::new("/other/y.tf")));
    }
}
