//! Virtual filesystem used by the host and exposed to modules.
//!
//! Relative paths are looked up in an ordered list of search roots, the way
//! game data directories stack. Absolute paths bypass the roots.

mod table;

pub use table::{FileTable, VirtualFile};

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

/// Ordered set of search roots.
#[derive(Debug, Clone, Default)]
pub struct FileSystem {
    roots: Vec<PathBuf>,
}

impl FileSystem {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolve `path` to a real location.
    ///
    /// With `must_exist`, returns the first root containing the file (or the
    /// absolute path if it exists). Without it, an existing file is still
    /// preferred; otherwise the path is placed under the first root.
    pub fn resolve(&self, path: &str, must_exist: bool) -> Option<PathBuf> {
        let requested = Path::new(path);
        if requested.is_absolute() {
            return (!must_exist || requested.is_file()).then(|| requested.to_path_buf());
        }

        let existing = if self.roots.is_empty() {
            requested.is_file().then(|| requested.to_path_buf())
        } else {
            self.roots
                .iter()
                .map(|root| root.join(requested))
                .find(|candidate| candidate.is_file())
        };

        match existing {
            Some(found) => Some(found),
            None if must_exist => None,
            None => Some(match self.roots.first() {
                Some(root) => root.join(requested),
                None => requested.to_path_buf(),
            }),
        }
    }

    /// Open `path` for reading. Without `must_exist`, a missing file is
    /// created empty.
    pub fn open(&self, path: &str, must_exist: bool) -> io::Result<VirtualFile> {
        let resolved = self.resolve(path, must_exist).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{path} not found in search roots"))
        })?;

        let file = if must_exist {
            std::fs::File::open(&resolved)?
        } else {
            if let Some(parent) = resolved.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&resolved)?
        };

        Ok(VirtualFile::new(resolved, file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_resolve_prefers_first_root() {
        let base = TempDir::new().unwrap();
        let mod_dir = TempDir::new().unwrap();
        write(base.path(), "gfx/wall.dds", b"base");
        let override_path = write(mod_dir.path(), "gfx/wall.dds", b"mod");

        let fs = FileSystem::new(vec![mod_dir.path().to_path_buf(), base.path().to_path_buf()]);
        assert_eq!(fs.resolve("gfx/wall.dds", true), Some(override_path));
    }

    #[test]
    fn test_resolve_falls_through_to_later_roots() {
        let base = TempDir::new().unwrap();
        let empty = TempDir::new().unwrap();
        let expected = write(base.path(), "pak0.pak", b"PACK");

        let fs = FileSystem::new(vec![empty.path().to_path_buf(), base.path().to_path_buf()]);
        assert_eq!(fs.resolve("pak0.pak", true), Some(expected));
    }

    #[test]
    fn test_resolve_missing_must_exist() {
        let root = TempDir::new().unwrap();
        let fs = FileSystem::new(vec![root.path().to_path_buf()]);
        assert!(fs.resolve("nope.pak", true).is_none());
        assert_eq!(
            fs.resolve("nope.pak", false),
            Some(root.path().join("nope.pak"))
        );
    }

    #[test]
    fn test_absolute_paths_bypass_roots() {
        let dir = TempDir::new().unwrap();
        let file = write(dir.path(), "abs.bin", b"x");
        let fs = FileSystem::new(vec![PathBuf::from("/definitely/not/here")]);
        assert_eq!(fs.resolve(file.to_str().unwrap(), true), Some(file));
    }

    #[test]
    fn test_open_without_must_exist_creates_file() {
        let root = TempDir::new().unwrap();
        let fs = FileSystem::new(vec![root.path().to_path_buf()]);

        let file = fs.open("saves/slot1.sav", false).unwrap();
        assert_eq!(file.path(), root.path().join("saves/slot1.sav"));
        assert!(root.path().join("saves/slot1.sav").exists());
    }

    #[test]
    fn test_open_missing_is_not_found() {
        let root = TempDir::new().unwrap();
        let fs = FileSystem::new(vec![root.path().to_path_buf()]);
        let err = fs.open("missing.dds", true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
