//! Mapping database names to files on disk

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::{Error, Result};

/// Side files SQLite may leave next to a database file
const SIDE_FILE_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];

/// Resolves database names to paths and manages the files behind them.
pub trait StorageLocator: Send + Sync {
   /// Path of the database file for `name`.
   fn resolve(&self, name: &str) -> Result<PathBuf>;

   /// Create the parent directory of a database file that does not exist yet.
   fn ensure_parent_exists(&self, path: &Path) -> Result<()> {
      if !path.exists()
         && let Some(parent) = path.parent()
      {
         fs::create_dir_all(parent)?;
      }
      Ok(())
   }

   /// Delete the database file and its side files.
   fn delete(&self, path: &Path) -> Result<()> {
      delete_database_files(path)
   }
}

/// Stores every database as a file directly under one root directory.
#[derive(Debug, Clone)]
pub struct DirectoryLocator {
   root: PathBuf,
}

impl DirectoryLocator {
   pub fn new(root: impl Into<PathBuf>) -> Self {
      Self { root: root.into() }
   }

   pub fn root(&self) -> &Path {
      &self.root
   }
}

impl StorageLocator for DirectoryLocator {
   fn resolve(&self, name: &str) -> Result<PathBuf> {
      validate_name(name)?;
      Ok(self.root.join(name))
   }
}

/// Names must be a single plain file name
fn validate_name(name: &str) -> Result<()> {
   let mut components = Path::new(name).components();
   let single_normal =
      matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none();

   if name.is_empty() || name.contains(['/', '\\', '\0']) || !single_normal {
      return Err(Error::InvalidDatabaseName(name.to_string()));
   }
   Ok(())
}

/// Delete a database file and, best-effort, its journal/WAL/shared-memory files.
///
/// Fails if the main file cannot be removed, including when it does not exist.
pub fn delete_database_files(path: &Path) -> Result<()> {
   fs::remove_file(path)?;
   debug!(path = %path.display(), "Deleted database file");

   for suffix in SIDE_FILE_SUFFIXES {
      let mut side: OsString = path.as_os_str().to_owned();
      side.push(suffix);
      match fs::remove_file(&side) {
         Ok(()) => {}
         Err(e) if e.kind() == ErrorKind::NotFound => {}
         Err(e) => warn!(path = ?side, error = %e, "Failed to delete database side file"),
      }
   }

   Ok(())
}

#[cfg(test)]
mod tests {
   use super::*;
   use tempfile::TempDir;

   #[test]
   fn test_resolve_joins_root() {
      let locator = DirectoryLocator::new("/data/databases");
      assert_eq!(locator.root(), Path::new("/data/databases"));
      assert_eq!(
         locator.resolve("app.db").unwrap(),
         PathBuf::from("/data/databases/app.db")
      );
   }

   #[test]
   fn test_resolve_rejects_paths() {
      let locator = DirectoryLocator::new("/data/databases");
      for name in ["", "..", ".", "../app.db", "nested/app.db", "a\\b.db", "/etc/passwd", "x\0y"] {
         assert!(
            matches!(locator.resolve(name), Err(Error::InvalidDatabaseName(_))),
            "{name:?} should be rejected"
         );
      }
   }

   #[test]
   fn test_ensure_parent_exists_creates_missing_dirs() {
      let temp = TempDir::new().unwrap();
      let locator = DirectoryLocator::new(temp.path().join("a").join("b"));
      let path = locator.resolve("app.db").unwrap();

      locator.ensure_parent_exists(&path).unwrap();
      assert!(temp.path().join("a").join("b").is_dir());
   }

   #[test]
   fn test_delete_removes_side_files() {
      let temp = TempDir::new().unwrap();
      let locator = DirectoryLocator::new(temp.path());
      let path = locator.resolve("app.db").unwrap();

      fs::write(&path, b"").unwrap();
      fs::write(temp.path().join("app.db-wal"), b"").unwrap();
      fs::write(temp.path().join("app.db-shm"), b"").unwrap();

      locator.delete(&path).unwrap();

      assert!(!path.exists());
      assert!(!temp.path().join("app.db-wal").exists());
      assert!(!temp.path().join("app.db-shm").exists());
   }

   #[test]
   fn test_delete_missing_file_fails() {
      let temp = TempDir::new().unwrap();
      let locator = DirectoryLocator::new(temp.path());
      let path = locator.resolve("missing.db").unwrap();

      assert!(matches!(locator.delete(&path), Err(Error::Io(_))));
   }
}
