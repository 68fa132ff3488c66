//! # Photo File Collaborator
//!
//! Products may reference a photo by file name. The files themselves are
//! managed outside the record store's transactional boundary, in a single
//! directory owned by the app shell (which also runs the camera). The data
//! layer only ever:
//!
//! - resolves a product's photo file name to a path,
//! - removes the file when the product is deleted,
//! - reads/writes bytes during backup export/import.
//!
//! A missing file is never an error here: records and files can drift
//! (cleared app storage, restored backups) and the dataset stays usable.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use larder_core::types::Product;

/// Handle to the photo directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// Creates a handle rooted at the given directory.
    ///
    /// The directory is created lazily on the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ImageStore { root: root.into() }
    }

    /// The photo directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The path a photo file name resolves to.
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Resolves a product's photo to a path, when the product references
    /// one and the file actually exists on disk.
    pub fn product_image_path(&self, product: &Product) -> Option<PathBuf> {
        let file_name = product.photo.as_deref()?;
        let path = self.path_for(file_name);
        if path.is_file() {
            Some(path)
        } else {
            None
        }
    }

    /// Extracts the photo file name from a full path, e.g. when the camera
    /// hands back where it saved a capture.
    pub fn file_name_from_path(path: &Path) -> Option<String> {
        path.file_name().map(|n| n.to_string_lossy().into_owned())
    }

    /// Reads a photo's bytes. `Ok(None)` when the file does not exist.
    pub fn read(&self, file_name: &str) -> std::io::Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(file_name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Writes a photo's bytes, creating the photo directory if needed.
    pub fn write(&self, file_name: &str, bytes: &[u8]) -> std::io::Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.path_for(file_name), bytes)
    }

    /// Removes a photo file. A file that is already gone counts as
    /// success, not an error.
    pub fn remove(&self, file_name: &str) -> std::io::Result<()> {
        match fs::remove_file(self.path_for(file_name)) {
            Ok(()) => {
                debug!(file = %file_name, "Removed photo file");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let images = ImageStore::new(dir.path().join("photos"));

        images.write("1.jpg", b"jpeg-bytes").unwrap();
        assert_eq!(images.read("1.jpg").unwrap(), Some(b"jpeg-bytes".to_vec()));
    }

    #[test]
    fn test_missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let images = ImageStore::new(dir.path());

        assert_eq!(images.read("ghost.jpg").unwrap(), None);
    }

    #[test]
    fn test_remove_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let images = ImageStore::new(dir.path());

        assert!(images.remove("ghost.jpg").is_ok());

        images.write("real.jpg", b"x").unwrap();
        assert!(images.remove("real.jpg").is_ok());
        assert_eq!(images.read("real.jpg").unwrap(), None);
    }

    #[test]
    fn test_file_name_from_path() {
        let name = ImageStore::file_name_from_path(Path::new("/data/photos/42.jpg"));
        assert_eq!(name.as_deref(), Some("42.jpg"));
    }
}
