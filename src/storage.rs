//! The `submissions` bucket: deterministic blob paths, the download content-type table, and a
//! directory-backed store.

#[cfg(feature = "ssr")]
use std::fs::{self, OpenOptions};
#[cfg(feature = "ssr")]
use std::io::{ErrorKind, Write};
#[cfg(feature = "ssr")]
use std::path::PathBuf;

#[cfg(feature = "ssr")]
use crate::error::BlobError;

/// Builds the bucket key for a team's artifact, `{team}/{team}_{field}.{ext}`.
pub fn blob_path(team_name: &str, field: &str, extension: &str) -> String {
    let team = team_name.trim();
    format!("{team}/{team}_{field}.{extension}")
}

/// Lower-cased extension after the last dot, if there is one.
pub fn file_extension(name: &str) -> Option<String> {
    let (stem, extension) = name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

/// Last segment of a blob path, used as the saved file name.
pub fn file_name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub fn content_type_for(path: &str) -> &'static str {
    match file_extension(file_name_of(path)).as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("ppt") => "application/vnd.ms-powerpoint",
        Some("pptx") => {
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        }
        _ => "application/octet-stream",
    }
}

/// Rejects keys that could escape the bucket root.
pub fn is_valid_blob_path(path: &str) -> bool {
    !path.is_empty()
        && !path.contains('\\')
        && !path.contains('\0')
        && path
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

/// Blob storage as the portal uses it. Calls are blocking; async callers go through
/// `spawn_blocking` the same way database calls do.
#[cfg(feature = "ssr")]
pub trait BlobStore: Send + Sync {
    /// Writes a new blob. Never overwrites an existing key.
    fn upload(&self, path: &str, bytes: &[u8]) -> Result<(), BlobError>;

    fn download(&self, path: &str) -> Result<Vec<u8>, BlobError>;

    /// Removes a blob. Removing a key that is already gone succeeds.
    fn remove(&self, path: &str) -> Result<(), BlobError>;
}

#[cfg(feature = "ssr")]
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

#[cfg(feature = "ssr")]
impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsBlobStore { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, BlobError> {
        if !is_valid_blob_path(path) {
            return Err(BlobError::InvalidPath(path.to_string()));
        }
        Ok(path
            .split('/')
            .fold(self.root.clone(), |full, segment| full.join(segment)))
    }

    /// Deletes every blob in the bucket and recreates the empty root.
    pub fn purge(&self) -> Result<(), BlobError> {
        let io_error = |source: std::io::Error| BlobError::Io {
            path: self.root.display().to_string(),
            source,
        };
        match fs::remove_dir_all(&self.root) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(e)),
        }
        fs::create_dir_all(&self.root).map_err(io_error)
    }
}

#[cfg(feature = "ssr")]
impl BlobStore for FsBlobStore {
    fn upload(&self, path: &str, bytes: &[u8]) -> Result<(), BlobError> {
        let target = self.resolve(path)?;
        let io_error = |source: std::io::Error| BlobError::Io {
            path: path.to_string(),
            source,
        };

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(BlobError::AlreadyExists(path.to_string()))
            }
            Err(e) => return Err(io_error(e)),
        };
        file.write_all(bytes).map_err(io_error)?;
        file.sync_all().map_err(io_error)
    }

    fn download(&self, path: &str) -> Result<Vec<u8>, BlobError> {
        let target = self.resolve(path)?;
        fs::read(&target).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BlobError::NotFound(path.to_string()),
            _ => BlobError::Io {
                path: path.to_string(),
                source: e,
            },
        })
    }

    fn remove(&self, path: &str) -> Result<(), BlobError> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(BlobError::Io {
                    path: path.to_string(),
                    source: e,
                })
            }
        }

        // Drop the team directory once its last blob is gone. Fails harmlessly when not empty.
        if let Some(parent) = target.parent() {
            if parent != self.root.as_path() {
                let _ = fs::remove_dir(parent);
            }
        }
        Ok(())
    }
}


#[cfg(all(test, feature = "ssr"))]
mod fs_tests {
    use super::*;

    #[test]
    fn test_upload_download_remove() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path());

        store
            .upload("Alpha/Alpha_technical.pdf", b"%PDF-1.7")
            .expect("upload");
        assert_eq!(
            store.download("Alpha/Alpha_technical.pdf").expect("download"),
            b"%PDF-1.7".to_vec()
        );

        store.remove("Alpha/Alpha_technical.pdf").expect("remove");
        assert!(matches!(
            store.download("Alpha/Alpha_technical.pdf"),
            Err(BlobError::NotFound(_))
        ));
        // The emptied team directory is cleaned up with its last blob.
        assert!(!dir.path().join("Alpha").exists());
    }

    #[test]
    fn test_upload_never_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path());

        store.upload("Alpha/Alpha_bmc.pdf", b"first").expect("upload");
        let err = store
            .upload("Alpha/Alpha_bmc.pdf", b"second")
            .expect_err("second upload should be refused");
        assert!(matches!(err, BlobError::AlreadyExists(_)));
        assert_eq!(
            store.download("Alpha/Alpha_bmc.pdf").expect("download"),
            b"first".to_vec()
        );
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path());
        assert!(store.remove("Ghost/Ghost_bmc.pdf").is_ok());
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path().join("bucket"));
        let err = store
            .upload("../outside.pdf", b"nope")
            .expect_err("should reject traversal");
        assert!(matches!(err, BlobError::InvalidPath(_)));
        assert!(!dir.path().join("outside.pdf").exists());
    }

    #[test]
    fn test_purge() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path().join("bucket"));
        store.upload("A/A_bmc.pdf", b"x").expect("upload");
        store.upload("B/B_bmc.pdf", b"y").expect("upload");

        store.purge().expect("purge");
        assert!(store.root().exists());
        assert!(matches!(
            store.download("A/A_bmc.pdf"),
            Err(BlobError::NotFound(_))
        ));
    }
}
