//! Scoped ownership of the files multipart decoding writes to disk.
//!
//! Every path is registered before the first byte is written to it. The
//! tracker is created at the top of connection handling and released at the
//! bottom; `Drop` covers the early returns and panics in between.

use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct TempFiles {
    paths: Vec<PathBuf>,
}

impl TempFiles {
    pub fn new() -> TempFiles {
        TempFiles { paths: Vec::new() }
    }

    pub fn track(&mut self, path: &Path) {
        if !self.paths.iter().any(|p| p == path) {
            self.paths.push(path.to_path_buf());
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Removes every tracked file. Files that are already gone are fine.
    pub async fn release(&mut self) {
        for path in self.paths.drain(..) {
            if let Err(e) = remove_quietly(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "could not remove upload");
            }
        }
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => {
                    tracing::warn!(path = %path.display(), error = %e, "could not remove upload");
                }
                _ => {}
            }
        }
    }
}

/// Deletes `path`, treating a missing file as success.
pub async fn remove_quietly(path: &Path) -> Result<(), io::Error> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn removing_twice_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        std::fs::write(&path, b"data").unwrap();

        remove_quietly(&path).await.unwrap();
        remove_quietly(&path).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn release_removes_tracked_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, b"a").unwrap();

        let mut files = TempFiles::new();
        files.track(&a);
        files.track(&a);
        // Never created; must not stop `a` from going away.
        files.track(&b);
        assert_eq!(files.len(), 2);

        files.release().await;
        assert!(files.is_empty());
        assert!(!a.exists());
    }

    #[test]
    fn drop_removes_tracked_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("left-behind.txt");
        std::fs::write(&path, b"x").unwrap();
        {
            let mut files = TempFiles::new();
            files.track(&path);
        }
        assert!(!path.exists());
    }
}
