//! Transient files that hold certificate payloads for the helper process.
//!
//! A [`TransientFile`] moves through `Unopened → Open → Closed`. It deletes
//! its file when dropped unless [`TransientFile::preserve`] was called.

use cn_common::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::logging::event_names;

/// Fixed prefix for generated transient file names.
pub const TEMP_FILE_PREFIX: &str = "CRT";

#[derive(Debug, Default)]
pub struct TransientFile {
    path: Option<PathBuf>,
    file: Option<File>,
    preserve: bool,
}

impl TransientFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a uniquely named, empty file in `dir`.
    ///
    /// The returned path already exists so concurrent callers cannot collide
    /// on it; ownership of deleting it passes to whoever opens it next.
    pub fn unique_path(dir: &Path) -> Result<PathBuf> {
        let reserved = tempfile::Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .suffix(".tmp")
            .tempfile_in(dir)?;
        reserved.into_temp_path().keep().map_err(|e| Error::Io(e.error))
    }

    /// Create (or truncate) the file at `path` for exclusive writing.
    pub fn create(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        if self.path.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        let path = path.into();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        self.file = Some(file);
        self.path = Some(path);
        Ok(())
    }

    /// Write `count` bytes of `buf` starting at `offset`.
    ///
    /// May write fewer bytes than requested; callers loop until done.
    pub fn write(&mut self, buf: &[u8], offset: usize, count: usize) -> Result<usize> {
        let file = self.file.as_mut().ok_or(Error::NotOpen)?;
        let end = offset
            .checked_add(count)
            .filter(|&end| end <= buf.len())
            .ok_or(Error::InvalidRange {
                offset,
                count,
                len: buf.len(),
            })?;
        Ok(file.write(&buf[offset..end])?)
    }

    /// Write the whole of `buf`, looping over partial writes.
    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let mut total = 0;
        while total < buf.len() {
            let written = self.write(buf, total, buf.len() - total)?;
            if written == 0 {
                return Err(Error::Io(std::io::ErrorKind::WriteZero.into()));
            }
            total += written;
        }
        Ok(())
    }

    /// Release the write handle. The file stays on disk.
    pub fn close(&mut self) {
        self.file = None;
    }

    /// Keep the file on disk after this value is dropped.
    pub fn preserve(&mut self) {
        self.preserve = true;
    }

    pub fn is_preserved(&self) -> bool {
        self.preserve
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Drop for TransientFile {
    fn drop(&mut self) {
        self.file = None;
        let Some(path) = &self.path else {
            return;
        };
        if self.preserve {
            debug!(
                event = event_names::TEMP_FILE_PRESERVED,
                path = %path.display(),
                "keeping transient file"
            );
            return;
        }
        if let Err(e) = std::fs::remove_file(path) {
            warn!(
                event = event_names::TEMP_FILE_DELETE_FAILED,
                path = %path.display(),
                error = %e,
                "failed to delete transient file"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn create_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = TransientFile::new();
        file.create(dir.path().join("a")).unwrap();
        assert!(matches!(
            file.create(dir.path().join("b")),
            Err(Error::AlreadyInitialized)
        ));
    }

    #[test]
    fn write_before_create_is_not_open() {
        let mut file = TransientFile::new();
        assert!(matches!(file.write(b"abc", 0, 3), Err(Error::NotOpen)));
    }

    #[test]
    fn write_after_close_is_not_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = TransientFile::new();
        file.create(dir.path().join("a")).unwrap();
        file.close();
        file.close();
        assert!(matches!(file.write(b"abc", 0, 3), Err(Error::NotOpen)));
    }

    #[test]
    fn out_of_range_write_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = TransientFile::new();
        file.create(dir.path().join("a")).unwrap();
        assert!(matches!(
            file.write(b"abc", 2, 5),
            Err(Error::InvalidRange { len: 3, .. })
        ));
    }

    #[test]
    fn dropped_file_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cert.bin");
        {
            let mut file = TransientFile::new();
            file.create(&path).unwrap();
            file.write_all(b"payload").unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn preserved_file_survives_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cert.bin");
        {
            let mut file = TransientFile::new();
            file.create(&path).unwrap();
            file.write_all(b"payload").unwrap();
            file.close();
            file.preserve();
            file.preserve();
        }
        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
    }

    #[test]
    fn drop_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.bin");
        let mut file = TransientFile::new();
        file.create(&path).unwrap();
        file.close();
        std::fs::remove_file(&path).unwrap();
        drop(file);
    }

    #[test]
    fn unique_path_reserves_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = TransientFile::unique_path(dir.path()).unwrap();
        let b = TransientFile::unique_path(dir.path()).unwrap();
        assert_ne!(a, b);
        assert!(a.exists());
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(TEMP_FILE_PREFIX));
    }

    proptest! {
        #[test]
        fn chunked_writes_round_trip(
            bytes in proptest::collection::vec(any::<u8>(), 0..2048),
            chunk in 1usize..97,
        ) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("chunked.bin");
            let mut file = TransientFile::new();
            file.create(&path).unwrap();

            let mut offset = 0;
            while offset < bytes.len() {
                let count = chunk.min(bytes.len() - offset);
                offset += file.write(&bytes, offset, count).unwrap();
            }
            file.close();
            file.preserve();

            prop_assert_eq!(std::fs::read(&path).unwrap(), bytes);
        }
    }
}
