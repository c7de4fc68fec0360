// src/storage/local.rs

//! Local filesystem storage

use super::{FileSender, SendHeaders, Storage};
use crate::error::{Error, Result};
use crate::hash::{ChecksumAlgorithm, hash_file};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Chunk size for streaming artifacts to clients (1 MiB)
pub const SEND_CHUNK_SIZE: usize = 1024 * 1024;

/// Artifact storage rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for a relative storage path
    ///
    /// Absolute paths and `..` components are refused.
    pub fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        safe.then(|| self.root.join(relative))
    }

    /// Put the source bytes under a temporary name inside `dir`
    fn stage(source: &Path, dir: &Path) -> io::Result<NamedTempFile> {
        let mut staged = tempfile::Builder::new()
            .prefix(".incoming-")
            .tempfile_in(dir)?;

        if fs::rename(source, staged.path()).is_err() {
            // Different filesystem; fall back to copying
            let mut input = File::open(source)?;
            io::copy(&mut input, staged.as_file_mut())?;
            staged.as_file_mut().sync_all()?;
            let _ = fs::remove_file(source);
        }

        Ok(staged)
    }
}

impl Storage for LocalStorage {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_some_and(|full| full.is_file())
    }

    fn list_files(&self, dir: &str) -> Result<Vec<String>> {
        let Some(full) = self.resolve(dir) else {
            return Ok(Vec::new());
        };
        if !full.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&full)? {
            let entry = entry?;
            let path = entry.path();
            let is_zip = path.extension().is_some_and(|ext| ext == "zip");
            if is_zip && path.is_file() {
                files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        files.sort();
        Ok(files)
    }

    fn move_file(&self, source: &Path, dest: &str) -> bool {
        let Some(target) = self.resolve(dest) else {
            warn!("Refusing to move into unsafe storage path {}", dest);
            return false;
        };
        let Some(dir) = target.parent() else {
            return false;
        };

        if let Err(e) = fs::create_dir_all(dir) {
            warn!("Failed to create storage directory {}: {}", dir.display(), e);
            return false;
        }

        if target.exists() {
            debug!("{} already stored, discarding {}", dest, source.display());
            let _ = fs::remove_file(source);
            return true;
        }

        let staged = match Self::stage(source, dir) {
            Ok(staged) => staged,
            Err(e) => {
                warn!("Failed to stage {} for {}: {}", source.display(), dest, e);
                return false;
            }
        };

        match staged.persist_noclobber(&target) {
            Ok(_) => {
                debug!("Stored artifact at {}", target.display());
                true
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!("{} stored concurrently, keeping existing file", dest);
                true
            }
            Err(e) => {
                warn!("Failed to move artifact to {}: {}", target.display(), e.error);
                false
            }
        }
    }

    fn checksum(&self, algorithm: ChecksumAlgorithm, path: &str) -> Result<Option<String>> {
        match self.resolve(path) {
            Some(full) if full.is_file() => Ok(Some(hash_file(algorithm, &full)?)),
            _ => Ok(None),
        }
    }

    fn delete(&self, path: &str) -> bool {
        self.resolve(path)
            .is_some_and(|full| fs::remove_file(full).is_ok())
    }

    fn send(&self, path: &str, sender: &mut dyn FileSender) -> Result<()> {
        let full = self
            .resolve(path)
            .filter(|full| full.is_file())
            .ok_or_else(|| Error::FileNotFound {
                path: path.to_string(),
            })?;

        let file = File::open(&full)?;
        let content_length = file.metadata()?.len();
        let file_name = full
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        sender.send_file(
            file,
            SendHeaders {
                file_name,
                content_type: "application/zip",
                content_length,
            },
        )
    }
}

/// Copy a reader to a writer in 1 MiB chunks
///
/// Stops at the first write error, which is how a disconnected client shows
/// up, so the rest of the file is never read.
pub fn copy_chunked<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> io::Result<u64> {
    let mut buffer = vec![0u8; SEND_CHUNK_SIZE];
    let mut total: u64 = 0;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..n])?;
        writer.flush()?;
        total += n as u64;
    }

    Ok(total)
}

/// Sender that streams artifacts into any writer
pub struct WriterSender<W: Write> {
    writer: W,
    headers: Option<SendHeaders>,
}

impl<W: Write> WriterSender<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            headers: None,
        }
    }

    /// Headers of the last sent file
    pub fn headers(&self) -> Option<&SendHeaders> {
        self.headers.as_ref()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> FileSender for WriterSender<W> {
    fn send_file(&mut self, mut file: File, headers: SendHeaders) -> Result<()> {
        let sent = copy_chunked(&mut file, &mut self.writer)?;
        debug!("Sent {} ({} bytes)", headers.file_name, sent);
        self.headers = Some(headers);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scratch_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_move_creates_directories() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp.path().join("packages"));
        let source = scratch_file(temp.path(), "build.zip", b"artifact");

        assert!(storage.move_file(&source, "plugin/acme/acme-1.0.0.zip"));
        assert!(storage.exists("plugin/acme/acme-1.0.0.zip"));
        assert!(!source.exists());
        assert_eq!(
            fs::read(temp.path().join("packages/plugin/acme/acme-1.0.0.zip")).unwrap(),
            b"artifact"
        );
    }

    #[test]
    fn test_move_onto_existing_keeps_original() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp.path().join("packages"));
        let first = scratch_file(temp.path(), "first.zip", b"first");
        let second = scratch_file(temp.path(), "second.zip", b"second");

        assert!(storage.move_file(&first, "plugin/acme/acme-1.0.0.zip"));
        assert!(storage.move_file(&second, "plugin/acme/acme-1.0.0.zip"));
        assert_eq!(
            fs::read(temp.path().join("packages/plugin/acme/acme-1.0.0.zip")).unwrap(),
            b"first"
        );
        assert!(!second.exists());
    }

    #[test]
    fn test_move_missing_source_fails() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp.path());
        assert!(!storage.move_file(&temp.path().join("missing.zip"), "plugin/a/a-1.zip"));
        assert!(!storage.exists("plugin/a/a-1.zip"));
    }

    #[test]
    fn test_list_files_only_zips() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("plugin/acme");
        fs::create_dir_all(&dir).unwrap();
        scratch_file(&dir, "acme-1.0.0.zip", b"a");
        scratch_file(&dir, "acme-0.9.0.zip", b"b");
        scratch_file(&dir, "notes.txt", b"c");
        fs::create_dir(dir.join("nested.zip")).unwrap();

        let storage = LocalStorage::new(temp.path());
        assert_eq!(
            storage.list_files("plugin/acme").unwrap(),
            ["acme-0.9.0.zip", "acme-1.0.0.zip"]
        );
        assert!(storage.list_files("plugin/missing").unwrap().is_empty());
    }

    #[test]
    fn test_checksum_and_delete() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("theme/twentyten");
        fs::create_dir_all(&dir).unwrap();
        scratch_file(&dir, "twentyten-3.0.zip", b"Hello, World!");

        let storage = LocalStorage::new(temp.path());
        assert_eq!(
            storage
                .checksum(ChecksumAlgorithm::Sha1, "theme/twentyten/twentyten-3.0.zip")
                .unwrap()
                .as_deref(),
            Some("0a0a9f2a6772942557ab5355d76af442f8f65e01")
        );
        assert!(storage.delete("theme/twentyten/twentyten-3.0.zip"));
        assert!(!storage.delete("theme/twentyten/twentyten-3.0.zip"));
        assert_eq!(
            storage
                .checksum(ChecksumAlgorithm::Sha1, "theme/twentyten/twentyten-3.0.zip")
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp.path().join("packages"));
        scratch_file(temp.path(), "secret.zip", b"secret");

        assert!(storage.resolve("../secret.zip").is_none());
        assert!(storage.resolve("/etc/passwd").is_none());
        assert!(!storage.exists("../secret.zip"));
    }

    #[test]
    fn test_send_streams_with_headers() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("plugin/acme");
        fs::create_dir_all(&dir).unwrap();
        let content = vec![42u8; SEND_CHUNK_SIZE + 17];
        fs::write(dir.join("acme-1.0.0.zip"), &content).unwrap();

        let storage = LocalStorage::new(temp.path());
        let mut sender = WriterSender::new(Vec::new());
        storage.send("plugin/acme/acme-1.0.0.zip", &mut sender).unwrap();

        let headers = sender.headers().cloned().unwrap();
        assert_eq!(headers.file_name, "acme-1.0.0.zip");
        assert_eq!(headers.content_type, "application/zip");
        assert_eq!(headers.content_length, content.len() as u64);
        assert_eq!(sender.into_inner(), content);
    }

    #[test]
    fn test_send_missing_file() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp.path());
        let mut sender = WriterSender::new(Vec::new());
        let err = storage.send("plugin/acme/acme-1.0.0.zip", &mut sender).unwrap_err();
        assert!(err.is_not_found());
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_copy_chunked_stops_on_write_error() {
        let data = vec![1u8; 3 * SEND_CHUNK_SIZE];
        let err = copy_chunked(&mut data.as_slice(), &mut BrokenPipe).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
