// src/storage/mod.rs

//! Artifact storage
//!
//! Storage is the durable record of which releases have been archived. Paths
//! are always relative to the storage root and follow
//! `{type}/{slug}/{slug}-{version}.zip`.

mod local;

pub use local::{LocalStorage, WriterSender, copy_chunked, SEND_CHUNK_SIZE};

use crate::error::Result;
use crate::hash::ChecksumAlgorithm;
use std::fs::File;
use std::path::Path;

/// Response metadata accompanying a sent artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendHeaders {
    pub file_name: String,
    pub content_type: &'static str,
    pub content_length: u64,
}

/// Receives artifact bytes on behalf of a client
pub trait FileSender {
    fn send_file(&mut self, file: File, headers: SendHeaders) -> Result<()>;
}

/// Backend holding artifact files
pub trait Storage: Send + Sync {
    fn exists(&self, path: &str) -> bool;

    /// Names of `.zip` files in a directory; empty when the directory is absent
    fn list_files(&self, dir: &str) -> Result<Vec<String>>;

    /// Move a scratch file into storage
    ///
    /// Returns `false` on failure. A destination that already exists counts
    /// as success and the source is discarded.
    fn move_file(&self, source: &Path, dest: &str) -> bool;

    /// Hex digest of a stored file, `None` when it does not exist
    fn checksum(&self, algorithm: ChecksumAlgorithm, path: &str) -> Result<Option<String>>;

    fn delete(&self, path: &str) -> bool;

    /// Hand a stored file to a sender
    fn send(&self, path: &str, sender: &mut dyn FileSender) -> Result<()>;
}
