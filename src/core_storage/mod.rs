//! The file-system collaborator consumed by command handlers. Paths are
//! virtual absolute paths (`/a/b`) produced by the session's directory
//! stack; how they map to real storage is the backend's business.

pub mod local;

use std::io;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::core_auth::UserAccount;
use crate::core_transfer::BackgroundTransfer;

pub use local::{LocalStorage, LocalStorageFactory};

#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

#[derive(Debug, Clone)]
pub enum ResolvedPath {
    File(EntryInfo),
    Directory(EntryInfo),
    Missing,
}

impl ResolvedPath {
    pub fn exists(&self) -> bool {
        !matches!(self, ResolvedPath::Missing)
    }
}

/// Where the bytes of an upload go. A backend may accept them into a live
/// stream, or hand back a staging sink plus a deferred transfer that pushes
/// the staged data out-of-band on the background worker.
pub enum StoreTarget {
    Stream(Box<dyn AsyncWrite + Send + Unpin>),
    Background {
        sink: Box<dyn AsyncWrite + Send + Unpin>,
        transfer: Box<dyn BackgroundTransfer>,
    },
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn resolve(&self, path: &str) -> io::Result<ResolvedPath>;

    async fn list(&self, path: &str) -> io::Result<Vec<EntryInfo>>;

    async fn create_dir(&self, path: &str) -> io::Result<()>;

    async fn open_read(&self, path: &str, offset: u64)
        -> io::Result<Box<dyn AsyncRead + Send + Unpin>>;

    /// Creates or replaces a file; `offset > 0` restarts an interrupted
    /// upload at that position instead of truncating.
    async fn create(&self, path: &str, offset: u64) -> io::Result<StoreTarget>;

    async fn append(&self, path: &str) -> io::Result<StoreTarget>;

    async fn rename(&self, from: &str, to: &str) -> io::Result<()>;

    async fn remove_file(&self, path: &str) -> io::Result<()>;

    async fn remove_dir(&self, path: &str) -> io::Result<()>;

    async fn set_modified(&self, path: &str, modified: SystemTime) -> io::Result<()>;

    fn supports_append(&self) -> bool {
        true
    }

    fn supports_non_empty_dir_removal(&self) -> bool {
        false
    }

    /// Whether names compare case-insensitively on this backend.
    fn compares_case_insensitively(&self) -> bool {
        false
    }

    /// Name equality under the backend's comparer.
    fn names_equal(&self, a: &str, b: &str) -> bool {
        if self.compares_case_insensitively() {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }
}

/// Builds the backend assigned to a session at login.
pub trait StorageFactory: Send + Sync {
    fn create(&self, account: &UserAccount) -> Arc<dyn StorageBackend>;
}
