//! Local-disk storage backend.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use filetime::FileTime;
use log::warn;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncSeekExt};

use crate::core_auth::UserAccount;
use crate::core_storage::{EntryInfo, ResolvedPath, StorageBackend, StorageFactory, StoreTarget};

pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Maps a virtual path onto the root directory. Parent and prefix
    /// components are rejected so a crafted argument can never climb out of
    /// the allowed area.
    fn disk_path(&self, path: &str) -> io::Result<PathBuf> {
        let mut disk = self.root.clone();
        for component in Path::new(path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(name) => disk.push(name),
                Component::CurDir => {}
                _ => {
                    warn!("path is outside of the allowed area: {}", path);
                    return Err(io::Error::new(
                        io::ErrorKind::PermissionDenied,
                        "path is outside of the allowed area",
                    ));
                }
            }
        }
        Ok(disk)
    }

    fn entry_info(name: String, metadata: &std::fs::Metadata) -> EntryInfo {
        EntryInfo {
            name,
            is_dir: metadata.is_dir(),
            size: metadata.len(),
            modified: metadata.modified().ok(),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn resolve(&self, path: &str) -> io::Result<ResolvedPath> {
        let disk = self.disk_path(path)?;
        let name = disk
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("/"));
        match tokio::fs::metadata(&disk).await {
            Ok(metadata) => {
                let info = Self::entry_info(name, &metadata);
                if metadata.is_dir() {
                    Ok(ResolvedPath::Directory(info))
                } else {
                    Ok(ResolvedPath::File(info))
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(ResolvedPath::Missing),
            Err(err) => Err(err),
        }
    }

    async fn list(&self, path: &str) -> io::Result<Vec<EntryInfo>> {
        let disk = self.disk_path(path)?;
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&disk).await?;
        while let Some(entry) = dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(Self::entry_info(name, &metadata));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn create_dir(&self, path: &str) -> io::Result<()> {
        let disk = self.disk_path(path)?;
        tokio::fs::create_dir(&disk).await
    }

    async fn open_read(
        &self,
        path: &str,
        offset: u64,
    ) -> io::Result<Box<dyn AsyncRead + Send + Unpin>> {
        let disk = self.disk_path(path)?;
        let mut file = File::open(&disk).await?;
        if offset > 0 {
            file.seek(io::SeekFrom::Start(offset)).await?;
        }
        Ok(Box::new(file))
    }

    async fn create(&self, path: &str, offset: u64) -> io::Result<StoreTarget> {
        let disk = self.disk_path(path)?;
        let file = if offset > 0 {
            let mut file = OpenOptions::new().write(true).create(true).open(&disk).await?;
            file.seek(io::SeekFrom::Start(offset)).await?;
            file
        } else {
            File::create(&disk).await?
        };
        Ok(StoreTarget::Stream(Box::new(file)))
    }

    async fn append(&self, path: &str) -> io::Result<StoreTarget> {
        let disk = self.disk_path(path)?;
        let file = OpenOptions::new().append(true).create(true).open(&disk).await?;
        Ok(StoreTarget::Stream(Box::new(file)))
    }

    async fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let from = self.disk_path(from)?;
        let to = self.disk_path(to)?;
        tokio::fs::rename(&from, &to).await
    }

    async fn remove_file(&self, path: &str) -> io::Result<()> {
        let disk = self.disk_path(path)?;
        tokio::fs::remove_file(&disk).await
    }

    async fn remove_dir(&self, path: &str) -> io::Result<()> {
        let disk = self.disk_path(path)?;
        tokio::fs::remove_dir(&disk).await
    }

    async fn set_modified(&self, path: &str, modified: SystemTime) -> io::Result<()> {
        let disk = self.disk_path(path)?;
        let mtime = FileTime::from_system_time(modified);
        tokio::task::spawn_blocking(move || filetime::set_file_mtime(&disk, mtime))
            .await
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?
    }
}

pub struct LocalStorageFactory;

impl StorageFactory for LocalStorageFactory {
    fn create(&self, account: &UserAccount) -> Arc<dyn StorageBackend> {
        Arc::new(LocalStorage::new(account.home.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(root: &Path) -> LocalStorage {
        LocalStorage::new(root.to_path_buf())
    }

    #[tokio::test]
    async fn resolve_distinguishes_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();
        tokio::fs::write(dir.path().join("f.txt"), b"abc").await.unwrap();
        let s = storage(dir.path());
        assert!(matches!(s.resolve("/sub").await.unwrap(), ResolvedPath::Directory(_)));
        match s.resolve("/f.txt").await.unwrap() {
            ResolvedPath::File(info) => assert_eq!(info.size, 3),
            other => panic!("expected file, got {:?}", other),
        }
        assert!(!s.resolve("/nope").await.unwrap().exists());
    }

    #[tokio::test]
    async fn traversal_components_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let s = storage(dir.path());
        let err = s.disk_path("/../etc/passwd").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn create_with_offset_keeps_prefix() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("part"), b"0123456789").await.unwrap();
        let s = storage(dir.path());
        match s.create("/part", 4).await.unwrap() {
            StoreTarget::Stream(mut sink) => {
                use tokio::io::AsyncWriteExt;
                sink.write_all(b"XY").await.unwrap();
                sink.shutdown().await.unwrap();
            }
            StoreTarget::Background { .. } => panic!("local backend never defers"),
        }
        let content = tokio::fs::read(dir.path().join("part")).await.unwrap();
        assert_eq!(content, b"0123XY6789");
    }

    #[tokio::test]
    async fn list_is_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("b"), b"").await.unwrap();
        tokio::fs::write(dir.path().join("a"), b"").await.unwrap();
        let s = storage(dir.path());
        let names: Vec<_> = s.list("/").await.unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
