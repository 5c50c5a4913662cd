use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("asset {0} already exists")]
    Conflict(String),
    #[error("invalid asset name {0:?}")]
    InvalidName(String),
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
}

/// Where ingested assets live. Names are flat (no directories) and the
/// public path is what a user record stores.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Stores `body` under `name`. Never replaces an existing asset.
    async fn put_object(&self, name: &str, body: Bytes) -> Result<(), StorageError>;
    /// Returns `false` when there was nothing to delete.
    async fn delete_object(&self, name: &str) -> Result<bool, StorageError>;
    fn public_path(&self, name: &str) -> String;
    fn name_from_public_path(&self, path: &str) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct LocalDiskStorage {
    root: PathBuf,
    public_prefix: String,
}

impl LocalDiskStorage {
    pub async fn new(root: impl Into<PathBuf>, public_prefix: &str) -> anyhow::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create upload dir {}", root.display()))?;
        info!(path = %root.display(), "asset store ready");
        Ok(Self {
            root,
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        if !is_flat_name(name) {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

fn is_flat_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && Path::new(name).components().count() == 1
}

#[async_trait]
impl AssetStore for LocalDiskStorage {
    async fn put_object(&self, name: &str, body: Bytes) -> Result<(), StorageError> {
        let target = self.resolve(name)?;
        let tmp = self
            .root
            .join(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()));

        if let Err(e) = fs::write(&tmp, &body).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        // hard_link refuses an existing target, rename would replace it
        let linked = fs::hard_link(&tmp, &target).await;
        if let Err(e) = fs::remove_file(&tmp).await {
            warn!(error = %e, tmp = %tmp.display(), "failed to remove temp upload");
        }

        match linked {
            Ok(()) => {
                debug!(asset = name, size = body.len(), "asset stored");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(asset = name, "asset name already taken");
                Err(StorageError::Conflict(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_object(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.resolve(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(asset = name, "asset deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn public_path(&self, name: &str) -> String {
        format!("{}/{}", self.public_prefix, name)
    }

    fn name_from_public_path(&self, path: &str) -> Option<String> {
        let name = path
            .strip_prefix(self.public_prefix.as_str())?
            .strip_prefix('/')?;
        is_flat_name(name).then(|| name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (tempfile::TempDir, LocalDiskStorage) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDiskStorage::new(dir.path().join("uploads"), "/uploads/")
            .await
            .unwrap();
        (dir, store)
    }

    fn entries(root: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(root)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn put_writes_file_and_leaves_no_temp() {
        let (_dir, store) = store().await;
        store
            .put_object("1-a.png", Bytes::from_static(b"abc"))
            .await
            .unwrap();

        assert_eq!(entries(store.root()), vec!["1-a.png".to_string()]);
        assert_eq!(std::fs::read(store.root().join("1-a.png")).unwrap(), b"abc");
    }

    #[tokio::test]
    async fn put_never_overwrites() {
        let (_dir, store) = store().await;
        store
            .put_object("1-a.png", Bytes::from_static(b"first"))
            .await
            .unwrap();
        let err = store
            .put_object("1-a.png", Bytes::from_static(b"second"))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Conflict(ref n) if n == "1-a.png"));
        assert_eq!(std::fs::read(store.root().join("1-a.png")).unwrap(), b"first");
        assert_eq!(entries(store.root()).len(), 1);
    }

    #[tokio::test]
    async fn rejects_names_that_escape_root() {
        let (_dir, store) = store().await;
        for bad in ["", "../x.png", "a/b.png", ".hidden", "..", "a\\b.png"] {
            let err = store
                .put_object(bad, Bytes::from_static(b"x"))
                .await
                .unwrap_err();
            assert!(matches!(err, StorageError::InvalidName(_)), "{bad}");
        }
    }

    #[tokio::test]
    async fn delete_reports_missing() {
        let (_dir, store) = store().await;
        store
            .put_object("2-b.jpg", Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert!(store.delete_object("2-b.jpg").await.unwrap());
        assert!(!store.delete_object("2-b.jpg").await.unwrap());
        assert!(entries(store.root()).is_empty());
    }

    #[tokio::test]
    async fn public_path_roundtrip() {
        let (_dir, store) = store().await;
        let public = store.public_path("3-c.jpg");
        assert_eq!(public, "/uploads/3-c.jpg");
        assert_eq!(
            store.name_from_public_path(&public).as_deref(),
            Some("3-c.jpg")
        );
        assert_eq!(store.name_from_public_path("/elsewhere/3-c.jpg"), None);
        assert_eq!(store.name_from_public_path("/uploads/../etc/passwd"), None);
        assert_eq!(store.name_from_public_path("/uploadsx/3-c.jpg"), None);
    }
}
