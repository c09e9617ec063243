use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::info;

use crate::errors::{Error, Result};

/// Blob storage for uploaded files, addressed by generated file names.
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn store(&self, name: &str, bytes: Vec<u8>) -> Result<()>;
    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>>;
    async fn delete(&self, name: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        info!("Storing uploads under {}", root.display());
        Self { root }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        // ! names are generated server side; anything path-like is refused
        let plain = Path::new(name)
            .file_name()
            .is_some_and(|file| file == name);
        if !plain || name.starts_with('.') {
            return Err(Error::BadRequest(format!("Invalid file name {name}")));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn store(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.root).await?;
        fs::write(path, bytes).await?;
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(name)?).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.path_for(name)?).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryFileStorage {
    files: tokio::sync::RwLock<std::collections::HashMap<String, Vec<u8>>>,
}

#[cfg(test)]
impl MemoryFileStorage {
    pub async fn contains(&self, name: &str) -> bool {
        self.files.read().await.contains_key(name)
    }
}

#[cfg(test)]
#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn store(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        self.files.write().await.insert(name.to_string(), bytes);
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.files.read().await.get(name).cloned())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.files.write().await.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_storage_round_trip() {
        let root = std::env::temp_dir().join(format!("uploads-{}", uuid::Uuid::new_v4()));
        let storage = LocalFileStorage::new(&root);

        storage.store("a.png", vec![1, 2, 3]).await.unwrap();
        assert_eq!(storage.load("a.png").await.unwrap(), Some(vec![1, 2, 3]));

        storage.delete("a.png").await.unwrap();
        storage.delete("a.png").await.unwrap();
        assert_eq!(storage.load("a.png").await.unwrap(), None);

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn refuses_path_like_names() {
        let storage = LocalFileStorage::new(std::env::temp_dir());
        assert!(storage.load("../etc/passwd").await.is_err());
        assert!(storage.store("nested/a.png", vec![]).await.is_err());
        assert!(storage.delete(".hidden").await.is_err());
    }
}
