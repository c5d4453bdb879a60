use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::SnapshotStore;
use crate::utils::error::StoreError;

/// One `<name>.json` file per query under a data directory.
///
/// Saves go to a sibling temp file that is synced and then renamed over the
/// target, so a crash mid-write leaves the previous snapshot in place.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn slot_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json.tmp", name))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    fn backend(&self) -> &str {
        "file"
    }

    async fn initialize(&self, names: &[String]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;

        for name in names {
            let path = self.slot_path(name);
            let created = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;

            match created {
                Ok(_) => tracing::debug!(query = %name, path = %path.display(), "Created empty snapshot slot"),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    async fn load_raw(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.slot_path(name)).await {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_raw(&self, name: &str, payload: &[u8]) -> Result<(), StoreError> {
        let temp = self.temp_path(name);

        let mut file = fs::File::create(&temp).await?;
        file.write_all(payload).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp, self.slot_path(name)).await?;
        Ok(())
    }
}
