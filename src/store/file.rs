use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};

use super::document::{Collection, DocumentBackend, DocumentWrite};
use super::StoreError;

/// One pretty-printed JSON file per collection inside `dir`.
///
/// Read-modify-write cycles in this process run one at a time under
/// `writer_lock`, and commits still re-check the files under their own lock.
/// Separate processes sharing the directory are not coordinated.
pub struct FileBackend {
    dir: PathBuf,
    writer_lock: Mutex<()>,
    commit_lock: Mutex<()>,
}

impl FileBackend {
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            writer_lock: Mutex::new(()),
            commit_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, collection: Collection) -> PathBuf {
        self.dir.join(format!("{}.json", collection.key()))
    }

    async fn read_file(path: &Path) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(path).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl DocumentBackend for FileBackend {
    async fn load(&self, collection: Collection) -> Result<Option<String>, StoreError> {
        Self::read_file(&self.path_for(collection)).await
    }

    async fn commit(&self, writes: &[DocumentWrite]) -> Result<bool, StoreError> {
        let _guard = self.commit_lock.lock().await;

        for write in writes {
            let current = Self::read_file(&self.path_for(write.collection)).await?;
            if current != write.expected {
                return Ok(false);
            }
        }

        // Stage every file first so a failure leaves the originals untouched,
        // then swap them in.
        let mut staged = Vec::with_capacity(writes.len());
        for write in writes {
            let target = self.path_for(write.collection);
            let tmp = target.with_extension("json.tmp");
            tokio::fs::write(&tmp, &write.body).await?;
            staged.push((tmp, target));
        }
        for (tmp, target) in staged {
            tokio::fs::rename(&tmp, &target).await?;
        }

        Ok(true)
    }

    async fn writer_lock<'a>(&'a self) -> Option<MutexGuard<'a, ()>> {
        Some(self.writer_lock.lock().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(collection: Collection, expected: Option<&str>, body: &str) -> DocumentWrite {
        DocumentWrite {
            collection,
            expected: expected.map(str::to_string),
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(tmp.path()).unwrap();
        assert_eq!(backend.load(Collection::Records).await.unwrap(), None);
    }

    #[tokio::test]
    async fn commit_writes_named_files() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(tmp.path().join("data")).unwrap();

        let ok = backend
            .commit(&[
                write(Collection::Records, None, "[]"),
                write(Collection::Comments, None, "[1]"),
            ])
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("data/records.json")).unwrap(),
            "[]"
        );
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("data/comments.json")).unwrap(),
            "[1]"
        );
        assert!(!tmp.path().join("data/records.json.tmp").exists());
    }

    #[tokio::test]
    async fn stale_expectation_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(tmp.path()).unwrap();
        backend
            .commit(&[write(Collection::Records, None, "[1]")])
            .await
            .unwrap();

        let ok = backend
            .commit(&[
                write(Collection::Comments, None, "[9]"),
                write(Collection::Records, Some("[]"), "[2]"),
            ])
            .await
            .unwrap();
        assert!(!ok);
        assert_eq!(
            backend.load(Collection::Records).await.unwrap().as_deref(),
            Some("[1]")
        );
        assert_eq!(backend.load(Collection::Comments).await.unwrap(), None);
    }
}
