use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::probe::probe::Probe;
use crate::store::store::{Backend, ProbeStore, StoreError};

type Probes = BTreeMap<String, Probe>;

/// Durable backend: a single JSON document mapping identifier to probe.
#[derive(Clone, Debug)]
pub struct ShelfBackend {
    path: PathBuf,
    commit_lock: Arc<Mutex<()>>,
}

impl ShelfBackend {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        ShelfBackend {
            path: path.into(),
            commit_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl Backend for ShelfBackend {
    async fn open(&self) -> Result<Box<dyn ProbeStore>, StoreError> {
        Ok(Box::new(Shelf::open(&self.path, self.commit_lock.clone()).await?))
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

#[derive(Debug)]
enum Change {
    Put(String, Probe),
    Delete(String),
}

/// A snapshot of the shelf taken when the request opened it, plus the writes
/// the request made. Writes reach the file only on `close`.
#[derive(Debug)]
pub struct Shelf {
    path: PathBuf,
    commit_lock: Arc<Mutex<()>>,
    probes: Probes,
    journal: Vec<Change>,
}

impl Shelf {
    async fn open(path: &Path, commit_lock: Arc<Mutex<()>>) -> Result<Shelf, StoreError> {
        let probes = read_probes(path).await?;
        debug!("Opened probe shelf {} with {} probes", path.display(), probes.len());
        Ok(Shelf {
            path: path.to_path_buf(),
            commit_lock,
            probes,
            journal: Vec::new(),
        })
    }
}

#[async_trait]
impl ProbeStore for Shelf {
    fn list(&self) -> Vec<Probe> {
        self.probes.values().cloned().collect()
    }

    fn get(&self, identifier: &str) -> Option<Probe> {
        self.probes.get(identifier).cloned()
    }

    fn exists(&self, identifier: &str) -> bool {
        self.probes.contains_key(identifier)
    }

    fn put(&mut self, identifier: &str, probe: Probe) {
        self.probes.insert(identifier.to_string(), probe.clone());
        self.journal.push(Change::Put(identifier.to_string(), probe));
    }

    fn delete(&mut self, identifier: &str) {
        self.probes.remove(identifier);
        self.journal.push(Change::Delete(identifier.to_string()));
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        let journal = std::mem::take(&mut self.journal);
        if journal.is_empty() {
            debug!("Closed probe shelf {} without changes", self.path.display());
            return Ok(());
        }

        // Re-read under the lock so writes from other requests survive.
        let _guard = self.commit_lock.lock().await;
        let mut probes = read_probes(&self.path).await?;
        let changes = journal.len();
        for change in journal {
            match change {
                Change::Put(identifier, probe) => {
                    probes.insert(identifier, probe);
                }
                Change::Delete(identifier) => {
                    probes.remove(&identifier);
                }
            }
        }
        write_probes(&self.path, &probes).await?;
        debug!("Committed {} changes to probe shelf {}", changes, self.path.display());
        Ok(())
    }
}

impl Drop for Shelf {
    fn drop(&mut self) {
        if !self.journal.is_empty() {
            warn!(
                "Discarding {} uncommitted changes to probe shelf {}",
                self.journal.len(),
                self.path.display()
            );
        }
    }
}

async fn read_probes(path: &Path) -> Result<Probes, StoreError> {
    match fs::read(path).await {
        Ok(bytes) if bytes.is_empty() => Ok(Probes::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Probes::new()),
        Err(err) => Err(err.into()),
    }
}

async fn write_probes(path: &Path, probes: &Probes) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut tmp_name = OsString::from(path.as_os_str());
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let data = serde_json::to_vec_pretty(probes)?;
    let mut file = File::create(&tmp_path).await?;
    file.write_all(&data).await?;
    file.sync_all().await?;
    fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(identifier: &str, endpoint: &str) -> Probe {
        Probe::new(
            identifier.to_string(),
            endpoint.to_string(),
            vec!["cpu".to_string()],
            vec!["v1".to_string()],
        )
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ShelfBackend::new(dir.path().join("data").join("probes.db"));

        let mut shelf = backend.open().await.unwrap();
        assert!(shelf.list().is_empty());
        assert!(!shelf.exists("p1"));
        shelf.close().await.unwrap();
        assert!(!dir.path().join("data").exists());
    }

    #[tokio::test]
    async fn close_persists_writes_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("probes.db");
        let backend = ShelfBackend::new(&path);

        let mut shelf = backend.open().await.unwrap();
        shelf.put("p1", probe("p1", "10.0.0.1:9100"));
        shelf.put("p2", probe("p2", "10.0.0.2:9100"));
        assert!(shelf.exists("p1"));
        shelf.close().await.unwrap();
        assert!(path.exists());

        let mut shelf = ShelfBackend::new(&path).open().await.unwrap();
        assert_eq!(Some(probe("p1", "10.0.0.1:9100")), shelf.get("p1"));
        assert_eq!(2, shelf.list().len());
        shelf.delete("p1");
        shelf.close().await.unwrap();

        let shelf = backend.open().await.unwrap();
        assert_eq!(None, shelf.get("p1"));
        assert_eq!(vec![probe("p2", "10.0.0.2:9100")], shelf.list());
    }

    #[tokio::test]
    async fn dropped_handle_discards_writes() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ShelfBackend::new(dir.path().join("probes.db"));

        let mut shelf = backend.open().await.unwrap();
        shelf.put("p1", probe("p1", "10.0.0.1:9100"));
        drop(shelf);

        assert!(backend.open().await.unwrap().list().is_empty());
    }

    #[tokio::test]
    async fn concurrent_handles_keep_each_others_records() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ShelfBackend::new(dir.path().join("probes.db"));

        let mut first = backend.open().await.unwrap();
        let mut second = backend.open().await.unwrap();
        first.put("p1", probe("p1", "10.0.0.1:9100"));
        second.put("p2", probe("p2", "10.0.0.2:9100"));
        let (first, second) = tokio::join!(first.close(), second.close());
        first.unwrap();
        second.unwrap();

        let shelf = backend.open().await.unwrap();
        assert!(shelf.exists("p1"));
        assert!(shelf.exists("p2"));
    }

    #[tokio::test]
    async fn corrupt_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probes.db");
        std::fs::write(&path, b"not json").unwrap();

        let result = ShelfBackend::new(&path).open().await;
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }

    #[tokio::test]
    async fn failed_commit_keeps_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probes.db");
        std::fs::create_dir(dir.path().join("probes.db.tmp")).unwrap();
        let backend = ShelfBackend::new(&path);

        let mut shelf = backend.open().await.unwrap();
        shelf.put("p1", probe("p1", "10.0.0.1:9100"));
        assert!(matches!(shelf.close().await, Err(StoreError::Io(_))));
        drop(shelf);

        assert!(!path.exists());
        assert!(backend.open().await.unwrap().list().is_empty());
    }
}
