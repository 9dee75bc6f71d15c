use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use log::debug;

use crate::probe::probe::Probe;
use crate::store::store::{Backend, ProbeStore, StoreError};

/// In-process backend. Writes are visible to other requests immediately and
/// are lost when the process exits.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    pub(crate) probes: Arc<DashMap<String, Probe>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            probes: Arc::new(DashMap::new()),
        }
    }
}

#[async_trait]
impl ProbeStore for MemoryStore {
    fn list(&self) -> Vec<Probe> {
        self.probes.iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn get(&self, identifier: &str) -> Option<Probe> {
        self.probes.get(identifier)
            .map(|probe| probe.to_owned())
    }

    fn exists(&self, identifier: &str) -> bool {
        self.probes.contains_key(identifier)
    }

    fn put(&mut self, identifier: &str, probe: Probe) {
        self.probes.insert(identifier.to_string(), probe);
    }

    fn delete(&mut self, identifier: &str) {
        self.probes.remove(identifier);
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl Backend for MemoryStore {
    async fn open(&self) -> Result<Box<dyn ProbeStore>, StoreError> {
        debug!("Opening in-memory probe store with {} probes", self.probes.len());
        Ok(Box::new(self.clone()))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(identifier: &str) -> Probe {
        Probe::new(
            identifier.to_string(),
            "localhost:9100".to_string(),
            vec!["cpu".to_string()],
            vec!["v1".to_string()],
        )
    }

    #[tokio::test]
    async fn handles_share_the_same_records() {
        let backend = MemoryStore::new();

        let mut first = backend.open().await.unwrap();
        first.put("p1", probe("p1"));
        first.close().await.unwrap();

        let mut second = backend.open().await.unwrap();
        assert!(second.exists("p1"));
        assert_eq!(Some(probe("p1")), second.get("p1"));
        assert_eq!(1, second.list().len());

        second.delete("p1");
        second.delete("missing");
        assert!(!second.exists("p1"));
        assert!(backend.open().await.unwrap().list().is_empty());
    }
}
