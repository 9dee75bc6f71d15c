use std::io;

use async_trait::async_trait;
use thiserror::Error;

use crate::probe::probe::Probe;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("probe store io error: {0}")]
    Io(#[from] io::Error),
    #[error("probe store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Request scoped view of the probe records.
///
/// A handle is opened at request entry and either closed, which commits its
/// writes, or dropped, which releases it and discards anything not committed.
#[async_trait]
pub trait ProbeStore: Send {
    /// All records, in store iteration order.
    fn list(&self) -> Vec<Probe>;

    fn get(&self, identifier: &str) -> Option<Probe>;

    fn exists(&self, identifier: &str) -> bool {
        self.get(identifier).is_some()
    }

    /// Unconditional insert or overwrite.
    fn put(&mut self, identifier: &str, probe: Probe);

    /// Unconditional removal. Deleting a missing identifier is not an error.
    fn delete(&mut self, identifier: &str);

    async fn close(&mut self) -> Result<(), StoreError>;
}

/// Hands out one `ProbeStore` per request.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn open(&self) -> Result<Box<dyn ProbeStore>, StoreError>;

    fn describe(&self) -> String;
}
