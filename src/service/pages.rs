//! Page texts of uploaded documents, kept under the job's key family

use std::sync::Arc;
use std::time::Duration;

use crate::model::PageText;
use crate::store::{EphemeralStore, JobKeys, StoreError};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PageArchiveError {
    #[error("Page texts not found for job {0}")]
    NotFound(String),

    #[error("Malformed page archive: {0}")]
    Serialization(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

#[derive(Clone)]
pub struct PageArchive {
    store: Arc<dyn EphemeralStore>,
    ttl: Duration,
}

impl PageArchive {
    pub fn new(store: Arc<dyn EphemeralStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn save(&self, job_id: &str, pages: &[PageText]) -> Result<(), PageArchiveError> {
        let keys = JobKeys::new(job_id);
        let raw =
            serde_json::to_vec(pages).map_err(|e| PageArchiveError::Serialization(e.to_string()))?;
        self.store.put(&keys.pages, &raw, self.ttl).await?;

        tracing::debug!(job_id = %job_id, pages = pages.len(), bytes = raw.len(), "Page texts stored");
        Ok(())
    }

    pub async fn load(&self, job_id: &str) -> Result<Vec<PageText>, PageArchiveError> {
        let keys = JobKeys::new(job_id);
        let raw = self
            .store
            .get(&keys.pages)
            .await?
            .ok_or_else(|| PageArchiveError::NotFound(job_id.to_string()))?;
        serde_json::from_slice(&raw).map_err(|e| PageArchiveError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_pages_round_trip_in_order() {
        let archive = PageArchive::new(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        let pages = vec![PageText::new(1, "first"), PageText::new(2, ""), PageText::new(3, "third")];

        archive.save("job", &pages).await.unwrap();
        assert_eq!(archive.load("job").await.unwrap(), pages);
    }

    #[tokio::test]
    async fn test_missing_archive_is_not_found() {
        let archive = PageArchive::new(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        assert!(matches!(
            archive.load("job").await,
            Err(PageArchiveError::NotFound(_))
        ));
    }
}
