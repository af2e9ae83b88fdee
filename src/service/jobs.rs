//! Job registry
//!
//! Sole owner of job records. Every mutation is a read-modify-write applied
//! through the store's compare-and-swap, retried when a concurrent writer got
//! there first. The `pending -> extracting` transition doubles as the
//! one-run-per-job lock.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::model::{ExtractionOutcome, Job, JobStatus, ProgressPhase};
use crate::store::{EphemeralStore, JobKeys, StoreError, SwapOutcome};

/// Attempts before a contended update gives up
const MAX_UPDATE_ATTEMPTS: usize = 16;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Extraction already running for job {0}")]
    AlreadyRunning(String),

    #[error("Invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Job record could not be updated after {0} attempts")]
    Contention(usize),

    #[error("Malformed job record: {0}")]
    Serialization(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Progress counters reported by the extraction run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// Document pages are known
    Parsed,
    /// A page announced this many claims
    ClaimsAnnounced(u64),
    /// One claim was appended to the ledger
    ClaimProcessed,
}

/// Creates, reads and transitions job records
#[derive(Clone)]
pub struct JobRegistry {
    store: Arc<dyn EphemeralStore>,
    ttl: Duration,
}

impl JobRegistry {
    pub fn new(store: Arc<dyn EphemeralStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Create a `pending` job for a document with `pages_total` pages
    pub async fn create_job(&self, pages_total: u64) -> Result<Job, JobError> {
        let job = Job::new(Uuid::new_v4().to_string(), pages_total);
        let keys = JobKeys::new(&job.job_id);
        self.store.put(&keys.job, &encode(&job)?, self.ttl).await?;

        tracing::info!(job_id = %job.job_id, pages = pages_total, "Job created");
        Ok(job)
    }

    /// Read a job record
    pub async fn get(&self, job_id: &str) -> Result<Job, JobError> {
        let keys = JobKeys::new(job_id);
        let raw = self
            .store
            .get(&keys.job)
            .await?
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        decode(&raw)
    }

    /// Move `pending -> extracting`
    ///
    /// Fails with [`JobError::AlreadyRunning`] if another caller won the
    /// transition; that caller owns the only run of this job.
    pub async fn begin_extraction(&self, job_id: &str) -> Result<Job, JobError> {
        let job = self
            .update(job_id, |job| match job.status {
                JobStatus::Pending => {
                    job.status = JobStatus::Extracting;
                    Ok(())
                }
                JobStatus::Extracting => Err(JobError::AlreadyRunning(job.job_id.clone())),
                from => Err(JobError::InvalidTransition {
                    job_id: job.job_id.clone(),
                    from,
                    to: JobStatus::Extracting,
                }),
            })
            .await?;

        tracing::info!(job_id = %job_id, "Extraction started");
        Ok(job)
    }

    /// Move `extracting -> extracted|failed`; repeating the same outcome is a no-op
    pub async fn complete_extraction(
        &self,
        job_id: &str,
        outcome: ExtractionOutcome,
    ) -> Result<Job, JobError> {
        let target = JobStatus::from(outcome);
        let job = self
            .update(job_id, |job| match job.status {
                JobStatus::Extracting => {
                    job.status = target;
                    Ok(())
                }
                current if current == target => Ok(()),
                from => Err(JobError::InvalidTransition {
                    job_id: job.job_id.clone(),
                    from,
                    to: target,
                }),
            })
            .await?;

        tracing::info!(job_id = %job_id, status = %job.status, "Extraction finished");
        Ok(job)
    }

    /// Apply a progress update; counters never decrease
    pub async fn record_progress(
        &self,
        job_id: &str,
        update: ProgressUpdate,
    ) -> Result<Job, JobError> {
        self.update(job_id, |job| {
            match update {
                ProgressUpdate::Parsed => job.phase = Some(ProgressPhase::Parse),
                ProgressUpdate::ClaimsAnnounced(count) => {
                    job.phase = Some(ProgressPhase::Extract);
                    job.total_claims_expected += count;
                }
                ProgressUpdate::ClaimProcessed => {
                    job.phase = Some(ProgressPhase::Extract);
                    job.processed_count += 1;
                    job.total_claims_expected =
                        job.total_claims_expected.max(job.processed_count);
                }
            }
            Ok(())
        })
        .await
    }

    /// Refresh `lastActivityAt` and the TTL of every key of the job
    pub async fn touch(&self, job_id: &str) -> Result<Job, JobError> {
        self.update(job_id, |_| Ok(())).await
    }

    /// Compare-and-swap loop; also stamps `lastActivityAt` and refreshes sibling keys
    async fn update<F>(&self, job_id: &str, mut apply: F) -> Result<Job, JobError>
    where
        F: FnMut(&mut Job) -> Result<(), JobError>,
    {
        let keys = JobKeys::new(job_id);

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let current = self
                .store
                .get(&keys.job)
                .await?
                .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

            let mut job = decode(&current)?;
            apply(&mut job)?;
            job.last_activity_at = Utc::now();
            let next = encode(&job)?;

            match self
                .store
                .compare_and_swap(&keys.job, &current, &next, self.ttl)
                .await?
            {
                SwapOutcome::Swapped => {
                    self.store.refresh_ttl(&keys.all(), self.ttl).await?;
                    return Ok(job);
                }
                SwapOutcome::Missing => return Err(JobError::NotFound(job_id.to_string())),
                SwapOutcome::Conflict => {
                    tracing::debug!(job_id = %job_id, attempt = attempt, "Job update conflict, retrying");
                }
            }
        }

        tracing::warn!(job_id = %job_id, "Job update abandoned after repeated conflicts");
        Err(JobError::Contention(MAX_UPDATE_ATTEMPTS))
    }
}

fn encode(job: &Job) -> Result<Vec<u8>, JobError> {
    serde_json::to_vec(job).map_err(|e| JobError::Serialization(e.to_string()))
}

fn decode(raw: &[u8]) -> Result<Job, JobError> {
    serde_json::from_slice(raw).map_err(|e| JobError::Serialization(e.to_string()))
}
