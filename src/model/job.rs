//! Job metadata record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing state of an uploaded document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Extracting,
    Extracted,
    Failed,
}

impl JobStatus {
    /// Whether extraction has finished, successfully or not
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Extracted | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Extracting => "extracting",
            JobStatus::Extracted => "extracted",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final state of an extraction run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Extracted,
    Failed,
}

impl From<ExtractionOutcome> for JobStatus {
    fn from(outcome: ExtractionOutcome) -> Self {
        match outcome {
            ExtractionOutcome::Extracted => JobStatus::Extracted,
            ExtractionOutcome::Failed => JobStatus::Failed,
        }
    }
}

/// Pipeline phase reported in progress events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Parse,
    Extract,
}

/// One uploaded-document processing session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    /// Claims announced by the pages processed so far
    pub total_claims_expected: u64,
    /// Claims appended to the ledger so far
    pub processed_count: u64,
    /// Number of pages in the uploaded document
    pub pages_total: u64,
    /// Phase of the latest persisted progress snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<ProgressPhase>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Job {
    pub fn new(job_id: String, pages_total: u64) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            status: JobStatus::Pending,
            total_claims_expected: 0,
            processed_count: 0,
            pages_total,
            phase: None,
            created_at: now,
            last_activity_at: now,
        }
    }
}
