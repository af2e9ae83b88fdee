//! Key namespaces for job state
//!
//! A job owns exactly three keys. They are always refreshed together so the
//! job record, its claim log and its page texts share one expiration clock.

const ROOT: &str = "papertrail";
const PREFIX_JOB: &str = "jobs";
const PREFIX_CLAIMS: &str = "claims";
const PREFIX_PAGES: &str = "pages";

/// The set of store keys belonging to one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobKeys {
    /// Job metadata record
    pub job: String,
    /// Append-only claim log
    pub claims: String,
    /// Extracted page texts of the uploaded document
    pub pages: String,
}

impl JobKeys {
    pub fn new(job_id: &str) -> Self {
        Self {
            job: format!("{ROOT}:{PREFIX_JOB}:{job_id}"),
            claims: format!("{ROOT}:{PREFIX_CLAIMS}:{job_id}"),
            pages: format!("{ROOT}:{PREFIX_PAGES}:{job_id}"),
        }
    }

    /// All keys of the job, for shared TTL refreshes
    pub fn all(&self) -> Vec<String> {
        vec![self.job.clone(), self.claims.clone(), self.pages.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_namespaced_per_job() {
        let keys = JobKeys::new("abc");
        assert_eq!(keys.job, "papertrail:jobs:abc");
        assert_eq!(keys.claims, "papertrail:claims:abc");
        assert_eq!(keys.pages, "papertrail:pages:abc");
        assert_eq!(keys.all().len(), 3);
    }

    #[test]
    fn test_distinct_jobs_never_share_keys() {
        let a = JobKeys::new("a");
        let b = JobKeys::new("b");
        for key in a.all() {
            assert!(!b.all().contains(&key));
        }
    }
}
