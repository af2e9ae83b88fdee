pub mod api;
pub mod claim;
pub mod config;
pub mod document;
pub mod event;
pub mod extraction;
pub mod job;

pub use claim::{CitationStatus, Claim, ClaimDraft, Evidence, Verdict, Verification};
pub use config::{Config, ExtractionConfig, StoreBackend, VerificationConfig};
pub use document::PageText;
pub use event::StreamEvent;
pub use job::{ExtractionOutcome, Job, JobStatus, ProgressPhase};
