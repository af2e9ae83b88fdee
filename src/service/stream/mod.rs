//! Claim streaming
//!
//! [`StreamCoordinator::open`] gives every caller an ordered event stream for
//! a job: a replay of the ledger followed, while the job is still being
//! extracted, by live events. The first caller of a pending job starts the
//! extraction run; later callers attach to it. When the run belongs to another
//! process the caller follows the ledger by polling the store.
//!
//! Replay is a snapshot taken when the consumer attaches. A verification merged
//! after that point is not re-emitted on the stream; later replays include it.

pub mod fanout;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};

use crate::model::{
    Claim, ExtractionConfig, ExtractionOutcome, Job, JobStatus, PageText, ProgressPhase,
    StreamEvent,
};
use crate::service::claims;
use crate::service::credential::Credential;
use crate::service::jobs::{JobError, JobRegistry, ProgressUpdate};
use crate::service::ledger::{ClaimLedger, LedgerError};
use crate::service::pages::{PageArchive, PageArchiveError};
use crate::service::reasoner::{ClaimReasoner, ReasonerError};

use fanout::{Attachment, LiveRun, LiveRuns};

pub const EXPIRED_MESSAGE: &str = "Unknown or expired jobId";
const EXTRACTION_FAILED_MESSAGE: &str = "Claim extraction failed";
const PROVIDER_FAILED_MESSAGE: &str = "Claim extraction failed: the reasoning provider returned an error";
const STORAGE_FAILED_MESSAGE: &str = "Claim extraction failed: storage error";
const NOT_RUNNING_MESSAGE: &str = "Claim extraction is not running";

const DEFAULT_FOLLOW_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StreamError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Pages(#[from] PageArchiveError),

    #[error(transparent)]
    Reasoner(#[from] ReasonerError),
}

impl StreamError {
    /// Message safe to send to clients
    fn public_message(&self) -> &'static str {
        match self {
            StreamError::Job(JobError::NotFound(_)) | StreamError::Pages(PageArchiveError::NotFound(_)) => {
                EXPIRED_MESSAGE
            }
            StreamError::Reasoner(_) => PROVIDER_FAILED_MESSAGE,
            StreamError::Job(_) | StreamError::Ledger(_) | StreamError::Pages(_) => {
                STORAGE_FAILED_MESSAGE
            }
        }
    }

    /// Failure class for logs
    fn kind(&self) -> &'static str {
        match self {
            StreamError::Job(_) => "job",
            StreamError::Ledger(_) => "ledger",
            StreamError::Pages(_) => "pages",
            StreamError::Reasoner(e) => e.kind(),
        }
    }
}

/// Drives extraction runs and serves their event streams
#[derive(Clone)]
pub struct StreamCoordinator {
    jobs: JobRegistry,
    ledger: ClaimLedger,
    pages: PageArchive,
    reasoner: Arc<dyn ClaimReasoner>,
    runs: Arc<LiveRuns>,
    config: ExtractionConfig,
    follow_interval: Duration,
}

impl StreamCoordinator {
    pub fn new(
        jobs: JobRegistry,
        ledger: ClaimLedger,
        pages: PageArchive,
        reasoner: Arc<dyn ClaimReasoner>,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            jobs,
            ledger,
            pages,
            reasoner,
            runs: Arc::new(LiveRuns::new()),
            config,
            follow_interval: DEFAULT_FOLLOW_INTERVAL,
        }
    }

    /// Poll interval used when following a run owned by another process
    pub fn with_follow_interval(mut self, interval: Duration) -> Self {
        self.follow_interval = interval;
        self
    }

    /// Open the event stream of a job
    ///
    /// Fails before any event is produced if the job is unknown or expired.
    pub async fn open(
        &self,
        job_id: &str,
        credential: Credential,
    ) -> Result<BoxStream<'static, StreamEvent>, StreamError> {
        let job = self.jobs.touch(job_id).await?;

        if job.status.is_terminal() {
            return self.finished_feed(&job).await;
        }

        let (run, created) = self.runs.get_or_insert(job_id);
        if !created {
            return self.attach(job_id, &run).await;
        }

        // Reserved: attach before the run can publish anything
        let attachment = run.attach();
        match self.jobs.begin_extraction(job_id).await {
            Ok(_) => {
                let this = self.clone();
                let run_handle = run.clone();
                let owned_job_id = job_id.to_string();
                tokio::spawn(async move {
                    this.run_extraction(owned_job_id, run_handle, credential)
                        .await
                });
                self.feed_from(job_id, attachment).await
            }
            Err(JobError::AlreadyRunning(_)) => {
                self.release(job_id, &run);
                tracing::info!(job_id = %job_id, "Run owned elsewhere, following ledger");
                self.follow_feed(job_id, 0).await
            }
            Err(JobError::InvalidTransition { .. }) => {
                self.release(job_id, &run);
                let job = self.jobs.get(job_id).await?;
                self.finished_feed(&job).await
            }
            Err(e) => {
                self.release(job_id, &run);
                Err(e.into())
            }
        }
    }

    fn release(&self, job_id: &str, run: &Arc<LiveRun>) {
        self.runs.remove(job_id, run);
        run.abandon();
    }

    async fn attach(
        &self,
        job_id: &str,
        run: &Arc<LiveRun>,
    ) -> Result<BoxStream<'static, StreamEvent>, StreamError> {
        let attachment = run.attach();
        self.feed_from(job_id, attachment).await
    }

    async fn feed_from(
        &self,
        job_id: &str,
        attachment: Attachment,
    ) -> Result<BoxStream<'static, StreamEvent>, StreamError> {
        match attachment {
            Attachment::Live {
                cursor,
                progress,
                receiver,
            } => {
                let mut feed = self.feed(job_id, Source::Live(receiver));
                feed.pending.extend(progress);
                let claims = self.ledger.replay(job_id).await?;
                feed.push_claims(claims.into_iter().take_while(|c| c.sequence < cursor));
                feed.cursor = cursor;

                tracing::info!(
                    job_id = %job_id,
                    replayed = feed.pending.len(),
                    cursor = cursor,
                    "Consumer attached to live run"
                );
                Ok(feed.into_stream())
            }
            Attachment::Finished { terminal } => {
                // The run persists its outcome before finishing, so the
                // snapshot is final
                let job = self.jobs.get(job_id).await?;
                let mut feed = self.feed(job_id, Source::Closed);
                feed.pending.extend(progress_snapshot(&job));
                feed.push_claims(self.ledger.replay(job_id).await?);
                feed.pending.push_back(terminal);
                Ok(feed.into_stream())
            }
            Attachment::Abandoned => self.follow_feed(job_id, 0).await,
        }
    }

    /// Replay of a job whose extraction has ended
    async fn finished_feed(&self, job: &Job) -> Result<BoxStream<'static, StreamEvent>, StreamError> {
        let mut feed = self.feed(&job.job_id, Source::Closed);
        feed.pending.extend(progress_snapshot(job));
        let claims = self.ledger.replay(&job.job_id).await?;
        let replayed = claims.len();
        feed.push_claims(claims);
        feed.pending.push_back(terminal_event(job.status));

        tracing::info!(
            job_id = %job.job_id,
            status = %job.status,
            replayed = replayed,
            "Replaying finished job"
        );
        Ok(feed.into_stream())
    }

    async fn follow_feed(
        &self,
        job_id: &str,
        cursor: u64,
    ) -> Result<BoxStream<'static, StreamEvent>, StreamError> {
        let mut feed = self.feed(job_id, Source::Follow);
        feed.cursor = cursor;
        Ok(feed.into_stream())
    }

    fn feed(&self, job_id: &str, source: Source) -> Feed {
        Feed {
            job_id: job_id.to_string(),
            jobs: self.jobs.clone(),
            ledger: self.ledger.clone(),
            pending: VecDeque::new(),
            source,
            cursor: 0,
            last_progress: None,
            follow_interval: self.follow_interval,
            polled: false,
        }
    }

    /// Producer task: owns the run from `extracting` to a terminal status
    async fn run_extraction(self, job_id: String, run: Arc<LiveRun>, credential: Credential) {
        let start_time = std::time::Instant::now();
        tracing::info!(job_id = %job_id, "Extraction run started");

        let (outcome, terminal) = match self.extract_all(&job_id, &run, &credential).await {
            Ok(claims) => {
                tracing::info!(
                    job_id = %job_id,
                    claims = claims,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    "Extraction run completed"
                );
                (ExtractionOutcome::Extracted, StreamEvent::done())
            }
            Err(e) => {
                tracing::error!(
                    job_id = %job_id,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    error_kind = e.kind(),
                    "Extraction run failed"
                );
                (ExtractionOutcome::Failed, StreamEvent::error(e.public_message()))
            }
        };

        // The terminal status is persisted before consumers see the terminal event
        let terminal = match self.jobs.complete_extraction(&job_id, outcome).await {
            Ok(_) => terminal,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to record extraction outcome");
                match e {
                    JobError::NotFound(_) => StreamEvent::error(EXPIRED_MESSAGE),
                    _ => StreamEvent::error(STORAGE_FAILED_MESSAGE),
                }
            }
        };

        run.finish(terminal);
        self.runs.remove(&job_id, &run);
    }

    /// Extract every page in order; returns the number of claims appended
    async fn extract_all(
        &self,
        job_id: &str,
        run: &LiveRun,
        credential: &Credential,
    ) -> Result<u64, StreamError> {
        let pages = self.pages.load(job_id).await?;
        let pages_total = pages.len() as u64;

        self.jobs.record_progress(job_id, ProgressUpdate::Parsed).await?;
        run.publish_progress(StreamEvent::progress(ProgressPhase::Parse, pages_total, pages_total));

        let readable: Vec<PageText> = pages.into_iter().filter(|p| !p.is_blank()).collect();
        tracing::debug!(
            job_id = %job_id,
            pages = pages_total,
            readable = readable.len(),
            concurrency = self.config.concurrency,
            "Extracting claims from pages"
        );

        // Calls overlap, but results are consumed in page order
        let mut results = stream::iter(readable)
            .map(|page| {
                let reasoner = self.reasoner.clone();
                let credential = credential.clone();
                async move {
                    let claims = reasoner.extract_claims(&credential, &page).await;
                    (page, claims)
                }
            })
            .buffered(self.config.concurrency.max(1));

        let mut appended = 0;
        while let Some((page, extracted)) = results.next().await {
            let drafts = claims::prepare(&page, extracted?);
            if drafts.is_empty() {
                continue;
            }

            let job = self
                .jobs
                .record_progress(job_id, ProgressUpdate::ClaimsAnnounced(drafts.len() as u64))
                .await?;
            run.publish_progress(extract_progress(&job));

            for draft in drafts {
                let claim = self.ledger.append_claim(job_id, draft).await?;
                let job = self
                    .jobs
                    .record_progress(job_id, ProgressUpdate::ClaimProcessed)
                    .await?;
                run.publish_claim(&claim);
                run.publish_progress(extract_progress(&job));
                appended += 1;
            }
        }

        Ok(appended)
    }
}

fn extract_progress(job: &Job) -> StreamEvent {
    StreamEvent::progress(
        ProgressPhase::Extract,
        job.processed_count,
        job.total_claims_expected,
    )
}

/// Last persisted progress of a job, if any was recorded
fn progress_snapshot(job: &Job) -> Option<StreamEvent> {
    job.phase.map(|phase| match phase {
        ProgressPhase::Parse => StreamEvent::progress(phase, job.pages_total, job.pages_total),
        ProgressPhase::Extract => extract_progress(job),
    })
}

fn terminal_event(status: JobStatus) -> StreamEvent {
    match status {
        JobStatus::Failed => StreamEvent::error(EXTRACTION_FAILED_MESSAGE),
        _ => StreamEvent::done(),
    }
}

enum Source {
    Live(tokio::sync::mpsc::UnboundedReceiver<StreamEvent>),
    Follow,
    Closed,
}

/// One consumer's position in a job's event sequence
struct Feed {
    job_id: String,
    jobs: JobRegistry,
    ledger: ClaimLedger,
    pending: VecDeque<StreamEvent>,
    source: Source,
    /// Sequence of the next claim this consumer expects
    cursor: u64,
    last_progress: Option<(u64, u64)>,
    follow_interval: Duration,
    polled: bool,
}

impl Feed {
    fn into_stream(self) -> BoxStream<'static, StreamEvent> {
        stream::unfold(self, |mut feed| async move {
            let event = feed.next_event().await?;
            Some((event, feed))
        })
        .boxed()
    }

    fn push_claims(&mut self, claims: impl IntoIterator<Item = Claim>) {
        for claim in claims {
            self.cursor = claim.sequence + 1;
            self.pending.push_back(StreamEvent::Claim(claim));
        }
    }

    fn close_with(&mut self, terminal: StreamEvent) {
        self.pending.push_back(terminal);
        self.source = Source::Closed;
    }

    async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }

            let received = match &mut self.source {
                Source::Closed => return None,
                Source::Follow => None,
                Source::Live(receiver) => Some(receiver.recv().await),
            };

            match received {
                None => self.poll().await,
                Some(Some(event)) => {
                    if let StreamEvent::Claim(claim) = &event {
                        if claim.sequence < self.cursor {
                            continue;
                        }
                        self.cursor = claim.sequence + 1;
                    }
                    if event.is_terminal() {
                        self.source = Source::Closed;
                    }
                    return Some(event);
                }
                Some(None) => {
                    // The run went away without a terminal event
                    tracing::debug!(job_id = %self.job_id, cursor = self.cursor, "Live feed closed, following ledger");
                    self.source = Source::Follow;
                }
            }
        }
    }

    /// Read the job, then any claims past the cursor
    ///
    /// Reads do not refresh the TTL, so a run that died elsewhere ends the
    /// stream once its job expires.
    async fn poll(&mut self) {
        if self.polled {
            tokio::time::sleep(self.follow_interval).await;
        }
        self.polled = true;

        let job = match self.jobs.get(&self.job_id).await {
            Ok(job) => job,
            Err(JobError::NotFound(_)) => {
                self.close_with(StreamEvent::error(EXPIRED_MESSAGE));
                return;
            }
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, error = %e, "Failed to read followed job");
                self.close_with(StreamEvent::error(STORAGE_FAILED_MESSAGE));
                return;
            }
        };

        match self.ledger.replay_from(&self.job_id, self.cursor).await {
            Ok(claims) => self.push_claims(claims),
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, error = %e, "Failed to read followed ledger");
                self.close_with(StreamEvent::error(STORAGE_FAILED_MESSAGE));
                return;
            }
        }

        let counters = (job.processed_count, job.total_claims_expected);
        if self.last_progress != Some(counters) {
            if let Some(progress) = progress_snapshot(&job) {
                self.pending.push_back(progress);
            }
            self.last_progress = Some(counters);
        }

        match job.status {
            JobStatus::Extracting => {}
            JobStatus::Pending => self.close_with(StreamEvent::error(NOT_RUNNING_MESSAGE)),
            status => self.close_with(terminal_event(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::extraction::ExtractedCitationStatus::{Cited, Uncited, WeaklyCited};
    use crate::service::testing::{ScriptedReasoner, TTL, credential, extracted};
    use crate::store::{EphemeralStore, MemoryStore};

    struct Fixture {
        store: Arc<MemoryStore>,
        jobs: JobRegistry,
        ledger: ClaimLedger,
        pages: PageArchive,
        reasoner: Arc<ScriptedReasoner>,
        coordinator: StreamCoordinator,
    }

    fn fixture_on(store: Arc<MemoryStore>, reasoner: Arc<ScriptedReasoner>) -> Fixture {
        let jobs = JobRegistry::new(store.clone(), TTL);
        let ledger = ClaimLedger::new(store.clone(), TTL);
        let pages = PageArchive::new(store.clone(), TTL);
        let config = ExtractionConfig {
            concurrency: 1,
            ..ExtractionConfig::default()
        };
        let coordinator = StreamCoordinator::new(
            jobs.clone(),
            ledger.clone(),
            pages.clone(),
            reasoner.clone(),
            config,
        )
        .with_follow_interval(Duration::from_millis(5));

        Fixture {
            store,
            jobs,
            ledger,
            pages,
            reasoner,
            coordinator,
        }
    }

    fn fixture(reasoner: ScriptedReasoner) -> Fixture {
        fixture_on(Arc::new(MemoryStore::new()), Arc::new(reasoner))
    }

    const PAGE_ONE: &str = "Smith (2019) showed that sleep improves recall. Prior work links diet to mood.";
    const PAGE_TWO: &str = "Glaciers retreat faster than predicted.";

    fn three_claim_reasoner() -> ScriptedReasoner {
        ScriptedReasoner::new()
            .with_page(
                1,
                vec![
                    extracted("Smith (2019) showed that sleep improves recall.", Cited),
                    extracted("Prior work links diet to mood.", WeaklyCited),
                ],
            )
            .with_page(2, vec![extracted("Glaciers retreat faster than predicted.", Uncited)])
    }

    async fn upload(f: &Fixture, pages: &[&str]) -> String {
        let pages: Vec<PageText> = pages
            .iter()
            .zip(1u32..)
            .map(|(text, number)| PageText::new(number, *text))
            .collect();
        let job = f.jobs.create_job(pages.len() as u64).await.unwrap();
        f.pages.save(&job.job_id, &pages).await.unwrap();
        job.job_id
    }

    fn claim_sequences(events: &[StreamEvent]) -> Vec<u64> {
        events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::Claim(claim) => Some(claim.sequence),
                _ => None,
            })
            .collect()
    }

    fn progress_counts(events: &[StreamEvent]) -> Vec<(u64, u64)> {
        events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::Progress(p) if p.phase == ProgressPhase::Extract => {
                    Some((p.processed, p.total))
                }
                _ => None,
            })
            .collect()
    }

    async fn wait_for_status(jobs: &JobRegistry, job_id: &str, status: JobStatus) {
        for _ in 0..200 {
            if jobs.get(job_id).await.unwrap().status == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job never reached {status}");
    }

    #[tokio::test]
    async fn test_three_claim_document_then_replay() {
        let f = fixture(three_claim_reasoner());
        let job_id = upload(&f, &[PAGE_ONE, PAGE_TWO]).await;

        let events: Vec<StreamEvent> = f
            .coordinator
            .open(&job_id, credential())
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(claim_sequences(&events), vec![0, 1, 2]);
        assert_eq!(events.last(), Some(&StreamEvent::done()));
        assert_eq!(progress_counts(&events).last(), Some(&(3, 3)));
        assert!(matches!(
            &events[0],
            StreamEvent::Progress(p) if p.phase == ProgressPhase::Parse && p.total == 2
        ));
        wait_for_status(&f.jobs, &job_id, JobStatus::Extracted).await;

        let replay: Vec<StreamEvent> = f
            .coordinator
            .open(&job_id, credential())
            .await
            .unwrap()
            .collect()
            .await;
        let claims: Vec<&StreamEvent> = replay
            .iter()
            .filter(|e| matches!(e, StreamEvent::Claim(_)))
            .collect();
        let original: Vec<&StreamEvent> = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::Claim(_)))
            .collect();
        assert_eq!(claims, original);
        assert_eq!(replay.last(), Some(&StreamEvent::done()));
        assert!(matches!(replay[replay.len() - 2], StreamEvent::Claim(_)));
        assert_eq!(f.reasoner.extract_calls(), 2);
    }

    #[test]
    fn test_reasoner_failure_kind_hides_provider_text() {
        let err = StreamError::from(ReasonerError::ExtractionFailed(
            "Sleep improves recall".to_string(),
        ));
        assert_eq!(err.kind(), "provider");
        assert_eq!(err.public_message(), PROVIDER_FAILED_MESSAGE);
        assert!(!err.public_message().contains("Sleep"));
    }

    #[tokio::test]
    async fn test_consumer_arriving_as_run_ends_gets_same_records() {
        let f = fixture(three_claim_reasoner());
        let job_id = upload(&f, &[PAGE_ONE, PAGE_TWO]).await;
        let _: Vec<StreamEvent> = f
            .coordinator
            .open(&job_id, credential())
            .await
            .unwrap()
            .collect()
            .await;
        wait_for_status(&f.jobs, &job_id, JobStatus::Extracted).await;

        let racing: Vec<StreamEvent> = f
            .coordinator
            .feed_from(
                &job_id,
                Attachment::Finished {
                    terminal: StreamEvent::done(),
                },
            )
            .await
            .unwrap()
            .collect()
            .await;
        let later: Vec<StreamEvent> = f
            .coordinator
            .open(&job_id, credential())
            .await
            .unwrap()
            .collect()
            .await;

        assert!(matches!(&racing[0], StreamEvent::Progress(_)));
        assert_eq!(progress_counts(&racing).last(), Some(&(3, 3)));
        assert_eq!(progress_counts(&racing), progress_counts(&later));
        assert_eq!(claim_sequences(&racing), claim_sequences(&later));
        assert_eq!(racing.len(), later.len());
        assert_eq!(racing.last(), Some(&StreamEvent::done()));
    }

    #[tokio::test]
    async fn test_claims_carry_final_citation_status() {
        let f = fixture(three_claim_reasoner());
        let job_id = upload(&f, &[PAGE_ONE, PAGE_TWO]).await;

        let events: Vec<StreamEvent> = f
            .coordinator
            .open(&job_id, credential())
            .await
            .unwrap()
            .collect()
            .await;
        let claims: Vec<&Claim> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Claim(c) => Some(c),
                _ => None,
            })
            .collect();

        assert_eq!(claims[0].claim_id, "c0");
        assert_eq!(claims[0].citation_status, crate::model::CitationStatus::Cited);
        assert_eq!(claims[1].citation_status, crate::model::CitationStatus::WeaklyCited);
        assert!(claims[1].weak_reason.is_some());
        assert_eq!(claims[2].citation_status, crate::model::CitationStatus::Uncited);
    }

    #[tokio::test]
    async fn test_second_consumer_joins_mid_run() {
        let (reasoner, gate) = three_claim_reasoner().gated();
        let f = fixture(reasoner);
        let job_id = upload(&f, &[PAGE_ONE, PAGE_TWO]).await;

        let mut first = f.coordinator.open(&job_id, credential()).await.unwrap();
        gate.add_permits(1);

        let mut first_events = Vec::new();
        while claim_sequences(&first_events).len() < 2 {
            first_events.push(first.next().await.unwrap());
        }

        let second = f.coordinator.open(&job_id, credential()).await.unwrap();
        gate.add_permits(1);

        let second_events: Vec<StreamEvent> = second.collect().await;
        first_events.extend(first.collect::<Vec<_>>().await);

        assert_eq!(claim_sequences(&first_events), vec![0, 1, 2]);
        assert_eq!(claim_sequences(&second_events), vec![0, 1, 2]);
        assert_eq!(second_events.last(), Some(&StreamEvent::done()));
        assert_eq!(f.reasoner.extract_calls(), 2);
        assert_eq!(f.ledger.replay(&job_id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_opens_start_one_run() {
        let f = fixture(three_claim_reasoner());
        let job_id = upload(&f, &[PAGE_ONE, PAGE_TWO]).await;

        let (a, b) = tokio::join!(
            f.coordinator.open(&job_id, credential()),
            f.coordinator.open(&job_id, credential())
        );
        let (a, b): (Vec<_>, Vec<_>) = tokio::join!(a.unwrap().collect(), b.unwrap().collect());

        assert_eq!(claim_sequences(&a), vec![0, 1, 2]);
        assert_eq!(claim_sequences(&b), vec![0, 1, 2]);
        assert_eq!(f.reasoner.extract_calls(), 2);
        assert_eq!(f.ledger.replay(&job_id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_run_owned_by_another_instance_is_followed() {
        let store = Arc::new(MemoryStore::new());
        let (reasoner, gate) = three_claim_reasoner().gated();
        let reasoner = Arc::new(reasoner);
        let owner = fixture_on(store.clone(), reasoner.clone());
        let other = fixture_on(store, reasoner.clone());
        let job_id = upload(&owner, &[PAGE_ONE, PAGE_TWO]).await;

        let owned = owner.coordinator.open(&job_id, credential()).await.unwrap();
        let followed = other.coordinator.open(&job_id, credential()).await.unwrap();
        gate.add_permits(2);

        let (owned, followed): (Vec<_>, Vec<_>) = tokio::join!(owned.collect(), followed.collect());

        assert_eq!(claim_sequences(&owned), vec![0, 1, 2]);
        assert_eq!(claim_sequences(&followed), vec![0, 1, 2]);
        assert_eq!(followed.last(), Some(&StreamEvent::done()));
        assert_eq!(reasoner.extract_calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_run_emits_error_and_replays_claims() {
        let f = fixture(
            ScriptedReasoner::new()
                .with_page(1, vec![extracted("Glaciers retreat faster than predicted.", Uncited)])
                .failing_page(2),
        );
        let job_id = upload(&f, &[PAGE_TWO, "Second page body."]).await;

        let events: Vec<StreamEvent> = f
            .coordinator
            .open(&job_id, credential())
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(claim_sequences(&events), vec![0]);
        match events.last() {
            Some(StreamEvent::Error(e)) => {
                assert_eq!(e.message, PROVIDER_FAILED_MESSAGE);
                assert!(!e.message.contains("500"));
            }
            other => panic!("expected error event, got {other:?}"),
        }

        wait_for_status(&f.jobs, &job_id, JobStatus::Failed).await;
        let replay: Vec<StreamEvent> = f
            .coordinator
            .open(&job_id, credential())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(claim_sequences(&replay), vec![0]);
        assert!(matches!(replay.last(), Some(StreamEvent::Error(_))));
        assert_eq!(f.reasoner.extract_calls(), 2);
    }

    #[tokio::test]
    async fn test_blank_pages_are_not_sent_to_reasoner() {
        let f = fixture(ScriptedReasoner::new());
        let job_id = upload(&f, &["", "   ", "Body text."]).await;

        let events: Vec<StreamEvent> = f
            .coordinator
            .open(&job_id, credential())
            .await
            .unwrap()
            .collect()
            .await;

        assert!(claim_sequences(&events).is_empty());
        assert_eq!(events.last(), Some(&StreamEvent::done()));
        assert_eq!(f.reasoner.extract_calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_job_fails_before_streaming() {
        let f = fixture(ScriptedReasoner::new());

        assert!(matches!(
            f.coordinator.open("never-existed", credential()).await,
            Err(StreamError::Job(JobError::NotFound(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_job_is_not_found() {
        let f = fixture(ScriptedReasoner::new());
        let job_id = upload(&f, &[PAGE_TWO]).await;

        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        assert!(matches!(
            f.coordinator.open(&job_id, credential()).await,
            Err(StreamError::Job(JobError::NotFound(_)))
        ));
        assert!(f.store.get(&crate::store::JobKeys::new(&job_id).pages).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_verification_visible_in_later_replay() {
        let f = fixture(three_claim_reasoner());
        let job_id = upload(&f, &[PAGE_ONE, PAGE_TWO]).await;
        let _: Vec<StreamEvent> = f
            .coordinator
            .open(&job_id, credential())
            .await
            .unwrap()
            .collect()
            .await;
        wait_for_status(&f.jobs, &job_id, JobStatus::Extracted).await;

        let verification = crate::model::Verification {
            verdict: crate::model::Verdict::Supported,
            confidence: 0.8,
            reasoning: "Matches page 3.".to_string(),
            evidence: vec![],
        };
        f.ledger
            .merge_verification(&job_id, "c1", verification.clone())
            .await
            .unwrap();

        let replay: Vec<StreamEvent> = f
            .coordinator
            .open(&job_id, credential())
            .await
            .unwrap()
            .collect()
            .await;
        let verified: Vec<&Claim> = replay
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Claim(c) if c.verification.is_some() => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(verified.len(), 1);
        assert_eq!(verified[0].claim_id, "c1");
        assert_eq!(verified[0].verification.as_ref(), Some(&verification));
        assert_eq!(claim_sequences(&replay), vec![0, 1, 2]);
    }
}
