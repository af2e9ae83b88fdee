//! In-process fan-out of live extraction runs
//!
//! Each running job has one [`LiveRun`] holding a queue per attached consumer.
//! The producer publishes under the run's lock, and consumers attach under the
//! same lock, so every consumer gets a cursor that splits the ledger cleanly
//! into "replay" (`sequence < cursor`) and "live" (`sequence >= cursor`).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::model::{Claim, StreamEvent};

/// How a consumer joins a run
#[derive(Debug)]
pub enum Attachment {
    /// Replay claims below `cursor`, then read `receiver`
    Live {
        cursor: u64,
        progress: Option<StreamEvent>,
        receiver: UnboundedReceiver<StreamEvent>,
    },
    /// The run has ended; replay everything, then emit `terminal`
    Finished { terminal: StreamEvent },
    /// The run never started here; follow the ledger instead
    Abandoned,
}

#[derive(Default)]
struct RunState {
    next_sequence: u64,
    latest_progress: Option<StreamEvent>,
    subscribers: Vec<UnboundedSender<StreamEvent>>,
    terminal: Option<StreamEvent>,
    abandoned: bool,
}

impl RunState {
    fn broadcast(&mut self, event: &StreamEvent) {
        // Closed queues belong to detached consumers
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

/// Live feed of one extraction run
#[derive(Default)]
pub struct LiveRun {
    state: Mutex<RunState>,
}

impl LiveRun {
    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn attach(&self) -> Attachment {
        let mut state = self.state();
        if state.abandoned {
            return Attachment::Abandoned;
        }
        if let Some(terminal) = &state.terminal {
            return Attachment::Finished {
                terminal: terminal.clone(),
            };
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        state.subscribers.push(sender);
        Attachment::Live {
            cursor: state.next_sequence,
            progress: state.latest_progress.clone(),
            receiver,
        }
    }

    /// Deliver a claim already appended to the ledger
    pub fn publish_claim(&self, claim: &Claim) {
        let mut state = self.state();
        state.next_sequence = claim.sequence + 1;
        state.broadcast(&StreamEvent::Claim(claim.clone()));
    }

    pub fn publish_progress(&self, event: StreamEvent) {
        let mut state = self.state();
        state.broadcast(&event);
        state.latest_progress = Some(event);
    }

    /// Deliver the terminal event and detach every consumer
    pub fn finish(&self, terminal: StreamEvent) {
        let mut state = self.state();
        state.broadcast(&terminal);
        state.subscribers.clear();
        state.terminal = Some(terminal);
    }

    /// Give up a reserved run that will not be started; attached consumers see their queue close
    pub fn abandon(&self) {
        let mut state = self.state();
        state.abandoned = true;
        state.subscribers.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }
}

/// Runs owned by this process, by job id
#[derive(Default)]
pub struct LiveRuns {
    runs: Mutex<HashMap<String, Arc<LiveRun>>>,
}

impl LiveRuns {
    pub fn new() -> Self {
        Self::default()
    }

    fn runs(&self) -> MutexGuard<'_, HashMap<String, Arc<LiveRun>>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Existing run for the job, or a newly reserved one (`true`)
    pub fn get_or_insert(&self, job_id: &str) -> (Arc<LiveRun>, bool) {
        let mut runs = self.runs();
        if let Some(run) = runs.get(job_id) {
            return (run.clone(), false);
        }
        let run = Arc::new(LiveRun::default());
        runs.insert(job_id.to_string(), run.clone());
        (run, true)
    }

    /// Remove `run` if it is still the one registered for the job
    pub fn remove(&self, job_id: &str, run: &Arc<LiveRun>) {
        let mut runs = self.runs();
        if runs.get(job_id).is_some_and(|current| Arc::ptr_eq(current, run)) {
            runs.remove(job_id);
        }
    }

    pub fn len(&self) -> usize {
        self.runs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs().is_empty()
    }
}
