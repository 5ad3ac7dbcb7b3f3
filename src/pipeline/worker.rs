//! Execution backends for the filter+sort pass.
//!
//! The coordinator talks to a [`PipelineWorker`] by message passing only:
//! jobs go in through `submit`, tagged outputs come back through
//! `try_next`. Which backend runs the job is invisible to it.

use anyhow::{anyhow, Context, Result};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::pipeline::request::{PipelineJob, PipelineOutput, PipelineResult};

/// Result of checking a worker for output
#[derive(Debug)]
pub enum WorkerPoll {
    Ready(PipelineOutput),
    /// Nothing yet, work may still be running
    Pending,
    /// The worker is gone and will never answer
    Disconnected,
}

pub trait PipelineWorker: Send {
    fn name(&self) -> &str;

    /// Hand a job to the worker. An error means the worker is unavailable.
    fn submit(&mut self, job: PipelineJob) -> Result<()>;

    /// Non-blocking check for a finished job
    fn try_next(&mut self) -> WorkerPoll;

    /// Stop accepting work and release resources
    fn shutdown(&mut self) {}
}

/// Runs each job synchronously at submit time.
///
/// Used when offloading is disabled, and as the fallback after a worker
/// failure.
#[derive(Debug, Default)]
pub struct InlineWorker {
    done: VecDeque<PipelineOutput>,
}

impl InlineWorker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PipelineWorker for InlineWorker {
    fn name(&self) -> &str {
        "inline"
    }

    fn submit(&mut self, job: PipelineJob) -> Result<()> {
        let output = PipelineOutput {
            sequence: job.sequence,
            result: Ok(job.run()),
        };
        self.done.push_back(output);
        Ok(())
    }

    fn try_next(&mut self) -> WorkerPoll {
        match self.done.pop_front() {
            Some(output) => WorkerPoll::Ready(output),
            None => WorkerPoll::Pending,
        }
    }
}

/// A dedicated OS thread fed through unbounded channels.
///
/// Only the newest queued job is run: anything submitted before it has
/// been superseded and its result would be discarded anyway.
pub struct ThreadWorker {
    jobs: Option<UnboundedSender<PipelineJob>>,
    results: UnboundedReceiver<PipelineOutput>,
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl ThreadWorker {
    pub fn spawn() -> Result<Self> {
        Self::spawn_with(PipelineJob::run)
    }

    /// Spawn a worker that computes each job with `runner`
    pub fn spawn_with<F>(runner: F) -> Result<Self>
    where
        F: Fn(&PipelineJob) -> PipelineResult + Send + 'static,
    {
        let (job_tx, mut job_rx) = mpsc::unbounded_channel::<PipelineJob>();
        let (result_tx, result_rx) = mpsc::unbounded_channel::<PipelineOutput>();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("datagrid-worker".to_string())
            .spawn(move || {
                debug!(target: "worker", "Worker thread started");
                while let Some(mut job) = job_rx.blocking_recv() {
                    let mut skipped = 0usize;
                    while let Ok(newer) = job_rx.try_recv() {
                        job = newer;
                        skipped += 1;
                    }
                    if skipped > 0 {
                        debug!(target: "worker", "Skipped {} superseded jobs, running #{}", skipped, job.sequence);
                    }
                    if thread_stop.load(Ordering::Acquire) {
                        break;
                    }

                    let sequence = job.sequence;
                    let result = panic::catch_unwind(AssertUnwindSafe(|| runner(&job)))
                        .map_err(|payload| panic_message(payload.as_ref()));
                    if result_tx.send(PipelineOutput { sequence, result }).is_err() {
                        break;
                    }
                }
                debug!(target: "worker", "Worker thread exiting");
            })
            .context("Failed to spawn pipeline worker thread")?;

        info!(target: "worker", "Spawned pipeline worker thread");
        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            handle: Some(handle),
            stop,
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

impl PipelineWorker for ThreadWorker {
    fn name(&self) -> &str {
        "thread"
    }

    fn submit(&mut self, job: PipelineJob) -> Result<()> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| anyhow!("worker has been shut down"))?;
        jobs.send(job)
            .map_err(|_| anyhow!("worker thread is no longer running"))
    }

    fn try_next(&mut self) -> WorkerPoll {
        match self.results.try_recv() {
            Ok(output) => WorkerPoll::Ready(output),
            Err(TryRecvError::Empty) => WorkerPoll::Pending,
            Err(TryRecvError::Disconnected) => WorkerPoll::Disconnected,
        }
    }

    /// Never waits for a running job: a busy thread is detached and exits
    /// once its current job ends.
    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        // Closing the job channel ends the thread's receive loop
        self.jobs.take();
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.is_finished() {
            if handle.join().is_err() {
                warn!(target: "worker", "Worker thread ended with a panic");
            }
        } else {
            debug!(target: "worker", "Detaching busy worker thread");
        }
    }
}

impl Drop for ThreadWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Debug, Default)]
struct DeferredState {
    queued: Vec<PipelineJob>,
    done: VecDeque<PipelineOutput>,
    reject_submissions: bool,
    disconnected: bool,
}

/// A worker that only finishes jobs when its [`DeferredHandle`] says so.
///
/// Lets callers decide completion order, which is how out-of-order
/// results are exercised.
#[derive(Debug)]
pub struct DeferredWorker {
    state: Arc<Mutex<DeferredState>>,
}

/// Controls the jobs held by a [`DeferredWorker`]
#[derive(Debug, Clone)]
pub struct DeferredHandle {
    state: Arc<Mutex<DeferredState>>,
}

fn lock(state: &Mutex<DeferredState>) -> MutexGuard<'_, DeferredState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DeferredWorker {
    pub fn new() -> (Self, DeferredHandle) {
        let state = Arc::new(Mutex::new(DeferredState::default()));
        let handle = DeferredHandle {
            state: Arc::clone(&state),
        };
        (Self { state }, handle)
    }
}

impl PipelineWorker for DeferredWorker {
    fn name(&self) -> &str {
        "deferred"
    }

    fn submit(&mut self, job: PipelineJob) -> Result<()> {
        let mut state = lock(&self.state);
        if state.reject_submissions {
            return Err(anyhow!("deferred worker is rejecting jobs"));
        }
        state.queued.push(job);
        Ok(())
    }

    fn try_next(&mut self) -> WorkerPoll {
        let mut state = lock(&self.state);
        match state.done.pop_front() {
            Some(output) => WorkerPoll::Ready(output),
            None if state.disconnected => WorkerPoll::Disconnected,
            None => WorkerPoll::Pending,
        }
    }
}

impl DeferredHandle {
    /// Sequence numbers of submitted jobs not yet finished, in submit order
    pub fn pending_sequences(&self) -> Vec<u64> {
        lock(&self.state).queued.iter().map(|j| j.sequence).collect()
    }

    /// Run the job with `sequence` now. Returns false if no such job is queued.
    pub fn complete(&self, sequence: u64) -> bool {
        let mut state = lock(&self.state);
        let Some(pos) = state.queued.iter().position(|j| j.sequence == sequence) else {
            return false;
        };
        let job = state.queued.remove(pos);
        let result = Ok(job.run());
        state.done.push_back(PipelineOutput { sequence, result });
        true
    }

    /// Finish every queued job in submit order
    pub fn complete_all(&self) {
        for sequence in self.pending_sequences() {
            self.complete(sequence);
        }
    }

    /// Answer the job with `sequence` with an error
    pub fn fail(&self, sequence: u64, message: &str) -> bool {
        let mut state = lock(&self.state);
        let Some(pos) = state.queued.iter().position(|j| j.sequence == sequence) else {
            return false;
        };
        state.queued.remove(pos);
        state.done.push_back(PipelineOutput {
            sequence,
            result: Err(message.to_string()),
        });
        true
    }

    /// Make further submissions fail as if the worker were unavailable
    pub fn reject_submissions(&self, reject: bool) {
        lock(&self.state).reject_submissions = reject;
    }

    /// Drop all queued jobs and report the worker as gone
    pub fn disconnect(&self) {
        let mut state = lock(&self.state);
        state.queued.clear();
        state.disconnected = true;
    }
}
