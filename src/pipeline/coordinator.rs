//! Request sequencing, debouncing and settle timing for the view pipeline.
//!
//! The coordinator is a polled state machine. Inputs record what changed
//! and, for structural changes, issue a request straight away; search input
//! waits for the debounce window first. [`PipelineCoordinator::poll`] then
//! fires due timers, drains the worker and hands back a new [`DataView`]
//! once its minimum latency has elapsed.
//!
//! Every request takes the next sequence number. A result is only kept if
//! its sequence still equals the latest one issued, so a slow older request
//! can never replace the output of a newer one.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::data::column::ColumnRegistry;
use crate::data::data_view::DataView;
use crate::data::datatable::RowStore;
use crate::data::sort::SortSpec;
use crate::debouncer::Debouncer;
use crate::pipeline::memo::{FilterKey, FilterMemo};
use crate::pipeline::request::{PipelineJob, PipelineOutput};
use crate::pipeline::worker::{InlineWorker, PipelineWorker, WorkerPoll};
use crate::utils::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Nothing pending
    Idle,
    /// Search input is waiting out its quiet period
    Debouncing,
    /// A request is with the worker
    Computing,
    /// A result is ready and waiting for its minimum latency
    Settling,
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelinePhase::Idle => "Idle",
            PipelinePhase::Debouncing => "Debouncing",
            PipelinePhase::Computing => "Computing",
            PipelinePhase::Settling => "Settling",
        };
        write!(f, "{}", name)
    }
}

/// Counters for the debug report
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub requests: u64,
    pub applied: u64,
    pub discarded: u64,
    pub fallbacks: u64,
    pub last_elapsed: Option<Duration>,
}

/// The latest issued request, kept until its result arrives
struct InFlight {
    job: PipelineJob,
    key: FilterKey,
    issued_at: Instant,
}

/// A computed view held back until `ready_at`
struct Settling {
    view: DataView,
    ready_at: Instant,
}

pub struct PipelineCoordinator {
    clock: Arc<dyn Clock>,
    worker: Box<dyn PipelineWorker>,
    debouncer: Debouncer,
    min_latency: Duration,

    // Current inputs
    rows: RowStore,
    columns: ColumnRegistry,
    sort: SortSpec,
    term: String,
    pending_term: Option<String>,

    sequence: u64,
    in_flight: Option<InFlight>,
    settling: Option<Settling>,
    memo: FilterMemo,
    stats: PipelineStats,
    disposed: bool,
}

impl PipelineCoordinator {
    pub fn new(
        clock: Arc<dyn Clock>,
        worker: Box<dyn PipelineWorker>,
        debounce: Duration,
        min_latency: Duration,
    ) -> Self {
        debug!(
            target: "pipeline",
            "Coordinator using '{}' worker, debounce {:?}, min latency {:?}",
            worker.name(),
            debounce,
            min_latency
        );
        Self {
            clock,
            worker,
            debouncer: Debouncer::with_delay(debounce),
            min_latency,
            rows: RowStore::empty(),
            columns: ColumnRegistry::empty(),
            sort: SortSpec::natural(),
            term: String::new(),
            pending_term: None,
            sequence: 0,
            in_flight: None,
            settling: None,
            memo: FilterMemo::new(),
            stats: PipelineStats::default(),
            disposed: false,
        }
    }

    // ========== Inputs ==========

    /// Replace the row snapshot and recompute immediately
    pub fn set_rows(&mut self, rows: RowStore) {
        self.rows = rows;
        self.request("rows replaced");
    }

    /// Replace the schema. Drops the filter memo and installs `sort`.
    pub fn set_columns(&mut self, columns: ColumnRegistry, sort: SortSpec) {
        self.columns = columns;
        self.sort = sort;
        self.memo.clear();
        self.request("columns replaced");
    }

    pub fn set_sort(&mut self, sort: SortSpec) {
        if sort == self.sort {
            return;
        }
        self.sort = sort;
        self.request("sort changed");
    }

    /// Record search input; the term takes effect after the quiet period
    pub fn set_search_term(&mut self, term: impl Into<String>) {
        if self.disposed {
            return;
        }
        self.pending_term = Some(term.into());
        self.debouncer.trigger(self.clock.now());
    }

    // ========== Driving ==========

    /// Advance timers and worker results.
    ///
    /// Returns the new view when one lands on this call.
    pub fn poll(&mut self) -> Option<DataView> {
        if self.disposed {
            return None;
        }
        let now = self.clock.now();

        if self.debouncer.should_execute(now) {
            if let Some(term) = self.pending_term.take() {
                if term != self.term {
                    self.term = term;
                    self.request("search term");
                } else {
                    debug!(target: "pipeline", "Debounced term unchanged, no request");
                }
            }
        }

        self.drain_worker();

        let ready = self
            .settling
            .as_ref()
            .is_some_and(|settling| now >= settling.ready_at);
        if !ready {
            return None;
        }
        let settling = self.settling.take()?;
        self.stats.applied += 1;
        debug!(
            target: "pipeline",
            "Applied view #{} ({} rows)",
            settling.view.sequence(),
            settling.view.row_count()
        );
        Some(settling.view)
    }

    /// When `poll` next has timed work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        let settle = self.settling.as_ref().map(|s| s.ready_at);
        match (self.debouncer.deadline(), settle) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn phase(&self) -> PipelinePhase {
        if self.settling.is_some() {
            PipelinePhase::Settling
        } else if self.in_flight.is_some() {
            PipelinePhase::Computing
        } else if self.debouncer.is_pending() {
            PipelinePhase::Debouncing
        } else {
            PipelinePhase::Idle
        }
    }

    /// Shut the worker down. Later inputs and polls do nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.worker.shutdown();
        self.debouncer.reset();
        self.pending_term = None;
        self.in_flight = None;
        self.settling = None;
        self.disposed = true;
        info!(target: "pipeline", "Coordinator disposed after {} requests", self.stats.requests);
    }

    // ========== Queries ==========

    pub fn rows(&self) -> &RowStore {
        &self.rows
    }

    pub fn columns(&self) -> &ColumnRegistry {
        &self.columns
    }

    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    /// The term the current view is (or will be) derived from
    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn pending_term(&self) -> Option<&str> {
        self.pending_term.as_deref()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn worker_name(&self) -> &str {
        self.worker.name()
    }

    pub fn memo_hits(&self) -> u64 {
        self.memo.hits()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // ========== Internals ==========

    fn request(&mut self, reason: &str) {
        if self.disposed {
            return;
        }

        self.sequence += 1;
        self.stats.requests += 1;
        // A result still settling is now stale
        self.settling = None;

        let key = FilterKey::new(self.rows.generation(), self.columns.generation(), &self.term);
        let job = PipelineJob {
            sequence: self.sequence,
            rows: self.rows.clone(),
            columns: self.columns.clone(),
            term: self.term.clone(),
            sort: self.sort.clone(),
            cached_filter: self.memo.get(&key),
        };

        crate::trace_request!(self.sequence, reason);
        self.in_flight = Some(InFlight {
            job: job.clone(),
            key,
            issued_at: self.clock.now(),
        });

        if let Err(e) = self.worker.submit(job.clone()) {
            self.fall_back(&format!("submit failed: {}", e));
            self.submit_inline(job);
        }
    }

    fn drain_worker(&mut self) {
        loop {
            match self.worker.try_next() {
                WorkerPoll::Ready(output) => self.accept(output),
                WorkerPoll::Pending => break,
                WorkerPoll::Disconnected => {
                    self.fall_back("worker disconnected");
                    if let Some(job) = self.in_flight.as_ref().map(|f| f.job.clone()) {
                        self.submit_inline(job);
                    }
                }
            }
        }
    }

    fn accept(&mut self, output: PipelineOutput) {
        if output.sequence != self.sequence {
            self.stats.discarded += 1;
            debug!(
                target: "pipeline",
                "Discarding stale result #{} (current #{})",
                output.sequence,
                self.sequence
            );
            return;
        }

        let result = match output.result {
            Ok(result) => result,
            Err(message) => {
                self.fall_back(&format!("job #{} failed: {}", output.sequence, message));
                if let Some(job) = self.in_flight.as_ref().map(|f| f.job.clone()) {
                    self.submit_inline(job);
                }
                return;
            }
        };

        let Some(in_flight) = self.in_flight.take() else {
            return;
        };

        if !result.filter_cached {
            self.memo.store(in_flight.key, Arc::clone(&result.filtered));
        }
        self.stats.last_elapsed = Some(result.elapsed);

        let job = in_flight.job;
        let view = DataView::from_parts(job.rows, result.ordered, job.term, job.sort, job.sequence);
        debug!(
            target: "pipeline",
            "Result #{} computed in {:?} (filter cached: {})",
            job.sequence,
            result.elapsed,
            result.filter_cached
        );
        self.settling = Some(Settling {
            view,
            ready_at: in_flight.issued_at + self.min_latency,
        });
    }

    /// Replace the worker with synchronous execution for good
    fn fall_back(&mut self, why: &str) {
        self.stats.fallbacks += 1;
        warn!(
            target: "worker",
            "Worker '{}' unavailable ({}), computing synchronously",
            self.worker.name(),
            why
        );
        self.worker.shutdown();
        self.worker = Box::new(InlineWorker::new());
    }

    fn submit_inline(&mut self, job: PipelineJob) {
        // InlineWorker::submit cannot fail
        if let Err(e) = self.worker.submit(job) {
            warn!(target: "worker", "Synchronous recompute failed: {}", e);
        }
    }
}

impl Drop for PipelineCoordinator {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::column::ColumnDef;
    use crate::data::datatable::Row;
    use crate::data::sort::SortDirection;
    use crate::pipeline::worker::{DeferredHandle, DeferredWorker};
    use crate::utils::clock::ManualClock;

    fn rows() -> RowStore {
        RowStore::new(vec![
            Row::new(1).with("name", "Bravo"),
            Row::new(2).with("name", "alpha"),
            Row::new(3).with("name", "Charlie"),
        ])
    }

    fn columns() -> ColumnRegistry {
        ColumnRegistry::new(vec![ColumnDef::new("name", "Name").sortable()]).unwrap()
    }

    fn inline(clock: &ManualClock) -> PipelineCoordinator {
        PipelineCoordinator::new(
            Arc::new(clock.clone()),
            Box::new(InlineWorker::new()),
            Duration::from_millis(100),
            Duration::from_millis(100),
        )
    }

    fn deferred(clock: &ManualClock) -> (PipelineCoordinator, DeferredHandle) {
        let (worker, handle) = DeferredWorker::new();
        let coordinator = PipelineCoordinator::new(
            Arc::new(clock.clone()),
            Box::new(worker),
            Duration::from_millis(100),
            Duration::from_millis(100),
        );
        (coordinator, handle)
    }

    fn names(view: &DataView) -> Vec<String> {
        view.rows()
            .map(|r| r.get("name").unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_min_latency_holds_fast_result() {
        let clock = ManualClock::new();
        let mut c = inline(&clock);
        c.set_columns(columns(), SortSpec::natural());
        c.set_rows(rows());

        assert_eq!(c.phase(), PipelinePhase::Computing);
        clock.advance_ms(10);
        assert!(c.poll().is_none());
        assert_eq!(c.phase(), PipelinePhase::Settling);

        clock.advance_ms(89);
        assert!(c.poll().is_none());
        clock.advance_ms(1);
        let view = c.poll().unwrap();
        assert_eq!(view.row_count(), 3);
        assert_eq!(c.phase(), PipelinePhase::Idle);
    }

    #[test]
    fn test_search_is_debounced() {
        let clock = ManualClock::new();
        let mut c = inline(&clock);
        c.set_columns(columns(), SortSpec::natural());
        c.set_rows(rows());
        let before = c.sequence();

        c.set_search_term("c");
        clock.advance_ms(50);
        c.set_search_term("ch");
        clock.advance_ms(99);
        c.poll();
        assert_eq!(c.sequence(), before);
        assert_eq!(c.term(), "");

        clock.advance_ms(1);
        c.poll();
        assert_eq!(c.sequence(), before + 1);
        assert_eq!(c.term(), "ch");

        clock.advance_ms(100);
        let view = c.poll().unwrap();
        assert_eq!(names(&view), vec!["Charlie"]);
    }

    #[test]
    fn test_unchanged_debounced_term_issues_nothing() {
        let clock = ManualClock::new();
        let mut c = inline(&clock);
        c.set_rows(rows());
        let before = c.sequence();

        c.set_search_term("x");
        c.set_search_term("");
        clock.advance_ms(100);
        c.poll();
        assert_eq!(c.sequence(), before);
    }

    #[test]
    fn test_stale_result_is_discarded() {
        let clock = ManualClock::new();
        let (mut c, handle) = deferred(&clock);
        c.set_columns(columns(), SortSpec::natural());
        handle.complete_all();
        clock.advance_ms(100);
        c.poll();

        c.set_rows(rows());
        c.set_sort(SortSpec::by("name", SortDirection::Ascending));
        let pending = handle.pending_sequences();
        assert_eq!(pending.len(), 2);

        // Newer request finishes first, older one after
        handle.complete(pending[1]);
        handle.complete(pending[0]);
        clock.advance_ms(100);
        let view = c.poll().unwrap();
        assert_eq!(view.sequence(), pending[1]);
        assert_eq!(names(&view), vec!["alpha", "Bravo", "Charlie"]);
        assert_eq!(c.stats().discarded, 1);
        assert!(c.poll().is_none());
    }

    #[test]
    fn test_new_request_supersedes_settling_view() {
        let clock = ManualClock::new();
        let mut c = inline(&clock);
        c.set_columns(columns(), SortSpec::natural());
        c.set_rows(rows());
        c.poll();
        assert_eq!(c.phase(), PipelinePhase::Settling);

        clock.advance_ms(50);
        c.set_sort(SortSpec::by("name", SortDirection::Descending));
        clock.advance_ms(60);
        assert!(c.poll().is_none());
        clock.advance_ms(40);
        let view = c.poll().unwrap();
        assert_eq!(names(&view), vec!["Charlie", "Bravo", "alpha"]);
    }

    #[test]
    fn test_worker_error_falls_back_to_inline() {
        let clock = ManualClock::new();
        let (mut c, handle) = deferred(&clock);
        c.set_columns(columns(), SortSpec::natural());
        c.set_rows(rows());
        for seq in handle.pending_sequences() {
            handle.fail(seq, "worker crashed");
        }

        clock.advance_ms(100);
        let view = c.poll().unwrap();
        assert_eq!(view.row_count(), 3);
        assert_eq!(c.worker_name(), "inline");
        assert_eq!(c.stats().fallbacks, 1);
    }

    #[test]
    fn test_rejected_submit_falls_back() {
        let clock = ManualClock::new();
        let (mut c, handle) = deferred(&clock);
        handle.reject_submissions(true);
        c.set_rows(rows());
        assert_eq!(c.worker_name(), "inline");

        clock.advance_ms(100);
        assert_eq!(c.poll().unwrap().row_count(), 3);
    }

    #[test]
    fn test_disconnected_worker_recomputes_in_flight() {
        let clock = ManualClock::new();
        let (mut c, handle) = deferred(&clock);
        c.set_rows(rows());
        handle.disconnect();

        clock.advance_ms(100);
        assert_eq!(c.poll().unwrap().row_count(), 3);
    }

    #[test]
    fn test_sort_only_change_reuses_filter() {
        let clock = ManualClock::new();
        let mut c = inline(&clock);
        c.set_columns(columns(), SortSpec::natural());
        c.set_rows(rows());
        c.poll();
        assert_eq!(c.memo_hits(), 0);

        c.set_sort(SortSpec::by("name", SortDirection::Ascending));
        assert_eq!(c.memo_hits(), 1);

        c.set_columns(columns(), SortSpec::natural());
        assert_eq!(c.memo_hits(), 1);
    }

    #[test]
    fn test_dispose_stops_pipeline() {
        let clock = ManualClock::new();
        let mut c = inline(&clock);
        c.dispose();
        c.set_rows(rows());
        clock.advance_ms(200);
        assert!(c.poll().is_none());
        assert_eq!(c.phase(), PipelinePhase::Idle);
        assert!(c.is_disposed());
    }

    #[test]
    fn test_next_deadline_tracks_timers() {
        let clock = ManualClock::new();
        let mut c = inline(&clock);
        assert!(c.next_deadline().is_none());

        let start = clock.now();
        c.set_search_term("a");
        assert_eq!(c.next_deadline(), Some(start + Duration::from_millis(100)));
        assert_eq!(c.phase(), PipelinePhase::Debouncing);
    }
}
