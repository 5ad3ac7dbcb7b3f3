//! The request/result messages exchanged with a pipeline worker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::data::column::ColumnRegistry;
use crate::data::datatable::RowStore;
use crate::data::filter::filter_indices;
use crate::data::sort::{sort_indices, SortSpec};

/// One filter+sort unit of work.
///
/// Owns snapshots of its inputs. Row store and registry are immutable and
/// shared by `Arc`, so handing a job to another thread never aliases state
/// the coordinator can still change.
#[derive(Debug, Clone)]
pub struct PipelineJob {
    pub sequence: u64,
    pub rows: RowStore,
    pub columns: ColumnRegistry,
    pub term: String,
    pub sort: SortSpec,
    /// Filter output from the memo, when the key matched
    pub cached_filter: Option<Arc<Vec<usize>>>,
}

impl PipelineJob {
    /// Run filter then sort
    pub fn run(&self) -> PipelineResult {
        let start = Instant::now();

        let filter_cached = self.cached_filter.is_some();
        let filtered = match &self.cached_filter {
            Some(cached) => Arc::clone(cached),
            None => Arc::new(filter_indices(&self.rows, &self.columns, &self.term)),
        };

        let ordered = sort_indices(
            &self.rows,
            &self.columns,
            &filtered,
            self.sort.column.as_deref(),
            self.sort.direction,
        );

        PipelineResult {
            filtered,
            ordered,
            filter_cached,
            elapsed: start.elapsed(),
        }
    }
}

/// Output of a completed job
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Filter stage output, kept for the memo
    pub filtered: Arc<Vec<usize>>,
    /// Final display order
    pub ordered: Vec<usize>,
    pub filter_cached: bool,
    pub elapsed: Duration,
}

/// What a worker sends back, tagged with the request it answers
#[derive(Debug)]
pub struct PipelineOutput {
    pub sequence: u64,
    pub result: Result<PipelineResult, String>,
}
