//! The table engine facade.
//!
//! `TableEngine` wires the row store, column registry, pipeline
//! coordinator, selection manager and virtualizer together and exposes them
//! to a data source and a view surface. All input methods are synchronous;
//! the only asynchronous part is the pipeline, which advances on
//! [`TableEngine::poll`] (or [`TableEngine::settle`] on a tokio runtime).

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::data::column::{ColumnDef, ColumnRegistry};
use crate::data::data_view::DataView;
use crate::data::datatable::{Row, RowId, RowStore};
use crate::data::datatable_loaders::{load_csv_rows, load_json_rows};
use crate::data::sort::{SortDirection, SortSpec};
use crate::debug::{
    render_report, EventsDebugProvider, PipelineDebugProvider, SelectionDebugProvider,
    ViewDebugProvider, ViewportDebugProvider,
};
use crate::pipeline::coordinator::{PipelineCoordinator, PipelinePhase};
use crate::pipeline::worker::{InlineWorker, PipelineWorker, ThreadWorker};
use crate::state::dispatcher::{EventDispatcher, SubscriptionId};
use crate::state::events::{EngineEvent, EventKind};
use crate::state::selection::{HeaderCheckState, SelectionManager};
use crate::ui::virtualizer::{ViewportWindow, Virtualizer};
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::logging::get_log_buffer;

/// Longest `settle` sleeps between checks while a worker is computing
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(2);

pub struct TableEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    coordinator: PipelineCoordinator,

    /// Last applied view
    view: DataView,
    selection: SelectionManager,
    virtualizer: Virtualizer,
    dispatcher: EventDispatcher,
    last_window: Option<ViewportWindow>,

    /// Most recent typed search input
    typed_term: String,
    /// Externally owned filter; wins over typed input while non-empty
    filter: String,
}

impl TableEngine {
    /// Engine on the system clock, with a worker thread when configured
    pub fn new(config: EngineConfig) -> Result<Self> {
        let worker: Box<dyn PipelineWorker> = if config.pipeline.use_worker {
            match ThreadWorker::spawn() {
                Ok(worker) => Box::new(worker),
                Err(e) => {
                    warn!(target: "worker", "Worker unavailable ({}), computing synchronously", e);
                    Box::new(InlineWorker::new())
                }
            }
        } else {
            Box::new(InlineWorker::new())
        };
        Self::with_runtime(config, Arc::new(SystemClock), worker)
    }

    /// Engine with an explicit clock and worker
    pub fn with_runtime(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        worker: Box<dyn PipelineWorker>,
    ) -> Result<Self> {
        config.validate()?;

        let coordinator = PipelineCoordinator::new(
            Arc::clone(&clock),
            worker,
            config.pipeline.debounce(),
            config.pipeline.min_latency(),
        );
        let virtualizer = Virtualizer::new(config.viewport.row_height, config.viewport.overscan)
            .with_no_data_text(config.table.no_data_text.clone())
            .with_append_row(config.table.append_row.clone())
            .with_fab(config.table.has_fab);

        info!(target: "engine", "Table engine created ({} worker)", coordinator.worker_name());
        Ok(Self {
            config,
            clock,
            coordinator,
            view: DataView::empty(),
            selection: SelectionManager::new(),
            virtualizer,
            dispatcher: EventDispatcher::new(),
            last_window: None,
            typed_term: String::new(),
            filter: String::new(),
        })
    }

    // ========== Data source input ==========

    /// Replace all rows. Recomputes immediately; duplicate ids keep the
    /// first occurrence.
    pub fn set_rows(&mut self, rows: Vec<Row>) {
        self.set_row_store(RowStore::new(rows));
    }

    pub fn set_row_store(&mut self, store: RowStore) {
        debug!(target: "engine", "Row store replaced ({} rows)", store.len());
        if self.selection.prune(&store) {
            self.emit_selection();
        }
        self.coordinator.set_rows(store);
    }

    /// Load rows from a JSON array of objects
    pub fn set_rows_from_json(&mut self, json: &str, id_field: &str) -> Result<()> {
        let rows = load_json_rows(json, id_field)?;
        self.set_rows(rows);
        Ok(())
    }

    /// Load rows from CSV text with a header line
    pub fn set_rows_from_csv(&mut self, csv: &str, id_field: &str) -> Result<()> {
        let rows = load_csv_rows(csv.as_bytes(), id_field)?;
        self.set_rows(rows);
        Ok(())
    }

    /// Replace the schema. Resets sorting to natural order (or the schema's
    /// declared default) and drops cached filter results.
    ///
    /// Duplicate column ids are rejected and leave the engine unchanged.
    pub fn set_columns(&mut self, columns: Vec<ColumnDef>) -> Result<()> {
        let registry = ColumnRegistry::new(columns)?;
        let sort = SortSpec::initial_for(&registry);
        debug!(target: "engine", "Columns replaced ({}), sort reset to {:?}", registry.len(), sort);
        self.coordinator.set_columns(registry, sort);
        Ok(())
    }

    // ========== View surface input ==========

    /// Typed search input, debounced. Ignored while a filter is set.
    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.typed_term = term.into();
        if !self.filter.is_empty() {
            debug!(target: "engine", "Search input ignored while filter is set");
            return;
        }
        self.coordinator.set_search_term(self.typed_term.clone());
    }

    /// Programmatic filter, debounced like typed input. Clearing it falls
    /// back to the last typed term.
    pub fn set_filter(&mut self, term: impl Into<String>) {
        self.filter = term.into();
        let effective = if self.filter.is_empty() {
            self.typed_term.clone()
        } else {
            self.filter.clone()
        };
        self.coordinator.set_search_term(effective);
    }

    pub fn set_scroll(&mut self, offset: f64, viewport_height: f64) {
        if self.virtualizer.set_scroll(offset, viewport_height) {
            self.refresh_window();
        }
    }

    pub fn reset_scroll(&mut self) {
        if self.virtualizer.reset_scroll() {
            self.refresh_window();
        }
    }

    /// Put the entry at `index` at the top of the viewport
    pub fn scroll_to_row(&mut self, index: usize) {
        if self.virtualizer.scroll_to_row(index) {
            self.refresh_window();
        }
    }

    /// Header click. Returns false for unknown or unsortable columns.
    pub fn toggle_sort(&mut self, column_id: &str) -> bool {
        let mut sort = self.coordinator.sort().clone();
        if !sort.toggle(column_id, self.coordinator.columns()) {
            return false;
        }
        let direction = sort.direction;
        self.coordinator.set_sort(sort);
        self.dispatcher.dispatch(EngineEvent::SortingChanged {
            column: column_id.to_string(),
            direction,
        });
        true
    }

    pub fn toggle_row_selected(&mut self, id: &RowId) -> bool {
        if !self.config.table.selectable {
            return false;
        }
        let changed = self.selection.toggle_row(self.coordinator.rows(), id);
        if changed {
            self.selection_changed();
        }
        changed
    }

    /// Header checkbox: true selects every selectable row, false clears
    pub fn toggle_select_all(&mut self, checked: bool) -> bool {
        if !self.config.table.selectable {
            return false;
        }
        let changed = self.selection.set_all(self.coordinator.rows(), checked);
        if changed {
            self.selection_changed();
        }
        changed
    }

    pub fn clear_selection(&mut self) -> bool {
        self.toggle_select_all(false)
    }

    /// Row click. Emits `RowActivated` for data rows of a clickable table.
    pub fn activate_row(&mut self, id: &RowId) -> bool {
        if !self.config.table.clickable || !self.view.contains(id) {
            return false;
        }
        self.dispatcher
            .dispatch(EngineEvent::RowActivated(id.clone()));
        true
    }

    // ========== Driving ==========

    /// Advance the pipeline. Returns true when a new view was applied.
    pub fn poll(&mut self) -> bool {
        match self.coordinator.poll() {
            Some(view) => {
                self.view = view;
                self.refresh_window();
                true
            }
            None => false,
        }
    }

    /// Poll until the pipeline is idle, sleeping on the tokio timer in
    /// between. Only meaningful with a clock that moves on its own.
    pub async fn settle(&mut self) {
        loop {
            self.poll();
            let phase = self.phase();
            if phase == PipelinePhase::Idle {
                break;
            }

            let now = self.clock.now();
            let until_deadline = self
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(now));
            let wait = match (phase, until_deadline) {
                (PipelinePhase::Computing, Some(d)) => d.min(WORKER_POLL_INTERVAL),
                (_, Some(d)) => d,
                (_, None) => WORKER_POLL_INTERVAL,
            };
            tokio::time::sleep(wait).await;
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.coordinator.next_deadline()
    }

    pub fn phase(&self) -> PipelinePhase {
        self.coordinator.phase()
    }

    pub fn is_loading(&self) -> bool {
        matches!(
            self.phase(),
            PipelinePhase::Computing | PipelinePhase::Settling
        )
    }

    /// Shut the worker down; the pipeline ignores input afterwards
    pub fn dispose(&mut self) {
        self.coordinator.dispose();
    }

    // ========== Queries ==========

    pub fn view(&self) -> &DataView {
        &self.view
    }

    /// Current window over the view
    pub fn window(&self) -> ViewportWindow {
        self.virtualizer.window(&self.view, &self.selection)
    }

    pub fn header_check_state(&self) -> HeaderCheckState {
        self.selection.header_state(self.coordinator.rows())
    }

    pub fn selection(&self) -> &[RowId] {
        self.selection.selected()
    }

    pub fn is_selected(&self, id: &RowId) -> bool {
        self.selection.is_selected(id)
    }

    pub fn rows(&self) -> &RowStore {
        self.coordinator.rows()
    }

    pub fn columns(&self) -> &ColumnRegistry {
        self.coordinator.columns()
    }

    pub fn visible_columns(&self) -> Vec<&ColumnDef> {
        self.coordinator.columns().visible_columns().collect()
    }

    pub fn has_filterable(&self) -> bool {
        self.coordinator.columns().has_filterable()
    }

    pub fn sort(&self) -> &SortSpec {
        self.coordinator.sort()
    }

    /// Direction shown on a column header, if it is the sorted column
    pub fn sort_direction_for(&self, column_id: &str) -> Option<SortDirection> {
        let sort = self.coordinator.sort();
        if sort.column.as_deref() == Some(column_id) {
            sort.direction
        } else {
            None
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========== Listeners ==========

    pub fn on_view_changed<F>(&mut self, mut listener: F) -> SubscriptionId
    where
        F: FnMut(&ViewportWindow) + Send + 'static,
    {
        self.dispatcher
            .subscribe_fn(EventKind::ViewChanged, move |event| {
                if let EngineEvent::ViewChanged(window) = event {
                    listener(window);
                }
            })
    }

    pub fn on_selection_changed<F>(&mut self, mut listener: F) -> SubscriptionId
    where
        F: FnMut(&[RowId]) + Send + 'static,
    {
        self.dispatcher
            .subscribe_fn(EventKind::SelectionChanged, move |event| {
                if let EngineEvent::SelectionChanged(ids) = event {
                    listener(ids);
                }
            })
    }

    pub fn on_sorting_changed<F>(&mut self, mut listener: F) -> SubscriptionId
    where
        F: FnMut(&str, Option<SortDirection>) + Send + 'static,
    {
        self.dispatcher
            .subscribe_fn(EventKind::SortingChanged, move |event| {
                if let EngineEvent::SortingChanged { column, direction } = event {
                    listener(column, *direction);
                }
            })
    }

    pub fn on_row_activated<F>(&mut self, mut listener: F) -> SubscriptionId
    where
        F: FnMut(&RowId) + Send + 'static,
    {
        self.dispatcher
            .subscribe_fn(EventKind::RowActivated, move |event| {
                if let EngineEvent::RowActivated(id) = event {
                    listener(id);
                }
            })
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    // ========== Debug ==========

    pub fn debug_report(&self) -> String {
        let window = self.last_window.as_ref();
        render_report(&[
            &PipelineDebugProvider {
                coordinator: &self.coordinator,
            },
            &ViewDebugProvider {
                view: &self.view,
                columns: self.coordinator.columns(),
            },
            &SelectionDebugProvider {
                selection: &self.selection,
                view: &self.view,
            },
            &ViewportDebugProvider {
                virtualizer: &self.virtualizer,
                window,
            },
            &EventsDebugProvider {
                history: self.dispatcher.get_event_history(),
                logs: get_log_buffer(),
            },
        ])
    }

    // ========== Internals ==========

    fn selection_changed(&mut self) {
        self.emit_selection();
        self.refresh_window();
    }

    fn emit_selection(&mut self) {
        let ids = self.selection.selected().to_vec();
        self.dispatcher.dispatch(EngineEvent::SelectionChanged(ids));
    }

    /// Recompute the window and notify if it differs from the last one
    fn refresh_window(&mut self) {
        let window = self.window();
        if self.last_window.as_ref() == Some(&window) {
            return;
        }
        self.last_window = Some(window.clone());
        self.dispatcher.dispatch(EngineEvent::ViewChanged(window));
    }
}

impl Drop for TableEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}
