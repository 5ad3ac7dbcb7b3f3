//! Debug providers for the parts of a table engine

use crate::data::column::ColumnRegistry;
use crate::data::data_view::DataView;
use crate::debug::debug_trace::{priority, DebugSection, DebugSectionBuilder, DebugTrace};
use crate::pipeline::coordinator::PipelineCoordinator;
use crate::state::selection::SelectionManager;
use crate::ui::virtualizer::{ViewportWindow, Virtualizer};
use crate::utils::logging::LogRingBuffer;

/// How many rows of the view are listed in the report
const VIEW_SAMPLE: usize = 10;

pub struct PipelineDebugProvider<'a> {
    pub coordinator: &'a PipelineCoordinator,
}

impl DebugTrace for PipelineDebugProvider<'_> {
    fn name(&self) -> &str {
        "Pipeline"
    }

    fn debug_sections(&self) -> Vec<DebugSection> {
        let c = self.coordinator;
        let stats = c.stats();
        let mut builder = DebugSectionBuilder::new();
        builder.add_section("PIPELINE STATE", priority::PIPELINE);
        builder
            .add_field("Phase", c.phase())
            .add_field("Worker", c.worker_name())
            .add_field("Sequence", c.sequence())
            .add_field("Term", format!("{:?}", c.term()))
            .add_field("Pending Term", format!("{:?}", c.pending_term()))
            .add_field("Sort", format!("{:?}", c.sort()))
            .add_field("Rows", c.rows().len())
            .add_field("Columns", c.columns().len());

        builder.add_line("\n--- Counters ---");
        builder
            .add_field("Requests", stats.requests)
            .add_field("Applied", stats.applied)
            .add_field("Discarded (stale)", stats.discarded)
            .add_field("Worker Fallbacks", stats.fallbacks)
            .add_field("Filter Memo Hits", c.memo_hits());
        if let Some(elapsed) = stats.last_elapsed {
            builder.add_field("Last Compute", format!("{:?}", elapsed));
        }
        builder.build()
    }

    fn debug_summary(&self) -> Option<String> {
        Some(format!(
            "{} (request #{})",
            self.coordinator.phase(),
            self.coordinator.sequence()
        ))
    }
}

pub struct ViewDebugProvider<'a> {
    pub view: &'a DataView,
    pub columns: &'a ColumnRegistry,
}

impl DebugTrace for ViewDebugProvider<'_> {
    fn name(&self) -> &str {
        "View"
    }

    fn debug_sections(&self) -> Vec<DebugSection> {
        let view = self.view;
        let mut builder = DebugSectionBuilder::new();
        builder.add_section("VIEW STATE", priority::VIEW);
        builder
            .add_field("From Request", view.sequence())
            .add_field("Visible Rows", view.row_count())
            .add_field("Source Rows", view.source().len())
            .add_field("Filter", format!("{:?}", view.filter_term()))
            .add_field("Sort", format!("{:?}", view.sort_spec()));

        let visible: Vec<&str> = self.columns.visible_columns().map(|c| c.id.as_str()).collect();
        builder.add_line(format!("Columns: {}", visible.join(", ")));

        if !view.is_empty() {
            builder.add_line(format!("\nFirst {} rows:", VIEW_SAMPLE.min(view.row_count())));
            for (i, row) in view.rows().take(VIEW_SAMPLE).enumerate() {
                builder.add_line(format!("  [{:3}] {}", i, row.id()));
            }
        }
        builder.build()
    }
}

pub struct SelectionDebugProvider<'a> {
    pub selection: &'a SelectionManager,
    pub view: &'a DataView,
}

impl DebugTrace for SelectionDebugProvider<'_> {
    fn name(&self) -> &str {
        "Selection"
    }

    fn debug_sections(&self) -> Vec<DebugSection> {
        let store = self.view.source();
        let hidden = self
            .selection
            .selected()
            .iter()
            .filter(|id| !self.view.contains(id))
            .count();

        let mut builder = DebugSectionBuilder::new();
        builder.add_section("SELECTION STATE", priority::SELECTION);
        builder
            .add_field("Selected", self.selection.len())
            .add_field("Selectable Rows", store.selectable_count())
            .add_field("Hidden By Filter", hidden)
            .add_field("Header", format!("{:?}", self.selection.header_state(store)));
        builder.build()
    }
}

pub struct ViewportDebugProvider<'a> {
    pub virtualizer: &'a Virtualizer,
    pub window: Option<&'a ViewportWindow>,
}

impl DebugTrace for ViewportDebugProvider<'_> {
    fn name(&self) -> &str {
        "Viewport"
    }

    fn debug_sections(&self) -> Vec<DebugSection> {
        let v = self.virtualizer;
        let mut builder = DebugSectionBuilder::new();
        builder.add_section("VIEWPORT STATE", priority::VIEWPORT);
        builder
            .add_field("Row Height", v.row_height())
            .add_field("Viewport Height", v.viewport_height())
            .add_field("Requested Offset", v.scroll_offset());

        match self.window {
            Some(window) => {
                builder
                    .add_field("Effective Offset", window.scroll_offset)
                    .add_field("Total Extent", window.total_extent)
                    .add_field(
                        "Window",
                        format!(
                            "{}..{} of {}",
                            window.first_index,
                            window.first_index + window.entries.len(),
                            window.entry_count
                        ),
                    );
                if window.is_no_data() {
                    builder.add_line("Showing no-data placeholder");
                }
            }
            None => {
                builder.add_line("No window emitted yet");
            }
        }
        builder.build()
    }
}

pub struct EventsDebugProvider<'a> {
    pub history: &'a [String],
    pub logs: Option<LogRingBuffer>,
}

impl DebugTrace for EventsDebugProvider<'_> {
    fn name(&self) -> &str {
        "Events"
    }

    fn debug_sections(&self) -> Vec<DebugSection> {
        let mut builder = DebugSectionBuilder::new();
        builder.add_section("RECENT EVENTS", priority::EVENTS);
        for line in self.history.iter().rev().take(20) {
            builder.add_line(format!("  {}", line));
        }

        if let Some(logs) = &self.logs {
            builder.add_section("RECENT LOGS", priority::LOGS);
            for entry in logs.get_recent(20) {
                builder.add_line(entry.format_for_display());
            }
        }
        builder.build()
    }
}
