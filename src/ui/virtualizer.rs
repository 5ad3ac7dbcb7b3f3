/// Virtualizer - a scroll window over the derived view
///
/// Maps a scroll offset and viewport height onto the slice of view entries
/// that intersect the viewport, so rendering cost stays independent of the
/// total row count.
///
/// Architecture:
/// RowStore (immutable snapshot)
///     → DataView (filtered/sorted positions)
///         → Virtualizer (visible window + synthetic rows)
///             → View surface (pixels, out of scope)
use std::ops::Range;
use tracing::{debug, warn};

use crate::data::data_view::DataView;
use crate::data::datatable::Row;
use crate::state::selection::SelectionManager;

const FALLBACK_ROW_HEIGHT: f64 = 52.0;

/// One renderable line of the table body
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEntry {
    /// A data row at a display position in the view
    Row {
        view_index: usize,
        row: Row,
        selected: bool,
    },
    /// Pinned trailer, e.g. an "add new" affordance
    Append { label: String },
    /// Empty row reserving space for a floating action button
    Spacer,
    /// Sole entry when the view has no rows
    NoData { text: String },
}

impl ViewEntry {
    pub fn is_data(&self) -> bool {
        matches!(self, ViewEntry::Row { .. })
    }
}

/// An entry positioned in the scroll container
#[derive(Debug, Clone, PartialEq)]
pub struct WindowEntry {
    /// Position among all entries (data rows then synthetic rows)
    pub index: usize,
    /// Offset of the entry's top edge from the start of the list
    pub top: f64,
    pub entry: ViewEntry,
}

/// What the view surface renders
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportWindow {
    pub entries: Vec<WindowEntry>,
    /// Height of the whole list, for sizing the scrollbar
    pub total_extent: f64,
    pub first_index: usize,
    /// Number of entries in the whole list
    pub entry_count: usize,
    /// Offset actually used, clamped to the scrollable range
    pub scroll_offset: f64,
    pub viewport_height: f64,
    pub row_height: f64,
}

impl ViewportWindow {
    pub fn data_rows(&self) -> impl Iterator<Item = &Row> {
        self.entries.iter().filter_map(|e| match &e.entry {
            ViewEntry::Row { row, .. } => Some(row),
            _ => None,
        })
    }

    pub fn is_no_data(&self) -> bool {
        matches!(
            self.entries.as_slice(),
            [WindowEntry {
                entry: ViewEntry::NoData { .. },
                ..
            }]
        )
    }
}

#[derive(Debug, Clone)]
pub struct Virtualizer {
    row_height: f64,
    overscan: usize,

    /// Offset requested by the caller; survives view changes
    scroll_offset: f64,
    viewport_height: f64,

    no_data_text: String,
    append_label: Option<String>,
    has_fab: bool,
}

impl Virtualizer {
    pub fn new(row_height: f64, overscan: usize) -> Self {
        let row_height = if row_height.is_finite() && row_height > 0.0 {
            row_height
        } else {
            warn!(target: "viewport", "Invalid row height {}, using {}", row_height, FALLBACK_ROW_HEIGHT);
            FALLBACK_ROW_HEIGHT
        };
        Self {
            row_height,
            overscan,
            scroll_offset: 0.0,
            viewport_height: 0.0,
            no_data_text: "No data".to_string(),
            append_label: None,
            has_fab: false,
        }
    }

    pub fn with_no_data_text(mut self, text: impl Into<String>) -> Self {
        self.no_data_text = text.into();
        self
    }

    pub fn with_append_row(mut self, label: Option<String>) -> Self {
        self.append_label = label;
        self
    }

    pub fn with_fab(mut self, has_fab: bool) -> Self {
        self.has_fab = has_fab;
        self
    }

    /// Update scroll position and viewport size. Returns whether either changed.
    pub fn set_scroll(&mut self, offset: f64, viewport_height: f64) -> bool {
        let offset = sanitize(offset);
        let viewport_height = sanitize(viewport_height);
        let changed = offset != self.scroll_offset || viewport_height != self.viewport_height;
        self.scroll_offset = offset;
        self.viewport_height = viewport_height;
        changed
    }

    pub fn reset_scroll(&mut self) -> bool {
        let changed = self.scroll_offset != 0.0;
        self.scroll_offset = 0.0;
        changed
    }

    /// Scroll so the entry at `index` is at the top of the viewport
    pub fn scroll_to_row(&mut self, index: usize) -> bool {
        let offset = index as f64 * self.row_height;
        let changed = offset != self.scroll_offset;
        self.scroll_offset = offset;
        changed
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    pub fn row_height(&self) -> f64 {
        self.row_height
    }

    /// Number of entries for a view with `data_rows` rows
    pub fn entry_count(&self, data_rows: usize) -> usize {
        if data_rows == 0 {
            return 1;
        }
        data_rows + usize::from(self.append_label.is_some()) + usize::from(self.has_fab)
    }

    /// Offset clamped to the scrollable range of `entry_count` entries
    pub fn effective_offset(&self, entry_count: usize) -> f64 {
        let max = (entry_count as f64 * self.row_height - self.viewport_height).max(0.0);
        self.scroll_offset.min(max)
    }

    /// Entry indices to render, overscan included
    pub fn visible_range(&self, entry_count: usize) -> Range<usize> {
        if entry_count == 0 {
            return 0..0;
        }
        let offset = self.effective_offset(entry_count);
        let first = ((offset / self.row_height).floor() as usize).min(entry_count);
        let last = (((offset + self.viewport_height) / self.row_height).ceil() as usize)
            .min(entry_count);

        let start = first.saturating_sub(self.overscan);
        let end = last.saturating_add(self.overscan).min(entry_count);
        start..end
    }

    /// Build the window for `view`, marking selected rows
    pub fn window(&self, view: &DataView, selection: &SelectionManager) -> ViewportWindow {
        let data_rows = view.row_count();
        let entry_count = self.entry_count(data_rows);
        let total_extent = entry_count as f64 * self.row_height;
        let scroll_offset = self.effective_offset(entry_count);

        let range = if data_rows == 0 {
            0..1
        } else {
            self.visible_range(entry_count)
        };

        let entries: Vec<WindowEntry> = range
            .clone()
            .filter_map(|index| {
                let entry = self.entry_at(view, selection, index)?;
                Some(WindowEntry {
                    index,
                    top: index as f64 * self.row_height,
                    entry,
                })
            })
            .collect();

        debug!(
            target: "viewport",
            "Window {:?} of {} entries (offset {:.0}, height {:.0})",
            range,
            entry_count,
            scroll_offset,
            self.viewport_height
        );

        ViewportWindow {
            entries,
            total_extent,
            first_index: range.start,
            entry_count,
            scroll_offset,
            viewport_height: self.viewport_height,
            row_height: self.row_height,
        }
    }

    fn entry_at(&self, view: &DataView, selection: &SelectionManager, index: usize) -> Option<ViewEntry> {
        let data_rows = view.row_count();
        if data_rows == 0 {
            return (index == 0).then(|| ViewEntry::NoData {
                text: self.no_data_text.clone(),
            });
        }

        if index < data_rows {
            let row = view.get_row(index)?;
            return Some(ViewEntry::Row {
                view_index: index,
                selected: selection.is_selected(row.id()),
                row: row.clone(),
            });
        }

        let mut synthetic = index - data_rows;
        if let Some(label) = &self.append_label {
            if synthetic == 0 {
                return Some(ViewEntry::Append {
                    label: label.clone(),
                });
            }
            synthetic -= 1;
        }
        (self.has_fab && synthetic == 0).then_some(ViewEntry::Spacer)
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::datatable::{Row, RowId, RowStore};

    fn view(n: usize) -> DataView {
        DataView::new(RowStore::new((0..n).map(Row::new).collect()))
    }

    #[test]
    fn test_window_slices_viewport_with_overscan() {
        let mut v = Virtualizer::new(10.0, 2);
        v.set_scroll(100.0, 30.0);
        let window = v.window(&view(100), &SelectionManager::new());

        assert_eq!(window.total_extent, 1000.0);
        assert_eq!(window.first_index, 8);
        let indices: Vec<usize> = window.entries.iter().map(|e| e.index).collect();
        assert_eq!(indices, (8..15).collect::<Vec<_>>());
        assert_eq!(window.entries[0].top, 80.0);
    }

    #[test]
    fn test_empty_view_yields_single_placeholder() {
        let v = Virtualizer::new(52.0, 3)
            .with_no_data_text("Nothing here")
            .with_append_row(Some("Add".to_string()))
            .with_fab(true);
        let window = v.window(&view(0), &SelectionManager::new());

        assert!(window.is_no_data());
        assert_eq!(window.entry_count, 1);
        assert_eq!(window.total_extent, 52.0);
        assert_eq!(
            window.entries[0].entry,
            ViewEntry::NoData {
                text: "Nothing here".to_string()
            }
        );
    }

    #[test]
    fn test_synthetic_rows_follow_data() {
        let mut v = Virtualizer::new(10.0, 0)
            .with_append_row(Some("Add device".to_string()))
            .with_fab(true);
        v.set_scroll(0.0, 100.0);
        let window = v.window(&view(2), &SelectionManager::new());

        assert_eq!(window.entry_count, 4);
        assert_eq!(window.total_extent, 40.0);
        assert!(window.entries[0].entry.is_data());
        assert_eq!(
            window.entries[2].entry,
            ViewEntry::Append {
                label: "Add device".to_string()
            }
        );
        assert_eq!(window.entries[3].entry, ViewEntry::Spacer);
    }

    #[test]
    fn test_scroll_offset_survives_shorter_view() {
        let mut v = Virtualizer::new(10.0, 0);
        v.set_scroll(500.0, 50.0);

        let short = v.window(&view(10), &SelectionManager::new());
        assert_eq!(short.scroll_offset, 50.0);
        assert_eq!(short.first_index, 5);

        // Stored offset is untouched, so a longer view scrolls back
        let long = v.window(&view(100), &SelectionManager::new());
        assert_eq!(long.scroll_offset, 500.0);
        assert_eq!(v.scroll_offset(), 500.0);

        assert!(v.reset_scroll());
        assert_eq!(v.scroll_offset(), 0.0);
    }

    #[test]
    fn test_rows_carry_selection_state() {
        let store = RowStore::new(vec![Row::new("a"), Row::new("b")]);
        let mut selection = SelectionManager::new();
        selection.toggle_row(&store, &RowId::from("b"));

        let mut v = Virtualizer::new(10.0, 0);
        v.set_scroll(0.0, 20.0);
        let window = v.window(&DataView::new(store), &selection);
        let flags: Vec<bool> = window
            .entries
            .iter()
            .map(|e| matches!(e.entry, ViewEntry::Row { selected: true, .. }))
            .collect();
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn test_scroll_to_row_and_invalid_input() {
        let mut v = Virtualizer::new(-1.0, 0);
        assert_eq!(v.row_height(), 52.0);
        v.scroll_to_row(3);
        assert_eq!(v.scroll_offset(), 156.0);
        v.set_scroll(f64::NAN, -5.0);
        assert_eq!(v.scroll_offset(), 0.0);
        assert_eq!(v.viewport_height(), 0.0);
    }
}
