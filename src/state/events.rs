//! Notifications the engine sends to its view surface

use crate::data::datatable::RowId;
use crate::data::sort::SortDirection;
use crate::ui::virtualizer::ViewportWindow;

/// Events emitted by the table engine
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The windowed slice or total extent changed
    ViewChanged(ViewportWindow),

    /// Full current selection, in selection order
    SelectionChanged(Vec<RowId>),

    /// An effective header toggle. `direction == None` means natural order.
    SortingChanged {
        column: String,
        direction: Option<SortDirection>,
    },

    /// A data row was clicked
    RowActivated(RowId),
}

/// Discriminant of [`EngineEvent`], used to route listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ViewChanged,
    SelectionChanged,
    SortingChanged,
    RowActivated,
}

impl EngineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::ViewChanged(_) => EventKind::ViewChanged,
            EngineEvent::SelectionChanged(_) => EventKind::SelectionChanged,
            EngineEvent::SortingChanged { .. } => EventKind::SortingChanged,
            EngineEvent::RowActivated(_) => EventKind::RowActivated,
        }
    }

    /// One-line description for logs and the debug report
    pub fn summary(&self) -> String {
        match self {
            EngineEvent::ViewChanged(window) => format!(
                "ViewChanged: {} entries from #{}, extent {:.0}",
                window.entries.len(),
                window.first_index,
                window.total_extent
            ),
            EngineEvent::SelectionChanged(ids) => {
                format!("SelectionChanged: {} selected", ids.len())
            }
            EngineEvent::SortingChanged { column, direction } => match direction {
                Some(d) => format!("SortingChanged: {} {}", column, d),
                None => format!("SortingChanged: {} natural", column),
            },
            EngineEvent::RowActivated(id) => format!("RowActivated: {}", id),
        }
    }
}
