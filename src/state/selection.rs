//! Selected-row tracking, keyed by row identity.
//!
//! Selection is independent of the derived view: filtering or sorting never
//! touches it. Identities are only dropped when their row leaves the row
//! store.

use std::collections::HashSet;
use tracing::debug;

use crate::data::datatable::{RowId, RowStore};
use crate::trace_selection;

/// Derived state of the select-all header checkbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderCheckState {
    Unchecked,
    Indeterminate,
    Checked,
}

#[derive(Debug, Clone, Default)]
pub struct SelectionManager {
    /// Selected ids in the order they were selected
    order: Vec<RowId>,
    lookup: HashSet<RowId>,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip one row. Unknown and unselectable rows are ignored.
    ///
    /// Returns whether the selection changed.
    pub fn toggle_row(&mut self, store: &RowStore, id: &RowId) -> bool {
        let selectable = store.find(id).is_some_and(|row| row.is_selectable());
        if !selectable {
            debug!(target: "selection", "Ignoring toggle of '{}' (unknown or unselectable)", id);
            return false;
        }

        if self.lookup.remove(id) {
            self.order.retain(|selected| selected != id);
            trace_selection!(format!("deselect {}", id), self.order.len());
        } else {
            self.insert(id.clone());
            trace_selection!(format!("select {}", id), self.order.len());
        }
        true
    }

    /// Select every selectable row in the store, filtered or not
    pub fn select_all(&mut self, store: &RowStore) -> bool {
        let before = self.order.len();
        for id in store.selectable_ids() {
            if !self.lookup.contains(id) {
                self.insert(id.clone());
            }
        }
        let changed = self.order.len() != before;
        if changed {
            trace_selection!("select all", self.order.len());
        }
        changed
    }

    pub fn clear(&mut self) -> bool {
        if self.order.is_empty() {
            return false;
        }
        self.order.clear();
        self.lookup.clear();
        trace_selection!("clear", 0);
        true
    }

    /// Header checkbox input: check selects all, uncheck clears
    pub fn set_all(&mut self, store: &RowStore, checked: bool) -> bool {
        if checked {
            self.select_all(store)
        } else {
            self.clear()
        }
    }

    /// Drop ids whose rows are no longer in the store
    pub fn prune(&mut self, store: &RowStore) -> bool {
        let before = self.order.len();
        self.order.retain(|id| store.contains(id));
        if self.order.len() == before {
            return false;
        }
        self.lookup = self.order.iter().cloned().collect();
        trace_selection!("prune", self.order.len());
        true
    }

    pub fn is_selected(&self, id: &RowId) -> bool {
        self.lookup.contains(id)
    }

    pub fn selected(&self) -> &[RowId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Tri-state over the store's selectable rows
    pub fn header_state(&self, store: &RowStore) -> HeaderCheckState {
        let total = store.selectable_count();
        let selected = store
            .selectable_ids()
            .filter(|id| self.lookup.contains(*id))
            .count();

        match selected {
            0 => HeaderCheckState::Unchecked,
            n if n == total => HeaderCheckState::Checked,
            _ => HeaderCheckState::Indeterminate,
        }
    }

    fn insert(&mut self, id: RowId) {
        self.lookup.insert(id.clone());
        self.order.push(id);
    }
}
