use crate::data::datatable::{Row, RowId, RowStore};
use crate::data::sort::SortSpec;
use std::sync::Arc;

/// The derived, ordered result of filter + sort over a [`RowStore`].
///
/// Holds only positions into the source snapshot, so it never owns or
/// mutates row data, and is rebuilt wholesale on every input change.
#[derive(Debug, Clone)]
pub struct DataView {
    /// The immutable snapshot the positions refer to
    source: RowStore,

    /// Visible row positions, in display order
    visible_rows: Arc<Vec<usize>>,

    /// Inputs this view was derived from
    filter_term: String,
    sort: SortSpec,

    /// Pipeline request that produced the view (0 for the initial view)
    sequence: u64,
}

impl DataView {
    /// A view showing every row in natural order
    pub fn new(source: RowStore) -> Self {
        let visible_rows = (0..source.len()).collect();
        Self {
            source,
            visible_rows: Arc::new(visible_rows),
            filter_term: String::new(),
            sort: SortSpec::natural(),
            sequence: 0,
        }
    }

    pub fn empty() -> Self {
        Self::new(RowStore::empty())
    }

    pub fn from_parts(
        source: RowStore,
        visible_rows: Vec<usize>,
        filter_term: impl Into<String>,
        sort: SortSpec,
        sequence: u64,
    ) -> Self {
        Self {
            source,
            visible_rows: Arc::new(visible_rows),
            filter_term: filter_term.into(),
            sort,
            sequence,
        }
    }

    /// Number of data rows in the view
    pub fn row_count(&self) -> usize {
        self.visible_rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible_rows.is_empty()
    }

    /// Row at a display position
    pub fn get_row(&self, index: usize) -> Option<&Row> {
        let row_idx = *self.visible_rows.get(index)?;
        self.source.get(row_idx)
    }

    /// Rows in display order
    pub fn rows(&self) -> impl Iterator<Item = &Row> + '_ {
        self.visible_rows
            .iter()
            .filter_map(move |&i| self.source.get(i))
    }

    pub fn ids(&self) -> Vec<RowId> {
        self.rows().map(|r| r.id().clone()).collect()
    }

    /// Display position of a row id, if the row is in the view
    pub fn position_of(&self, id: &RowId) -> Option<usize> {
        let store_idx = self.source.position(id)?;
        self.visible_rows.iter().position(|&i| i == store_idx)
    }

    pub fn contains(&self, id: &RowId) -> bool {
        self.position_of(id).is_some()
    }

    pub fn source(&self) -> &RowStore {
        &self.source
    }

    /// Visible positions into the source store
    pub fn visible_row_indices(&self) -> &[usize] {
        &self.visible_rows
    }

    pub fn filter_term(&self) -> &str {
        &self.filter_term
    }

    pub fn sort_spec(&self) -> &SortSpec {
        &self.sort
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Default for DataView {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_resolves_positions_through_source() {
        let store = RowStore::new(vec![
            Row::new("a").with("n", 1),
            Row::new("b").with("n", 2),
            Row::new("c").with("n", 3),
        ]);
        let view = DataView::from_parts(store, vec![2, 0], "", SortSpec::natural(), 4);

        assert_eq!(view.row_count(), 2);
        assert_eq!(view.get_row(0).unwrap().id().as_str(), "c");
        assert_eq!(view.position_of(&RowId::from("a")), Some(1));
        assert!(!view.contains(&RowId::from("b")));
        assert_eq!(view.sequence(), 4);
        assert_eq!(view.source().len(), 3);
    }

    #[test]
    fn test_new_view_shows_all_rows() {
        let store = RowStore::new(vec![Row::new(1), Row::new(2)]);
        let view = DataView::new(store);
        assert_eq!(
            view.ids(),
            vec![RowId::from(1), RowId::from(2)]
        );
        assert!(view.sort_spec().is_natural());
    }
}
