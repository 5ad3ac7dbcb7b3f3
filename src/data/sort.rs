//! Sort stage and the header-click sort policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::data::column::ColumnRegistry;
use crate::data::datatable::RowStore;
use crate::data::datavalue_compare::{KeyComparator, SortKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => write!(f, "asc"),
            SortDirection::Descending => write!(f, "desc"),
        }
    }
}

/// Active sort. `column == None` means natural (row store) order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: Option<String>,
    pub direction: Option<SortDirection>,
}

impl SortSpec {
    pub fn natural() -> Self {
        Self::default()
    }

    pub fn by(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: Some(column.into()),
            direction: Some(direction),
        }
    }

    pub fn is_natural(&self) -> bool {
        self.column.is_none()
    }

    /// Sort spec a freshly configured schema starts with
    pub fn initial_for(columns: &ColumnRegistry) -> Self {
        match columns.default_sort() {
            Some((column, direction)) => Self::by(column, direction),
            None => Self::natural(),
        }
    }

    /// Apply a header click.
    ///
    /// Repeated clicks on one column cycle asc -> desc -> natural; a click on
    /// a different column always starts it at asc. Clicks on unknown or
    /// unsortable columns are ignored. Returns whether the spec changed.
    pub fn toggle(&mut self, column_id: &str, columns: &ColumnRegistry) -> bool {
        if !columns.is_sortable(column_id) {
            debug!(target: "pipeline", "Ignoring sort click on '{}' (not sortable)", column_id);
            return false;
        }

        let same_column = self.column.as_deref() == Some(column_id);
        let next = match (same_column, self.direction) {
            (true, Some(SortDirection::Ascending)) => Some(SortDirection::Descending),
            (true, Some(SortDirection::Descending)) => None,
            _ => Some(SortDirection::Ascending),
        };

        self.direction = next;
        self.column = next.map(|_| column_id.to_string());
        true
    }
}

/// Order `indices` (positions in `store`) by `column_id`.
///
/// Stable: equal keys keep their incoming order. No column, or a column the
/// registry does not know, keeps the incoming order unchanged. A missing
/// direction sorts ascending.
pub fn sort_indices(
    store: &RowStore,
    columns: &ColumnRegistry,
    indices: &[usize],
    column_id: Option<&str>,
    direction: Option<SortDirection>,
) -> Vec<usize> {
    let Some(column_id) = column_id else {
        return indices.to_vec();
    };
    let Some(column) = columns.get(column_id) else {
        debug!(target: "pipeline", "Sort column '{}' not in registry, keeping order", column_id);
        return indices.to_vec();
    };

    let kind = column.column_type.sort_key_kind();
    let mut keyed: Vec<(SortKey, usize)> = indices
        .iter()
        .map(|&i| {
            let value = store.get(i).and_then(|row| row.get(&column.id));
            (SortKey::from_value(value, kind), i)
        })
        .collect();

    let descending = direction == Some(SortDirection::Descending);
    let mut comparator = KeyComparator::new();
    // sort_by is stable
    keyed.sort_by(|(a, _), (b, _)| {
        let ord = comparator.compare(a, b);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });

    keyed.into_iter().map(|(_, i)| i).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::column::ColumnDef;
    use crate::data::datatable::Row;

    fn registry() -> ColumnRegistry {
        ColumnRegistry::new(vec![
            ColumnDef::new("name", "Name").sortable(),
            ColumnDef::new("size", "Size").numeric().sortable(),
            ColumnDef::new("note", "Note"),
        ])
        .unwrap()
    }

    fn ids(store: &RowStore, order: &[usize]) -> Vec<String> {
        order
            .iter()
            .map(|&i| store.get(i).unwrap().id().to_string())
            .collect()
    }

    #[test]
    fn test_text_sort_is_case_insensitive() {
        let store = RowStore::new(vec![
            Row::new(1).with("name", "Bravo"),
            Row::new(2).with("name", "alpha"),
            Row::new(3).with("name", "Charlie"),
        ]);
        let order = sort_indices(
            &store,
            &registry(),
            &[0, 1, 2],
            Some("name"),
            Some(SortDirection::Ascending),
        );
        assert_eq!(ids(&store, &order), vec!["2", "1", "3"]);
    }

    #[test]
    fn test_text_sort_collates_accented_names() {
        let store = RowStore::new(vec![
            Row::new(1).with("name", "zebra"),
            Row::new(2).with("name", "Éclair"),
            Row::new(3).with("name", "apple"),
            Row::new(4).with("name", "eclair"),
        ]);
        let cols = registry();
        let asc = sort_indices(
            &store,
            &cols,
            &[0, 1, 2, 3],
            Some("name"),
            Some(SortDirection::Ascending),
        );
        let names: Vec<String> = asc
            .iter()
            .map(|&i| store.get(i).unwrap().get("name").unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["apple", "eclair", "Éclair", "zebra"]);

        let desc = sort_indices(
            &store,
            &cols,
            &[0, 1, 2, 3],
            Some("name"),
            Some(SortDirection::Descending),
        );
        assert_eq!(ids(&store, &desc), vec!["1", "2", "4", "3"]);
    }

    #[test]
    fn test_sort_is_stable_in_both_directions() {
        let store = RowStore::new(vec![
            Row::new("a").with("size", 2),
            Row::new("b").with("size", 1),
            Row::new("c").with("size", "2"),
            Row::new("d").with("size", 1.0),
        ]);
        let cols = registry();
        let asc = sort_indices(&store, &cols, &[0, 1, 2, 3], Some("size"), None);
        assert_eq!(ids(&store, &asc), vec!["b", "d", "a", "c"]);

        let desc = sort_indices(
            &store,
            &cols,
            &[0, 1, 2, 3],
            Some("size"),
            Some(SortDirection::Descending),
        );
        assert_eq!(ids(&store, &desc), vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn test_numeric_sort_puts_malformed_first() {
        let store = RowStore::new(vec![
            Row::new("ten").with("size", 10),
            Row::new("junk").with("size", "lots"),
            Row::new("nine").with("size", "9"),
            Row::new("none"),
        ]);
        let order = sort_indices(
            &store,
            &registry(),
            &[0, 1, 2, 3],
            Some("size"),
            Some(SortDirection::Ascending),
        );
        assert_eq!(ids(&store, &order), vec!["junk", "none", "nine", "ten"]);
    }

    #[test]
    fn test_no_column_keeps_input_order() {
        let store = RowStore::new(vec![Row::new(1), Row::new(2), Row::new(3)]);
        let order = sort_indices(&store, &registry(), &[2, 0, 1], None, None);
        assert_eq!(order, vec![2, 0, 1]);

        let unknown = sort_indices(&store, &registry(), &[2, 0, 1], Some("nope"), None);
        assert_eq!(unknown, vec![2, 0, 1]);
    }

    #[test]
    fn test_toggle_cycle() {
        let cols = registry();
        let mut spec = SortSpec::natural();

        assert!(spec.toggle("name", &cols));
        assert_eq!(spec, SortSpec::by("name", SortDirection::Ascending));

        assert!(spec.toggle("name", &cols));
        assert_eq!(spec, SortSpec::by("name", SortDirection::Descending));

        assert!(spec.toggle("name", &cols));
        assert!(spec.is_natural());
        assert_eq!(spec.direction, None);

        // Different column from a descending state starts at asc
        spec.toggle("name", &cols);
        spec.toggle("name", &cols);
        assert!(spec.toggle("size", &cols));
        assert_eq!(spec, SortSpec::by("size", SortDirection::Ascending));
    }

    #[test]
    fn test_toggle_ignores_unsortable() {
        let cols = registry();
        let mut spec = SortSpec::by("name", SortDirection::Ascending);
        assert!(!spec.toggle("note", &cols));
        assert!(!spec.toggle("missing", &cols));
        assert_eq!(spec, SortSpec::by("name", SortDirection::Ascending));
    }
}
