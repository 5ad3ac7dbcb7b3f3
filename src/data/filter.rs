//! Filter stage: case-insensitive substring search over filterable columns.

use crate::data::column::ColumnRegistry;
use crate::data::datatable::{Row, RowStore};

/// Does `row` contain `needle` (already lowercased) in any filterable column?
///
/// Null and missing values never match.
pub fn row_matches(row: &Row, columns: &ColumnRegistry, needle: &str) -> bool {
    columns.filterable_columns().any(|column| match row.get(&column.id) {
        Some(value) if !value.is_null() => value.to_string().to_lowercase().contains(needle),
        _ => false,
    })
}

/// Indices of the rows in `store` matching `term`, in store order.
///
/// An empty term keeps every row.
pub fn filter_indices(store: &RowStore, columns: &ColumnRegistry, term: &str) -> Vec<usize> {
    if term.is_empty() {
        return (0..store.len()).collect();
    }

    let needle = term.to_lowercase();
    store
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| row_matches(row, columns, &needle))
        .map(|(i, _)| i)
        .collect()
}

/// Row-level form of [`filter_indices`]
pub fn filter_rows<'a>(store: &'a RowStore, columns: &ColumnRegistry, term: &str) -> Vec<&'a Row> {
    filter_indices(store, columns, term)
        .into_iter()
        .filter_map(|i| store.get(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::column::ColumnDef;
    use crate::data::datatable::DataValue;

    fn sample() -> (RowStore, ColumnRegistry) {
        let store = RowStore::new(vec![
            Row::new(1).with("name", "Bravo").with("count", 12),
            Row::new(2).with("name", "alpha").with("count", 7),
            Row::new(3).with("name", "Charlie").with("count", DataValue::Null),
            Row::new(4).with("count", 120),
        ]);
        let columns = ColumnRegistry::new(vec![
            ColumnDef::new("name", "Name").sortable(),
            ColumnDef::new("count", "Count").numeric(),
        ])
        .unwrap();
        (store, columns)
    }

    #[test]
    fn test_empty_term_is_identity() {
        let (store, columns) = sample();
        assert_eq!(filter_indices(&store, &columns, ""), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_case_insensitive_substring() {
        let (store, columns) = sample();
        assert_eq!(filter_indices(&store, &columns, "A"), vec![0, 1, 2]);
        assert_eq!(filter_indices(&store, &columns, "char"), vec![2]);
        assert!(filter_indices(&store, &columns, "z").is_empty());
    }

    #[test]
    fn test_numbers_are_stringified_and_missing_fields_tolerated() {
        let (store, columns) = sample();
        // "12" matches 12 and 120; row 4 has no name at all
        assert_eq!(filter_indices(&store, &columns, "12"), vec![0, 3]);
    }

    #[test]
    fn test_unfilterable_columns_are_skipped() {
        let store = RowStore::new(vec![Row::new(1).with("secret", "needle")]);
        let columns =
            ColumnRegistry::new(vec![ColumnDef::new("secret", "Secret").not_filterable()]).unwrap();
        assert!(filter_rows(&store, &columns, "needle").is_empty());
    }
}
