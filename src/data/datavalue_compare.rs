use crate::data::column::SortKeyKind;
use crate::data::datatable::DataValue;
use feruca::Collator;
use std::cmp::Ordering;

/// Precomputed sort key for one cell.
///
/// `Missing` covers null, absent and malformed values (a non-numeric value
/// in a numeric column) and orders before every real value.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Missing,
    Number(f64),
    Text(String),
}

impl SortKey {
    pub fn from_value(value: Option<&DataValue>, kind: SortKeyKind) -> Self {
        let value = match value {
            Some(v) if !v.is_null() => v,
            _ => return SortKey::Missing,
        };

        match kind {
            SortKeyKind::Numeric => value
                .as_f64()
                .map(SortKey::Number)
                .unwrap_or(SortKey::Missing),
            SortKeyKind::Text => SortKey::Text(value.to_string().to_lowercase()),
        }
    }
}

/// Locale-aware ordering for text keys (Unicode collation, CLDR root)
///
/// Holds the collator's internal caches, so one instance should serve a
/// whole sort pass.
pub struct KeyComparator {
    collator: Collator,
}

impl KeyComparator {
    pub fn new() -> Self {
        Self {
            collator: Collator::default(),
        }
    }

    /// Compare two sort keys in ascending order
    pub fn compare(&mut self, a: &SortKey, b: &SortKey) -> Ordering {
        match (a, b) {
            (SortKey::Missing, SortKey::Missing) => Ordering::Equal,
            (SortKey::Missing, _) => Ordering::Less,
            (_, SortKey::Missing) => Ordering::Greater,

            (SortKey::Number(a), SortKey::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            // Keys are already case-folded, so only identical text compares equal
            (SortKey::Text(a), SortKey::Text(b)) if a == b => Ordering::Equal,
            (SortKey::Text(a), SortKey::Text(b)) => self.collator.collate(a.as_str(), b.as_str()),

            // Keys of one column share a kind; numbers first keeps this total
            (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
            (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
        }
    }
}

impl Default for KeyComparator {
    fn default() -> Self {
        Self::new()
    }
}

/// Compare two optional cell values the way a column of `kind` sorts them
pub fn compare_values(a: Option<&DataValue>, b: Option<&DataValue>, kind: SortKeyKind) -> Ordering {
    KeyComparator::new().compare(&SortKey::from_value(a, kind), &SortKey::from_value(b, kind))
}
