use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// A single cell value in a row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
}

impl DataValue {
    /// Infer a value from raw text (CSV cells, string-encoded JSON)
    pub fn infer_from_str(s: &str) -> Self {
        if s.is_empty() || s.eq_ignore_ascii_case("null") {
            return DataValue::Null;
        }

        if s.eq_ignore_ascii_case("true") {
            return DataValue::Boolean(true);
        }
        if s.eq_ignore_ascii_case("false") {
            return DataValue::Boolean(false);
        }

        if let Ok(i) = s.parse::<i64>() {
            return DataValue::Integer(i);
        }

        if let Ok(f) = s.parse::<f64>() {
            return DataValue::Float(f);
        }

        DataValue::String(s.to_string())
    }

    /// Convert a JSON value. Arrays and objects keep their JSON text.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => DataValue::Null,
            JsonValue::Bool(b) => DataValue::Boolean(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    DataValue::Integer(i)
                } else {
                    n.as_f64().map(DataValue::Float).unwrap_or(DataValue::Null)
                }
            }
            JsonValue::String(s) => DataValue::String(s.clone()),
            other => DataValue::String(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Numeric view of the value, coercing string-encoded numbers
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataValue::Integer(i) => Some(*i as f64),
            DataValue::Float(f) if !f.is_nan() => Some(*f),
            DataValue::String(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
            _ => None,
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::String(s) => write!(f, "{}", s),
            DataValue::Integer(i) => write!(f, "{}", i),
            DataValue::Float(fl) => write!(f, "{}", fl),
            DataValue::Boolean(b) => write!(f, "{}", b),
            DataValue::Null => write!(f, ""),
        }
    }
}

impl From<&str> for DataValue {
    fn from(s: &str) -> Self {
        DataValue::String(s.to_string())
    }
}

impl From<String> for DataValue {
    fn from(s: String) -> Self {
        DataValue::String(s)
    }
}

impl From<i64> for DataValue {
    fn from(i: i64) -> Self {
        DataValue::Integer(i)
    }
}

impl From<i32> for DataValue {
    fn from(i: i32) -> Self {
        DataValue::Integer(i as i64)
    }
}

impl From<f64> for DataValue {
    fn from(f: f64) -> Self {
        DataValue::Float(f)
    }
}

impl From<bool> for DataValue {
    fn from(b: bool) -> Self {
        DataValue::Boolean(b)
    }
}

impl<T: Into<DataValue>> From<Option<T>> for DataValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(DataValue::Null)
    }
}

/// Stable identity of a row, used for selection and reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(String);

impl RowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RowId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for RowId {
    fn from(i: i64) -> Self {
        Self(i.to_string())
    }
}

impl From<i32> for RowId {
    fn from(i: i32) -> Self {
        Self(i.to_string())
    }
}

impl From<usize> for RowId {
    fn from(i: usize) -> Self {
        Self(i.to_string())
    }
}

/// A record: column id -> value, plus identity and selectability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    id: RowId,
    values: HashMap<String, DataValue>,
    selectable: bool,
}

impl Row {
    pub fn new(id: impl Into<RowId>) -> Self {
        Self {
            id: id.into(),
            values: HashMap::new(),
            selectable: true,
        }
    }

    /// Builder-style value setter
    pub fn with(mut self, column: impl Into<String>, value: impl Into<DataValue>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    pub fn with_selectable(mut self, selectable: bool) -> Self {
        self.selectable = selectable;
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<DataValue>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn id(&self) -> &RowId {
        &self.id
    }

    pub fn is_selectable(&self) -> bool {
        self.selectable
    }

    /// Value for a column. Missing keys are `None`, never an error.
    pub fn get(&self, column: &str) -> Option<&DataValue> {
        self.values.get(column)
    }

    pub fn values(&self) -> &HashMap<String, DataValue> {
        &self.values
    }
}

static STORE_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Immutable snapshot of the record collection.
///
/// Cloning is cheap (shared `Arc`). Every constructed store gets a fresh
/// generation number, which is its identity for memoization.
#[derive(Debug, Clone)]
pub struct RowStore {
    rows: Arc<Vec<Row>>,
    index: Arc<HashMap<RowId, usize>>,
    generation: u64,
}

impl RowStore {
    /// Build a store, dropping rows whose id was already seen
    pub fn new(rows: Vec<Row>) -> Self {
        let mut seen: HashSet<RowId> = HashSet::with_capacity(rows.len());
        let mut unique = Vec::with_capacity(rows.len());
        let mut dropped = 0usize;

        for row in rows {
            if seen.insert(row.id.clone()) {
                unique.push(row);
            } else {
                dropped += 1;
                warn!(target: "engine", "Dropping row with duplicate id '{}'", row.id);
            }
        }

        let index: HashMap<RowId, usize> = unique
            .iter()
            .enumerate()
            .map(|(i, row)| (row.id.clone(), i))
            .collect();

        let generation = STORE_GENERATION.fetch_add(1, Ordering::SeqCst);
        debug!(
            target: "engine",
            "RowStore generation {}: {} rows ({} duplicates dropped)",
            generation,
            unique.len(),
            dropped
        );

        Self {
            rows: Arc::new(unique),
            index: Arc::new(index),
            generation,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn position(&self, id: &RowId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &RowId) -> bool {
        self.index.contains_key(id)
    }

    pub fn find(&self, id: &RowId) -> Option<&Row> {
        self.position(id).and_then(|i| self.rows.get(i))
    }

    /// Ids of rows that can be selected, in store order
    pub fn selectable_ids(&self) -> impl Iterator<Item = &RowId> {
        self.rows.iter().filter(|r| r.selectable).map(|r| &r.id)
    }

    pub fn selectable_count(&self) -> usize {
        self.rows.iter().filter(|r| r.selectable).count()
    }
}

impl Default for RowStore {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_ids_are_dropped_keeping_first() {
        let store = RowStore::new(vec![
            Row::new(1).with("name", "first"),
            Row::new(2).with("name", "second"),
            Row::new(1).with("name", "duplicate"),
        ]);

        assert_eq!(store.len(), 2);
        let row = store.find(&RowId::from(1)).unwrap();
        assert_eq!(row.get("name"), Some(&DataValue::from("first")));
        assert_eq!(store.position(&RowId::from(2)), Some(1));
    }

    #[test]
    fn test_each_store_has_a_new_generation() {
        let a = RowStore::new(vec![Row::new(1)]);
        let b = RowStore::new(vec![Row::new(1)]);
        assert_ne!(a.generation(), b.generation());
        assert_eq!(a.clone().generation(), a.generation());
    }

    #[test]
    fn test_selectable_ids_skip_unselectable_rows() {
        let store = RowStore::new(vec![
            Row::new("a"),
            Row::new("b").with_selectable(false),
            Row::new("c"),
        ]);
        let ids: Vec<&str> = store.selectable_ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(store.selectable_count(), 2);
    }

    #[test]
    fn test_value_inference_and_coercion() {
        assert_eq!(DataValue::infer_from_str("42"), DataValue::Integer(42));
        assert_eq!(DataValue::infer_from_str("4.5"), DataValue::Float(4.5));
        assert_eq!(DataValue::infer_from_str("TRUE"), DataValue::Boolean(true));
        assert_eq!(DataValue::infer_from_str(""), DataValue::Null);
        assert_eq!(DataValue::infer_from_str("abc"), DataValue::from("abc"));

        assert_eq!(DataValue::from(" 12.5 ").as_f64(), Some(12.5));
        assert_eq!(DataValue::from("n/a").as_f64(), None);
        assert_eq!(DataValue::Boolean(true).as_f64(), None);
        assert_eq!(DataValue::Null.as_f64(), None);
    }

    #[test]
    fn test_from_json_numbers() {
        assert_eq!(
            DataValue::from_json(&serde_json::json!(7)),
            DataValue::Integer(7)
        );
        assert_eq!(
            DataValue::from_json(&serde_json::json!(1.25)),
            DataValue::Float(1.25)
        );
        assert_eq!(
            DataValue::from_json(&serde_json::json!(["a"])),
            DataValue::from("[\"a\"]")
        );
    }

    #[test]
    fn test_timestamps_stay_text() {
        let stamp = "2024-03-01T12:30:00Z";
        assert_eq!(DataValue::infer_from_str(stamp), DataValue::from(stamp));
        assert_eq!(
            DataValue::from_json(&serde_json::json!(stamp)),
            DataValue::String(stamp.to_string())
        );
        assert_eq!(DataValue::from(stamp).to_string(), stamp);
    }
}
