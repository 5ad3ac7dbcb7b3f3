//! Single-entry memo of the filter stage output.

use std::sync::Arc;
use tracing::trace;

/// Identity of a filter pass: which row snapshot, which schema, which term
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterKey {
    pub rows_generation: u64,
    pub columns_generation: u64,
    pub term: String,
}

impl FilterKey {
    pub fn new(rows_generation: u64, columns_generation: u64, term: impl Into<String>) -> Self {
        Self {
            rows_generation,
            columns_generation,
            term: term.into(),
        }
    }
}

/// Remembers the most recent filter result only; storing a new key evicts
/// the previous one.
#[derive(Debug, Default)]
pub struct FilterMemo {
    entry: Option<(FilterKey, Arc<Vec<usize>>)>,
    hits: u64,
    misses: u64,
}

impl FilterMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, key: &FilterKey) -> Option<Arc<Vec<usize>>> {
        match &self.entry {
            Some((cached_key, indices)) if cached_key == key => {
                self.hits += 1;
                trace!(target: "pipeline", "Filter memo hit for term '{}'", key.term);
                Some(Arc::clone(indices))
            }
            _ => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn store(&mut self, key: FilterKey, indices: Arc<Vec<usize>>) {
        self.entry = Some((key, indices));
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_entry_replacement() {
        let mut memo = FilterMemo::new();
        let a = FilterKey::new(1, 1, "a");
        let b = FilterKey::new(1, 1, "b");

        assert!(memo.get(&a).is_none());
        memo.store(a.clone(), Arc::new(vec![0, 2]));
        assert_eq!(*memo.get(&a).unwrap(), vec![0, 2]);

        memo.store(b.clone(), Arc::new(vec![1]));
        assert!(memo.get(&a).is_none());
        assert!(memo.get(&b).is_some());
        assert_eq!(memo.hits(), 2);
        assert_eq!(memo.misses(), 2);
    }

    #[test]
    fn test_key_includes_generations() {
        let mut memo = FilterMemo::new();
        memo.store(FilterKey::new(1, 1, "a"), Arc::new(vec![0]));
        assert!(memo.get(&FilterKey::new(2, 1, "a")).is_none());
        assert!(memo.get(&FilterKey::new(1, 2, "a")).is_none());
        memo.clear();
        assert!(memo.is_empty());
    }
}
