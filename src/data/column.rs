//! Column definitions and the per-table column registry.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::data::datatable::{DataValue, Row};
use crate::data::sort::SortDirection;

/// Column kinds. Only `Numeric` changes pipeline behaviour (comparator);
/// the rest matter to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnType {
    #[default]
    Text,
    Numeric,
    Icon,
    IconButton,
    OverflowMenu,
}

/// How a sort key is derived from a cell value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKeyKind {
    /// Numeric comparison, coercing string-encoded numbers
    Numeric,
    /// Case-insensitive text comparison
    Text,
}

/// Horizontal alignment hint for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    Start,
    Center,
    End,
}

impl ColumnType {
    pub fn sort_key_kind(self) -> SortKeyKind {
        match self {
            ColumnType::Numeric => SortKeyKind::Numeric,
            ColumnType::Text
            | ColumnType::Icon
            | ColumnType::IconButton
            | ColumnType::OverflowMenu => SortKeyKind::Text,
        }
    }

    pub fn alignment(self) -> Alignment {
        match self {
            ColumnType::Numeric => Alignment::End,
            ColumnType::Icon | ColumnType::IconButton | ColumnType::OverflowMenu => {
                Alignment::Center
            }
            ColumnType::Text => Alignment::Start,
        }
    }
}

/// Pure cell renderer used by the presentation layer only
pub type CellRenderer = Arc<dyn Fn(&DataValue, &Row) -> String + Send + Sync>;

/// Declarative description of one column
#[derive(Clone)]
pub struct ColumnDef {
    pub id: String,
    pub title: String,
    pub column_type: ColumnType,
    pub sortable: bool,
    pub filterable: bool,
    pub hidden: bool,
    pub grows: bool,
    /// Sort applied when the schema is (re)configured
    pub default_direction: Option<SortDirection>,
    pub render: Option<CellRenderer>,
}

impl fmt::Debug for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDef")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("column_type", &self.column_type)
            .field("sortable", &self.sortable)
            .field("filterable", &self.filterable)
            .field("hidden", &self.hidden)
            .field("grows", &self.grows)
            .field("default_direction", &self.default_direction)
            .field("render", &self.render.is_some())
            .finish()
    }
}

impl ColumnDef {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            column_type: ColumnType::Text,
            sortable: false,
            filterable: true,
            hidden: false,
            grows: false,
            default_direction: None,
            render: None,
        }
    }

    pub fn with_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = column_type;
        self
    }

    pub fn numeric(self) -> Self {
        self.with_type(ColumnType::Numeric)
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    /// Exclude the column from search matching
    pub fn not_filterable(mut self) -> Self {
        self.filterable = false;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn grows(mut self) -> Self {
        self.grows = true;
        self
    }

    pub fn default_sort(mut self, direction: SortDirection) -> Self {
        self.default_direction = Some(direction);
        self
    }

    pub fn with_renderer(
        mut self,
        render: impl Fn(&DataValue, &Row) -> String + Send + Sync + 'static,
    ) -> Self {
        self.render = Some(Arc::new(render));
        self
    }

    pub fn alignment(&self) -> Alignment {
        self.column_type.alignment()
    }

    /// Render this column's cell for a row, falling back to the value's text
    pub fn render_cell(&self, row: &Row) -> String {
        let value = row.get(&self.id).cloned().unwrap_or(DataValue::Null);
        match &self.render {
            Some(render) => render(&value, row),
            None => value.to_string(),
        }
    }
}

static REGISTRY_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Immutable, ordered set of columns for one table configuration
#[derive(Debug, Clone)]
pub struct ColumnRegistry {
    columns: Arc<Vec<ColumnDef>>,
    generation: u64,
}

impl ColumnRegistry {
    /// Build a registry. Column ids must be unique.
    pub fn new(columns: Vec<ColumnDef>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.id.as_str()) {
                return Err(anyhow!("Duplicate column id '{}'", column.id));
            }
        }

        Ok(Self {
            columns: Arc::new(columns),
            generation: REGISTRY_GENERATION.fetch_add(1, Ordering::SeqCst),
        })
    }

    pub fn empty() -> Self {
        Self {
            columns: Arc::new(Vec::new()),
            generation: REGISTRY_GENERATION.fetch_add(1, Ordering::SeqCst),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter()
    }

    /// Columns the presentation layer should draw
    pub fn visible_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| !c.hidden)
    }

    /// Columns searched by the filter stage; hidden columns included
    pub fn filterable_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.filterable)
    }

    pub fn has_filterable(&self) -> bool {
        self.columns.iter().any(|c| c.filterable)
    }

    pub fn is_sortable(&self, id: &str) -> bool {
        self.get(id).map(|c| c.sortable).unwrap_or(false)
    }

    /// First column declaring a default sort direction
    pub fn default_sort(&self) -> Option<(&str, SortDirection)> {
        self.columns
            .iter()
            .find_map(|c| c.default_direction.map(|d| (c.id.as_str(), d)))
    }
}

impl Default for ColumnRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_column_ids_rejected() {
        let result = ColumnRegistry::new(vec![
            ColumnDef::new("name", "Name"),
            ColumnDef::new("name", "Other"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_hidden_columns_still_filterable() {
        let registry = ColumnRegistry::new(vec![
            ColumnDef::new("name", "Name"),
            ColumnDef::new("entity_id", "Entity").hidden(),
            ColumnDef::new("actions", "")
                .with_type(ColumnType::OverflowMenu)
                .not_filterable(),
        ])
        .unwrap();

        let visible: Vec<&str> = registry.visible_columns().map(|c| c.id.as_str()).collect();
        assert_eq!(visible, vec!["name", "actions"]);

        let filterable: Vec<&str> = registry
            .filterable_columns()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(filterable, vec!["name", "entity_id"]);
    }

    #[test]
    fn test_type_table() {
        assert_eq!(ColumnType::Numeric.sort_key_kind(), SortKeyKind::Numeric);
        assert_eq!(ColumnType::Icon.sort_key_kind(), SortKeyKind::Text);
        assert_eq!(ColumnType::Numeric.alignment(), Alignment::End);
        assert_eq!(ColumnType::Text.alignment(), Alignment::Start);
    }

    #[test]
    fn test_default_sort_is_first_declared() {
        let registry = ColumnRegistry::new(vec![
            ColumnDef::new("a", "A").sortable(),
            ColumnDef::new("b", "B")
                .sortable()
                .default_sort(SortDirection::Descending),
            ColumnDef::new("c", "C")
                .sortable()
                .default_sort(SortDirection::Ascending),
        ])
        .unwrap();
        assert_eq!(
            registry.default_sort(),
            Some(("b", SortDirection::Descending))
        );
    }

    #[test]
    fn test_render_cell_uses_renderer() {
        let column = ColumnDef::new("temp", "Temperature")
            .numeric()
            .with_renderer(|value, _row| format!("{} °C", value));
        let row = Row::new(1).with("temp", 21);
        assert_eq!(column.render_cell(&row), "21 °C");

        let plain = ColumnDef::new("missing", "Missing");
        assert_eq!(plain.render_cell(&row), "");
    }
}
