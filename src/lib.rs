//! Incremental tabular view engine.
//!
//! Given a collection of uniformly shaped rows and a column schema, keeps a
//! filtered, sorted view and a virtualized window over it up to date while
//! search text, sort clicks and selection arrive, without ever applying a
//! stale or out-of-order result.

pub mod config;
pub mod data;
pub mod debouncer;
pub mod debug;
pub mod engine;
pub mod pipeline;
pub mod state;
pub mod ui;
pub mod utils;

pub use config::EngineConfig;
pub use data::column::{Alignment, ColumnDef, ColumnRegistry, ColumnType};
pub use data::data_view::DataView;
pub use data::datatable::{DataValue, Row, RowId, RowStore};
pub use data::sort::{SortDirection, SortSpec};
pub use engine::TableEngine;
pub use pipeline::{PipelinePhase, PipelineWorker};
pub use state::{EngineEvent, HeaderCheckState, SubscriptionId};
pub use ui::{ViewEntry, ViewportWindow, WindowEntry};
pub use utils::clock::{Clock, ManualClock, SystemClock};
