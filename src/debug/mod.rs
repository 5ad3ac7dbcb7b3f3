pub mod debug_trace;
pub mod engine_debug;

pub use debug_trace::{priority, render_report, DebugSection, DebugSectionBuilder, DebugTrace};
pub use engine_debug::{
    EventsDebugProvider, PipelineDebugProvider, SelectionDebugProvider, ViewDebugProvider,
    ViewportDebugProvider,
};
