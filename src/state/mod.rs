//! Engine state that lives outside the view pipeline
//!
//! Selection is keyed by row identity and survives view recomputation;
//! events and the dispatcher carry notifications to the view surface.

pub mod dispatcher;
pub mod events;
pub mod selection;

pub use dispatcher::{EngineSubscriber, EventDispatcher, SubscriptionId};
pub use events::{EngineEvent, EventKind};
pub use selection::{HeaderCheckState, SelectionManager};
