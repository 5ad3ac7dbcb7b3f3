//! The view pipeline: filter+sort requests, their execution, and the
//! coordinator that sequences them.

pub mod coordinator;
pub mod memo;
pub mod request;
pub mod worker;

pub use coordinator::{PipelineCoordinator, PipelinePhase, PipelineStats};
pub use worker::{DeferredHandle, DeferredWorker, InlineWorker, PipelineWorker, ThreadWorker};
