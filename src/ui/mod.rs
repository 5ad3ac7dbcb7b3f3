//! Presentation-side helpers that stay independent of any renderer

pub mod virtualizer;

pub use virtualizer::{ViewEntry, ViewportWindow, Virtualizer, WindowEntry};
