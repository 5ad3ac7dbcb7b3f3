//! Utility modules shared across the engine
//!
//! Time sources and tracing setup live here.

pub mod clock;
pub mod logging;
