//! Configuration module
//!
//! Engine settings loaded from TOML: pipeline timing, viewport geometry
//! and table behaviour.

pub mod config;

pub use config::{EngineConfig, PipelineConfig, TableConfig, ViewportConfig};
