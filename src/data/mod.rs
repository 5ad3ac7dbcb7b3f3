//! Data layer: rows, columns, and the pure filter/sort stages
//!
//! Everything here is synchronous and free of I/O apart from the loaders.
//! The pipeline module composes these pieces into the derived view.

// Core data model
pub mod column;
pub mod datatable;
pub mod datavalue_compare;

// Pipeline stages
pub mod filter;
pub mod sort;

// Derived view
pub mod data_view;

// Row sources
pub mod datatable_loaders;
