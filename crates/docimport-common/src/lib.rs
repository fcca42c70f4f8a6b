//! docimport common library
//!
//! Shared utilities for the docimport workspace members:
//!
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//! - **Naming**: document store collection/field name validation and sanitization
//! - **Units**: human readable byte counts for progress and summaries

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod logging;
pub mod naming;
pub mod units;

// Re-export commonly used helpers
pub use naming::{sanitize_name, valid_collection_name, valid_field_name};
pub use units::byte_count_si;
