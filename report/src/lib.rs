//! Report generation for benchmark results
//!
//! This crate turns a finished run's `Summary` into:
//!
//! - A console report in the same banner layout as the run log
//! - A pretty-printed JSON document

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod json;
pub mod text;

pub use json::{export_json, ReportError};
pub use text::{render_summary, UNAVAILABLE};
