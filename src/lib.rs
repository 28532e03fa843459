//! # docs2office
//!
//! A CLI utility to convert a markdown documentation tree into Word and PDF files.
//!
//! ## Current Features
//!
//! - Merge every markdown file into one combined document
//! - DOCX and PDF conversion through pandoc, per file and for the merged document
//! - JSON run report
//!
//! ## Usage
//!
//! ```bash
//! docs2office convert docs --report exports/report.json
//! ```

pub mod converter;
pub mod exporter;
pub mod merger;

pub use converter::{ConvertError, Converter, Pandoc, TargetFormat};
pub use exporter::{ExportOptions, ExportSummary, Exporter, FailedConversion};
pub use merger::MarkdownMerger;
