//! zenkoku - streaming tools for Japanese corporate registry CSV exports
//!
//! Splits registry files by prefecture, filters them by date and substring,
//! diffs successive exports by key, and extracts lead lists from the raw
//! national corporate-number dump. Every operation streams its input; only
//! the differ keeps per-key state in memory.

pub mod config;
pub mod diff;
pub mod encoding;
pub mod enrich;
pub mod error;
pub mod filter;
pub mod model;
pub mod output;
pub mod partition;
pub mod preview;
pub mod registry;
pub mod source;

pub use config::{ReadOptions, WriteOptions};
pub use diff::{DiffResult, DiffSummary, Differ};
pub use error::PipelineError;
pub use model::{Columns, Key, KeySpec, Row, Table};
pub use partition::Partitioner;
pub use source::{CsvSink, CsvSource, RowSink, RowSource};
