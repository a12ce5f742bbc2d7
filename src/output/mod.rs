//! Rendering of run reports

mod json;
mod terminal;

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;
use termcolor::WriteColor;

use crate::config::OutputFormat;
use crate::diff::DiffSummary;
use crate::encoding::TextEncoding;
use crate::partition::PartitionSummary;
use crate::registry::ExtractSummary;

pub use json::JsonOutput;
pub use terminal::TerminalOutput;

/// Trait for output formatters
pub trait OutputFormatter {
    fn render_preview(&self, report: &PreviewReport, writer: &mut dyn WriteColor) -> Result<()>;
    fn render_split(&self, report: &SplitReport, writer: &mut dyn WriteColor) -> Result<()>;
    fn render_diff(&self, report: &DiffReport, writer: &mut dyn WriteColor) -> Result<()>;
    fn render_extract(&self, report: &ExtractReport, writer: &mut dyn WriteColor) -> Result<()>;
    fn render_detect(&self, report: &DetectReport, writer: &mut dyn WriteColor) -> Result<()>;
}

/// Factory for creating output formatters
pub struct OutputFactory;

impl OutputFactory {
    pub fn create(format: OutputFormat) -> Box<dyn OutputFormatter> {
        match format {
            OutputFormat::Terminal => Box::new(TerminalOutput::new()),
            OutputFormat::Json => Box::new(JsonOutput::new()),
        }
    }
}

/// Head of a filtered file, plus the export count when one was written
#[derive(Debug, Clone, Serialize)]
pub struct PreviewReport {
    pub path: PathBuf,
    pub encoding: TextEncoding,
    pub delimiter: char,
    pub columns: Vec<String>,
    /// First matching rows, in `columns` order
    pub rows: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out: Option<PathBuf>,
    /// Matching rows written to `out`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitReport {
    pub path: PathBuf,
    pub out_dir: PathBuf,
    pub column: String,
    #[serde(flatten)]
    pub summary: PartitionSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiffReport {
    pub old: PathBuf,
    pub new: PathBuf,
    pub key_columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_added: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_removed: Option<PathBuf>,
    #[serde(flatten)]
    pub summary: DiffSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractReport {
    pub path: PathBuf,
    pub out: PathBuf,
    #[serde(flatten)]
    pub summary: ExtractSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectReport {
    pub path: PathBuf,
    pub encoding: TextEncoding,
}
