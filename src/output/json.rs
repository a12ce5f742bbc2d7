//! JSON output format

use anyhow::Result;
use serde::Serialize;
use termcolor::WriteColor;

use super::{DetectReport, DiffReport, ExtractReport, OutputFormatter, PreviewReport, SplitReport};

/// JSON output formatter
pub struct JsonOutput {
    pretty: bool,
}

impl JsonOutput {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    pub fn compact() -> Self {
        Self { pretty: false }
    }

    fn write<T: Serialize>(&self, value: &T, writer: &mut dyn WriteColor) -> Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut *writer, value)?;
        } else {
            serde_json::to_writer(&mut *writer, value)?;
        }
        writeln!(writer)?;
        Ok(())
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for JsonOutput {
    fn render_preview(&self, report: &PreviewReport, writer: &mut dyn WriteColor) -> Result<()> {
        self.write(report, writer)
    }

    fn render_split(&self, report: &SplitReport, writer: &mut dyn WriteColor) -> Result<()> {
        self.write(report, writer)
    }

    fn render_diff(&self, report: &DiffReport, writer: &mut dyn WriteColor) -> Result<()> {
        self.write(report, writer)
    }

    fn render_extract(&self, report: &ExtractReport, writer: &mut dyn WriteColor) -> Result<()> {
        self.write(report, writer)
    }

    fn render_detect(&self, report: &DetectReport, writer: &mut dyn WriteColor) -> Result<()> {
        self.write(report, writer)
    }
}
