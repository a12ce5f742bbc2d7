//! Colored terminal output

use anyhow::Result;
use tabled::builder::Builder;
use tabled::settings::Style;
use termcolor::{Color, ColorSpec, WriteColor};

use super::{DetectReport, DiffReport, ExtractReport, OutputFormatter, PreviewReport, SplitReport};

/// Terminal output with colors
pub struct TerminalOutput {
    ok: ColorSpec,
    dim: ColorSpec,
}

impl TerminalOutput {
    pub fn new() -> Self {
        let mut ok = ColorSpec::new();
        ok.set_fg(Some(Color::Green)).set_bold(true);
        let mut dim = ColorSpec::new();
        dim.set_dimmed(true);
        Self { ok, dim }
    }

    fn write_ok(&self, writer: &mut dyn WriteColor, line: &str) -> Result<()> {
        writer.set_color(&self.ok)?;
        write!(writer, "✓ ")?;
        writer.reset()?;
        writeln!(writer, "{}", line)?;
        Ok(())
    }

    fn write_note(&self, writer: &mut dyn WriteColor, line: &str) -> Result<()> {
        writer.set_color(&self.dim)?;
        writeln!(writer, "{}", line)?;
        writer.reset()?;
        Ok(())
    }
}

impl Default for TerminalOutput {
    fn default() -> Self {
        Self::new()
    }
}

/// Render rows under a header as a boxed table
fn build_table(header: &[String], rows: &[Vec<String>]) -> String {
    let mut builder = Builder::default();
    builder.push_record(header.iter().cloned());
    for row in rows {
        builder.push_record(row.iter().cloned());
    }
    builder.build().with(Style::modern()).to_string()
}

fn display_delimiter(delimiter: char) -> String {
    match delimiter {
        '\t' => "\\t".to_string(),
        other => other.to_string(),
    }
}

impl OutputFormatter for TerminalOutput {
    fn render_preview(&self, report: &PreviewReport, writer: &mut dyn WriteColor) -> Result<()> {
        writeln!(writer, "Encoding:  {}", report.encoding)?;
        writeln!(writer, "Delimiter: '{}'", display_delimiter(report.delimiter))?;
        writeln!(writer, "Columns:   {:?}", report.columns)?;
        writeln!(writer)?;

        if report.rows.is_empty() {
            self.write_note(writer, "(no matching rows)")?;
        } else {
            writeln!(writer, "First {} rows:", report.rows.len())?;
            writeln!(writer, "{}", build_table(&report.columns, &report.rows))?;
        }

        if let (Some(out), Some(written)) = (&report.out, report.written) {
            writeln!(writer)?;
            self.write_ok(writer, &format!("Wrote {} ({} rows)", out.display(), written))?;
        }
        Ok(())
    }

    fn render_split(&self, report: &SplitReport, writer: &mut dyn WriteColor) -> Result<()> {
        let summary = &report.summary;
        self.write_ok(writer, &format!("Output directory: {}", report.out_dir.display()))?;
        self.write_ok(
            writer,
            &format!(
                "Partitions: {} (rows written: {})",
                summary.counts.len(),
                summary.total()
            ),
        )?;

        let ranked: Vec<Vec<String>> = summary
            .ranked()
            .into_iter()
            .map(|(value, n)| vec![value.to_string(), n.to_string()])
            .collect();
        if !ranked.is_empty() {
            let header = [report.column.clone(), "rows".to_string()];
            writeln!(writer, "{}", build_table(&header, &ranked))?;
        }

        if summary.skipped_empty > 0 || summary.skipped_excluded > 0 {
            self.write_note(
                writer,
                &format!(
                    "Skipped: {} with empty '{}', {} not in allow-list",
                    summary.skipped_empty, report.column, summary.skipped_excluded
                ),
            )?;
        }
        Ok(())
    }

    fn render_diff(&self, report: &DiffReport, writer: &mut dyn WriteColor) -> Result<()> {
        let target = |path: &Option<std::path::PathBuf>| {
            path.as_ref()
                .map(|p| format!(" -> {}", p.display()))
                .unwrap_or_default()
        };
        self.write_ok(
            writer,
            &format!("Added:   {} rows{}", report.summary.added, target(&report.out_added)),
        )?;
        if let Some(removed) = report.summary.removed {
            self.write_ok(
                writer,
                &format!("Removed: {} rows{}", removed, target(&report.out_removed)),
            )?;
        }
        Ok(())
    }

    fn render_extract(&self, report: &ExtractReport, writer: &mut dyn WriteColor) -> Result<()> {
        let summary = &report.summary;
        self.write_ok(
            writer,
            &format!(
                "Wrote {} ({} of {} rows)",
                report.out.display(),
                summary.written,
                summary.rows_read
            ),
        )?;
        self.write_note(
            writer,
            &format!(
                "Rejected: {} by assigned date, {} by company name",
                summary.rejected_date, summary.rejected_name
            ),
        )?;
        Ok(())
    }

    fn render_detect(&self, report: &DetectReport, writer: &mut dyn WriteColor) -> Result<()> {
        writeln!(writer, "{}: {}", report.path.display(), report.encoding)?;
        Ok(())
    }
}
