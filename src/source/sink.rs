//! Row sinks: where pipeline output goes

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::WriteOptions;
use crate::encoding::EncodingWriter;
use crate::error::PipelineError;
use crate::model::{Columns, Row, Table};

/// Receives a header, then rows sharing it
pub trait RowSink {
    /// Called once before any row, with the header of the rows to come
    fn begin(&mut self, columns: &Columns) -> Result<()>;

    fn write_row(&mut self, row: &Row) -> Result<()>;

    /// Flush buffered output
    fn finish(&mut self) -> Result<()>;
}

impl RowSink for Table {
    fn begin(&mut self, columns: &Columns) -> Result<()> {
        self.columns = columns.clone();
        self.rows.clear();
        Ok(())
    }

    fn write_row(&mut self, row: &Row) -> Result<()> {
        self.push(row);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Fail when `output` resolves to one of `inputs`.
///
/// Sinks truncate their file on `begin`, before the input has been read.
/// A path that does not exist yet cannot be an input.
pub fn ensure_not_input(output: &Path, inputs: &[&Path]) -> Result<(), PipelineError> {
    let Ok(target) = output.canonicalize() else {
        return Ok(());
    };
    if inputs
        .iter()
        .any(|input| input.canonicalize().is_ok_and(|input| input == target))
    {
        return Err(PipelineError::OutputIsInput {
            path: output.to_path_buf(),
        });
    }
    Ok(())
}

type EncodedCsv = csv::Writer<EncodingWriter<BufWriter<File>>>;

/// A delimited output file.
///
/// Nothing touches the disk until [`RowSink::begin`]; the file is then
/// created (truncating any existing one) and the header written. By default
/// the header of the incoming rows is used; [`CsvSink::with_layout`] fixes
/// an explicit column order instead, filling absent columns with "".
pub struct CsvSink {
    path: PathBuf,
    options: WriteOptions,
    layout: Option<Vec<String>>,
    writer: Option<EncodedCsv>,
    rows_written: usize,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>, options: &WriteOptions) -> Self {
        Self {
            path: path.into(),
            options: options.clone(),
            layout: None,
            writer: None,
            rows_written: 0,
        }
    }

    /// Write exactly these columns, in this order
    pub fn with_layout(mut self, columns: Vec<String>) -> Self {
        self.layout = Some(columns);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }
}

impl RowSink for CsvSink {
    fn begin(&mut self, columns: &Columns) -> Result<()> {
        let file = File::create(&self.path)
            .map_err(PipelineError::from)
            .with_context(|| format!("Failed to create output file: {}", self.path.display()))?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.options.delimiter)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(EncodingWriter::new(BufWriter::new(file), self.options.encoding));

        let header: Vec<&str> = match &self.layout {
            Some(layout) => layout.iter().map(String::as_str).collect(),
            None => columns.iter().collect(),
        };
        // a source without columns gets no header row
        if !header.is_empty() {
            writer
                .write_record(&header)
                .map_err(PipelineError::from)
                .with_context(|| format!("Failed to write header to {}", self.path.display()))?;
        }

        self.writer = Some(writer);
        self.rows_written = 0;
        Ok(())
    }

    fn write_row(&mut self, row: &Row) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .with_context(|| format!("output {} written before begin()", self.path.display()))?;
        let result = match &self.layout {
            Some(layout) => writer.write_record(row.project(layout)),
            None => writer.write_record(row.values()),
        };
        result
            .map_err(PipelineError::from)
            .with_context(|| format!("Failed to write row to {}", self.path.display()))?;
        self.rows_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer
                .flush()
                .map_err(PipelineError::from)
                .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::TextEncoding;

    #[test]
    fn test_output_may_not_be_an_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("new.csv");
        std::fs::write(&input, "id\n1\n").unwrap();
        let other = dir.path().join("old.csv");
        std::fs::write(&other, "id\n1\n").unwrap();

        let aliased = dir.path().join(".").join("new.csv");
        assert!(matches!(
            ensure_not_input(&aliased, &[other.as_path(), input.as_path()]),
            Err(PipelineError::OutputIsInput { .. })
        ));
        assert!(ensure_not_input(&dir.path().join("added.csv"), &[input.as_path()]).is_ok());
        assert!(ensure_not_input(&other, &[input.as_path()]).is_ok());
        assert_eq!(std::fs::read_to_string(&input).unwrap(), "id\n1\n");
    }

    #[test]
    fn test_csv_sink_writes_bom_and_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let columns: Columns = ["id", "name"].into_iter().collect();

        let mut sink = CsvSink::new(&path, &WriteOptions::default());
        sink.begin(&columns).unwrap();
        sink.write_row(&Row::new(columns.clone(), vec!["1".into(), "株式会社A".into()], 1))
            .unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.rows_written(), 1);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes, TextEncoding::Utf8Sig.encode("id,name\n1,株式会社A\n"));
    }

    #[test]
    fn test_csv_sink_layout_fills_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let options = WriteOptions::default().with_encoding(TextEncoding::Utf8);
        let row = Row::from_pairs([("company", "A"), ("id", "1")]);

        let mut sink = CsvSink::new(&path, &options)
            .with_layout(vec!["id".into(), "company".into(), "homepage_url".into()]);
        sink.begin(row.columns()).unwrap();
        sink.write_row(&row).unwrap();
        sink.finish().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "id,company,homepage_url\n1,A,\n");
    }

    #[test]
    fn test_csv_sink_cp932_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let options = WriteOptions::default().with_encoding(TextEncoding::Cp932);
        let row = Row::from_pairs([("prefecture", "大阪府")]);

        let mut sink = CsvSink::new(&path, &options);
        sink.begin(row.columns()).unwrap();
        sink.write_row(&row).unwrap();
        sink.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes, TextEncoding::Cp932.encode("prefecture\n大阪府\n"));
    }

    #[test]
    fn test_write_before_begin_fails() {
        let mut sink = CsvSink::new("unused.csv", &WriteOptions::default());
        assert!(sink.write_row(&Row::from_pairs([("a", "1")])).is_err());
    }

    #[test]
    fn test_table_sink() {
        let columns: Columns = ["a"].into_iter().collect();
        let mut table = Table::default();
        table.begin(&columns).unwrap();
        table.write_row(&Row::from_pairs([("a", "x")])).unwrap();
        table.finish().unwrap();
        assert_eq!(table.columns, columns);
        assert_eq!(table.rows[0].get("a"), Some("x"));
    }
}
