//! Streaming CSV reader

use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::StringRecord;
use tracing::{debug, info};

use crate::config::ReadOptions;
use crate::encoding::{DecodingReader, TextEncoding};
use crate::error::PipelineError;
use crate::model::{Columns, Row, Table};

use super::{RowSource, Rows};

/// A delimited file on disk with its read options and resolved encoding
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    options: ReadOptions,
    encoding: TextEncoding,
}

impl CsvSource {
    /// Check the file exists and settle its encoding.
    ///
    /// A missing file fails here, before any processing starts.
    pub fn open(path: impl AsRef<Path>, options: &ReadOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(PipelineError::FileNotFound { path }.into());
        }
        let encoding = options.encoding.resolve(&path)?;
        info!(path = %path.display(), encoding = %encoding, "opened input");
        Ok(Self {
            path,
            options: options.clone(),
            encoding,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// File name without its extension
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// File name including its extension
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Open a lazy, single-pass stream of rows
    pub fn stream(&self) -> Result<RowStream> {
        RowStream::open(&self.path, &self.options, self.encoding)
    }

    /// Read every row into memory
    pub fn load(&self) -> Result<Table> {
        let mut stream = self.stream()?;
        let mut table = Table::new(stream.columns().clone());
        for row in stream.by_ref() {
            table.rows.push(row?);
        }
        debug!(path = %self.path.display(), rows = table.row_count(), "loaded table");
        Ok(table)
    }
}

impl RowSource for CsvSource {
    fn columns(&self) -> Result<Columns> {
        Ok(self.stream()?.columns().clone())
    }

    fn rows(&self) -> Result<Rows<'_>> {
        Ok(Box::new(self.stream()?))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

type DecodedReader = csv::Reader<DecodingReader<BufReader<File>>>;

/// Rows of one file, read lazily.
///
/// The header (or the first record, for headerless files) is read when the
/// stream opens. The file handle is released when the stream is dropped.
pub struct RowStream {
    path: PathBuf,
    reader: DecodedReader,
    columns: Columns,
    pending: Option<StringRecord>,
    record: StringRecord,
    line: u64,
    done: bool,
}

impl RowStream {
    fn open(path: &Path, options: &ReadOptions, encoding: TextEncoding) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => anyhow::Error::new(PipelineError::FileNotFound {
                path: path.to_path_buf(),
            }),
            _ => anyhow::Error::new(PipelineError::Io(e))
                .context(format!("Failed to open file: {}", path.display())),
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(DecodingReader::new(BufReader::new(file), encoding));

        let mut first = StringRecord::new();
        let has_first = reader
            .read_record(&mut first)
            .map_err(PipelineError::from)
            .with_context(|| format!("Failed to read first record of {}", path.display()))?;

        let (columns, pending) = match (has_first, options.has_header) {
            (false, _) => (Columns::empty(), None),
            (true, true) => (first.iter().map(str::to_string).collect(), None),
            (true, false) => (Columns::synthesize(first.len()), Some(first)),
        };

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            columns,
            pending,
            record: StringRecord::new(),
            line: 0,
            done: !has_first,
        })
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }
}

impl Iterator for RowStream {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(record) = self.pending.take() {
            self.line += 1;
            return Some(Ok(Row::from_record(&self.columns, &record, self.line)));
        }
        if self.done {
            return None;
        }

        match self.reader.read_record(&mut self.record) {
            Ok(true) => {
                self.line += 1;
                Some(Ok(Row::from_record(&self.columns, &self.record, self.line)))
            }
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                let row = self.line + 1;
                Some(Err(anyhow::Error::new(PipelineError::Csv(e)).context(format!(
                    "Failed to read row {} of {}",
                    row,
                    self.path.display()
                ))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::EncodingChoice;
    use std::io::Write;

    fn write_csv(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn test_stream_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "a.csv", b"id,name\n1,A\n2,B\n");
        let source = CsvSource::open(&path, &ReadOptions::default()).unwrap();

        let stream = source.stream().unwrap();
        assert_eq!(stream.columns().names(), ["id", "name"]);
        let rows: Vec<Row> = stream.collect::<Result<_>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("name"), Some("B"));
        assert_eq!(rows[1].line(), 2);
    }

    #[test]
    fn test_headerless_synthesizes_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "raw.csv", b"1,A,x\n2,B\n3,C,y,extra\n");
        let options = ReadOptions::default().with_header(false);
        let source = CsvSource::open(&path, &options).unwrap();

        let table = source.load().unwrap();
        assert_eq!(table.columns.names(), ["col_1", "col_2", "col_3"]);
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.rows[0].values(), ["1", "A", "x"]);
        assert_eq!(table.rows[1].values(), ["2", "B", ""]);
        assert_eq!(table.rows[2].values(), ["3", "C", "y"]);
    }

    #[test]
    fn test_bulk_and_stream_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "b.csv", b"k;v\n1;a\n2\n3;c;zz\n");
        for has_header in [true, false] {
            let options = ReadOptions::default()
                .with_delimiter(b';')
                .with_header(has_header);
            let source = CsvSource::open(&path, &options).unwrap();
            let bulk = source.load().unwrap();
            let streamed: Vec<Row> = source.rows().unwrap().collect::<Result<_>>().unwrap();
            assert_eq!(bulk.columns, source.columns().unwrap());
            assert_eq!(bulk.rows, streamed);
        }
    }

    #[test]
    fn test_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "empty.csv", b"");
        for has_header in [true, false] {
            let options = ReadOptions::default().with_header(has_header);
            let source = CsvSource::open(&path, &options).unwrap();
            let table = source.load().unwrap();
            assert!(table.columns.is_empty());
            assert!(table.is_empty());
        }
    }

    #[test]
    fn test_shift_jis_input() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = TextEncoding::Cp932.encode("id,prefecture\n1,東京都\n");
        let path = write_csv(&dir, "sjis.csv", &bytes);

        let source = CsvSource::open(&path, &ReadOptions::default()).unwrap();
        assert_eq!(source.encoding(), TextEncoding::Cp932);
        let table = source.load().unwrap();
        assert_eq!(table.rows[0].get("prefecture"), Some("東京都"));

        let explicit = ReadOptions::default()
            .with_encoding(EncodingChoice::Explicit(TextEncoding::ShiftJis));
        let source = CsvSource::open(&path, &explicit).unwrap();
        assert_eq!(source.encoding(), TextEncoding::ShiftJis);
    }

    #[test]
    fn test_bom_is_not_part_of_header() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = TextEncoding::Utf8Sig.encode("id,name\n1,A\n");
        let path = write_csv(&dir, "bom.csv", &bytes);
        let source = CsvSource::open(&path, &ReadOptions::default()).unwrap();
        assert_eq!(source.columns().unwrap().names(), ["id", "name"]);
    }

    #[test]
    fn test_missing_file() {
        let err = CsvSource::open("/no/such/file.csv", &ReadOptions::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "13_tokyo_all.csv", b"a\n");
        let source = CsvSource::open(&path, &ReadOptions::default()).unwrap();
        assert_eq!(source.stem(), "13_tokyo_all");
        assert_eq!(source.file_name(), "13_tokyo_all.csv");
    }
}
