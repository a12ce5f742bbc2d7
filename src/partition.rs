//! Split one file into one output file per distinct column value

use std::collections::hash_map::Entry;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::WriteOptions;
use crate::model::Row;
use crate::source::{ensure_not_input, CsvSink, RowSink, RowSource};

/// File name template used when none is given
pub const DEFAULT_TEMPLATE: &str = "{pref}_{stem}_filtered.csv";

const UNSAFE_FILENAME_CHARS: &[char] = &[
    '\\', '/', ':', '*', '?', '"', '<', '>', '|', '\n', '\r', '\t',
];

/// Remove characters that are unsafe in a file name
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !UNSAFE_FILENAME_CHARS.contains(c))
        .collect()
}

/// Names describing the input file, available to templates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputName {
    /// File name without extension
    pub stem: String,
    /// File name with extension
    pub base: String,
    /// The input itself; no partition may be written over it
    pub path: PathBuf,
}

impl InputName {
    pub fn from_path(path: &Path) -> Self {
        let lossy = |s: Option<&std::ffi::OsStr>| {
            s.map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        Self {
            stem: lossy(path.file_stem()),
            base: lossy(path.file_name()),
            path: path.to_path_buf(),
        }
    }
}

/// Output file name template.
///
/// Placeholders: `{partition_value}` (alias `{pref}`), `{stem}`, `{base}`.
/// The template is scanned once, so braces inside substituted text are kept
/// literally. Unknown placeholders are left as written. The rendered name
/// is sanitized as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate(String);

impl NameTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn render(&self, value: &str, input: &InputName) -> String {
        let mut name = String::with_capacity(self.0.len() + value.len());
        let mut rest = self.0.as_str();
        while let Some(open) = rest.find('{') {
            name.push_str(&rest[..open]);
            let tail = &rest[open..];
            let Some(close) = tail.find('}') else {
                rest = tail;
                break;
            };
            let substitute = match &tail[1..close] {
                "partition_value" | "pref" => Some(value),
                "stem" => Some(input.stem.as_str()),
                "base" => Some(input.base.as_str()),
                _ => None,
            };
            match substitute {
                Some(text) => {
                    name.push_str(text);
                    rest = &tail[close + 1..];
                }
                None => {
                    name.push('{');
                    rest = &tail[1..];
                }
            }
        }
        name.push_str(rest);
        sanitize_filename(&name)
    }
}

impl Default for NameTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

/// Outcome of one partitioning run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionSummary {
    /// Rows written per partition value, in order of first appearance
    pub counts: IndexMap<String, usize>,
    /// Output file per partition value
    pub files: IndexMap<String, PathBuf>,
    /// Data rows read from the input
    pub rows_read: usize,
    /// Rows whose partition value was empty after trimming
    pub skipped_empty: usize,
    /// Rows whose partition value was not on the allow-list
    pub skipped_excluded: usize,
}

impl PartitionSummary {
    /// Rows written across all partitions
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Partitions ordered by row count descending, then by value
    pub fn ranked(&self) -> Vec<(&str, usize)> {
        let mut ranked: Vec<(&str, usize)> = self
            .counts
            .iter()
            .map(|(value, &n)| (value.as_str(), n))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

/// Splits rows by the trimmed value of one column
#[derive(Debug, Clone)]
pub struct Partitioner {
    column: String,
    out_dir: PathBuf,
    include: Option<FxHashSet<String>>,
    template: NameTemplate,
    write: WriteOptions,
}

impl Partitioner {
    pub fn new(column: impl Into<String>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            column: column.into(),
            out_dir: out_dir.into(),
            include: None,
            template: NameTemplate::default(),
            write: WriteOptions::default(),
        }
    }

    /// Only emit partitions whose value is in `values`
    pub fn with_include<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_template(mut self, template: NameTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_write_options(mut self, write: WriteOptions) -> Self {
        self.write = write;
        self
    }

    fn admits<'r>(&self, row: &'r Row, summary: &mut PartitionSummary) -> Option<&'r str> {
        let value = row.get_or_empty(&self.column).trim();
        if value.is_empty() {
            summary.skipped_empty += 1;
            return None;
        }
        if let Some(include) = &self.include {
            if !include.contains(value) {
                summary.skipped_excluded += 1;
                return None;
            }
        }
        Some(value)
    }

    /// Stream `source` once, writing each admitted row to its partition file.
    ///
    /// Output files are opened lazily on the first row of each value and
    /// carry the source header. Values that sanitize to the same file name
    /// share that file. Fails with `ColumnNotFound` before writing anything
    /// if the partition column is not in the header.
    #[instrument(level = "info", skip_all, fields(source = %source.describe(), column = %self.column))]
    pub fn partition<S: RowSource + ?Sized>(
        &self,
        source: &S,
        input: &InputName,
    ) -> Result<PartitionSummary> {
        let columns = source.columns()?;
        let mut summary = PartitionSummary::default();
        if columns.is_empty() {
            debug!("input is empty, nothing to partition");
            return Ok(summary);
        }
        columns.require(&self.column)?;

        fs::create_dir_all(&self.out_dir).with_context(|| {
            format!("Failed to create output directory: {}", self.out_dir.display())
        })?;

        let mut sinks: FxHashMap<String, CsvSink> = FxHashMap::default();
        for row in source.rows()? {
            let row = row?;
            summary.rows_read += 1;
            let Some(value) = self.admits(&row, &mut summary) else {
                continue;
            };

            let file_name = self.template.render(value, input);
            let sink = match sinks.entry(file_name) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let path = self.out_dir.join(entry.key());
                    ensure_not_input(&path, &[input.path.as_path()])?;
                    info!(value, path = %path.display(), "opening partition");
                    let mut sink = CsvSink::new(path, &self.write);
                    sink.begin(&columns)?;
                    entry.insert(sink)
                }
            };
            sink.write_row(&row)?;

            if !summary.files.contains_key(value) {
                summary
                    .files
                    .insert(value.to_string(), sink.path().to_path_buf());
            }
            *summary.counts.entry(value.to_string()).or_insert(0) += 1;
        }

        for sink in sinks.values_mut() {
            sink.finish()?;
        }

        info!(
            partitions = summary.counts.len(),
            written = summary.total(),
            skipped_empty = summary.skipped_empty,
            skipped_excluded = summary.skipped_excluded,
            "partitioning complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::TextEncoding;
    use crate::error::PipelineError;
    use crate::model::{Columns, Table};

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        let columns: Columns = columns.iter().copied().collect();
        let mut table = Table::new(columns.clone());
        for (i, values) in rows.iter().enumerate() {
            let values = values.iter().map(|v| v.to_string()).collect();
            table.rows.push(Row::new(columns.clone(), values, i as u64 + 1));
        }
        table
    }

    fn input() -> InputName {
        InputName {
            stem: "zenkoku".into(),
            base: "zenkoku.csv".into(),
            path: PathBuf::new(),
        }
    }

    fn utf8() -> WriteOptions {
        WriteOptions::default().with_encoding(TextEncoding::Utf8)
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a/b\\c:d*e?f\"g<h>i|j\nk\rl\tm"), "abcdefghijklm");
        assert_eq!(sanitize_filename("東京都_all.csv"), "東京都_all.csv");
    }

    #[test]
    fn test_template_render() {
        let template = NameTemplate::default();
        assert_eq!(template.render("東京都", &input()), "東京都_zenkoku_filtered.csv");

        let custom = NameTemplate::new("{base}-{partition_value}.csv");
        assert_eq!(custom.render("a/b", &input()), "zenkoku.csv-ab.csv");
    }

    #[test]
    fn test_template_keeps_braces_in_values() {
        let template = NameTemplate::default();
        assert_eq!(template.render("{stem}", &input()), "{stem}_zenkoku_filtered.csv");
        assert_eq!(template.render("{pref}", &input()), "{pref}_zenkoku_filtered.csv");

        let odd = NameTemplate::new("{unknown}_{{pref}_{stem");
        assert_eq!(odd.render("A", &input()), "{unknown}_{A_{stem");
    }

    #[test]
    fn test_placeholder_like_values_get_their_own_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = table(&["pref", "x"], &[&["zenkoku", "1"], &["{stem}", "2"]]);
        let summary = Partitioner::new("pref", dir.path())
            .with_write_options(utf8())
            .partition(&source, &input())
            .unwrap();

        assert_ne!(summary.files["zenkoku"], summary.files["{stem}"]);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
        let braces = fs::read_to_string(dir.path().join("{stem}_zenkoku_filtered.csv")).unwrap();
        assert_eq!(braces, "pref,x\n{stem},2\n");
    }

    #[test]
    fn test_input_name_from_path() {
        let name = InputName::from_path(Path::new("/data/00_zenkoku_all_20250630.csv"));
        assert_eq!(name.stem, "00_zenkoku_all_20250630");
        assert_eq!(name.base, "00_zenkoku_all_20250630.csv");
    }

    #[test]
    fn test_partition_counts_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = table(
            &["pref", "x"],
            &[&["Tokyo", "1"], &["Osaka", "2"], &["Tokyo", "3"]],
        );
        let summary = Partitioner::new("pref", dir.path())
            .with_write_options(utf8())
            .partition(&source, &input())
            .unwrap();

        assert_eq!(summary.counts.get("Tokyo"), Some(&2));
        assert_eq!(summary.counts.get("Osaka"), Some(&1));
        assert_eq!(summary.ranked(), vec![("Tokyo", 2), ("Osaka", 1)]);

        let tokyo = fs::read_to_string(dir.path().join("Tokyo_zenkoku_filtered.csv")).unwrap();
        assert_eq!(tokyo, "pref,x\nTokyo,1\nTokyo,3\n");
        let osaka = fs::read_to_string(&summary.files["Osaka"]).unwrap();
        assert_eq!(osaka, "pref,x\nOsaka,2\n");
    }

    #[test]
    fn test_partition_skips_empty_and_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let source = table(
            &["id", "prefecture"],
            &[
                &["1", " 東京都 "],
                &["2", ""],
                &["3", "   "],
                &["4", "大阪府"],
                &["5", "北海道"],
            ],
        );
        let summary = Partitioner::new("prefecture", dir.path())
            .with_include(["東京都", "大阪府"])
            .partition(&source, &input())
            .unwrap();

        assert_eq!(summary.rows_read, 5);
        assert_eq!(summary.skipped_empty, 2);
        assert_eq!(summary.skipped_excluded, 1);
        assert_eq!(summary.total(), 2);
        assert_eq!(
            summary.total() + summary.skipped_empty + summary.skipped_excluded,
            summary.rows_read
        );
        assert!(!dir.path().join("北海道_zenkoku_filtered.csv").exists());

        // original (untrimmed) values are written
        let bytes = fs::read(dir.path().join("東京都_zenkoku_filtered.csv")).unwrap();
        assert_eq!(bytes, TextEncoding::Utf8Sig.encode("id,prefecture\n1, 東京都 \n"));
    }

    #[test]
    fn test_missing_column_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = table(&["id", "name"], &[&["1", "A"]]);
        let err = Partitioner::new("prefecture", dir.path().join("out"))
            .partition(&source, &input())
            .unwrap_err();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::ColumnNotFound { column, available }) => {
                assert_eq!(column, "prefecture");
                assert_eq!(available, &["id".to_string(), "name".to_string()]);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_partition_never_overwrites_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zenkoku.csv");
        fs::write(&path, "pref,x\nzenkoku,1\n").unwrap();
        let source = table(&["pref", "x"], &[&["zenkoku", "1"]]);

        let err = Partitioner::new("pref", dir.path())
            .with_template(NameTemplate::new("{base}"))
            .partition(&source, &InputName::from_path(&path))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::OutputIsInput { .. })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "pref,x\nzenkoku,1\n");
    }

    #[test]
    fn test_empty_source() {
        let dir = tempfile::tempdir().unwrap();
        let summary = Partitioner::new("pref", dir.path())
            .partition(&Table::default(), &input())
            .unwrap();
        assert_eq!(summary, PartitionSummary::default());
    }

    #[test]
    fn test_partition_is_idempotent() {
        let source = table(
            &["pref", "x"],
            &[&["B", "1"], &["A", "2"], &["B", "3"], &["C", "4"]],
        );
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let partitioner = Partitioner::new("pref", first.path());
        partitioner.partition(&source, &input()).unwrap();
        Partitioner::new("pref", second.path())
            .partition(&source, &input())
            .unwrap();

        for value in ["A", "B", "C"] {
            let name = format!("{}_zenkoku_filtered.csv", value);
            assert_eq!(
                fs::read(first.path().join(&name)).unwrap(),
                fs::read(second.path().join(&name)).unwrap()
            );
        }
    }
}
