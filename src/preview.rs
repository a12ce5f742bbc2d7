//! Filtered head-of-file preview with optional export

use anyhow::Result;
use tracing::{debug, instrument};

use crate::filter::RowFilter;
use crate::model::{Columns, Row};
use crate::source::{RowSink, RowSource};

/// What a preview pass saw
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preview {
    pub columns: Columns,
    /// Up to `head` matching rows
    pub rows: Vec<Row>,
    /// Matching rows exported, when an export sink was given
    pub written: Option<usize>,
}

/// Stream `source`, keeping the first `head` rows that pass `filter`.
///
/// With an `export` sink every matching row is also written there and the
/// whole file is read; without one, reading stops after `head` matches.
/// Filter columns missing from the header are a configuration error.
#[instrument(level = "info", skip_all, fields(source = %source.describe(), head = head))]
pub fn preview<S: RowSource + ?Sized>(
    source: &S,
    filter: &RowFilter,
    head: usize,
    export: Option<&mut dyn RowSink>,
) -> Result<Preview> {
    let columns = source.columns()?;
    filter.validate(&columns)?;

    let mut preview = Preview {
        columns: columns.clone(),
        ..Default::default()
    };
    let mut export = export;
    if let Some(sink) = export.as_deref_mut() {
        sink.begin(&columns)?;
    }

    let mut written = 0;
    for row in source.rows()? {
        let row = row?;
        if !filter.matches(&row) {
            continue;
        }
        if let Some(sink) = export.as_deref_mut() {
            sink.write_row(&row)?;
            written += 1;
        }
        if preview.rows.len() < head {
            preview.rows.push(row);
        } else if export.is_none() {
            break;
        }
    }

    if let Some(sink) = export.as_deref_mut() {
        sink.finish()?;
        preview.written = Some(written);
    }
    debug!(shown = preview.rows.len(), written = ?preview.written, "preview complete");
    Ok(preview)
}
