//! Set difference between two row sources by key
//!
//! `added` are rows of the new source whose key the old source lacks,
//! `removed` the reverse. Only key sets are held in memory; rows stream
//! straight from the inputs to the outputs.

mod keyset;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, instrument};

use crate::model::{KeySpec, Table};
use crate::source::{RowSink, RowSource};

pub use keyset::{read_key_set, KeySet};

/// Counts from one diff run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    /// Rows of the new source whose key is absent from the old source
    pub added: usize,
    /// Rows of the old source whose key is absent from the new source;
    /// `None` when removals were not requested
    pub removed: Option<usize>,
}

/// Both sides of a diff, materialized
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// Added rows, under the new source's header
    pub added: Table,
    /// Removed rows, under the old source's header
    pub removed: Table,
    pub added_count: usize,
    pub removed_count: usize,
}

/// Diff engine keyed by a fixed list of columns
#[derive(Debug, Clone)]
pub struct Differ {
    key: KeySpec,
}

impl Differ {
    pub fn new(key: KeySpec) -> Self {
        Self { key }
    }

    /// Diff `old` against `new`, writing rows to whichever sinks are given.
    ///
    /// The old key set is built first and the new source streamed once
    /// against it. Removals cost a second key set (of `new`) and a second
    /// pass over `old`, so they are only computed when `removed` is given.
    /// The `added` sink receives the new header, `removed` the old one.
    #[instrument(level = "info", skip_all, fields(old = %old.describe(), new = %new.describe()))]
    pub fn diff<O, N>(
        &self,
        old: &O,
        new: &N,
        added: Option<&mut dyn RowSink>,
        removed: Option<&mut dyn RowSink>,
    ) -> Result<DiffSummary>
    where
        O: RowSource + ?Sized,
        N: RowSource + ?Sized,
    {
        let old_columns = old.columns()?;
        let new_columns = new.columns()?;
        self.key
            .validate(&old_columns)
            .with_context(|| format!("key columns missing from {}", old.describe()))?;
        self.key
            .validate(&new_columns)
            .with_context(|| format!("key columns missing from {}", new.describe()))?;

        let old_keys = read_key_set(old, &self.key)?;

        let mut summary = DiffSummary::default();
        let mut added = added;
        if let Some(sink) = added.as_deref_mut() {
            sink.begin(&new_columns)?;
        }
        for row in new.rows()? {
            let row = row?;
            if !old_keys.contains(&self.key.key(&row)) {
                if let Some(sink) = added.as_deref_mut() {
                    sink.write_row(&row)?;
                }
                summary.added += 1;
            }
        }
        if let Some(sink) = added.as_deref_mut() {
            sink.finish()?;
        }
        drop(old_keys);

        if let Some(sink) = removed {
            let new_keys = read_key_set(new, &self.key)?;
            let mut count = 0;
            sink.begin(&old_columns)?;
            for row in old.rows()? {
                let row = row?;
                if !new_keys.contains(&self.key.key(&row)) {
                    sink.write_row(&row)?;
                    count += 1;
                }
            }
            sink.finish()?;
            summary.removed = Some(count);
        }

        info!(added = summary.added, removed = ?summary.removed, "diff complete");
        Ok(summary)
    }

    /// Diff into in-memory tables, computing both directions
    pub fn diff_tables<O, N>(&self, old: &O, new: &N) -> Result<DiffResult>
    where
        O: RowSource + ?Sized,
        N: RowSource + ?Sized,
    {
        let mut added = Table::default();
        let mut removed = Table::default();
        let summary = self.diff(
            old,
            new,
            Some(&mut added as &mut dyn RowSink),
            Some(&mut removed as &mut dyn RowSink),
        )?;
        Ok(DiffResult {
            added,
            removed,
            added_count: summary.added,
            removed_count: summary.removed.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::model::{Columns, Row};

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        let columns: Columns = columns.iter().copied().collect();
        let mut table = Table::new(columns.clone());
        for values in rows {
            table.push(&Row::new(
                columns.clone(),
                values.iter().map(|v| v.to_string()).collect(),
                0,
            ));
        }
        table
    }

    fn ids(table: &Table) -> Vec<&str> {
        table.column_values("id").collect()
    }

    fn by_id() -> Differ {
        Differ::new(KeySpec::parse("id"))
    }

    #[test]
    fn test_added_and_removed() {
        let old = table(&["id", "name"], &[&["1", "A"], &["2", "B"]]);
        let new = table(&["id", "name"], &[&["1", "A"], &["3", "C"]]);

        let result = by_id().diff_tables(&old, &new).unwrap();
        assert_eq!(result.added_count, 1);
        assert_eq!(result.removed_count, 1);
        assert_eq!(result.added.rows[0].values(), ["3", "C"]);
        assert_eq!(result.removed.rows[0].values(), ["2", "B"]);
    }

    #[test]
    fn test_symmetry() {
        let a = table(&["id"], &[&["1"], &["2"], &["4"], &["4"]]);
        let b = table(&["id"], &[&["2"], &["3"], &["5"]]);
        let ab = by_id().diff_tables(&a, &b).unwrap();
        let ba = by_id().diff_tables(&b, &a).unwrap();
        assert_eq!(ab.added, ba.removed);
        assert_eq!(ab.removed, ba.added);
        assert_eq!(ids(&ab.removed), ["1", "4", "4"]);
    }

    #[test]
    fn test_self_diff_is_empty() {
        let a = table(&["id", "v"], &[&["1", "x"], &["2", "y"], &["2", "z"]]);
        let result = by_id().diff_tables(&a, &a).unwrap();
        assert_eq!(result.added_count, 0);
        assert_eq!(result.removed_count, 0);
    }

    #[test]
    fn test_headers_follow_each_side() {
        let old = table(&["id", "legacy"], &[&["1", "x"]]);
        let new = table(&["code", "id", "extra"], &[&["c", "2", "e"]]);
        let result = by_id().diff_tables(&old, &new).unwrap();
        assert_eq!(result.added.columns.names(), ["code", "id", "extra"]);
        assert_eq!(result.removed.columns.names(), ["id", "legacy"]);
    }

    #[test]
    fn test_composite_key_trims() {
        let old = table(&["id", "code"], &[&["1", "A"], &["1", "B"]]);
        let new = table(&["id", "code"], &[&[" 1 ", "A"], &["1", "C"]]);
        let result = Differ::new(KeySpec::parse("id,code"))
            .diff_tables(&old, &new)
            .unwrap();
        assert_eq!(result.added.column_values("code").collect::<Vec<_>>(), ["C"]);
        assert_eq!(result.removed.column_values("code").collect::<Vec<_>>(), ["B"]);
    }

    #[test]
    fn test_empty_inputs() {
        let empty = Table::default();
        let some = table(&["id"], &[&["1"]]);

        let result = by_id().diff_tables(&empty, &some).unwrap();
        assert_eq!((result.added_count, result.removed_count), (1, 0));
        let result = by_id().diff_tables(&some, &empty).unwrap();
        assert_eq!((result.added_count, result.removed_count), (0, 1));
        let result = by_id().diff_tables(&empty, &empty).unwrap();
        assert_eq!((result.added_count, result.removed_count), (0, 0));
    }

    #[test]
    fn test_removed_only_when_requested() {
        let old = table(&["id"], &[&["1"], &["2"]]);
        let new = table(&["id"], &[&["2"], &["3"]]);
        let summary = by_id().diff(&old, &new, None, None).unwrap();
        assert_eq!(
            summary,
            DiffSummary {
                added: 1,
                removed: None
            }
        );
    }

    #[test]
    fn test_missing_key_column() {
        let old = table(&["id"], &[&["1"]]);
        let new = table(&["code"], &[&["1"]]);
        let err = by_id().diff_tables(&old, &new).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::ColumnNotFound { .. })
        ));
    }
}
