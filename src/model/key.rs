//! Row identity for diffing

use super::schema::Columns;
use super::table::Row;
use crate::error::PipelineError;

/// The identity of a row: its trimmed values at the key columns, in order.
///
/// Only ever compared and hashed. No case folding or numeric coercion is
/// applied, so `"01"` and `"1"` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key(Box<[String]>);

impl Key {
    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

/// Extract the key of `row` at `key_columns`; a missing column reads as ""
pub fn make_key<S: AsRef<str>>(row: &Row, key_columns: &[S]) -> Key {
    Key(key_columns
        .iter()
        .map(|c| row.get_or_empty(c.as_ref()).trim().to_string())
        .collect())
}

/// The ordered list of key column names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    columns: Vec<String>,
}

impl KeySpec {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a comma-separated list such as `"id,code"`, dropping blanks
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(',').map(str::trim).filter(|c| !c.is_empty()))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn key(&self, row: &Row) -> Key {
        make_key(row, &self.columns)
    }

    /// Check every key column exists in `columns`.
    ///
    /// An empty header (empty file) has nothing to check against and passes.
    pub fn validate(&self, columns: &Columns) -> Result<(), PipelineError> {
        if columns.is_empty() {
            return Ok(());
        }
        for column in &self.columns {
            columns.require(column)?;
        }
        Ok(())
    }
}
