//! Rows and materialized tables

use csv::StringRecord;

use super::schema::Columns;

/// One record: an ordered mapping from column name to value.
///
/// A row always has exactly one value per column of its file: short
/// records are padded with empty strings, long ones truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    columns: Columns,
    values: Vec<String>,
    /// 1-indexed record number in the source, header excluded
    line: u64,
}

impl Row {
    /// Create a row, fitting `values` to the width of `columns`
    pub fn new(columns: Columns, mut values: Vec<String>, line: u64) -> Self {
        values.resize(columns.len(), String::new());
        Self {
            columns,
            values,
            line,
        }
    }

    pub fn from_record(columns: &Columns, record: &StringRecord, line: u64) -> Self {
        let values = record
            .iter()
            .take(columns.len())
            .map(str::to_string)
            .collect();
        Self::new(columns.clone(), values, line)
    }

    /// Build a row from `(column, value)` pairs; handy in tests and fixtures
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let (names, values): (Vec<String>, Vec<String>) = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .unzip();
        Self::new(Columns::new(names), values, 0)
    }

    /// Value of `column`, or `None` if this row's file has no such column
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .position(column)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }

    /// Value of `column`, with a missing column read as ""
    pub fn get_or_empty(&self, column: &str) -> &str {
        self.get(column).unwrap_or("")
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn line(&self) -> u64 {
        self.line
    }

    /// `(column, value)` pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .zip(self.values.iter().map(String::as_str))
    }

    /// Values for `columns` in that order, "" where this row lacks one
    pub fn project<'a>(&'a self, columns: &'a [String]) -> impl Iterator<Item = &'a str> + 'a {
        columns.iter().map(move |c| self.get_or_empty(c))
    }
}

/// A fully materialized, randomly accessible set of rows sharing one header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Columns,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Columns) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, re-homing it onto this table's header
    pub fn push(&mut self, row: &Row) {
        let line = self.rows.len() as u64 + 1;
        let values = row.project(self.columns.names()).map(str::to_string).collect();
        self.rows.push(Row::new(self.columns.clone(), values, line));
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Values of one column across all rows; "" where absent
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.rows.iter().map(move |r| r.get_or_empty(column))
    }
}
