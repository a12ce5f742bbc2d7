//! Row predicates applied while streaming
//!
//! Every predicate is a pure `&Row -> bool` function; nothing is retained
//! between rows apart from the configured needle or threshold.

use chrono::NaiveDate;

use crate::error::PipelineError;
use crate::model::{Columns, Row};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` threshold given on the command line
pub fn parse_date(value: &str) -> Result<NaiveDate, PipelineError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| PipelineError::InvalidDate {
        value: value.to_string(),
    })
}

/// The first `n` characters of `value` (not bytes)
fn leading_chars(value: &str, n: usize) -> &str {
    match value.char_indices().nth(n) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

/// A single row test
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Column value contains the needle, ignoring case
    Contains { column: String, needle: String },
    /// Column's leading `YYYY-MM-DD` is on or after the threshold
    DateFrom {
        column: String,
        threshold: NaiveDate,
    },
}

impl Predicate {
    pub fn contains(column: impl Into<String>, needle: &str) -> Self {
        Predicate::Contains {
            column: column.into(),
            needle: needle.to_lowercase(),
        }
    }

    pub fn date_from(column: impl Into<String>, threshold: NaiveDate) -> Self {
        Predicate::DateFrom {
            column: column.into(),
            threshold,
        }
    }

    /// The column this predicate reads
    pub fn column(&self) -> &str {
        match self {
            Predicate::Contains { column, .. } | Predicate::DateFrom { column, .. } => column,
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        let value = row.get_or_empty(self.column());
        match self {
            Predicate::Contains { needle, .. } => value.to_lowercase().contains(needle.as_str()),
            Predicate::DateFrom { threshold, .. } => {
                // trailing time components are ignored
                NaiveDate::parse_from_str(leading_chars(value, 10), DATE_FORMAT)
                    .map(|date| date >= *threshold)
                    .unwrap_or(false)
            }
        }
    }
}

/// A conjunction of predicates; the empty filter admits every row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFilter {
    predicates: Vec<Predicate>,
}

impl RowFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate that must also hold
    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.predicates.iter().all(|p| p.matches(row))
    }

    /// Fail if a predicate reads a column the header does not have
    pub fn validate(&self, columns: &Columns) -> Result<(), PipelineError> {
        if columns.is_empty() {
            return Ok(());
        }
        for predicate in &self.predicates {
            columns.require(predicate.column())?;
        }
        Ok(())
    }
}
