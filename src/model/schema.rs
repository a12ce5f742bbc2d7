//! Column sets

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::PipelineError;

/// The ordered column names of one file.
///
/// Cheap to clone: every row of a file shares one `Columns`.
#[derive(Clone)]
pub struct Columns {
    inner: Arc<ColumnIndex>,
}

struct ColumnIndex {
    names: Vec<String>,
    positions: FxHashMap<String, usize>,
}

impl Columns {
    /// Build a column set from header names.
    ///
    /// When a name repeats, lookups resolve to its last occurrence.
    pub fn new(names: Vec<String>) -> Self {
        let positions = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            inner: Arc::new(ColumnIndex { names, positions }),
        }
    }

    /// `col_1..col_N`, for files without a header row
    pub fn synthesize(width: usize) -> Self {
        Self::new((1..=width).map(|i| format!("col_{}", i)).collect())
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn names(&self) -> &[String] {
        &self.inner.names
    }

    pub fn len(&self) -> usize {
        self.inner.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.inner.positions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.positions.contains_key(name)
    }

    /// Position of `name`, or a `ColumnNotFound` listing this header
    pub fn require(&self, name: &str) -> Result<usize, PipelineError> {
        self.position(name)
            .ok_or_else(|| PipelineError::column_not_found(name, self.names()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.inner.names.iter().map(String::as_str)
    }
}

impl PartialEq for Columns {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.names == other.inner.names
    }
}

impl Eq for Columns {}

impl fmt::Debug for Columns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl Default for Columns {
    fn default() -> Self {
        Self::empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Columns {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}
