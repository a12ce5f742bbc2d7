//! In-memory key sets

use anyhow::Result;
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::model::{Key, KeySpec};
use crate::source::RowSource;

/// The distinct keys of one source
pub type KeySet = FxHashSet<Key>;

/// Walk `source` once and collect the distinct keys of its rows.
///
/// Memory grows with the number of distinct keys; duplicates collapse.
pub fn read_key_set<S: RowSource + ?Sized>(source: &S, spec: &KeySpec) -> Result<KeySet> {
    let mut keys = KeySet::default();
    let mut rows = 0usize;
    for row in source.rows()? {
        keys.insert(spec.key(&row?));
        rows += 1;
    }
    debug!(source = %source.describe(), rows, distinct = keys.len(), "built key set");
    Ok(keys)
}
