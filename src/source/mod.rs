//! Row sources and sinks
//!
//! A [`RowSource`] can be walked any number of times; each walk is a fresh,
//! single-pass iterator. Two implementations exist and callers pick one
//! explicitly: [`CsvSource`] streams from disk and never holds more than one
//! row, [`Table`] is the bulk, in-memory form.

mod csv;
mod sink;

use anyhow::Result;

use crate::model::{Columns, Row, Table};

pub use self::csv::{CsvSource, RowStream};
pub use self::sink::{ensure_not_input, CsvSink, RowSink};

/// A boxed single pass over a source's rows
pub type Rows<'a> = Box<dyn Iterator<Item = Result<Row>> + 'a>;

/// Something that can produce rows sharing one header
pub trait RowSource {
    /// Column set of the source; empty for an empty file
    fn columns(&self) -> Result<Columns>;

    /// Start a new pass over all rows
    fn rows(&self) -> Result<Rows<'_>>;

    /// Short human label for logs
    fn describe(&self) -> String;
}

impl RowSource for Table {
    fn columns(&self) -> Result<Columns> {
        Ok(self.columns.clone())
    }

    fn rows(&self) -> Result<Rows<'_>> {
        Ok(Box::new(self.rows.iter().cloned().map(Ok)))
    }

    fn describe(&self) -> String {
        format!("in-memory table ({} rows)", self.row_count())
    }
}

impl<T: RowSource + ?Sized> RowSource for &T {
    fn columns(&self) -> Result<Columns> {
        (**self).columns()
    }

    fn rows(&self) -> Result<Rows<'_>> {
        (**self).rows()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
