//! Row-level data model: column sets, rows, keys and materialized tables

mod key;
mod schema;
mod table;

pub use key::{make_key, Key, KeySpec};
pub use schema::Columns;
pub use table::{Row, Table};
