//! Filter / sort / limit / project over feed records.
//!
//! [`search`] is a pure function of the table and the parsed [`QuerySpec`].
//! Errors naming unknown columns are meant to be reported back to the model,
//! not to abort anything.

mod engine;
mod spec;

pub use engine::{search, SearchResult};
pub use spec::{FilterPredicate, QuerySpec, RangeBounds};

use crate::store::ColumnKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Unknown column: {column}")]
    UnknownColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("Unknown sort column: {column}")]
    UnknownSortColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("Unknown columns: {columns:?}")]
    UnknownColumns {
        columns: Vec<String>,
        available: Vec<String>,
    },

    #[error("Range bound `{bound}` cannot be compared with {kind:?} column {column}")]
    IncomparableBound {
        column: String,
        bound: &'static str,
        kind: ColumnKind,
    },
}

impl QueryError {
    /// The table's full column list, for errors caused by a bad column name.
    pub fn available_columns(&self) -> Option<&[String]> {
        match self {
            QueryError::UnknownColumn { available, .. }
            | QueryError::UnknownSortColumn { available, .. }
            | QueryError::UnknownColumns { available, .. } => Some(available),
            QueryError::IncomparableBound { .. } => None,
        }
    }

    /// Column names the request got wrong.
    pub fn offending_columns(&self) -> Vec<&str> {
        match self {
            QueryError::UnknownColumn { column, .. }
            | QueryError::UnknownSortColumn { column, .. }
            | QueryError::IncomparableBound { column, .. } => vec![column.as_str()],
            QueryError::UnknownColumns { columns, .. } => {
                columns.iter().map(String::as_str).collect()
            }
        }
    }
}
