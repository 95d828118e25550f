//! Statement builder.
//!
//! [`QueryBuilder`] renders complete MySQL statements for one fixed table from filter
//! objects, write arguments and [`QueryOptions`]. Every value is escaped into literal
//! syntax by [`crate::sanitize`]; nothing here performs I/O.
//!
//! ## Design
//!
//! - Pure and reentrant: builders hold only the target table.
//! - Safe defaults: UPDATE and DELETE require a non-empty filter; UPDATE requires SET.
//! - Property names are normalized to snake_case (see [`crate::Column`]).
//!
//! # Example
//!
//! ```ignore
//! use sqlmapper::{Filter, QueryBuilder, QueryOptions};
//!
//! let users = QueryBuilder::new("users")?;
//! let sql = users.build_select(
//!     Filter::new().eq("lastName", "Doe"),
//!     &QueryOptions::new().sort_desc("email").limit(2).offset(1),
//! )?;
//! assert_eq!(
//!     sql,
//!     "SELECT * FROM users WHERE (last_name = 'Doe') ORDER BY email DESC LIMIT 2 OFFSET 1"
//! );
//! # Ok::<(), sqlmapper::OrmError>(())
//! ```

mod delete;
mod insert;
mod options;
mod select;
mod update;

pub use insert::{InsertMode, OnDuplicate};
pub use options::{QueryOptions, SortDirection};


use crate::condition::Filter;
use crate::error::{OrmError, OrmResult};
use crate::ident::{Column, Ident, IntoIdent};
use crate::sanitize::escape;
use crate::value::{Record, Value};

/// Statement builder bound to a single table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBuilder {
    table: Ident,
}

impl QueryBuilder {
    /// Create a builder for `table` (validated as an identifier).
    pub fn new(table: impl IntoIdent) -> OrmResult<Self> {
        Ok(Self {
            table: table.into_ident()?,
        })
    }

    pub fn table(&self) -> &Ident {
        &self.table
    }

    fn push_where(&self, sql: &mut String, filter: &Filter) -> OrmResult<()> {
        if let Some(predicates) = filter.to_where_sql()? {
            sql.push_str(" WHERE ");
            sql.push_str(&predicates);
        }
        Ok(())
    }

    fn push_required_where(&self, sql: &mut String, filter: &Filter, verb: &str) -> OrmResult<()> {
        if filter.is_empty() {
            return Err(OrmError::validation(format!(
                "{verb} on {} requires a non-empty filter",
                self.table.to_sql()
            )));
        }
        self.push_where(sql, filter)
    }
}

/// Render `` `col` = value `` pairs for SET / ON DUPLICATE KEY UPDATE clauses.
fn assignments(record: &Record) -> OrmResult<String> {
    let mut parts = Vec::with_capacity(record.len());
    for (name, value) in record.iter() {
        let column = Column::normalize(name)?;
        parts.push(format!(
            "{} = {}",
            column.to_quoted_sql(),
            write_value(name, value)?
        ));
    }
    Ok(parts.join(", "))
}

/// Escape a value destined for a write (INSERT / SET); lists are not writable.
fn write_value(column: &str, value: &Value) -> OrmResult<String> {
    if let Value::List(_) = value {
        return Err(OrmError::validation(format!(
            "Column '{column}': list values are only valid in filters"
        )));
    }
    Ok(escape(value))
}
