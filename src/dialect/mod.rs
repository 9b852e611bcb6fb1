//! Database-specific SQL extensions.
//!
//! Providers translate criteria queries to native SQL but cannot window a query
//! that is embedded in another one (a CTE body or a subquery). Dialects append
//! those extensions to native SQL in the syntax of the target database:
//!
//! | Dialect     | `limit = 10, offset = 20`                                       |
//! |-------------|-----------------------------------------------------------------|
//! | postgresql  | `LIMIT 10 OFFSET 20`                                            |
//! | h2          | `LIMIT 10 OFFSET 20`                                            |
//! | mysql       | `LIMIT 10 OFFSET 20`                                            |
//! | sqlite      | `LIMIT 10 OFFSET 20`                                            |
//! | db2         | `OFFSET 20 ROWS FETCH FIRST 10 ROWS ONLY`                       |
//! | oracle      | `OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY`                        |
//! | mssql       | `OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY`                        |
//! | mssql2008   | nested `ROW_NUMBER()` window                                    |
//!
//! Dialects are registered in a [`DialectRegistry`] and resolved once when a
//! [`CriteriaBuilderFactory`](crate::CriteriaBuilderFactory) is created.

mod db2;
mod mssql;
mod mysql;
mod oracle;
mod postgresql;
mod registry;
mod sqlite;

pub use db2::DB2DbmsDialect;
pub use mssql::{MSSQL2008DbmsDialect, MSSQLDbmsDialect};
pub use mysql::MySQLDbmsDialect;
pub use oracle::OracleDbmsDialect;
pub use postgresql::{H2DbmsDialect, PostgreSQLDbmsDialect};
pub use registry::DialectRegistry;
pub use sqlite::SQLiteDbmsDialect;

use crate::error::CriteriaError;
use std::fmt;

/// Kind of statement being extended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatementType {
    #[default]
    Select,
    Insert,
    Update,
    Delete,
}

/// What to append to a native statement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedSql {
    pub statement_type: StatementType,
    /// The statement is embedded in another statement
    pub is_subquery: bool,
    /// Render LIMIT/OFFSET into the SQL instead of leaving them to the provider
    pub inline_limit_offset: bool,
    /// Name of the CTE whose body is being extended
    pub cte_name: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Columns returned by a DML statement
    pub returning_columns: Vec<String>,
}

impl ExtendedSql {
    /// Select extension that inlines the given window
    pub fn inline_window(limit: Option<u64>, offset: Option<u64>) -> Self {
        Self {
            inline_limit_offset: true,
            limit,
            offset,
            ..Self::default()
        }
    }
}

/// Strategy for database-specific SQL
pub trait DbmsDialect: fmt::Debug + Send + Sync {
    /// Registry name (`postgresql`, `mysql`, ...)
    fn name(&self) -> &'static str;

    /// Keyword introducing a CTE list
    fn cte_keyword(&self, recursive: bool) -> &'static str {
        if recursive {
            "WITH RECURSIVE"
        } else {
            "WITH"
        }
    }

    /// Whether DML statements can return columns (`RETURNING`)
    fn supports_returning(&self) -> bool {
        false
    }

    /// Columns a windowed statement returns on top of its own select list
    fn window_columns(&self) -> &'static [&'static str] {
        &[]
    }

    /// Append the window in this dialect's syntax
    fn append_limit_offset(&self, sql: &mut String, limit: Option<u64>, offset: Option<u64>) {
        append_limit_offset_clause(sql, limit, offset);
    }

    /// Append every requested extension to `sql`
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedOperation` when returning columns are requested from a
    /// dialect without `RETURNING` support, or for a window on a DML statement.
    fn append_extended_sql(&self, sql: &mut String, extended: &ExtendedSql) -> Result<(), CriteriaError> {
        if extended.inline_limit_offset && (extended.limit.is_some() || extended.offset.is_some()) {
            if extended.statement_type != StatementType::Select {
                return Err(CriteriaError::UnsupportedOperation(format!(
                    "LIMIT/OFFSET on {:?} statement",
                    extended.statement_type
                )));
            }
            self.append_limit_offset(sql, extended.limit, extended.offset);
        }
        if !extended.returning_columns.is_empty() {
            if !self.supports_returning() {
                return Err(CriteriaError::UnsupportedOperation(format!(
                    "RETURNING is not supported by dialect '{}'",
                    self.name()
                )));
            }
            sql.push_str(" RETURNING ");
            sql.push_str(&extended.returning_columns.join(", "));
        }
        Ok(())
    }
}

/// `LIMIT n OFFSET m`, either part optional
pub(crate) fn append_limit_offset_clause(sql: &mut String, limit: Option<u64>, offset: Option<u64>) {
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }
}

/// `OFFSET m ROWS FETCH <fetch_keyword> n ROWS ONLY`, either part optional
pub(crate) fn append_offset_fetch_clause(
    sql: &mut String,
    limit: Option<u64>,
    offset: Option<u64>,
    fetch_keyword: &str,
) {
    if let Some(offset) = offset {
        sql.push_str(&format!(" OFFSET {offset} ROWS"));
    }
    if let Some(limit) = limit {
        sql.push_str(&format!(" FETCH {fetch_keyword} {limit} ROWS ONLY"));
    }
}
