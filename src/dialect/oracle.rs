use super::{append_offset_fetch_clause, DbmsDialect};

/// Oracle 12c and later: `OFFSET m ROWS FETCH NEXT n ROWS ONLY`
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDbmsDialect;

impl DbmsDialect for OracleDbmsDialect {
    fn name(&self) -> &'static str {
        "oracle"
    }

    /// Recursive CTEs are plain `WITH` in Oracle
    fn cte_keyword(&self, _recursive: bool) -> &'static str {
        "WITH"
    }

    fn append_limit_offset(&self, sql: &mut String, limit: Option<u64>, offset: Option<u64>) {
        append_offset_fetch_clause(sql, limit, offset, "NEXT");
    }
}
