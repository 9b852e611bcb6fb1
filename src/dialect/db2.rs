use super::{append_offset_fetch_clause, DbmsDialect};

/// DB2: `OFFSET m ROWS FETCH FIRST n ROWS ONLY`
#[derive(Debug, Clone, Copy, Default)]
pub struct DB2DbmsDialect;

impl DbmsDialect for DB2DbmsDialect {
    fn name(&self) -> &'static str {
        "db2"
    }

    /// DB2 has no RECURSIVE keyword
    fn cte_keyword(&self, _recursive: bool) -> &'static str {
        "WITH"
    }

    fn append_limit_offset(&self, sql: &mut String, limit: Option<u64>, offset: Option<u64>) {
        append_offset_fetch_clause(sql, limit, offset, "FIRST");
    }
}
