use super::{append_limit_offset_clause, DbmsDialect};

/// MySQL: `LIMIT`/`OFFSET`; OFFSET alone is not valid, so an offset-only
/// window uses the largest possible limit
#[derive(Debug, Clone, Copy, Default)]
pub struct MySQLDbmsDialect;

impl DbmsDialect for MySQLDbmsDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn append_limit_offset(&self, sql: &mut String, limit: Option<u64>, offset: Option<u64>) {
        let limit = match (limit, offset) {
            (None, Some(_)) => Some(u64::MAX),
            (limit, _) => limit,
        };
        append_limit_offset_clause(sql, limit, offset);
    }
}
