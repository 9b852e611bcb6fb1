use super::DbmsDialect;

/// SQLite: `LIMIT`/`OFFSET`, with `LIMIT -1` for an offset-only window
#[derive(Debug, Clone, Copy, Default)]
pub struct SQLiteDbmsDialect;

impl DbmsDialect for SQLiteDbmsDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn append_limit_offset(&self, sql: &mut String, limit: Option<u64>, offset: Option<u64>) {
        match limit {
            Some(limit) => sql.push_str(&format!(" LIMIT {limit}")),
            None if offset.is_some() => sql.push_str(" LIMIT -1"),
            None => {}
        }
        if let Some(offset) = offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }
}
