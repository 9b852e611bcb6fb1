use super::DbmsDialect;

/// PostgreSQL: `LIMIT`/`OFFSET` and `RETURNING`
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgreSQLDbmsDialect;

impl DbmsDialect for PostgreSQLDbmsDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn supports_returning(&self) -> bool {
        true
    }
}

/// H2 in its default mode: `LIMIT`/`OFFSET`, no `RETURNING`
#[derive(Debug, Clone, Copy, Default)]
pub struct H2DbmsDialect;

impl DbmsDialect for H2DbmsDialect {
    fn name(&self) -> &'static str {
        "h2"
    }
}
