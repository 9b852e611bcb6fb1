use super::{append_offset_fetch_clause, DbmsDialect};

/// SQL Server 2012 and later: `OFFSET m ROWS FETCH NEXT n ROWS ONLY`
///
/// The OFFSET clause is mandatory for FETCH and requires an ORDER BY, so both
/// are added when missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct MSSQLDbmsDialect;

impl DbmsDialect for MSSQLDbmsDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn cte_keyword(&self, _recursive: bool) -> &'static str {
        "WITH"
    }

    fn append_limit_offset(&self, sql: &mut String, limit: Option<u64>, offset: Option<u64>) {
        if limit.is_none() && offset.is_none() {
            return;
        }
        if !has_top_level_order_by(sql) {
            sql.push_str(" ORDER BY (SELECT 0)");
        }
        append_offset_fetch_clause(sql, limit, Some(offset.unwrap_or(0)), "NEXT");
    }
}

/// SQL Server 2008: windowing through a nested `ROW_NUMBER()`
///
/// The windowed statement returns an additional `rownumber_` column.
#[derive(Debug, Clone, Copy, Default)]
pub struct MSSQL2008DbmsDialect;

impl DbmsDialect for MSSQL2008DbmsDialect {
    fn name(&self) -> &'static str {
        "mssql2008"
    }

    fn cte_keyword(&self, _recursive: bool) -> &'static str {
        "WITH"
    }

    fn window_columns(&self) -> &'static [&'static str] {
        &["rownumber_"]
    }

    fn append_limit_offset(&self, sql: &mut String, limit: Option<u64>, offset: Option<u64>) {
        let mut conditions = Vec::new();
        let start = offset.unwrap_or(0);
        if start > 0 {
            conditions.push(format!("outer_.rownumber_ > {start}"));
        }
        if let Some(limit) = limit {
            conditions.push(format!("outer_.rownumber_ <= {}", start.saturating_add(limit)));
        }
        let mut wrapped = format!(
            "SELECT * FROM (SELECT inner_.*, ROW_NUMBER() OVER (ORDER BY (SELECT 0)) rownumber_ FROM ({sql}) inner_) outer_"
        );
        if !conditions.is_empty() {
            wrapped.push_str(" WHERE ");
            wrapped.push_str(&conditions.join(" AND "));
        }
        *sql = wrapped;
    }
}

/// Whether `sql` has an ORDER BY outside of parentheses and string literals
fn has_top_level_order_by(sql: &str) -> bool {
    let upper = sql.to_ascii_uppercase();
    let bytes = upper.as_bytes();
    let mut depth = 0usize;
    let mut in_literal = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_literal = !in_literal,
            b'(' if !in_literal => depth += 1,
            b')' if !in_literal => depth = depth.saturating_sub(1),
            b'O' if !in_literal && depth == 0 && upper[i..].starts_with("ORDER BY") => {
                let boundary = i == 0 || !bytes[i - 1].is_ascii_alphanumeric() && bytes[i - 1] != b'_';
                if boundary {
                    return true;
                }
            }
            _ => {}
        }
        i += 1;
    }
    false
}
