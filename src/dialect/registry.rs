use super::{
    DB2DbmsDialect, DbmsDialect, H2DbmsDialect, MSSQL2008DbmsDialect, MSSQLDbmsDialect, MySQLDbmsDialect,
    OracleDbmsDialect, PostgreSQLDbmsDialect, SQLiteDbmsDialect,
};
use crate::error::CriteriaError;
use std::collections::HashMap;
use std::sync::Arc;

/// Dialects by lower-case name
#[derive(Debug, Clone, Default)]
pub struct DialectRegistry {
    dialects: HashMap<String, Arc<dyn DbmsDialect>>,
}

impl DialectRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in dialect
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PostgreSQLDbmsDialect));
        registry.register(Arc::new(H2DbmsDialect));
        registry.register(Arc::new(MySQLDbmsDialect));
        registry.register(Arc::new(SQLiteDbmsDialect));
        registry.register(Arc::new(DB2DbmsDialect));
        registry.register(Arc::new(OracleDbmsDialect));
        registry.register(Arc::new(MSSQLDbmsDialect));
        registry.register(Arc::new(MSSQL2008DbmsDialect));
        registry
    }

    /// Register `dialect` under its name, replacing a dialect of the same name
    pub fn register(&mut self, dialect: Arc<dyn DbmsDialect>) -> &mut Self {
        let name = dialect.name().to_ascii_lowercase();
        if self.dialects.insert(name.clone(), dialect).is_some() {
            log::debug!("Replaced dialect '{}'", name);
        }
        self
    }

    /// Look up a dialect, ignoring case
    ///
    /// # Errors
    ///
    /// Returns `UnknownDialect` when no dialect is registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn DbmsDialect>, CriteriaError> {
        self.dialects
            .get(&name.trim().to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| CriteriaError::UnknownDialect(name.to_string()))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.dialects.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
