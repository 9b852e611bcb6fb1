//! Native query specifications.
//!
//! A specification turns criteria-language query strings into native SQL through
//! the [`QueryProvider`] and applies the dialect's extended SQL (inlined
//! LIMIT/OFFSET for CTE bodies). The SQL is computed lazily, cached, and only
//! recomputed after the specification's state changed.

use crate::dialect::{DbmsDialect, ExtendedSql, StatementType};
use crate::error::CriteriaError;
use crate::parameter::ParameterValue;
use crate::provider::{QueryProvider, Tuple, TypedQuery};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use crate::tracing_helpers;

/// Executable plan for a native select
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQueryPlan {
    query: TypedQuery,
}

impl SelectQueryPlan {
    pub fn new(query: TypedQuery) -> Self {
        Self { query }
    }

    pub fn query(&self) -> &TypedQuery {
        &self.query
    }

    pub fn into_typed_query(self) -> TypedQuery {
        self.query
    }

    pub fn get_result_list<P: QueryProvider + ?Sized>(&self, provider: &P) -> Result<Vec<Tuple>, CriteriaError> {
        provider.get_result_list(&self.query).map_err(CriteriaError::Provider)
    }

    pub fn get_single_result<P: QueryProvider + ?Sized>(&self, provider: &P) -> Result<Tuple, CriteriaError> {
        provider.get_single_result(&self.query).map_err(CriteriaError::Provider)
    }
}

/// Lazily rendered native SQL
pub trait QuerySpecification {
    /// Native SQL of this specification, computed on first use and after changes
    fn sql<P: QueryProvider + ?Sized>(&mut self, provider: &P) -> Result<String, CriteriaError>;

    /// Plan for executing the specification as a select
    fn create_select_plan<P: QueryProvider + ?Sized>(&mut self, provider: &P) -> Result<SelectQueryPlan, CriteriaError>;
}

/// Native rendering of one CTE body
#[derive(Debug, Clone)]
pub struct CteQuerySpecification {
    dialect: Arc<dyn DbmsDialect>,
    name: String,
    attributes: Vec<String>,
    query_string: String,
    limit: Option<u64>,
    offset: Option<u64>,
    dirty: bool,
    sql: Option<String>,
}

impl CteQuerySpecification {
    pub fn new(
        dialect: Arc<dyn DbmsDialect>,
        name: impl Into<String>,
        attributes: Vec<String>,
        query_string: impl Into<String>,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Self {
        Self {
            dialect,
            name: name.into(),
            attributes,
            query_string: query_string.into(),
            limit,
            offset,
            dirty: true,
            sql: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Column list of the CTE, including columns added by a windowing dialect
    pub fn column_list(&self) -> Vec<String> {
        let mut columns = self.attributes.clone();
        if self.limit.is_some() || self.offset.is_some() {
            columns.extend(self.dialect.window_columns().iter().map(|c| c.to_string()));
        }
        columns
    }

    pub fn set_limit(&mut self, limit: Option<u64>) {
        if self.limit != limit {
            self.limit = limit;
            self.dirty = true;
        }
    }

    pub fn set_offset(&mut self, offset: Option<u64>) {
        if self.offset != offset {
            self.offset = offset;
            self.dirty = true;
        }
    }

    fn initialize<P: QueryProvider + ?Sized>(&mut self, provider: &P) -> Result<(), CriteriaError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::specification_span(&self.name).entered();

        let mut sql = provider.native_sql(&self.query_string).map_err(CriteriaError::Provider)?;
        let extended = ExtendedSql {
            statement_type: StatementType::Select,
            is_subquery: true,
            inline_limit_offset: true,
            cte_name: Some(self.name.clone()),
            limit: self.limit,
            offset: self.offset,
            returning_columns: Vec::new(),
        };
        self.dialect.append_extended_sql(&mut sql, &extended)?;
        log::debug!("CTE {} native SQL: {}", self.name, sql);
        self.sql = Some(sql);
        self.dirty = false;
        Ok(())
    }
}

impl QuerySpecification for CteQuerySpecification {
    fn sql<P: QueryProvider + ?Sized>(&mut self, provider: &P) -> Result<String, CriteriaError> {
        if self.dirty || self.sql.is_none() {
            self.initialize(provider)?;
        }
        Ok(self.sql.clone().unwrap_or_default())
    }

    /// CTE bodies are only ever executed as part of an enclosing query
    fn create_select_plan<P: QueryProvider + ?Sized>(&mut self, _provider: &P) -> Result<SelectQueryPlan, CriteriaError> {
        Err(CriteriaError::UnsupportedOperation(format!(
            "create_select_plan on CTE query specification '{}'",
            self.name
        )))
    }
}

/// Main query composed with its CTEs: `WITH A(..) AS (...), ... <main>`
#[derive(Debug, Clone)]
pub struct CustomQuerySpecification {
    dialect: Arc<dyn DbmsDialect>,
    ctes: Vec<CteQuerySpecification>,
    query_string: String,
    parameters: Vec<(String, ParameterValue)>,
    dirty: bool,
    sql: Option<String>,
}

impl CustomQuerySpecification {
    pub fn new(
        dialect: Arc<dyn DbmsDialect>,
        ctes: Vec<CteQuerySpecification>,
        query_string: impl Into<String>,
    ) -> Self {
        Self {
            dialect,
            ctes,
            query_string: query_string.into(),
            parameters: Vec::new(),
            dirty: true,
            sql: None,
        }
    }

    /// Parameter bindings passed to the plan; binding does not change the SQL
    pub fn set_parameters(&mut self, parameters: Vec<(String, ParameterValue)>) {
        self.parameters = parameters;
    }

    pub fn set_query_string(&mut self, query_string: impl Into<String>) {
        let query_string = query_string.into();
        if self.query_string != query_string {
            self.query_string = query_string;
            self.dirty = true;
        }
    }

    pub fn ctes_mut(&mut self) -> &mut [CteQuerySpecification] {
        // Any change below invalidates the composed SQL
        self.dirty = true;
        &mut self.ctes
    }

    fn initialize<P: QueryProvider + ?Sized>(&mut self, provider: &P) -> Result<(), CriteriaError> {
        let mut sql = String::new();
        if !self.ctes.is_empty() {
            sql.push_str(self.dialect.cte_keyword(false));
            sql.push(' ');
            for (i, cte) in self.ctes.iter_mut().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                let body = cte.sql(provider)?;
                sql.push_str(cte.name());
                sql.push('(');
                sql.push_str(&cte.column_list().join(", "));
                sql.push_str(") AS (");
                sql.push_str(&body);
                sql.push(')');
            }
            sql.push(' ');
        }
        sql.push_str(&provider.native_sql(&self.query_string).map_err(CriteriaError::Provider)?);
        self.sql = Some(sql);
        self.dirty = false;
        Ok(())
    }
}

impl QuerySpecification for CustomQuerySpecification {
    fn sql<P: QueryProvider + ?Sized>(&mut self, provider: &P) -> Result<String, CriteriaError> {
        if self.dirty || self.sql.is_none() {
            self.initialize(provider)?;
        }
        Ok(self.sql.clone().unwrap_or_default())
    }

    fn create_select_plan<P: QueryProvider + ?Sized>(&mut self, provider: &P) -> Result<SelectQueryPlan, CriteriaError> {
        let sql = self.sql(provider)?;
        Ok(SelectQueryPlan::new(
            TypedQuery::native(sql).with_parameters(self.parameters.clone()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{DialectRegistry, PostgreSQLDbmsDialect};
    use crate::test_helpers::MockProvider;

    fn native_provider() -> MockProvider {
        MockProvider::new().with_native_sql(|q| Ok(q.replace("FROM Cat c", "FROM cat c")))
    }

    #[test]
    fn test_cte_specification_inlines_limit_offset() {
        let provider = native_provider();
        let mut spec = CteQuerySpecification::new(
            Arc::new(PostgreSQLDbmsDialect),
            "CatAge",
            vec!["id".into(), "age".into()],
            "SELECT c.id, c.age FROM Cat c",
            Some(10),
            Some(5),
        );
        assert_eq!(spec.sql(&provider).unwrap(), "SELECT c.id, c.age FROM cat c LIMIT 10 OFFSET 5");
        // Cached until the window changes
        spec.sql(&provider).unwrap();
        assert_eq!(provider.native_sql_calls(), 1);
        spec.set_limit(Some(3));
        assert_eq!(spec.sql(&provider).unwrap(), "SELECT c.id, c.age FROM cat c LIMIT 3 OFFSET 5");
        assert_eq!(provider.native_sql_calls(), 2);
    }

    #[test]
    fn test_cte_select_plan_is_unsupported() {
        let provider = native_provider();
        let mut spec = CteQuerySpecification::new(
            Arc::new(PostgreSQLDbmsDialect),
            "CatAge",
            vec![],
            "SELECT c.id FROM Cat c",
            None,
            None,
        );
        let err = spec.create_select_plan(&provider).unwrap_err();
        assert!(matches!(err, CriteriaError::UnsupportedOperation(_)));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_custom_specification_composes_ctes() {
        let provider = native_provider();
        let dialect = DialectRegistry::with_defaults().resolve("db2").unwrap();
        let cte = CteQuerySpecification::new(
            dialect.clone(),
            "CatAge",
            vec!["id".into(), "age".into()],
            "SELECT c.id, c.age FROM Cat c",
            Some(2),
            None,
        );
        let mut spec = CustomQuerySpecification::new(dialect, vec![cte], "SELECT a.id FROM CatAge a");
        let plan = spec.create_select_plan(&provider).unwrap();
        assert_eq!(
            plan.query().query_string,
            "WITH CatAge(id, age) AS (SELECT c.id, c.age FROM cat c FETCH FIRST 2 ROWS ONLY) SELECT a.id FROM CatAge a"
        );
        assert_eq!(plan.query().language, crate::provider::QueryLanguage::Native);
    }
}
