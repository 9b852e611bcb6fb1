//! Fluent builder surface shared by every query scope, and the main criteria
//! builder.

use crate::config::CriteriaConfig;
use crate::dialect::DbmsDialect;
use crate::error::CriteriaError;
use crate::expression::Expression;
use crate::parameter::ParameterValue;
use crate::predicate::{ExistsPredicate, Predicate};
use crate::provider::{QueryProvider, Tuple, TypedQuery};
use crate::query::cte::CteBuilder;
use crate::query::join::JoinType;
use crate::query::object_builder::{ObjectBuilder, TupleObjectBuilder};
use crate::query::paginated::PaginatedCriteriaBuilder;
use crate::query::state::{join_parts, QueryKind, QueryState};
use crate::query::subquery::SubqueryBuilder;
use crate::specification::{CustomQuerySpecification, QuerySpecification};
use sea_query::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Structural builder operations shared by criteria, paginated, subquery and CTE
/// builders
///
/// Every structural method fails with `BuilderFinalized` once the builder has
/// been finalized by a terminal operation. Parameter binding stays allowed.
pub trait BaseQueryBuilder: Sized {
    fn query_state(&self) -> &QueryState;
    fn query_state_mut(&mut self) -> &mut QueryState;

    fn root_alias(&self) -> &str {
        self.query_state().root_alias()
    }

    fn is_finalized(&self) -> bool {
        self.query_state().is_finalized()
    }

    fn select(&mut self, expression: impl Into<Expression>) -> Result<&mut Self, CriteriaError> {
        self.query_state_mut().mutable()?.select.select(expression.into(), None)?;
        Ok(self)
    }

    fn select_as(&mut self, expression: impl Into<Expression>, alias: &str) -> Result<&mut Self, CriteriaError> {
        self.query_state_mut().mutable()?.select.select(expression.into(), Some(alias))?;
        Ok(self)
    }

    fn distinct(&mut self) -> Result<&mut Self, CriteriaError> {
        self.query_state_mut().mutable()?.select.set_distinct(true);
        Ok(self)
    }

    fn join(&mut self, path: &str, alias: &str, join_type: JoinType) -> Result<&mut Self, CriteriaError> {
        self.query_state_mut().mutable()?.joins.join(path, alias, join_type, false, None)?;
        Ok(self)
    }

    fn inner_join(&mut self, path: &str, alias: &str) -> Result<&mut Self, CriteriaError> {
        self.join(path, alias, JoinType::Inner)
    }

    fn left_join(&mut self, path: &str, alias: &str) -> Result<&mut Self, CriteriaError> {
        self.join(path, alias, JoinType::Left)
    }

    fn right_join(&mut self, path: &str, alias: &str) -> Result<&mut Self, CriteriaError> {
        self.join(path, alias, JoinType::Right)
    }

    /// Join with an additional `ON` condition
    fn join_on(
        &mut self,
        path: &str,
        alias: &str,
        join_type: JoinType,
        on: Predicate,
    ) -> Result<&mut Self, CriteriaError> {
        self.query_state_mut().mutable()?.joins.join(path, alias, join_type, false, Some(on))?;
        Ok(self)
    }

    /// Inner fetch join, rendered only in the data query
    fn join_fetch(&mut self, path: &str, alias: &str) -> Result<&mut Self, CriteriaError> {
        self.query_state_mut().mutable()?.joins.join(path, alias, JoinType::Inner, true, None)?;
        Ok(self)
    }

    /// Left fetch join, rendered only in the data query
    fn left_join_fetch(&mut self, path: &str, alias: &str) -> Result<&mut Self, CriteriaError> {
        self.query_state_mut().mutable()?.joins.join(path, alias, JoinType::Left, true, None)?;
        Ok(self)
    }

    /// Add a WHERE conjunct
    fn filter(&mut self, predicate: Predicate) -> Result<&mut Self, CriteriaError> {
        self.query_state_mut().mutable()?.where_clause.add(predicate);
        Ok(self)
    }

    /// `WHERE EXISTS (subquery)`
    fn where_exists(&mut self, subquery: SubqueryBuilder) -> Result<&mut Self, CriteriaError> {
        attach_exists(self.query_state_mut(), subquery, false)?;
        Ok(self)
    }

    /// `WHERE NOT EXISTS (subquery)`
    fn where_not_exists(&mut self, subquery: SubqueryBuilder) -> Result<&mut Self, CriteriaError> {
        attach_exists(self.query_state_mut(), subquery, true)?;
        Ok(self)
    }

    fn group_by(&mut self, expression: impl Into<Expression>) -> Result<&mut Self, CriteriaError> {
        self.query_state_mut().mutable()?.group_by.group_by(expression.into());
        Ok(self)
    }

    /// Add a HAVING conjunct
    fn having(&mut self, predicate: Predicate) -> Result<&mut Self, CriteriaError> {
        self.query_state_mut().mutable()?.having.add(predicate);
        Ok(self)
    }

    fn order_by(
        &mut self,
        expression: impl Into<Expression>,
        ascending: bool,
        nulls_first: bool,
    ) -> Result<&mut Self, CriteriaError> {
        self.query_state_mut()
            .mutable()?
            .order_by
            .order_by(expression.into(), ascending, nulls_first);
        Ok(self)
    }

    /// Ascending, nulls last
    fn order_by_asc(&mut self, expression: impl Into<Expression>) -> Result<&mut Self, CriteriaError> {
        self.order_by(expression, true, false)
    }

    /// Descending, nulls last
    fn order_by_desc(&mut self, expression: impl Into<Expression>) -> Result<&mut Self, CriteriaError> {
        self.order_by(expression, false, false)
    }

    /// Bind a named parameter
    ///
    /// # Errors
    ///
    /// Returns `ReservedParameterName` for the pagination id parameter.
    fn set_parameter(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self, CriteriaError> {
        self.query_state_mut()
            .parameters
            .set_parameter(name, ParameterValue::Single(value.into()))?;
        Ok(self)
    }

    /// Bind a named list parameter (`IN (:name)`)
    fn set_parameter_list(&mut self, name: &str, values: Vec<Value>) -> Result<&mut Self, CriteriaError> {
        self.query_state_mut()
            .parameters
            .set_parameter(name, ParameterValue::List(values))?;
        Ok(self)
    }
}

fn attach_exists(state: &mut QueryState, mut subquery: SubqueryBuilder, negated: bool) -> Result<(), CriteriaError> {
    let state = state.mutable()?;
    subquery.end()?;
    let aliases: Vec<String> = subquery.aliases().map(str::to_string).collect();
    if let Some(clash) = aliases.iter().find(|a| state.joins.has_alias(a)) {
        return Err(CriteriaError::DuplicateAlias(clash.clone()));
    }
    state.parameters.merge(subquery.query_state().parameters())?;
    for alias in &aliases {
        state.joins.reserve_alias(alias);
    }
    let mut exists = if negated {
        ExistsPredicate::negated()
    } else {
        ExistsPredicate::new()
    };
    exists.set_subquery_builder(subquery)?;
    state.where_clause.add(exists.into());
    Ok(())
}

/// Dialect and settings shared by every builder of one factory
#[derive(Debug, Clone)]
pub struct BuilderContext {
    pub dialect: Arc<dyn DbmsDialect>,
    pub config: Arc<CriteriaConfig>,
}

/// Turn a criteria query string into an executable query for `state`
///
/// Without CTEs the query is handed to the provider as is. With CTEs every CTE
/// body and the main query are translated to native SQL and composed through a
/// [`CustomQuerySpecification`]. The specification is built once per finalized
/// state and reused, so CTE bodies keep their native SQL across query kinds.
pub(crate) fn create_typed_query<P: QueryProvider + ?Sized>(
    state: &mut QueryState,
    context: &BuilderContext,
    provider: &P,
    query_string: &str,
) -> Result<TypedQuery, CriteriaError> {
    let display = match state.build_cte_prefix(context.dialect.cte_keyword(false))? {
        prefix if prefix.is_empty() => query_string.to_string(),
        prefix => format!("{prefix} {query_string}"),
    };
    let parameters = bind_parameters(state, &display)?;
    if state.ctes.is_empty() {
        return Ok(TypedQuery::new(display).with_parameters(parameters));
    }

    let mut specification = match state.specification.take() {
        Some(mut specification) => {
            specification.set_query_string(query_string);
            specification
        }
        None => {
            let mut ctes = Vec::with_capacity(state.ctes.len());
            for cte in &state.ctes {
                ctes.push(cte.to_specification(context.dialect.clone())?);
            }
            CustomQuerySpecification::new(context.dialect.clone(), ctes, query_string)
        }
    };
    specification.set_parameters(parameters);
    let plan = specification.create_select_plan(provider);
    state.specification = Some(specification);
    Ok(plan?.into_typed_query())
}

/// Bindings for every parameter the rendered query references
pub(crate) fn bind_parameters(
    state: &QueryState,
    query_string: &str,
) -> Result<Vec<(String, ParameterValue)>, CriteriaError> {
    let rendered = Expression::new(query_string);
    let names: BTreeSet<&str> = rendered.parameters().collect();
    state.parameters.verify_satisfied(names.iter().copied())?;
    Ok(state.parameters.bindings_for(names))
}

/// Criteria builder for one root entity
///
/// Results are produced by the installed [`ObjectBuilder`]; the default returns
/// raw [`Tuple`]s.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use lifeguard_criteria::prelude::*;
///
/// let metamodel = Metamodel::new()
///     .with_entity(EntityType::new("Cat").id("id").attribute("name").to_one("owner", "Person"))
///     .with_entity(EntityType::new("Person").id("id").attribute("name"));
/// let factory = CriteriaBuilderFactory::new(Arc::new(metamodel), CriteriaConfig::default())?;
///
/// let mut cb = factory.create_with_alias("Cat", "c")?;
/// cb.select("c.name")?
///     .filter(restrict("c.owner.name").like("%son"))?
///     .order_by_asc("c.name")?;
/// assert_eq!(
///     cb.get_query_string()?,
///     "SELECT c.name FROM Cat c JOIN c.owner owner_1 WHERE owner_1.name LIKE '%son' ORDER BY c.name ASC NULLS LAST"
/// );
/// # Ok::<(), lifeguard_criteria::CriteriaError>(())
/// ```
pub struct CriteriaBuilder<T = Tuple> {
    state: QueryState,
    object_builder: Arc<dyn ObjectBuilder<T>>,
    context: BuilderContext,
}

impl<T> fmt::Debug for CriteriaBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CriteriaBuilder")
            .field("state", &self.state)
            .field("dialect", &self.context.dialect.name())
            .finish()
    }
}

impl CriteriaBuilder<Tuple> {
    pub(crate) fn new(state: QueryState, context: BuilderContext) -> Self {
        Self {
            state,
            object_builder: Arc::new(TupleObjectBuilder),
            context,
        }
    }
}

impl<T> CriteriaBuilder<T> {
    /// Replace the result type
    ///
    /// The object builder's select items are appended to the select clause.
    ///
    /// # Errors
    ///
    /// Returns `BuilderFinalized` after a terminal operation.
    pub fn select_new<Y>(self, builder: impl ObjectBuilder<Y> + 'static) -> Result<CriteriaBuilder<Y>, CriteriaError> {
        self.with_object_builder(Arc::new(builder))
    }

    pub(crate) fn with_object_builder<Y>(
        mut self,
        builder: Arc<dyn ObjectBuilder<Y>>,
    ) -> Result<CriteriaBuilder<Y>, CriteriaError> {
        builder.apply_selects(&mut self.state.mutable()?.select)?;
        Ok(CriteriaBuilder {
            state: self.state,
            object_builder: builder,
            context: self.context,
        })
    }

    /// Register a common table expression
    ///
    /// # Errors
    ///
    /// Returns `DuplicateAlias` when a CTE with the same name is registered, or
    /// `DuplicateParameter` when the CTE binds a parameter differently.
    pub fn with(&mut self, mut cte: CteBuilder) -> Result<&mut Self, CriteriaError> {
        let state = self.state.mutable()?;
        cte.end()?;
        if state.ctes.iter().any(|c| c.name() == cte.name()) {
            return Err(CriteriaError::DuplicateAlias(cte.name().to_string()));
        }
        state.parameters.merge(cte.query_state().parameters())?;
        state.ctes.push(cte);
        Ok(self)
    }

    pub fn set_first_result(&mut self, first_result: u64) -> &mut Self {
        self.state.first_result = Some(first_result);
        self
    }

    pub fn set_max_results(&mut self, max_results: u64) -> &mut Self {
        self.state.max_results = Some(max_results);
        self
    }

    pub fn first_result(&self) -> Option<u64> {
        self.state.first_result
    }

    pub fn max_results(&self) -> Option<u64> {
        self.state.max_results
    }

    pub fn dialect(&self) -> &Arc<dyn DbmsDialect> {
        &self.context.dialect
    }

    /// Render the query in the criteria language (finalizes the builder)
    ///
    /// Queries with CTEs carry a `WITH` prefix.
    pub fn get_query_string(&mut self) -> Result<String, CriteriaError> {
        self.state.finalize()?;
        let body = self.state.render_cached(QueryKind::Main, QueryState::build_query)?;
        let prefix = self.state.build_cte_prefix(self.context.dialect.cte_keyword(false))?;
        Ok(join_parts(&[prefix, body]))
    }

    /// Build the executable query, including parameters and the result window
    ///
    /// # Errors
    ///
    /// Returns `UnsatisfiedParameter` when a referenced parameter is unbound, or
    /// the provider error from native SQL translation.
    pub fn get_typed_query<P: QueryProvider + ?Sized>(&mut self, provider: &P) -> Result<TypedQuery, CriteriaError> {
        self.state.finalize()?;
        let query_string = self.state.render_cached(QueryKind::Main, QueryState::build_query)?;
        let mut query = create_typed_query(&mut self.state, &self.context, provider, &query_string)?;
        query.first_result = self.state.first_result;
        query.max_results = self.state.max_results;
        Ok(query)
    }

    /// Execute the query and build every result
    pub fn get_result_list<P: QueryProvider + ?Sized>(&mut self, provider: &P) -> Result<Vec<T>, CriteriaError> {
        let query = self.get_typed_query(provider)?;
        log::debug!("Executing criteria query: {}", query.query_string);
        let rows = provider.get_result_list(&query).map_err(CriteriaError::Provider)?;
        self.object_builder.build_rows(rows)
    }

    /// Execute the query and build exactly one result
    pub fn get_single_result<P: QueryProvider + ?Sized>(&mut self, provider: &P) -> Result<T, CriteriaError> {
        let query = self.get_typed_query(provider)?;
        log::debug!("Executing criteria query: {}", query.query_string);
        let row = provider.get_single_result(&query).map_err(CriteriaError::Provider)?;
        self.object_builder.build(row)
    }

    /// Switch to paginated execution
    ///
    /// # Errors
    ///
    /// - `InvalidPageSize` when `page_size` is zero
    /// - `IdentifierUnresolved` when the root entity declares no identifier
    /// - `BuilderFinalized` after a terminal operation
    pub fn page(mut self, first_row: u64, page_size: u64) -> Result<PaginatedCriteriaBuilder<T>, CriteriaError> {
        self.state.mutable()?;
        PaginatedCriteriaBuilder::new(self.state, self.object_builder, self.context, first_row, page_size)
    }
}

impl<T> BaseQueryBuilder for CriteriaBuilder<T> {
    fn query_state(&self) -> &QueryState {
        &self.state
    }

    fn query_state_mut(&mut self) -> &mut QueryState {
        &mut self.state
    }
}
