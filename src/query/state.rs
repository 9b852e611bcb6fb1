//! Accumulated builder state and its lifecycle.

use crate::error::CriteriaError;
use crate::expression::Expression;
use crate::metamodel::{EntityType, Metamodel};
use crate::parameter::ParameterManager;
use crate::predicate::ExpressionCollector;
use crate::query::builder::BaseQueryBuilder;
use crate::query::clause::PredicateManager;
use crate::query::cte::CteBuilder;
use crate::query::group_by::GroupByManager;
use crate::query::join::JoinManager;
use crate::query::order_by::OrderByManager;
use crate::query::select::SelectManager;
use crate::specification::CustomQuerySpecification;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Lifecycle of a builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    /// Structural mutation allowed
    Building,
    /// A terminal operation ran; implicit joins are applied and clause state is frozen
    Finalized,
}

/// Kinds of query string a builder can render, used as render cache keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Main,
    Count,
    Id,
    PaginatedMain,
    Subquery,
    CteBody,
}

/// All clause managers of one query scope plus its parameters
#[derive(Debug, Clone)]
pub struct QueryState {
    pub(crate) metamodel: Arc<Metamodel>,
    pub(crate) joins: JoinManager,
    pub(crate) select: SelectManager,
    pub(crate) where_clause: PredicateManager,
    pub(crate) group_by: GroupByManager,
    pub(crate) having: PredicateManager,
    pub(crate) order_by: OrderByManager,
    pub(crate) parameters: ParameterManager,
    pub(crate) ctes: Vec<CteBuilder>,
    pub(crate) first_result: Option<u64>,
    pub(crate) max_results: Option<u64>,
    state: BuilderState,
    render_cache: HashMap<QueryKind, String>,
    /// Native specification of a finalized query with CTEs, shared by every
    /// query kind so each CTE body is translated once
    pub(crate) specification: Option<CustomQuerySpecification>,
}

impl QueryState {
    /// Create the state for `entity` aliased as `alias`
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntity` when the entity is not part of the metamodel.
    pub fn new(
        metamodel: Arc<Metamodel>,
        entity: &str,
        alias: &str,
        reserved_parameter: &str,
    ) -> Result<Self, CriteriaError> {
        let root = metamodel.entity(entity)?;
        Ok(Self {
            joins: JoinManager::new(metamodel.clone(), root, alias),
            metamodel,
            select: SelectManager::new(),
            where_clause: PredicateManager::new_where(),
            group_by: GroupByManager::new(),
            having: PredicateManager::new_having(),
            order_by: OrderByManager::new(),
            parameters: ParameterManager::new(reserved_parameter),
            ctes: Vec::new(),
            first_result: None,
            max_results: None,
            state: BuilderState::Building,
            render_cache: HashMap::new(),
            specification: None,
        })
    }

    pub fn metamodel(&self) -> &Arc<Metamodel> {
        &self.metamodel
    }

    pub fn root_entity(&self) -> &Arc<EntityType> {
        self.joins.root_entity()
    }

    pub fn root_alias(&self) -> &str {
        self.joins.root_alias()
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    pub fn is_finalized(&self) -> bool {
        self.state == BuilderState::Finalized
    }

    pub fn parameters(&self) -> &ParameterManager {
        &self.parameters
    }

    /// Gate for structural mutation
    ///
    /// # Errors
    ///
    /// Returns `BuilderFinalized` once a terminal operation has run.
    pub fn mutable(&mut self) -> Result<&mut Self, CriteriaError> {
        match self.state {
            BuilderState::Building => Ok(self),
            BuilderState::Finalized => Err(CriteriaError::BuilderFinalized),
        }
    }

    /// Apply implicit joins and freeze the clause state
    ///
    /// Runs at most once; later calls are no-ops.
    pub fn finalize(&mut self) -> Result<(), CriteriaError> {
        if self.is_finalized() {
            return Ok(());
        }
        let mut expressions = self.select.expressions();
        let restricting = self.restricting_expressions();
        expressions.extend(restricting.iter().cloned());
        for node in self.joins.nodes() {
            if let Some(on) = &node.on {
                expressions.extend(on.expressions());
            }
        }
        self.joins.apply_implicit_joins(&expressions)?;
        self.joins.mark_referenced(&restricting);
        self.state = BuilderState::Finalized;
        log::trace!(
            "Finalized builder for {} with {} join(s)",
            self.root_entity().name(),
            self.joins.nodes().len()
        );
        Ok(())
    }

    /// Expressions of the clauses that shape the count and id queries
    fn restricting_expressions(&self) -> Vec<Expression> {
        let mut expressions = self.where_clause.expressions();
        expressions.extend(self.group_by.expressions().iter().cloned());
        expressions.extend(self.having.expressions());
        for expression in self.order_by.expressions() {
            match self.select.alias_expression(expression.as_str()) {
                Some(aliased) => expressions.push(aliased.clone()),
                None => expressions.push(expression),
            }
        }
        expressions
    }

    /// Every expression of this scope, including subqueries and CTE bodies
    pub fn referenced_expressions(&self) -> Result<Vec<Expression>, CriteriaError> {
        let mut expressions = self.select.expressions();
        expressions.extend(self.where_clause.all_expressions()?);
        expressions.extend(self.group_by.expressions().iter().cloned());
        expressions.extend(self.having.all_expressions()?);
        expressions.extend(self.order_by.expressions());
        for node in self.joins.nodes() {
            if let Some(on) = &node.on {
                let mut collector = ExpressionCollector::including_subqueries();
                on.accept(&mut collector)?;
                expressions.extend(collector.into_expressions());
            }
        }
        for cte in &self.ctes {
            expressions.extend(cte.query_state().referenced_expressions()?);
        }
        Ok(expressions)
    }

    /// Names of every parameter referenced by this scope
    pub fn referenced_parameters(&self) -> Result<BTreeSet<String>, CriteriaError> {
        Ok(self
            .referenced_expressions()?
            .iter()
            .flat_map(|e| e.parameters().map(str::to_string).collect::<Vec<_>>())
            .collect())
    }

    pub(crate) fn cached(&self, kind: QueryKind) -> Option<&String> {
        self.render_cache.get(&kind)
    }

    /// Render through the cache; only finalized state is cached
    pub(crate) fn render_cached<F>(&mut self, kind: QueryKind, render: F) -> Result<String, CriteriaError>
    where
        F: FnOnce(&QueryState) -> Result<String, CriteriaError>,
    {
        if let Some(query) = self.cached(kind) {
            return Ok(query.clone());
        }
        let query = render(self)?;
        if self.is_finalized() {
            self.render_cache.insert(kind, query.clone());
        }
        Ok(query)
    }

    /// `FROM Entity alias`
    pub(crate) fn build_from(&self) -> String {
        format!("FROM {} {}", self.root_entity().name(), self.root_alias())
    }

    /// `WITH A(x, y) AS (...), B(z) AS (...)` prefix, empty without CTEs
    pub(crate) fn build_cte_prefix(&self, keyword: &str) -> Result<String, CriteriaError> {
        if self.ctes.is_empty() {
            return Ok(String::new());
        }
        let mut clauses = Vec::with_capacity(self.ctes.len());
        for cte in &self.ctes {
            clauses.push(cte.render_cte_clause()?);
        }
        Ok(format!("{} {}", keyword, clauses.join(", ")))
    }

    /// Select clause of a data query; empty when nothing is selected
    pub(crate) fn build_select_clause(&self) -> String {
        self.build_select_clause_with(self.select.is_distinct())
    }

    /// Select clause of a data query, forced to `SELECT DISTINCT` when `distinct`
    pub(crate) fn build_select_clause_with(&self, distinct: bool) -> String {
        match (self.select.is_empty(), distinct) {
            (true, true) => format!("SELECT DISTINCT {}", self.root_alias()),
            (false, true) => self.select.build_select_distinct(&self.joins),
            (_, false) => self.select.build_select(&self.joins),
        }
    }

    /// Render the main query: select, all joins and every clause
    pub(crate) fn build_query(&self) -> Result<String, CriteriaError> {
        Ok(join_parts(&[
            self.build_select_clause(),
            self.build_from(),
            self.joins.build_joins(true)?,
            self.where_clause.build_clause(&self.joins)?,
            self.group_by.build_group_by(&self.joins),
            self.having.build_clause(&self.joins)?,
            self.order_by.build_order_by(&self.joins, None),
        ]))
    }
}

/// Join non-empty fragments with single spaces
pub(crate) fn join_parts(parts: &[String]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::restrict;

    fn state() -> QueryState {
        let mm = Arc::new(
            Metamodel::new()
                .with_entity(EntityType::new("Cat").id("id").attribute("name").to_one("owner", "Person"))
                .with_entity(EntityType::new("Person").id("id").attribute("name")),
        );
        QueryState::new(mm, "Cat", "c", "ids").unwrap()
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut qs = state();
        qs.where_clause.add(restrict("c.owner.name").eq(":name"));
        qs.finalize().unwrap();
        qs.finalize().unwrap();
        assert_eq!(qs.joins.nodes().len(), 1);
        assert!(qs.mutable().is_err());
    }

    #[test]
    fn test_build_query_without_select() {
        let mut qs = state();
        qs.where_clause.add(restrict("c.owner.name").eq(":name"));
        qs.order_by.order_by(Expression::new("c.name"), true, false);
        qs.finalize().unwrap();
        assert_eq!(
            qs.build_query().unwrap(),
            "FROM Cat c JOIN c.owner owner_1 WHERE owner_1.name = :name ORDER BY c.name ASC NULLS LAST"
        );
    }

    #[test]
    fn test_referenced_parameters() {
        let mut qs = state();
        qs.select.select(Expression::new("COALESCE(c.name, :fallback)"), None).unwrap();
        qs.where_clause.add(restrict("c.name").eq(":name"));
        let params = qs.referenced_parameters().unwrap();
        assert_eq!(params.into_iter().collect::<Vec<_>>(), vec!["fallback", "name"]);
    }

    #[test]
    fn test_unknown_entity() {
        let mm = Arc::new(Metamodel::new());
        assert!(matches!(
            QueryState::new(mm, "Dog", "d", "ids"),
            Err(CriteriaError::UnknownEntity(_))
        ));
    }
}
