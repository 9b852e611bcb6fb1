//! Correlated subqueries for EXISTS predicates.

use crate::error::CriteriaError;
use crate::expression::Expression;
use crate::metamodel::Metamodel;
use crate::query::builder::BaseQueryBuilder;
use crate::query::state::{join_parts, QueryState};
use std::sync::Arc;

/// Builder for a subquery scope
///
/// Paths starting with an alias of the enclosing query are correlation
/// references and are rendered untouched. The subquery is finalized with
/// [`SubqueryBuilder::end`], which is done automatically when it is attached to
/// an EXISTS predicate.
#[derive(Debug, Clone)]
pub struct SubqueryBuilder {
    state: QueryState,
}

impl SubqueryBuilder {
    /// # Errors
    ///
    /// Returns `UnknownEntity` when the entity is not part of the metamodel.
    pub fn new(metamodel: Arc<Metamodel>, entity: &str, alias: &str) -> Result<Self, CriteriaError> {
        // Subqueries never bind the pagination id list
        let state = QueryState::new(metamodel, entity, alias, "")?;
        Ok(Self { state })
    }

    /// Finish the subquery and apply its implicit joins
    pub fn end(&mut self) -> Result<&mut Self, CriteriaError> {
        self.state.finalize()?;
        Ok(self)
    }

    /// Root alias followed by every join alias of this scope
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.state.joins.aliases()
    }

    /// Render `(SELECT ... FROM ... WHERE ...)`
    ///
    /// Fetch joins and ordering have no meaning in a subquery and are not
    /// rendered. Without select items the subquery selects `1`.
    pub fn render_subquery(&self) -> Result<String, CriteriaError> {
        let state = &self.state;
        let select = if state.select.is_empty() {
            "SELECT 1".to_string()
        } else {
            state.select.build_select_expressions(&state.joins)
        };
        let body = join_parts(&[
            select,
            state.build_from(),
            state.joins.build_joins(false)?,
            state.where_clause.build_clause(&state.joins)?,
            state.group_by.build_group_by(&state.joins),
            state.having.build_clause(&state.joins)?,
        ]);
        Ok(format!("({body})"))
    }

    /// Every expression of the subquery, nested subqueries included
    ///
    /// # Errors
    ///
    /// Returns `MissingSubquery` when a nested EXISTS has no subquery attached.
    pub fn referenced_expressions(&self) -> Result<Vec<Expression>, CriteriaError> {
        self.state.referenced_expressions()
    }
}

impl BaseQueryBuilder for SubqueryBuilder {
    fn query_state(&self) -> &QueryState {
        &self.state
    }

    fn query_state_mut(&mut self) -> &mut QueryState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metamodel::EntityType;
    use crate::predicate::{restrict, ExistsPredicate};

    fn metamodel() -> Arc<Metamodel> {
        Arc::new(
            Metamodel::new()
                .with_entity(EntityType::new("Cat").id("id").attribute("age").to_one("owner", "Person"))
                .with_entity(EntityType::new("Person").id("id").attribute("name")),
        )
    }

    #[test]
    fn test_render_with_implicit_join() {
        let mut sub = SubqueryBuilder::new(metamodel(), "Cat", "k").unwrap();
        sub.select("k.id")
            .unwrap()
            .filter(restrict("k.owner.name").eq("c.name"))
            .unwrap();
        sub.end().unwrap();
        assert_eq!(
            sub.render_subquery().unwrap(),
            "(SELECT k.id FROM Cat k JOIN k.owner owner_1 WHERE owner_1.name = c.name)"
        );
        assert!(sub.filter(restrict("k.age").gt("1")).is_err());
    }

    #[test]
    fn test_referenced_expressions() {
        let mut sub = SubqueryBuilder::new(metamodel(), "Cat", "k").unwrap();
        sub.filter(restrict("k.age").gt(":minAge")).unwrap();
        let exprs: Vec<String> = sub.referenced_expressions().unwrap().iter().map(|e| e.to_string()).collect();
        assert_eq!(exprs, vec!["k.age", ":minAge"]);
    }

    #[test]
    fn test_nested_exists_without_subquery() {
        let mut sub = SubqueryBuilder::new(metamodel(), "Cat", "k").unwrap();
        sub.filter(ExistsPredicate::new().into()).unwrap();
        assert!(matches!(sub.referenced_expressions(), Err(CriteriaError::MissingSubquery)));
    }
}
