//! Common table expressions.
//!
//! A CTE is declared as an entity flagged with [`EntityType::cte`] in the
//! metamodel. The CTE builder selects from a regular entity and binds each CTE
//! attribute to an expression:
//!
//! ```
//! use std::sync::Arc;
//! use lifeguard_criteria::prelude::*;
//!
//! let metamodel = Metamodel::new()
//!     .with_entity(EntityType::new("Cat").id("id").attribute("name").attribute("age"))
//!     .with_entity(EntityType::new("OldCat").id("id").attribute("name").cte());
//! let factory = CriteriaBuilderFactory::new(Arc::new(metamodel), CriteriaConfig::default())?;
//!
//! let mut cte = factory.create_cte("OldCat", "Cat", "c")?;
//! cte.bind("id", "c.id")?.bind("name", "c.name")?;
//! cte.filter(restrict("c.age").gt("10"))?;
//!
//! let mut cb = factory.create_with_alias("OldCat", "o")?;
//! cb.with(cte)?;
//! assert_eq!(
//!     cb.get_query_string()?,
//!     "WITH OldCat(id, name) AS (SELECT c.id, c.name FROM Cat c WHERE c.age > 10) FROM OldCat o"
//! );
//! # Ok::<(), lifeguard_criteria::CriteriaError>(())
//! ```

use crate::dialect::DbmsDialect;
use crate::error::CriteriaError;
use crate::expression::Expression;
use crate::metamodel::{EntityType, Metamodel};
use crate::query::builder::BaseQueryBuilder;
use crate::query::state::{join_parts, QueryState};
use crate::specification::CteQuerySpecification;
use std::sync::Arc;

/// Builder for one CTE body
#[derive(Debug, Clone)]
pub struct CteBuilder {
    state: QueryState,
    cte_entity: Arc<EntityType>,
}

impl CteBuilder {
    /// Start a CTE for `cte_entity` selecting from `from_entity` aliased as `alias`
    ///
    /// # Errors
    ///
    /// - `UnknownEntity` when either entity is not part of the metamodel
    /// - `UnsupportedOperation` when `cte_entity` is not flagged as a CTE
    pub fn new(
        metamodel: Arc<Metamodel>,
        cte_entity: &str,
        from_entity: &str,
        alias: &str,
    ) -> Result<Self, CriteriaError> {
        let entity = metamodel.entity(cte_entity)?;
        if !entity.is_cte() {
            return Err(CriteriaError::UnsupportedOperation(format!(
                "entity '{cte_entity}' is not a CTE entity"
            )));
        }
        let state = QueryState::new(metamodel, from_entity, alias, "")?;
        Ok(Self {
            state,
            cte_entity: entity,
        })
    }

    pub fn name(&self) -> &str {
        self.cte_entity.name()
    }

    /// Bind a CTE attribute to an expression of the CTE body
    ///
    /// # Errors
    ///
    /// - `UnknownAttribute` when the CTE entity does not declare `attribute`
    /// - `DuplicateAlias` when `attribute` is already bound
    pub fn bind(&mut self, attribute: &str, expression: impl Into<Expression>) -> Result<&mut Self, CriteriaError> {
        if !self.cte_entity.has_attribute(attribute) {
            return Err(CriteriaError::UnknownAttribute(format!(
                "{}.{}",
                self.cte_entity.name(),
                attribute
            )));
        }
        self.state
            .mutable()?
            .select
            .select(expression.into(), Some(attribute))?;
        Ok(self)
    }

    /// Bound attributes in binding order
    pub fn attributes(&self) -> Vec<&str> {
        self.state
            .select
            .items()
            .iter()
            .filter_map(|i| i.alias.as_deref())
            .collect()
    }

    /// Offset inlined into the CTE body
    pub fn set_first_result(&mut self, first_result: u64) -> &mut Self {
        self.state.first_result = Some(first_result);
        self
    }

    /// Limit inlined into the CTE body
    pub fn set_max_results(&mut self, max_results: u64) -> &mut Self {
        self.state.max_results = Some(max_results);
        self
    }

    /// Finish the CTE
    ///
    /// # Errors
    ///
    /// Returns `Mapping` when an attribute of the CTE entity is left unbound.
    pub fn end(&mut self) -> Result<&mut Self, CriteriaError> {
        if !self.state.is_finalized() {
            let bound = self.attributes();
            if let Some(missing) = self
                .cte_entity
                .attributes()
                .iter()
                .find(|a| !bound.contains(&a.as_str()))
            {
                return Err(CriteriaError::Mapping(format!(
                    "CTE attribute '{}.{}' is not bound",
                    self.cte_entity.name(),
                    missing
                )));
            }
        }
        self.state.finalize()?;
        Ok(self)
    }

    /// The CTE body in the criteria language, without LIMIT/OFFSET
    pub fn render_body(&self) -> Result<String, CriteriaError> {
        let state = &self.state;
        Ok(join_parts(&[
            state.select.build_select_expressions(&state.joins),
            state.build_from(),
            state.joins.build_joins(false)?,
            state.where_clause.build_clause(&state.joins)?,
            state.group_by.build_group_by(&state.joins),
            state.having.build_clause(&state.joins)?,
            state.order_by.build_order_by(&state.joins, Some(&state.select)),
        ]))
    }

    /// `Name(a, b) AS (body)` as shown in query strings
    pub fn render_cte_clause(&self) -> Result<String, CriteriaError> {
        let mut body = self.render_body()?;
        if let Some(limit) = self.state.max_results {
            body.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.state.first_result {
            body.push_str(&format!(" OFFSET {offset}"));
        }
        Ok(format!("{}({}) AS ({})", self.name(), self.attributes().join(", "), body))
    }

    /// Specification that renders this CTE natively through `dialect`
    pub fn to_specification(&self, dialect: Arc<dyn DbmsDialect>) -> Result<CteQuerySpecification, CriteriaError> {
        Ok(CteQuerySpecification::new(
            dialect,
            self.name(),
            self.attributes().into_iter().map(str::to_string).collect(),
            self.render_body()?,
            self.state.max_results,
            self.state.first_result,
        ))
    }
}

impl BaseQueryBuilder for CteBuilder {
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
    use crate::predicate::restrict;

    fn metamodel() -> Arc<Metamodel> {
        Arc::new(
            Metamodel::new()
                .with_entity(EntityType::new("Cat").id("id").attribute("name").attribute("age"))
                .with_entity(EntityType::new("CatAge").id("id").attribute("age").cte()),
        )
    }

    #[test]
    fn test_non_cte_entity_is_rejected() {
        let err = CteBuilder::new(metamodel(), "Cat", "Cat", "c").unwrap_err();
        assert!(matches!(err, CriteriaError::UnsupportedOperation(_)));
    }

    #[test]
    fn test_bind_unknown_attribute() {
        let mut cte = CteBuilder::new(metamodel(), "CatAge", "Cat", "c").unwrap();
        let err = cte.bind("name", "c.name").unwrap_err();
        assert!(matches!(err, CriteriaError::UnknownAttribute(ref a) if a == "CatAge.name"));
    }

    #[test]
    fn test_unbound_attribute_fails_on_end() {
        let mut cte = CteBuilder::new(metamodel(), "CatAge", "Cat", "c").unwrap();
        cte.bind("id", "c.id").unwrap();
        assert!(matches!(cte.end(), Err(CriteriaError::Mapping(_))));
    }

    #[test]
    fn test_cte_clause_with_window() {
        let mut cte = CteBuilder::new(metamodel(), "CatAge", "Cat", "c").unwrap();
        cte.bind("id", "c.id")
            .unwrap()
            .bind("age", "c.age")
            .unwrap()
            .order_by_desc("c.age")
            .unwrap();
        cte.set_max_results(10).set_first_result(20);
        cte.filter(restrict("c.name").is_not_null()).unwrap();
        cte.end().unwrap();
        assert_eq!(cte.attributes(), vec!["id", "age"]);
        assert_eq!(
            cte.render_cte_clause().unwrap(),
            "CatAge(id, age) AS (SELECT c.id, c.age FROM Cat c WHERE c.name IS NOT NULL ORDER BY c.age DESC NULLS LAST LIMIT 10 OFFSET 20)"
        );
    }
}
