//! Predicate tree for WHERE, HAVING and join ON clauses.
//!
//! Conditions are a closed set of node kinds ([`Predicate`]). Consumers walk the
//! tree through [`Predicate::accept`], which dispatches to the matching
//! `visit_*` method of a [`PredicateVisitor`]. Rendering, implicit-join discovery
//! and parameter validation are all visitors.
//!
//! # Example
//!
//! ```
//! use lifeguard_criteria::predicate::{restrict, Predicate};
//! use lifeguard_criteria::predicate::render::render_predicate;
//! use lifeguard_criteria::expression::IdentityResolver;
//!
//! let predicate = Predicate::or(vec![
//!     restrict("c.name").like("%son"),
//!     Predicate::and(vec![restrict("c.age").gt(":minAge"), restrict("c.owner").is_not_null()]),
//! ]);
//! let sql = render_predicate(&predicate, &IdentityResolver).unwrap();
//! assert_eq!(sql, "c.name LIKE '%son' OR (c.age > :minAge AND c.owner IS NOT NULL)");
//! ```

pub mod render;
pub mod restriction;
pub mod visitor;

pub use render::{render_conjunction, render_predicate};
pub use restriction::{render_value_literal, restrict, RestrictionBuilder};
pub use visitor::{ExpressionCollector, PredicateVisitor};

use crate::error::CriteriaError;
use crate::expression::Expression;
use crate::query::subquery::SubqueryBuilder;

/// Binary comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl ComparisonOperator {
    pub fn to_sql(&self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::NotEqual => "<>",
            ComparisonOperator::Greater => ">",
            ComparisonOperator::GreaterOrEqual => ">=",
            ComparisonOperator::Less => "<",
            ComparisonOperator::LessOrEqual => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonPredicate {
    pub left: Expression,
    pub operator: ComparisonOperator,
    pub right: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LikePredicate {
    pub left: Expression,
    pub pattern: Expression,
    pub case_sensitive: bool,
    pub escape: Option<char>,
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BetweenPredicate {
    pub left: Expression,
    pub start: Expression,
    pub end: Expression,
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InPredicate {
    pub left: Expression,
    pub values: Vec<Expression>,
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IsNullPredicate {
    pub expression: Expression,
    pub negated: bool,
}

/// `IS EMPTY` test on a collection-valued path
#[derive(Debug, Clone, PartialEq)]
pub struct IsEmptyPredicate {
    pub expression: Expression,
    pub negated: bool,
}

/// `EXISTS (subquery)` predicate
///
/// The predicate exclusively owns its subquery builder. A builder can be attached
/// exactly once; rendering a predicate without one is an error.
#[derive(Debug, Clone, Default)]
pub struct ExistsPredicate {
    subquery: Option<Box<SubqueryBuilder>>,
    negated: bool,
}

impl ExistsPredicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn negated() -> Self {
        Self {
            subquery: None,
            negated: true,
        }
    }

    /// Attach the correlated subquery, ending it if it is still open
    ///
    /// # Errors
    ///
    /// Returns `SubqueryAlreadyAttached` when a builder is already attached.
    pub fn set_subquery_builder(&mut self, mut builder: SubqueryBuilder) -> Result<(), CriteriaError> {
        if self.subquery.is_some() {
            return Err(CriteriaError::SubqueryAlreadyAttached);
        }
        builder.end()?;
        self.subquery = Some(Box::new(builder));
        Ok(())
    }

    pub fn builder(&self) -> Option<&SubqueryBuilder> {
        self.subquery.as_deref()
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }
}

impl PartialEq for ExistsPredicate {
    fn eq(&self, other: &Self) -> bool {
        self.negated == other.negated
            && match (&self.subquery, &other.subquery) {
                (Some(a), Some(b)) => a.render_subquery().ok() == b.render_subquery().ok(),
                (None, None) => true,
                _ => false,
            }
    }
}

/// A node of the predicate tree
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Comparison(ComparisonPredicate),
    Like(LikePredicate),
    Between(BetweenPredicate),
    In(InPredicate),
    IsNull(IsNullPredicate),
    IsEmpty(IsEmptyPredicate),
    Exists(ExistsPredicate),
}

impl Predicate {
    pub fn and(children: Vec<Predicate>) -> Self {
        Predicate::And(children)
    }

    pub fn or(children: Vec<Predicate>) -> Self {
        Predicate::Or(children)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Predicate) -> Self {
        Predicate::Not(Box::new(inner))
    }

    /// Double-dispatch into the visitor method for this node kind
    pub fn accept(&self, visitor: &mut dyn PredicateVisitor) -> Result<(), CriteriaError> {
        match self {
            Predicate::And(children) => visitor.visit_and(children),
            Predicate::Or(children) => visitor.visit_or(children),
            Predicate::Not(inner) => visitor.visit_not(inner),
            Predicate::Comparison(p) => visitor.visit_comparison(p),
            Predicate::Like(p) => visitor.visit_like(p),
            Predicate::Between(p) => visitor.visit_between(p),
            Predicate::In(p) => visitor.visit_in(p),
            Predicate::IsNull(p) => visitor.visit_is_null(p),
            Predicate::IsEmpty(p) => visitor.visit_is_empty(p),
            Predicate::Exists(p) => visitor.visit_exists(p),
        }
    }

    /// Every expression in the tree, excluding subquery bodies
    pub fn expressions(&self) -> Vec<Expression> {
        let mut collector = ExpressionCollector::new();
        // The collector never fails when subqueries are skipped
        let _ = self.accept(&mut collector);
        collector.into_expressions()
    }
}

impl From<ExistsPredicate> for Predicate {
    fn from(p: ExistsPredicate) -> Self {
        Predicate::Exists(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metamodel::{EntityType, Metamodel};
    use std::sync::Arc;

    fn subquery() -> SubqueryBuilder {
        let mm = Arc::new(Metamodel::new().with_entity(EntityType::new("Cat").id("id")));
        SubqueryBuilder::new(mm, "Cat", "k").unwrap()
    }

    #[test]
    fn test_exists_attach_once() {
        let mut exists = ExistsPredicate::new();
        assert!(exists.builder().is_none());
        exists.set_subquery_builder(subquery()).unwrap();
        assert!(exists.builder().is_some());

        let err = exists.set_subquery_builder(subquery()).unwrap_err();
        assert!(matches!(err, CriteriaError::SubqueryAlreadyAttached));
    }

    #[test]
    fn test_expressions_are_collected_in_order() {
        let predicate = Predicate::and(vec![
            restrict("c.name").eq(":name"),
            Predicate::not(restrict("c.owner.address.city").is_null()),
        ]);
        let exprs: Vec<String> = predicate.expressions().iter().map(|e| e.to_string()).collect();
        assert_eq!(exprs, vec!["c.name", ":name", "c.owner.address.city"]);
    }
}
