//! Visitor protocol over the predicate tree.

use super::{
    BetweenPredicate, ComparisonPredicate, ExistsPredicate, InPredicate, IsEmptyPredicate,
    IsNullPredicate, LikePredicate, Predicate,
};
use crate::error::CriteriaError;
use crate::expression::Expression;

/// One `visit_*` method per predicate node kind
///
/// Composite nodes hand their children to the visitor; it is up to the visitor to
/// recurse via [`Predicate::accept`].
pub trait PredicateVisitor {
    fn visit_and(&mut self, children: &[Predicate]) -> Result<(), CriteriaError>;
    fn visit_or(&mut self, children: &[Predicate]) -> Result<(), CriteriaError>;
    fn visit_not(&mut self, inner: &Predicate) -> Result<(), CriteriaError>;
    fn visit_comparison(&mut self, predicate: &ComparisonPredicate) -> Result<(), CriteriaError>;
    fn visit_like(&mut self, predicate: &LikePredicate) -> Result<(), CriteriaError>;
    fn visit_between(&mut self, predicate: &BetweenPredicate) -> Result<(), CriteriaError>;
    fn visit_in(&mut self, predicate: &InPredicate) -> Result<(), CriteriaError>;
    fn visit_is_null(&mut self, predicate: &IsNullPredicate) -> Result<(), CriteriaError>;
    fn visit_is_empty(&mut self, predicate: &IsEmptyPredicate) -> Result<(), CriteriaError>;
    fn visit_exists(&mut self, predicate: &ExistsPredicate) -> Result<(), CriteriaError>;
}

/// Collects every expression of a predicate tree
///
/// Subquery bodies are skipped unless [`ExpressionCollector::including_subqueries`]
/// is used (parameter validation needs them, implicit joins do not).
#[derive(Debug, Default)]
pub struct ExpressionCollector {
    expressions: Vec<Expression>,
    include_subqueries: bool,
}

impl ExpressionCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn including_subqueries() -> Self {
        Self {
            expressions: Vec::new(),
            include_subqueries: true,
        }
    }

    pub fn expressions(&self) -> &[Expression] {
        &self.expressions
    }

    pub fn into_expressions(self) -> Vec<Expression> {
        self.expressions
    }

    fn visit_all(&mut self, children: &[Predicate]) -> Result<(), CriteriaError> {
        for child in children {
            child.accept(self)?;
        }
        Ok(())
    }
}

impl PredicateVisitor for ExpressionCollector {
    fn visit_and(&mut self, children: &[Predicate]) -> Result<(), CriteriaError> {
        self.visit_all(children)
    }

    fn visit_or(&mut self, children: &[Predicate]) -> Result<(), CriteriaError> {
        self.visit_all(children)
    }

    fn visit_not(&mut self, inner: &Predicate) -> Result<(), CriteriaError> {
        inner.accept(self)
    }

    fn visit_comparison(&mut self, predicate: &ComparisonPredicate) -> Result<(), CriteriaError> {
        self.expressions.push(predicate.left.clone());
        self.expressions.push(predicate.right.clone());
        Ok(())
    }

    fn visit_like(&mut self, predicate: &LikePredicate) -> Result<(), CriteriaError> {
        self.expressions.push(predicate.left.clone());
        self.expressions.push(predicate.pattern.clone());
        Ok(())
    }

    fn visit_between(&mut self, predicate: &BetweenPredicate) -> Result<(), CriteriaError> {
        self.expressions.push(predicate.left.clone());
        self.expressions.push(predicate.start.clone());
        self.expressions.push(predicate.end.clone());
        Ok(())
    }

    fn visit_in(&mut self, predicate: &InPredicate) -> Result<(), CriteriaError> {
        self.expressions.push(predicate.left.clone());
        self.expressions.extend(predicate.values.iter().cloned());
        Ok(())
    }

    fn visit_is_null(&mut self, predicate: &IsNullPredicate) -> Result<(), CriteriaError> {
        self.expressions.push(predicate.expression.clone());
        Ok(())
    }

    fn visit_is_empty(&mut self, predicate: &IsEmptyPredicate) -> Result<(), CriteriaError> {
        self.expressions.push(predicate.expression.clone());
        Ok(())
    }

    fn visit_exists(&mut self, predicate: &ExistsPredicate) -> Result<(), CriteriaError> {
        if self.include_subqueries {
            let subquery = predicate.builder().ok_or(CriteriaError::MissingSubquery)?;
            self.expressions.extend(subquery.referenced_expressions()?);
        }
        Ok(())
    }
}
