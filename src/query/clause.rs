//! WHERE and HAVING clause manager.

use crate::error::CriteriaError;
use crate::expression::{Expression, PathResolver};
use crate::predicate::render::render_conjunction;
use crate::predicate::{ExpressionCollector, Predicate};

/// Conjunction of predicates rendered behind a clause keyword
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateManager {
    keyword: &'static str,
    predicates: Vec<Predicate>,
}

impl PredicateManager {
    pub fn new_where() -> Self {
        Self {
            keyword: "WHERE",
            predicates: Vec::new(),
        }
    }

    pub fn new_having() -> Self {
        Self {
            keyword: "HAVING",
            predicates: Vec::new(),
        }
    }

    pub fn add(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Expressions of every predicate, subquery bodies excluded
    pub fn expressions(&self) -> Vec<Expression> {
        self.predicates.iter().flat_map(Predicate::expressions).collect()
    }

    /// Expressions of every predicate including correlated subqueries
    pub fn all_expressions(&self) -> Result<Vec<Expression>, CriteriaError> {
        let mut collector = ExpressionCollector::including_subqueries();
        for predicate in &self.predicates {
            predicate.accept(&mut collector)?;
        }
        Ok(collector.into_expressions())
    }

    /// Render `KEYWORD p1 AND p2 ...`, or an empty string when unused
    pub fn build_clause(&self, resolver: &dyn PathResolver) -> Result<String, CriteriaError> {
        self.build_clause_with(resolver, None)
    }

    /// Render the clause with one extra trailing conjunct
    pub fn build_clause_with(
        &self,
        resolver: &dyn PathResolver,
        extra: Option<Predicate>,
    ) -> Result<String, CriteriaError> {
        if self.predicates.is_empty() && extra.is_none() {
            return Ok(String::new());
        }
        let rendered = match extra {
            Some(extra) => {
                let mut all = self.predicates.clone();
                all.push(extra);
                render_conjunction(&all, resolver)?
            }
            None => render_conjunction(&self.predicates, resolver)?,
        };
        Ok(format!("{} {}", self.keyword, rendered))
    }
}
