//! Rendering visitor: predicate tree to query-language text.

use super::{
    BetweenPredicate, ComparisonPredicate, ExistsPredicate, InPredicate, IsEmptyPredicate,
    IsNullPredicate, LikePredicate, Predicate, PredicateVisitor,
};
use crate::error::CriteriaError;
use crate::expression::PathResolver;

/// Render a single predicate with the given path resolver
pub fn render_predicate(predicate: &Predicate, resolver: &dyn PathResolver) -> Result<String, CriteriaError> {
    let mut renderer = PredicateRenderer::new(resolver);
    predicate.accept(&mut renderer)?;
    Ok(renderer.finish())
}

/// Render a conjunction of predicates (the top level of WHERE/HAVING/ON)
pub fn render_conjunction(predicates: &[Predicate], resolver: &dyn PathResolver) -> Result<String, CriteriaError> {
    let mut renderer = PredicateRenderer::new(resolver);
    renderer.render_junction(predicates, " AND ", |p| matches!(p, Predicate::Or(_)), "1 = 1")?;
    Ok(renderer.finish())
}

/// Visitor appending the rendered text of each node to a buffer
pub struct PredicateRenderer<'a> {
    sb: String,
    resolver: &'a dyn PathResolver,
}

impl<'a> PredicateRenderer<'a> {
    pub fn new(resolver: &'a dyn PathResolver) -> Self {
        Self {
            sb: String::new(),
            resolver,
        }
    }

    pub fn finish(self) -> String {
        self.sb
    }

    fn render_junction(
        &mut self,
        children: &[Predicate],
        separator: &str,
        needs_parens: impl Fn(&Predicate) -> bool,
        empty: &str,
    ) -> Result<(), CriteriaError> {
        if children.is_empty() {
            self.sb.push_str(empty);
            return Ok(());
        }
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                self.sb.push_str(separator);
            }
            let parens = needs_parens(child);
            if parens {
                self.sb.push('(');
            }
            child.accept(self)?;
            if parens {
                self.sb.push(')');
            }
        }
        Ok(())
    }

    fn push_resolved(&mut self, expression: &crate::expression::Expression) {
        let resolved = self.resolver.resolve(expression);
        self.sb.push_str(&resolved);
    }
}

impl PredicateVisitor for PredicateRenderer<'_> {
    fn visit_and(&mut self, children: &[Predicate]) -> Result<(), CriteriaError> {
        self.render_junction(children, " AND ", |p| matches!(p, Predicate::Or(_)), "1 = 1")
    }

    fn visit_or(&mut self, children: &[Predicate]) -> Result<(), CriteriaError> {
        self.render_junction(children, " OR ", |p| matches!(p, Predicate::And(_)), "1 = 0")
    }

    fn visit_not(&mut self, inner: &Predicate) -> Result<(), CriteriaError> {
        self.sb.push_str("NOT (");
        inner.accept(self)?;
        self.sb.push(')');
        Ok(())
    }

    fn visit_comparison(&mut self, predicate: &ComparisonPredicate) -> Result<(), CriteriaError> {
        self.push_resolved(&predicate.left);
        self.sb.push(' ');
        self.sb.push_str(predicate.operator.to_sql());
        self.sb.push(' ');
        self.push_resolved(&predicate.right);
        Ok(())
    }

    fn visit_like(&mut self, predicate: &LikePredicate) -> Result<(), CriteriaError> {
        if predicate.case_sensitive {
            self.push_resolved(&predicate.left);
        } else {
            self.sb.push_str("UPPER(");
            self.push_resolved(&predicate.left);
            self.sb.push(')');
        }
        self.sb.push_str(if predicate.negated { " NOT LIKE " } else { " LIKE " });
        if predicate.case_sensitive {
            self.push_resolved(&predicate.pattern);
        } else {
            self.sb.push_str("UPPER(");
            self.push_resolved(&predicate.pattern);
            self.sb.push(')');
        }
        if let Some(escape) = predicate.escape {
            self.sb.push_str(" ESCAPE '");
            self.sb.push(escape);
            self.sb.push('\'');
        }
        Ok(())
    }

    fn visit_between(&mut self, predicate: &BetweenPredicate) -> Result<(), CriteriaError> {
        self.push_resolved(&predicate.left);
        self.sb.push_str(if predicate.negated { " NOT BETWEEN " } else { " BETWEEN " });
        self.push_resolved(&predicate.start);
        self.sb.push_str(" AND ");
        self.push_resolved(&predicate.end);
        Ok(())
    }

    fn visit_in(&mut self, predicate: &InPredicate) -> Result<(), CriteriaError> {
        self.push_resolved(&predicate.left);
        self.sb.push_str(if predicate.negated { " NOT IN (" } else { " IN (" });
        for (i, value) in predicate.values.iter().enumerate() {
            if i > 0 {
                self.sb.push_str(", ");
            }
            self.push_resolved(value);
        }
        self.sb.push(')');
        Ok(())
    }

    fn visit_is_null(&mut self, predicate: &IsNullPredicate) -> Result<(), CriteriaError> {
        self.push_resolved(&predicate.expression);
        self.sb.push_str(if predicate.negated { " IS NOT NULL" } else { " IS NULL" });
        Ok(())
    }

    fn visit_is_empty(&mut self, predicate: &IsEmptyPredicate) -> Result<(), CriteriaError> {
        self.push_resolved(&predicate.expression);
        self.sb.push_str(if predicate.negated { " IS NOT EMPTY" } else { " IS EMPTY" });
        Ok(())
    }

    fn visit_exists(&mut self, predicate: &ExistsPredicate) -> Result<(), CriteriaError> {
        let subquery = predicate.builder().ok_or(CriteriaError::MissingSubquery)?;
        let rendered = subquery.render_subquery()?;
        self.sb.push_str(if predicate.is_negated() { "NOT EXISTS " } else { "EXISTS " });
        self.sb.push_str(&rendered);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::IdentityResolver;
    use crate::predicate::{restrict, ExistsPredicate};

    #[test]
    fn test_nested_junctions_are_parenthesized() {
        let predicate = Predicate::and(vec![
            Predicate::or(vec![restrict("c.age").lt("2"), restrict("c.age").gt("10")]),
            restrict("c.name").is_not_null(),
        ]);
        assert_eq!(
            render_predicate(&predicate, &IdentityResolver).unwrap(),
            "(c.age < 2 OR c.age > 10) AND c.name IS NOT NULL"
        );
    }

    #[test]
    fn test_not_and_between() {
        let predicate = Predicate::not(restrict("c.age").between("1", ":max"));
        assert_eq!(
            render_predicate(&predicate, &IdentityResolver).unwrap(),
            "NOT (c.age BETWEEN 1 AND :max)"
        );
    }

    #[test]
    fn test_in_list_and_case_insensitive_like() {
        let in_list = restrict("c.id").in_list(vec!["1".into(), "2".into(), "3".into()]);
        assert_eq!(render_predicate(&in_list, &IdentityResolver).unwrap(), "c.id IN (1, 2, 3)");

        let like = restrict("c.name").like_ignore_case("%TOM%");
        assert_eq!(
            render_predicate(&like, &IdentityResolver).unwrap(),
            "UPPER(c.name) LIKE UPPER('%TOM%')"
        );
    }

    #[test]
    fn test_exists_without_subquery_fails() {
        let predicate = Predicate::Exists(ExistsPredicate::new());
        let err = render_predicate(&predicate, &IdentityResolver).unwrap_err();
        assert!(matches!(err, CriteriaError::MissingSubquery));
    }

    #[test]
    fn test_top_level_conjunction() {
        let predicates = vec![
            restrict("c.name").eq(":name"),
            Predicate::or(vec![restrict("c.age").eq("1"), restrict("c.age").eq("2")]),
        ];
        assert_eq!(
            render_conjunction(&predicates, &IdentityResolver).unwrap(),
            "c.name = :name AND (c.age = 1 OR c.age = 2)"
        );
    }
}
