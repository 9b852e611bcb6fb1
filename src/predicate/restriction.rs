//! Fluent construction of leaf predicates.
//!
//! `restrict("c.age").gt(":minAge")` reads left to right the way the rendered
//! condition does. Right-hand sides are expressions (paths, parameters, literals);
//! LIKE patterns are plain strings and are quoted as string literals.

use super::{
    BetweenPredicate, ComparisonOperator, ComparisonPredicate, InPredicate, IsEmptyPredicate,
    IsNullPredicate, LikePredicate, Predicate,
};
use crate::error::CriteriaError;
use crate::expression::Expression;
use sea_query::Value;

/// Start a restriction on `expression`
pub fn restrict(expression: impl Into<Expression>) -> RestrictionBuilder {
    RestrictionBuilder::new(expression)
}

/// Builder for a predicate whose left-hand side is fixed
#[derive(Debug, Clone)]
pub struct RestrictionBuilder {
    left: Expression,
}

impl RestrictionBuilder {
    pub fn new(expression: impl Into<Expression>) -> Self {
        Self {
            left: expression.into(),
        }
    }

    pub fn left(&self) -> &Expression {
        &self.left
    }

    fn compare(self, operator: ComparisonOperator, right: impl Into<Expression>) -> Predicate {
        Predicate::Comparison(ComparisonPredicate {
            left: self.left,
            operator,
            right: right.into(),
        })
    }

    pub fn eq(self, right: impl Into<Expression>) -> Predicate {
        self.compare(ComparisonOperator::Equal, right)
    }

    pub fn ne(self, right: impl Into<Expression>) -> Predicate {
        self.compare(ComparisonOperator::NotEqual, right)
    }

    pub fn gt(self, right: impl Into<Expression>) -> Predicate {
        self.compare(ComparisonOperator::Greater, right)
    }

    pub fn ge(self, right: impl Into<Expression>) -> Predicate {
        self.compare(ComparisonOperator::GreaterOrEqual, right)
    }

    pub fn lt(self, right: impl Into<Expression>) -> Predicate {
        self.compare(ComparisonOperator::Less, right)
    }

    pub fn le(self, right: impl Into<Expression>) -> Predicate {
        self.compare(ComparisonOperator::LessOrEqual, right)
    }

    /// Compare against a literal value
    ///
    /// # Errors
    ///
    /// Returns `Mapping` for value types that have no literal form.
    pub fn eq_value(self, value: &Value) -> Result<Predicate, CriteriaError> {
        let literal = render_value_literal(value)?;
        Ok(self.eq(literal))
    }

    fn like_with(self, pattern: &str, case_sensitive: bool, negated: bool) -> Predicate {
        Predicate::Like(LikePredicate {
            left: self.left,
            pattern: Expression::string_literal(pattern),
            case_sensitive,
            escape: None,
            negated,
        })
    }

    /// Case-sensitive `LIKE` with the given pattern
    pub fn like(self, pattern: &str) -> Predicate {
        self.like_with(pattern, true, false)
    }

    /// `UPPER(left) LIKE UPPER(pattern)`
    pub fn like_ignore_case(self, pattern: &str) -> Predicate {
        self.like_with(pattern, false, false)
    }

    pub fn not_like(self, pattern: &str) -> Predicate {
        self.like_with(pattern, true, true)
    }

    /// `LIKE` with an explicit escape character
    pub fn like_escaped(self, pattern: &str, escape: char) -> Predicate {
        Predicate::Like(LikePredicate {
            left: self.left,
            pattern: Expression::string_literal(pattern),
            case_sensitive: true,
            escape: Some(escape),
            negated: false,
        })
    }

    pub fn between(self, start: impl Into<Expression>, end: impl Into<Expression>) -> Predicate {
        Predicate::Between(BetweenPredicate {
            left: self.left,
            start: start.into(),
            end: end.into(),
            negated: false,
        })
    }

    pub fn not_between(self, start: impl Into<Expression>, end: impl Into<Expression>) -> Predicate {
        Predicate::Between(BetweenPredicate {
            left: self.left,
            start: start.into(),
            end: end.into(),
            negated: true,
        })
    }

    pub fn in_list(self, values: Vec<Expression>) -> Predicate {
        Predicate::In(InPredicate {
            left: self.left,
            values,
            negated: false,
        })
    }

    pub fn not_in(self, values: Vec<Expression>) -> Predicate {
        Predicate::In(InPredicate {
            left: self.left,
            values,
            negated: true,
        })
    }

    /// `left IN (:name)`, bound to a list parameter at execution time
    pub fn in_parameter(self, name: &str) -> Predicate {
        self.in_list(vec![Expression::parameter(name)])
    }

    pub fn is_null(self) -> Predicate {
        Predicate::IsNull(IsNullPredicate {
            expression: self.left,
            negated: false,
        })
    }

    pub fn is_not_null(self) -> Predicate {
        Predicate::IsNull(IsNullPredicate {
            expression: self.left,
            negated: true,
        })
    }

    pub fn is_empty(self) -> Predicate {
        Predicate::IsEmpty(IsEmptyPredicate {
            expression: self.left,
            negated: false,
        })
    }

    pub fn is_not_empty(self) -> Predicate {
        Predicate::IsEmpty(IsEmptyPredicate {
            expression: self.left,
            negated: true,
        })
    }
}

/// Render a scalar value as a query-language literal
///
/// # Errors
///
/// Returns `Mapping` for value kinds without a literal representation.
pub fn render_value_literal(value: &Value) -> Result<Expression, CriteriaError> {
    let literal = match value {
        Value::Bool(Some(b)) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::TinyInt(Some(v)) => v.to_string(),
        Value::SmallInt(Some(v)) => v.to_string(),
        Value::Int(Some(v)) => v.to_string(),
        Value::BigInt(Some(v)) => v.to_string(),
        Value::TinyUnsigned(Some(v)) => v.to_string(),
        Value::SmallUnsigned(Some(v)) => v.to_string(),
        Value::Unsigned(Some(v)) => v.to_string(),
        Value::BigUnsigned(Some(v)) => v.to_string(),
        Value::Float(Some(v)) => v.to_string(),
        Value::Double(Some(v)) => v.to_string(),
        Value::String(Some(s)) => return Ok(Expression::string_literal(s)),
        Value::Char(Some(c)) => return Ok(Expression::string_literal(&c.to_string())),
        Value::Bool(None)
        | Value::TinyInt(None)
        | Value::SmallInt(None)
        | Value::Int(None)
        | Value::BigInt(None)
        | Value::TinyUnsigned(None)
        | Value::SmallUnsigned(None)
        | Value::Unsigned(None)
        | Value::BigUnsigned(None)
        | Value::Float(None)
        | Value::Double(None)
        | Value::String(None)
        | Value::Char(None) => "NULL".to_string(),
        other => {
            return Err(CriteriaError::Mapping(format!(
                "Value {other:?} has no literal representation"
            )))
        }
    };
    Ok(Expression::new(literal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::IdentityResolver;
    use crate::predicate::render::render_predicate;

    fn render(p: &Predicate) -> String {
        render_predicate(p, &IdentityResolver).unwrap()
    }

    #[test]
    fn test_like_pattern_is_quoted() {
        assert_eq!(render(&restrict("c.name").like("%son")), "c.name LIKE '%son'");
        assert_eq!(render(&restrict("c.name").like("O'%")), "c.name LIKE 'O''%'");
        assert_eq!(render(&restrict("c.name").not_like("A%")), "c.name NOT LIKE 'A%'");
        assert_eq!(
            render(&restrict("c.name").like_escaped("10!%%", '!')),
            "c.name LIKE '10!%%' ESCAPE '!'"
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(render(&restrict("c.age").ge(":min")), "c.age >= :min");
        assert_eq!(render(&restrict("c.age").ne("c.owner.age")), "c.age <> c.owner.age");
    }

    #[test]
    fn test_in_parameter_and_null_tests() {
        assert_eq!(render(&restrict("c.id").in_parameter("ids")), "c.id IN (:ids)");
        assert_eq!(render(&restrict("c.kittens").is_empty()), "c.kittens IS EMPTY");
        assert_eq!(render(&restrict("c.owner").is_null()), "c.owner IS NULL");
    }

    #[test]
    fn test_value_literals() {
        let p = restrict("c.name").eq_value(&Value::from("Tom")).unwrap();
        assert_eq!(render(&p), "c.name = 'Tom'");
        let p = restrict("c.age").eq_value(&Value::from(4i32)).unwrap();
        assert_eq!(render(&p), "c.age = 4");
        let p = restrict("c.alive").eq_value(&Value::from(true)).unwrap();
        assert_eq!(render(&p), "c.alive = TRUE");
    }
}
