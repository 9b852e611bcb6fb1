//! SELECT clause manager.

use crate::error::CriteriaError;
use crate::expression::{Expression, PathResolver};

/// One select item with its optional result alias
#[derive(Debug, Clone, PartialEq)]
pub struct SelectInfo {
    pub expression: Expression,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectManager {
    distinct: bool,
    items: Vec<SelectInfo>,
}

impl SelectManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a select item
    ///
    /// # Errors
    ///
    /// Returns `DuplicateAlias` when another item already uses `alias`.
    pub fn select(&mut self, expression: Expression, alias: Option<&str>) -> Result<(), CriteriaError> {
        if let Some(alias) = alias {
            if self.alias_expression(alias).is_some() {
                return Err(CriteriaError::DuplicateAlias(alias.to_string()));
            }
        }
        self.items.push(SelectInfo {
            expression,
            alias: alias.map(str::to_string),
        });
        Ok(())
    }

    pub fn set_distinct(&mut self, distinct: bool) {
        self.distinct = distinct;
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn items(&self) -> &[SelectInfo] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn expressions(&self) -> Vec<Expression> {
        self.items.iter().map(|i| i.expression.clone()).collect()
    }

    /// Expression selected under `alias`
    pub fn alias_expression(&self, alias: &str) -> Option<&Expression> {
        self.items
            .iter()
            .find(|i| i.alias.as_deref() == Some(alias))
            .map(|i| &i.expression)
    }

    /// Render `SELECT [DISTINCT] a, b AS x`, or an empty string without items
    pub fn build_select(&self, resolver: &dyn PathResolver) -> String {
        self.render(resolver, true, self.distinct)
    }

    /// Render the select clause as `SELECT DISTINCT` regardless of the flag
    pub fn build_select_distinct(&self, resolver: &dyn PathResolver) -> String {
        self.render(resolver, true, true)
    }

    /// Render the select list without result aliases (CTE bodies)
    pub fn build_select_expressions(&self, resolver: &dyn PathResolver) -> String {
        self.render(resolver, false, self.distinct)
    }

    fn render(&self, resolver: &dyn PathResolver, with_aliases: bool, distinct: bool) -> String {
        if self.items.is_empty() {
            return String::new();
        }
        let mut sb = String::from(if distinct { "SELECT DISTINCT " } else { "SELECT " });
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                sb.push_str(", ");
            }
            sb.push_str(&resolver.resolve(&item.expression));
            if with_aliases {
                if let Some(alias) = &item.alias {
                    sb.push_str(" AS ");
                    sb.push_str(alias);
                }
            }
        }
        sb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::IdentityResolver;

    #[test]
    fn test_select_with_aliases() {
        let mut sm = SelectManager::new();
        assert_eq!(sm.build_select(&IdentityResolver), "");
        sm.select(Expression::new("c.name"), Some("catName")).unwrap();
        sm.select(Expression::new("c.age"), None).unwrap();
        sm.set_distinct(true);
        assert_eq!(sm.build_select(&IdentityResolver), "SELECT DISTINCT c.name AS catName, c.age");
        assert_eq!(sm.build_select_expressions(&IdentityResolver), "SELECT DISTINCT c.name, c.age");
        assert_eq!(sm.alias_expression("catName").map(Expression::as_str), Some("c.name"));
    }

    #[test]
    fn test_duplicate_alias() {
        let mut sm = SelectManager::new();
        sm.select(Expression::new("c.name"), Some("n")).unwrap();
        let err = sm.select(Expression::new("c.age"), Some("n")).unwrap_err();
        assert!(matches!(err, CriteriaError::DuplicateAlias(ref a) if a == "n"));
    }
}
