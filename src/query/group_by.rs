use crate::expression::{Expression, PathResolver};

/// GROUP BY clause manager
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupByManager {
    expressions: Vec<Expression>,
}

impl GroupByManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a grouping expression; repeated expressions are ignored
    pub fn group_by(&mut self, expression: Expression) {
        if !self.expressions.contains(&expression) {
            self.expressions.push(expression);
        }
    }

    pub fn expressions(&self) -> &[Expression] {
        &self.expressions
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    pub fn build_group_by(&self, resolver: &dyn PathResolver) -> String {
        if self.expressions.is_empty() {
            return String::new();
        }
        let items: Vec<String> = self.expressions.iter().map(|e| resolver.resolve(e)).collect();
        format!("GROUP BY {}", items.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::IdentityResolver;

    #[test]
    fn test_group_by_deduplicates() {
        let mut gm = GroupByManager::new();
        assert_eq!(gm.build_group_by(&IdentityResolver), "");
        gm.group_by(Expression::new("c.name"));
        gm.group_by(Expression::new("c.age"));
        gm.group_by(Expression::new(" c.name "));
        assert_eq!(gm.build_group_by(&IdentityResolver), "GROUP BY c.name, c.age");
    }
}
