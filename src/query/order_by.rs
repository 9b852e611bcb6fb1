//! ORDER BY clause manager.

use crate::expression::{Expression, PathResolver};
use crate::query::select::SelectManager;

/// One ordering key
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expression: Expression,
    pub ascending: bool,
    pub nulls_first: bool,
}

impl OrderByItem {
    fn render(&self, expression: &str) -> String {
        format!(
            "{} {} {}",
            expression,
            if self.ascending { "ASC" } else { "DESC" },
            if self.nulls_first { "NULLS FIRST" } else { "NULLS LAST" }
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderByManager {
    items: Vec<OrderByItem>,
}

impl OrderByManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_by(&mut self, expression: Expression, ascending: bool, nulls_first: bool) {
        self.items.push(OrderByItem {
            expression,
            ascending,
            nulls_first,
        });
    }

    pub fn items(&self) -> &[OrderByItem] {
        &self.items
    }

    pub fn has_ordering(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn expressions(&self) -> Vec<Expression> {
        self.items.iter().map(|i| i.expression.clone()).collect()
    }

    /// Render the ORDER BY clause
    ///
    /// Queries that render the select list keep select aliases as ordering keys.
    /// Count and id queries have no select list, so `aliases` is passed and every
    /// key naming a select alias is replaced by the aliased expression.
    pub fn build_order_by(&self, resolver: &dyn PathResolver, aliases: Option<&SelectManager>) -> String {
        if self.items.is_empty() {
            return String::new();
        }
        let keys: Vec<String> = self
            .items
            .iter()
            .map(|item| {
                let substituted = aliases.and_then(|select| select.alias_expression(item.expression.as_str()));
                let rendered = resolver.resolve(substituted.unwrap_or(&item.expression));
                item.render(&rendered)
            })
            .collect();
        format!("ORDER BY {}", keys.join(", "))
    }
}
