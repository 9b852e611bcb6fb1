//! Conversion of result tuples into caller types.

use crate::error::CriteriaError;
use crate::expression::Expression;
use crate::provider::Tuple;
use crate::query::select::SelectManager;

/// Turns result tuples into instances of `T`
///
/// An object builder may contribute its own select items when it is installed on
/// a builder (see [`CriteriaBuilder::select_new`](crate::query::CriteriaBuilder::select_new)).
pub trait ObjectBuilder<T>: Send + Sync {
    /// Register the select items the builder expects, in tuple order
    fn apply_selects(&self, _selects: &mut SelectManager) -> Result<(), CriteriaError> {
        Ok(())
    }

    /// Build one result from one tuple
    fn build(&self, tuple: Tuple) -> Result<T, CriteriaError>;

    /// Post-process the complete result list
    fn build_list(&self, list: Vec<T>) -> Result<Vec<T>, CriteriaError> {
        Ok(list)
    }

    /// Build every row of a result list
    fn build_rows(&self, rows: Vec<Tuple>) -> Result<Vec<T>, CriteriaError> {
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            results.push(self.build(row)?);
        }
        self.build_list(results)
    }
}

/// Returns tuples unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct TupleObjectBuilder;

impl ObjectBuilder<Tuple> for TupleObjectBuilder {
    fn build(&self, tuple: Tuple) -> Result<Tuple, CriteriaError> {
        Ok(tuple)
    }
}

/// Object builder backed by a select list and a closure
///
/// ```
/// use lifeguard_criteria::query::object_builder::MappingObjectBuilder;
/// use lifeguard_criteria::{CriteriaError, Tuple};
///
/// struct CatName(String);
///
/// let builder = MappingObjectBuilder::new(vec![("c.name", None)], |tuple: Tuple| -> Result<CatName, CriteriaError> {
///     Ok(CatName(tuple.get::<String>(0)?))
/// });
/// # let _ = builder;
/// ```
pub struct MappingObjectBuilder<F> {
    selects: Vec<(Expression, Option<String>)>,
    mapper: F,
}

impl<F> MappingObjectBuilder<F> {
    pub fn new(selects: Vec<(&str, Option<&str>)>, mapper: F) -> Self {
        Self {
            selects: selects
                .into_iter()
                .map(|(e, a)| (Expression::new(e), a.map(str::to_string)))
                .collect(),
            mapper,
        }
    }
}

impl<T, F> ObjectBuilder<T> for MappingObjectBuilder<F>
where
    F: Fn(Tuple) -> Result<T, CriteriaError> + Send + Sync,
{
    fn apply_selects(&self, selects: &mut SelectManager) -> Result<(), CriteriaError> {
        for (expression, alias) in &self.selects {
            selects.select(expression.clone(), alias.as_deref())?;
        }
        Ok(())
    }

    fn build(&self, tuple: Tuple) -> Result<T, CriteriaError> {
        (self.mapper)(tuple)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::IdentityResolver;
    use sea_query::Value;

    #[test]
    fn test_mapping_builder_applies_selects() {
        let builder = MappingObjectBuilder::new(vec![("c.id", None), ("c.name", Some("n"))], |t: Tuple| -> Result<(i64, String), CriteriaError> {
            Ok((t.get::<i64>(0)?, t.get::<String>(1)?))
        });
        let mut selects = SelectManager::new();
        builder.apply_selects(&mut selects).unwrap();
        assert_eq!(selects.build_select(&IdentityResolver), "SELECT c.id, c.name AS n");

        let row = builder
            .build(Tuple::new(vec![Value::from(3i64), Value::from("Tom")]))
            .unwrap();
        assert_eq!(row, (3, "Tom".to_string()));
    }
}
