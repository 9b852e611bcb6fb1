//! Persistence provider abstraction.
//!
//! The criteria builder never talks to a database directly. It renders query strings
//! and hands them to a [`QueryProvider`], which is responsible for translating,
//! binding and executing them. This mirrors how Lifeguard's `LifeExecutor` abstracts
//! over `may_postgres` so the same builder works with a pooled connection, a
//! transaction or a mock.

use crate::error::CriteriaError;
use crate::parameter::ParameterValue;
use sea_query::{Value, ValueType};

/// Error type produced by providers, passed through to callers unmodified.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// Language of a [`TypedQuery`] string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryLanguage {
    /// Entity query language produced by the criteria builder (`FROM Cat c ...`)
    Criteria,
    /// Native SQL, already translated by the provider and extended by a dialect
    Native,
}

/// A query ready for execution: query text, named parameter bindings and the
/// result window.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedQuery {
    pub language: QueryLanguage,
    pub query_string: String,
    pub parameters: Vec<(String, ParameterValue)>,
    pub first_result: Option<u64>,
    pub max_results: Option<u64>,
}

impl TypedQuery {
    /// Create a criteria-language query without parameters or window
    pub fn new(query_string: impl Into<String>) -> Self {
        Self {
            language: QueryLanguage::Criteria,
            query_string: query_string.into(),
            parameters: Vec::new(),
            first_result: None,
            max_results: None,
        }
    }

    /// Create a native SQL query without parameters or window
    pub fn native(sql: impl Into<String>) -> Self {
        Self {
            language: QueryLanguage::Native,
            ..Self::new(sql)
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<(String, ParameterValue)>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Equivalent of JPA's `setFirstResult`
    pub fn set_first_result(mut self, first_result: u64) -> Self {
        self.first_result = Some(first_result);
        self
    }

    /// Equivalent of JPA's `setMaxResults`
    pub fn set_max_results(mut self, max_results: u64) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Look up a bound parameter by name
    pub fn parameter(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// One result row returned by a provider
///
/// Values are positional; column labels are optional and only used for lookups
/// by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tuple {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            columns: Vec::new(),
            values,
        }
    }

    pub fn with_columns(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Raw value at `index`
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Raw value labelled `column`
    pub fn value_by_name(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
    }

    /// Typed value at `index`
    ///
    /// # Errors
    ///
    /// Returns `CriteriaError::Mapping` if the index is out of range or the value
    /// cannot be converted into `T`.
    pub fn get<T: ValueType>(&self, index: usize) -> Result<T, CriteriaError> {
        let value = self.value(index).ok_or_else(|| {
            CriteriaError::Mapping(format!(
                "Tuple index {index} out of range (len {})",
                self.values.len()
            ))
        })?;
        <T as ValueType>::try_from(value.clone()).map_err(|e| {
            CriteriaError::Mapping(format!("Cannot convert tuple value at {index}: {e}"))
        })
    }
}

/// Upstream persistence capability consumed by the builders
///
/// Implementations execute criteria-language or native queries, bind named
/// parameters (including list parameters) and apply the result window.
pub trait QueryProvider {
    /// Execute the query and return every row
    ///
    /// # Errors
    ///
    /// Returns the provider's own error, which is propagated unmodified.
    fn get_result_list(&self, query: &TypedQuery) -> Result<Vec<Tuple>, ProviderError>;

    /// Translate a criteria-language query string into native SQL
    ///
    /// The returned SQL must not contain LIMIT/OFFSET; dialects inline those
    /// where a provider cannot window the query itself (CTE bodies).
    fn native_sql(&self, query_string: &str) -> Result<String, ProviderError>;

    /// Execute the query and return exactly one row
    fn get_single_result(&self, query: &TypedQuery) -> Result<Tuple, ProviderError> {
        let mut rows = self.get_result_list(query)?;
        match rows.len() {
            1 => Ok(rows.remove(0)),
            0 => Err("Expected one row, got none".into()),
            n => Err(format!("Expected one row, got {n}").into()),
        }
    }
}

/// Interpret a scalar result value (COUNT, ids) as an unsigned integer
pub(crate) fn value_as_u64(value: &Value) -> Result<u64, CriteriaError> {
    let converted = match value {
        Value::TinyInt(Some(v)) => <u64 as TryFrom<_>>::try_from(*v).ok(),
        Value::SmallInt(Some(v)) => <u64 as TryFrom<_>>::try_from(*v).ok(),
        Value::Int(Some(v)) => <u64 as TryFrom<_>>::try_from(*v).ok(),
        Value::BigInt(Some(v)) => <u64 as TryFrom<_>>::try_from(*v).ok(),
        Value::TinyUnsigned(Some(v)) => Some(u64::from(*v)),
        Value::SmallUnsigned(Some(v)) => Some(u64::from(*v)),
        Value::Unsigned(Some(v)) => Some(u64::from(*v)),
        Value::BigUnsigned(Some(v)) => Some(*v),
        _ => None,
    };
    converted.ok_or_else(|| CriteriaError::Mapping(format!("Expected a non-negative count, got {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_typed_access() {
        let tuple = Tuple::with_columns(
            vec!["id".to_string(), "name".to_string()],
            vec![Value::from(7i64), Value::from("Tom")],
        );
        assert_eq!(tuple.get::<i64>(0).unwrap(), 7);
        assert_eq!(tuple.get::<String>(1).unwrap(), "Tom");
        assert_eq!(tuple.value_by_name("name"), Some(&Value::from("Tom")));
        assert!(tuple.value_by_name("age").is_none());
    }

    #[test]
    fn test_tuple_out_of_range() {
        let tuple = Tuple::new(vec![Value::from(1i32)]);
        let err = tuple.get::<i32>(3).unwrap_err();
        assert!(matches!(err, CriteriaError::Mapping(_)));
    }

    #[test]
    fn test_value_as_u64() {
        assert_eq!(value_as_u64(&Value::BigInt(Some(5))).unwrap(), 5);
        assert_eq!(value_as_u64(&Value::Int(Some(0))).unwrap(), 0);
        assert_eq!(value_as_u64(&Value::TinyInt(Some(3))).unwrap(), 3);
        assert_eq!(value_as_u64(&Value::SmallInt(Some(4))).unwrap(), 4);
        assert!(value_as_u64(&Value::BigInt(Some(-1))).is_err());
        assert!(value_as_u64(&Value::BigInt(None)).is_err());
        assert!(value_as_u64(&Value::from("5")).is_err());
    }

    #[test]
    fn test_typed_query_window() {
        let query = TypedQuery::new("SELECT COUNT(*) FROM Cat cat")
            .set_first_result(10)
            .set_max_results(5);
        assert_eq!(query.language, QueryLanguage::Criteria);
        assert_eq!(query.first_result, Some(10));
        assert_eq!(query.max_results, Some(5));
        assert!(query.parameter("ids").is_none());
    }
}
