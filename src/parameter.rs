//! Named parameter registry.

use crate::error::CriteriaError;
use sea_query::Value;
use std::collections::{BTreeSet, HashMap};

/// Value bound to a named parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Single(Value),
    List(Vec<Value>),
}

impl ParameterValue {
    /// Number of bound elements (1 for a single value)
    pub fn len(&self) -> usize {
        match self {
            ParameterValue::Single(_) => 1,
            ParameterValue::List(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            ParameterValue::List(values) => Some(values),
            ParameterValue::Single(_) => None,
        }
    }
}

impl From<Value> for ParameterValue {
    fn from(value: Value) -> Self {
        ParameterValue::Single(value)
    }
}

impl From<Vec<Value>> for ParameterValue {
    fn from(values: Vec<Value>) -> Self {
        ParameterValue::List(values)
    }
}

/// Mapping from parameter name to bound value
///
/// Names are unique; re-binding a name replaces the previous value. One name is
/// reserved for the pagination id list and can only be bound by the pagination
/// engine through [`ParameterManager::add_parameter_mapping`].
#[derive(Debug, Clone)]
pub struct ParameterManager {
    values: HashMap<String, ParameterValue>,
    reserved: String,
}

impl ParameterManager {
    pub fn new(reserved: impl Into<String>) -> Self {
        Self {
            values: HashMap::new(),
            reserved: reserved.into(),
        }
    }

    /// Name reserved for the id-window parameter list
    pub fn reserved_name(&self) -> &str {
        &self.reserved
    }

    /// Bind a caller-supplied parameter
    ///
    /// # Errors
    ///
    /// Returns `ReservedParameterName` when `name` is the reserved id parameter.
    pub fn set_parameter(&mut self, name: &str, value: ParameterValue) -> Result<(), CriteriaError> {
        if name == self.reserved {
            return Err(CriteriaError::ReservedParameterName(name.to_string()));
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Bind a parameter without the reserved-name check
    pub(crate) fn add_parameter_mapping(&mut self, name: &str, value: ParameterValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Fail on the first referenced parameter that has no bound value
    pub fn verify_satisfied<'a>(
        &self,
        referenced: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), CriteriaError> {
        for name in referenced {
            if !self.values.contains_key(name) {
                return Err(CriteriaError::UnsatisfiedParameter(name.to_string()));
            }
        }
        Ok(())
    }

    /// Bindings for the referenced names, sorted by name for stable output
    pub fn bindings_for<'a>(
        &self,
        referenced: impl IntoIterator<Item = &'a str>,
    ) -> Vec<(String, ParameterValue)> {
        let names: BTreeSet<&str> = referenced.into_iter().collect();
        names
            .into_iter()
            .filter_map(|name| {
                self.values
                    .get(name)
                    .map(|value| (name.to_string(), value.clone()))
            })
            .collect()
    }

    /// Copy every binding of `other` into this registry
    ///
    /// Binding the same name to two different values across scopes is rejected,
    /// and so is binding the reserved name of this registry.
    pub(crate) fn merge(&mut self, other: &ParameterManager) -> Result<(), CriteriaError> {
        for (name, value) in &other.values {
            if *name == self.reserved {
                return Err(CriteriaError::ReservedParameterName(name.clone()));
            }
            match self.values.get(name) {
                Some(existing) if existing != value => {
                    return Err(CriteriaError::DuplicateParameter(name.clone()));
                }
                Some(_) => {}
                None => {
                    self.values.insert(name.clone(), value.clone());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_name_is_rejected() {
        let mut params = ParameterManager::new("ids");
        let err = params
            .set_parameter("ids", ParameterValue::List(vec![]))
            .unwrap_err();
        assert!(matches!(err, CriteriaError::ReservedParameterName(ref n) if n == "ids"));

        params.add_parameter_mapping("ids", ParameterValue::List(vec![Value::from(1i64)]));
        assert_eq!(params.get("ids").map(ParameterValue::len), Some(1));
    }

    #[test]
    fn test_rebinding_replaces_value() {
        let mut params = ParameterManager::new("ids");
        params.set_parameter("name", Value::from("Tom").into()).unwrap();
        params.set_parameter("name", Value::from("Jerry").into()).unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("name"), Some(&ParameterValue::Single(Value::from("Jerry"))));
    }

    #[test]
    fn test_verify_satisfied() {
        let mut params = ParameterManager::new("ids");
        params.set_parameter("age", Value::from(3i32).into()).unwrap();
        assert!(params.verify_satisfied(["age"]).is_ok());
        let err = params.verify_satisfied(["age", "name"]).unwrap_err();
        assert!(matches!(err, CriteriaError::UnsatisfiedParameter(ref n) if n == "name"));
    }

    #[test]
    fn test_bindings_are_sorted_and_deduplicated() {
        let mut params = ParameterManager::new("ids");
        params.set_parameter("b", Value::from(2i32).into()).unwrap();
        params.set_parameter("a", Value::from(1i32).into()).unwrap();
        params.set_parameter("unused", Value::from(0i32).into()).unwrap();
        let bindings = params.bindings_for(["b", "a", "b"]);
        let names: Vec<&str> = bindings.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_merge_conflict() {
        let mut outer = ParameterManager::new("ids");
        outer.set_parameter("x", Value::from(1i32).into()).unwrap();
        let mut inner = ParameterManager::new("ids");
        inner.set_parameter("x", Value::from(2i32).into()).unwrap();
        assert!(matches!(outer.merge(&inner), Err(CriteriaError::DuplicateParameter(_))));

        let mut same = ParameterManager::new("ids");
        same.set_parameter("x", Value::from(1i32).into()).unwrap();
        same.set_parameter("y", Value::from(5i32).into()).unwrap();
        outer.merge(&same).unwrap();
        assert!(outer.contains("y"));
    }
}
