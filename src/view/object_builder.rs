//! Projection of result tuples into view objects.

use crate::error::CriteriaError;
use crate::expression::Expression;
use crate::provider::Tuple;
use crate::query::object_builder::ObjectBuilder;
use crate::query::select::SelectManager;
use sea_query::{Value, ValueType};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};
use std::marker::PhantomData;

/// Value of one view field
#[derive(Debug, Clone, PartialEq)]
pub enum ViewValue {
    /// Basic value, possibly a typed NULL
    Value(Value),
    /// Nested view; `Null` when the association is absent
    Object(ViewObject),
    Null,
    /// Collection of basic values
    List(Vec<Value>),
}

/// Dynamically typed view instance
///
/// Fields keep their declaration order. Typed access goes through
/// [`ViewObject::get_as`] or serde via [`ViewObject::deserialize`].
#[derive(Debug, Clone, PartialEq)]
pub struct ViewObject {
    view: String,
    fields: Vec<(String, ViewValue)>,
}

impl ViewObject {
    pub fn view(&self) -> &str {
        &self.view
    }

    pub fn fields(&self) -> &[(String, ViewValue)] {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&ViewValue> {
        self.fields.iter().find(|(name, _)| name == field).map(|(_, v)| v)
    }

    /// Typed basic value of `field`
    ///
    /// # Errors
    ///
    /// Returns `Mapping` when the field is missing, not a basic value or not
    /// convertible into `T`.
    pub fn get_as<T: ValueType>(&self, field: &str) -> Result<T, CriteriaError> {
        match self.get(field) {
            Some(ViewValue::Value(value)) => <T as ValueType>::try_from(value.clone()).map_err(|e| {
                CriteriaError::Mapping(format!("Cannot convert {}.{}: {}", self.view, field, e))
            }),
            _ => Err(CriteriaError::Mapping(format!(
                "{}.{} is not a basic value",
                self.view, field
            ))),
        }
    }

    pub fn object(&self, field: &str) -> Option<&ViewObject> {
        match self.get(field) {
            Some(ViewValue::Object(object)) => Some(object),
            _ => None,
        }
    }

    pub fn list(&self, field: &str) -> Option<&[Value]> {
        match self.get(field) {
            Some(ViewValue::List(values)) => Some(values),
            _ => None,
        }
    }

    /// JSON object keyed by field name
    pub fn to_json(&self) -> Result<JsonValue, CriteriaError> {
        let mut map = Map::with_capacity(self.fields.len());
        for (name, value) in &self.fields {
            let json = match value {
                ViewValue::Value(v) => value_to_json(v)?,
                ViewValue::Object(o) => o.to_json()?,
                ViewValue::Null => JsonValue::Null,
                ViewValue::List(values) => {
                    JsonValue::Array(values.iter().map(value_to_json).collect::<Result<Vec<_>, _>>()?)
                }
            };
            map.insert(name.clone(), json);
        }
        Ok(JsonValue::Object(map))
    }

    /// Convert into any deserializable type whose fields match the view
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, CriteriaError> {
        serde_json::from_value(self.to_json()?)
            .map_err(|e| CriteriaError::Mapping(format!("Cannot deserialize view {}: {}", self.view, e)))
    }

    /// Append collection values of `other` that this object does not hold yet
    fn merge_collections(&mut self, other: ViewObject) {
        for (name, value) in other.fields {
            let ViewValue::List(values) = value else {
                continue;
            };
            if let Some((_, ViewValue::List(existing))) = self.fields.iter_mut().find(|(n, _)| *n == name) {
                for value in values {
                    if !existing.contains(&value) {
                        existing.push(value);
                    }
                }
            }
        }
    }
}

impl Serialize for ViewObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

fn is_null(value: &Value) -> bool {
    matches!(
        value,
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
            | Value::Char(None)
            | Value::Bytes(None)
            | Value::Json(None)
    )
}

fn value_to_json(value: &Value) -> Result<JsonValue, CriteriaError> {
    if is_null(value) {
        return Ok(JsonValue::Null);
    }
    Ok(match value {
        Value::Bool(Some(b)) => JsonValue::Bool(*b),
        Value::TinyInt(Some(v)) => JsonValue::from(*v),
        Value::SmallInt(Some(v)) => JsonValue::from(*v),
        Value::Int(Some(v)) => JsonValue::from(*v),
        Value::BigInt(Some(v)) => JsonValue::from(*v),
        Value::TinyUnsigned(Some(v)) => JsonValue::from(*v),
        Value::SmallUnsigned(Some(v)) => JsonValue::from(*v),
        Value::Unsigned(Some(v)) => JsonValue::from(*v),
        Value::BigUnsigned(Some(v)) => JsonValue::from(*v),
        Value::Float(Some(v)) => JsonValue::from(*v),
        Value::Double(Some(v)) => JsonValue::from(*v),
        Value::String(Some(s)) => JsonValue::String(s.to_string()),
        Value::Char(Some(c)) => JsonValue::String(c.to_string()),
        Value::Bytes(Some(b)) => JsonValue::Array(b.iter().map(|byte| JsonValue::from(*byte)).collect()),
        Value::Json(Some(j)) => (**j).clone(),
        other => {
            return Err(CriteriaError::Mapping(format!(
                "Value {other:?} cannot be represented in a view"
            )))
        }
    })
}

/// Position of each view field in the result tuple
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldLayout {
    Value(usize),
    Nested(ObjectLayout),
    Collection(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ObjectLayout {
    pub view: String,
    pub fields: Vec<(String, FieldLayout)>,
    /// Field name and tuple position of the id mapping
    pub id: Option<(String, usize)>,
}

impl ObjectLayout {
    fn build(&self, values: &[Value]) -> Result<ViewObject, CriteriaError> {
        let mut fields = Vec::with_capacity(self.fields.len());
        for (name, layout) in &self.fields {
            let value = match layout {
                FieldLayout::Value(index) => ViewValue::Value(value_at(values, *index)?.clone()),
                FieldLayout::Nested(nested) => match nested.id {
                    Some((_, index)) if is_null(value_at(values, index)?) => ViewValue::Null,
                    _ => ViewValue::Object(nested.build(values)?),
                },
                FieldLayout::Collection(index) => {
                    let value = value_at(values, *index)?;
                    if is_null(value) {
                        ViewValue::List(Vec::new())
                    } else {
                        ViewValue::List(vec![value.clone()])
                    }
                }
            };
            fields.push((name.clone(), value));
        }
        Ok(ViewObject {
            view: self.view.clone(),
            fields,
        })
    }
}

fn value_at(values: &[Value], index: usize) -> Result<&Value, CriteriaError> {
    values.get(index).ok_or_else(|| {
        CriteriaError::Mapping(format!(
            "View projection expects column {index}, row has {}",
            values.len()
        ))
    })
}

/// Object builder producing [`ViewObject`]s
///
/// With collection mappings one view spans several rows; rows are merged by
/// the view id, keeping the order in which ids first appear.
#[derive(Debug, Clone)]
pub struct ViewObjectBuilder {
    selects: Vec<String>,
    layout: ObjectLayout,
    merge: bool,
}

impl ViewObjectBuilder {
    pub(crate) fn new(selects: Vec<String>, layout: ObjectLayout, merge: bool) -> Self {
        Self { selects, layout, merge }
    }

    fn merge_rows(&self, list: Vec<ViewObject>) -> Vec<ViewObject> {
        let Some((id_field, _)) = &self.layout.id else {
            return list;
        };
        let mut merged: Vec<ViewObject> = Vec::with_capacity(list.len());
        for object in list {
            let id = object.get(id_field).cloned();
            match merged.iter_mut().find(|m| m.get(id_field) == id.as_ref()) {
                Some(existing) => existing.merge_collections(object),
                None => merged.push(object),
            }
        }
        merged
    }
}

impl ObjectBuilder<ViewObject> for ViewObjectBuilder {
    fn apply_selects(&self, selects: &mut SelectManager) -> Result<(), CriteriaError> {
        for expression in &self.selects {
            selects.select(Expression::new(expression.as_str()), None)?;
        }
        Ok(())
    }

    fn build(&self, tuple: Tuple) -> Result<ViewObject, CriteriaError> {
        self.layout.build(tuple.values())
    }

    fn build_list(&self, list: Vec<ViewObject>) -> Result<Vec<ViewObject>, CriteriaError> {
        if self.merge {
            Ok(self.merge_rows(list))
        } else {
            Ok(list)
        }
    }
}

/// Object builder deserializing merged view objects into `T`
pub struct TypedViewObjectBuilder<T> {
    inner: ViewObjectBuilder,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedViewObjectBuilder<T> {
    pub fn new(inner: ViewObjectBuilder) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> ObjectBuilder<T> for TypedViewObjectBuilder<T> {
    fn apply_selects(&self, selects: &mut SelectManager) -> Result<(), CriteriaError> {
        self.inner.apply_selects(selects)
    }

    fn build(&self, tuple: Tuple) -> Result<T, CriteriaError> {
        self.inner.build(tuple)?.deserialize()
    }

    fn build_rows(&self, rows: Vec<Tuple>) -> Result<Vec<T>, CriteriaError> {
        self.inner
            .build_rows(rows)?
            .iter()
            .map(ViewObject::deserialize)
            .collect()
    }
}
