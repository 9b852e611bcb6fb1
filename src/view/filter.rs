//! Attribute filters: predicate factories bound to a user value.
//!
//! A filter is created from the value the user supplied and applied later to
//! the expression of the filtered view attribute. An absent value is a
//! configuration error, never a silently skipped filter.
//!
//! ```
//! use lifeguard_criteria::view::filter::{AttributeFilter, EndsWithFilter};
//! use lifeguard_criteria::predicate::{render_predicate, restrict};
//! use lifeguard_criteria::expression::IdentityResolver;
//!
//! let filter = EndsWithFilter::new(Some("son"))?;
//! let predicate = filter.apply(restrict("owner_1.name"))?;
//! assert_eq!(render_predicate(&predicate, &IdentityResolver)?, "owner_1.name LIKE '%son'");
//!
//! assert!(EndsWithFilter::new(None).is_err());
//! # Ok::<(), lifeguard_criteria::CriteriaError>(())
//! ```

use crate::error::CriteriaError;
use crate::predicate::{render_value_literal, Predicate, RestrictionBuilder};
use sea_query::Value;
use std::fmt;

/// Builder-time predicate factory for one view attribute
pub trait AttributeFilter: fmt::Debug + Send + Sync {
    fn apply(&self, restriction: RestrictionBuilder) -> Result<Predicate, CriteriaError>;
}

fn required<T>(value: Option<T>, filter: &str) -> Result<T, CriteriaError> {
    value.ok_or_else(|| CriteriaError::NullFilterValue(filter.to_string()))
}

/// `attr = value`
#[derive(Debug, Clone, PartialEq)]
pub struct EqualFilter {
    value: Value,
}

impl EqualFilter {
    pub fn new(value: Option<Value>) -> Result<Self, CriteriaError> {
        Ok(Self {
            value: required(value, "EqualFilter")?,
        })
    }
}

impl AttributeFilter for EqualFilter {
    fn apply(&self, restriction: RestrictionBuilder) -> Result<Predicate, CriteriaError> {
        restriction.eq_value(&self.value)
    }
}

/// `attr LIKE 'value%'`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartsWithFilter {
    pattern: String,
}

impl StartsWithFilter {
    pub fn new(value: Option<&str>) -> Result<Self, CriteriaError> {
        Ok(Self {
            pattern: format!("{}%", required(value, "StartsWithFilter")?),
        })
    }
}

impl AttributeFilter for StartsWithFilter {
    fn apply(&self, restriction: RestrictionBuilder) -> Result<Predicate, CriteriaError> {
        Ok(restriction.like(&self.pattern))
    }
}

/// `attr LIKE '%value'`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndsWithFilter {
    pattern: String,
}

impl EndsWithFilter {
    pub fn new(value: Option<&str>) -> Result<Self, CriteriaError> {
        Ok(Self {
            pattern: format!("%{}", required(value, "EndsWithFilter")?),
        })
    }
}

impl AttributeFilter for EndsWithFilter {
    fn apply(&self, restriction: RestrictionBuilder) -> Result<Predicate, CriteriaError> {
        Ok(restriction.like(&self.pattern))
    }
}

/// `attr LIKE '%value%'`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainsFilter {
    pattern: String,
}

impl ContainsFilter {
    pub fn new(value: Option<&str>) -> Result<Self, CriteriaError> {
        Ok(Self {
            pattern: format!("%{}%", required(value, "ContainsFilter")?),
        })
    }
}

impl AttributeFilter for ContainsFilter {
    fn apply(&self, restriction: RestrictionBuilder) -> Result<Predicate, CriteriaError> {
        Ok(restriction.like(&self.pattern))
    }
}

/// `UPPER(attr) LIKE UPPER('%value%')`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainsIgnoreCaseFilter {
    pattern: String,
}

impl ContainsIgnoreCaseFilter {
    pub fn new(value: Option<&str>) -> Result<Self, CriteriaError> {
        Ok(Self {
            pattern: format!("%{}%", required(value, "ContainsIgnoreCaseFilter")?),
        })
    }
}

impl AttributeFilter for ContainsIgnoreCaseFilter {
    fn apply(&self, restriction: RestrictionBuilder) -> Result<Predicate, CriteriaError> {
        Ok(restriction.like_ignore_case(&self.pattern))
    }
}

/// `attr > value`
#[derive(Debug, Clone, PartialEq)]
pub struct GreaterThanFilter {
    value: Value,
}

impl GreaterThanFilter {
    pub fn new(value: Option<Value>) -> Result<Self, CriteriaError> {
        Ok(Self {
            value: required(value, "GreaterThanFilter")?,
        })
    }
}

impl AttributeFilter for GreaterThanFilter {
    fn apply(&self, restriction: RestrictionBuilder) -> Result<Predicate, CriteriaError> {
        Ok(restriction.gt(render_value_literal(&self.value)?))
    }
}

/// `attr < value`
#[derive(Debug, Clone, PartialEq)]
pub struct LessThanFilter {
    value: Value,
}

impl LessThanFilter {
    pub fn new(value: Option<Value>) -> Result<Self, CriteriaError> {
        Ok(Self {
            value: required(value, "LessThanFilter")?,
        })
    }
}

impl AttributeFilter for LessThanFilter {
    fn apply(&self, restriction: RestrictionBuilder) -> Result<Predicate, CriteriaError> {
        Ok(restriction.lt(render_value_literal(&self.value)?))
    }
}

/// `attr IS NULL` for `true`, `attr IS NOT NULL` for `false`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NullFilter {
    is_null: bool,
}

impl NullFilter {
    pub fn new(is_null: Option<bool>) -> Result<Self, CriteriaError> {
        Ok(Self {
            is_null: required(is_null, "NullFilter")?,
        })
    }
}

impl AttributeFilter for NullFilter {
    fn apply(&self, restriction: RestrictionBuilder) -> Result<Predicate, CriteriaError> {
        Ok(if self.is_null {
            restriction.is_null()
        } else {
            restriction.is_not_null()
        })
    }
}
