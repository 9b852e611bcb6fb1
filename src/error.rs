//! Error type for the criteria builder.
//!
//! Every fallible operation in this crate returns [`CriteriaError`]. Variants fall
//! into three families:
//!
//! - **Configuration errors** (unknown entity, unresolvable identifier, null filter
//!   value, unsupported operation) are fatal and never retried.
//! - **State errors** (mutating a finalized builder, attaching a subquery twice)
//!   are raised at the point of misuse.
//! - **Provider errors** are passed through unmodified from the [`QueryProvider`].
//!
//! [`QueryProvider`]: crate::provider::QueryProvider

use crate::provider::ProviderError;
use std::fmt;

/// Criteria builder error type
#[derive(Debug)]
pub enum CriteriaError {
    /// A structural mutation was attempted after a terminal operation
    BuilderFinalized,
    /// A subquery builder was attached to a predicate that already owns one
    SubqueryAlreadyAttached,
    /// An EXISTS predicate was rendered without a subquery builder
    MissingSubquery,
    /// A filter was constructed without a value (filter name)
    NullFilterValue(String),
    /// The identifier attribute of an entity could not be resolved
    IdentifierUnresolved(String),
    /// The entity is not part of the metamodel
    UnknownEntity(String),
    /// The entity declares no attribute or association with that name (`Entity.attribute`)
    UnknownAttribute(String),
    /// A join path starts with an alias that is not in scope
    UnknownAlias(String),
    /// An alias is already used by the root entity or another join
    DuplicateAlias(String),
    /// No dialect is registered under the given provider identifier
    UnknownDialect(String),
    /// Page size must be strictly positive
    InvalidPageSize(u64),
    /// The parameter name is reserved for the pagination id list
    ReservedParameterName(String),
    /// The query references a parameter that has no bound value
    UnsatisfiedParameter(String),
    /// A parameter with the same name was already bound in another scope
    DuplicateParameter(String),
    /// The operation is not supported by this kind of query
    UnsupportedOperation(String),
    /// Result tuple or view mapping error
    Mapping(String),
    /// Configuration loading error
    Config(config::ConfigError),
    /// Error raised by the underlying persistence provider
    Provider(ProviderError),
}

impl CriteriaError {
    /// Returns true for fatal misconfiguration (never worth retrying).
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            CriteriaError::NullFilterValue(_)
                | CriteriaError::IdentifierUnresolved(_)
                | CriteriaError::UnknownEntity(_)
                | CriteriaError::UnknownAttribute(_)
                | CriteriaError::UnknownAlias(_)
                | CriteriaError::DuplicateAlias(_)
                | CriteriaError::UnknownDialect(_)
                | CriteriaError::InvalidPageSize(_)
                | CriteriaError::ReservedParameterName(_)
                | CriteriaError::UnsupportedOperation(_)
                | CriteriaError::Config(_)
        )
    }

    /// Returns true for builder misuse detected at the call site.
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            CriteriaError::BuilderFinalized
                | CriteriaError::SubqueryAlreadyAttached
                | CriteriaError::MissingSubquery
                | CriteriaError::UnsatisfiedParameter(_)
                | CriteriaError::DuplicateParameter(_)
        )
    }
}

impl fmt::Display for CriteriaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CriteriaError::BuilderFinalized => {
                write!(f, "Builder state error: the builder was finalized by a terminal operation")
            }
            CriteriaError::SubqueryAlreadyAttached => {
                write!(f, "Builder state error: a subquery builder is already attached")
            }
            CriteriaError::MissingSubquery => {
                write!(f, "Builder state error: EXISTS predicate has no subquery builder")
            }
            CriteriaError::NullFilterValue(filter) => {
                write!(f, "Configuration error: {filter} requires a non-null value")
            }
            CriteriaError::IdentifierUnresolved(entity) => {
                write!(f, "Configuration error: cannot resolve identifier attribute of entity '{entity}'")
            }
            CriteriaError::UnknownEntity(entity) => {
                write!(f, "Configuration error: unknown entity '{entity}'")
            }
            CriteriaError::UnknownAttribute(path) => {
                write!(f, "Configuration error: unknown attribute '{path}'")
            }
            CriteriaError::UnknownAlias(alias) => {
                write!(f, "Configuration error: alias '{alias}' is not in scope")
            }
            CriteriaError::DuplicateAlias(alias) => {
                write!(f, "Configuration error: alias '{alias}' is already in use")
            }
            CriteriaError::UnknownDialect(name) => {
                write!(f, "Configuration error: no dialect registered for '{name}'")
            }
            CriteriaError::InvalidPageSize(size) => {
                write!(f, "Configuration error: invalid page size {size}, must be greater than zero")
            }
            CriteriaError::ReservedParameterName(name) => {
                write!(f, "Configuration error: parameter name '{name}' is reserved")
            }
            CriteriaError::UnsatisfiedParameter(name) => {
                write!(f, "Builder state error: parameter '{name}' has no bound value")
            }
            CriteriaError::DuplicateParameter(name) => {
                write!(f, "Builder state error: parameter '{name}' is bound more than once")
            }
            CriteriaError::UnsupportedOperation(op) => {
                write!(f, "Unsupported operation: {op}")
            }
            CriteriaError::Mapping(s) => {
                write!(f, "Mapping error: {s}")
            }
            CriteriaError::Config(e) => {
                write!(f, "Configuration loading error: {e}")
            }
            CriteriaError::Provider(e) => {
                write!(f, "Provider error: {e}")
            }
        }
    }
}

impl std::error::Error for CriteriaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CriteriaError::Config(e) => Some(e),
            CriteriaError::Provider(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for CriteriaError {
    fn from(err: config::ConfigError) -> Self {
        CriteriaError::Config(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_errors_are_classified() {
        assert!(CriteriaError::BuilderFinalized.is_state_error());
        assert!(CriteriaError::SubqueryAlreadyAttached.is_state_error());
        assert!(!CriteriaError::BuilderFinalized.is_configuration_error());
    }

    #[test]
    fn test_configuration_errors_are_classified() {
        let err = CriteriaError::NullFilterValue("name".to_string());
        assert!(err.is_configuration_error());
        assert!(!err.is_state_error());
        assert!(CriteriaError::UnsupportedOperation("x".into()).is_configuration_error());
    }

    #[test]
    fn test_display_contains_context() {
        let err = CriteriaError::IdentifierUnresolved("Cat".to_string());
        let display = err.to_string();
        assert!(display.contains("Configuration error"));
        assert!(display.contains("Cat"));

        let err = CriteriaError::InvalidPageSize(0);
        assert!(err.to_string().contains("page size 0"));
    }

    #[test]
    fn test_provider_error_is_passed_through() {
        let inner: ProviderError = "connection reset".into();
        let err = CriteriaError::Provider(inner);
        assert!(err.to_string().contains("connection reset"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_configuration_error());
        assert!(!err.is_state_error());
    }
}
