//! Entry point for creating builders.

use crate::config::CriteriaConfig;
use crate::dialect::{DbmsDialect, DialectRegistry};
use crate::error::CriteriaError;
use crate::metamodel::Metamodel;
use crate::query::builder::{BuilderContext, CriteriaBuilder};
use crate::query::cte::CteBuilder;
use crate::query::state::QueryState;
use crate::query::subquery::SubqueryBuilder;
use std::sync::Arc;

/// Creates criteria, subquery and CTE builders over one metamodel
///
/// The dialect is resolved once, when the factory is created; every builder
/// created by the factory shares it.
#[derive(Debug, Clone)]
pub struct CriteriaBuilderFactory {
    metamodel: Arc<Metamodel>,
    context: BuilderContext,
}

impl CriteriaBuilderFactory {
    /// Factory using the built-in dialects
    ///
    /// # Errors
    ///
    /// Returns `UnknownDialect` when `config.dialect` is not a built-in dialect.
    pub fn new(metamodel: Arc<Metamodel>, config: CriteriaConfig) -> Result<Self, CriteriaError> {
        Self::with_registry(metamodel, config, &DialectRegistry::with_defaults())
    }

    /// Factory resolving its dialect from `registry`
    pub fn with_registry(
        metamodel: Arc<Metamodel>,
        config: CriteriaConfig,
        registry: &DialectRegistry,
    ) -> Result<Self, CriteriaError> {
        let dialect = registry.resolve(&config.dialect)?;
        log::debug!(
            "Criteria builder factory using dialect '{}', id parameter ':{}'",
            dialect.name(),
            config.id_param_name
        );
        Ok(Self {
            metamodel,
            context: BuilderContext {
                dialect,
                config: Arc::new(config),
            },
        })
    }

    /// Factory configured from `config/config.toml` and `LIFEGUARD__*` variables
    pub fn from_config(metamodel: Arc<Metamodel>) -> Result<Self, CriteriaError> {
        let config = CriteriaConfig::load()?;
        Self::new(metamodel, config)
    }

    pub fn metamodel(&self) -> &Arc<Metamodel> {
        &self.metamodel
    }

    pub fn dialect(&self) -> &Arc<dyn DbmsDialect> {
        &self.context.dialect
    }

    pub fn config(&self) -> &CriteriaConfig {
        &self.context.config
    }

    pub(crate) fn context(&self) -> &BuilderContext {
        &self.context
    }

    /// Builder for `entity`, aliased by the lower-cased entity name (`Cat` → `cat`)
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntity` when the entity is not part of the metamodel.
    pub fn create(&self, entity: &str) -> Result<CriteriaBuilder, CriteriaError> {
        self.create_with_alias(entity, &entity.to_lowercase())
    }

    pub fn create_with_alias(&self, entity: &str, alias: &str) -> Result<CriteriaBuilder, CriteriaError> {
        let state = QueryState::new(
            self.metamodel.clone(),
            entity,
            alias,
            &self.context.config.id_param_name,
        )?;
        Ok(CriteriaBuilder::new(state, self.context.clone()))
    }

    /// Builder for a correlated subquery, to be attached with `where_exists`
    pub fn create_subquery(&self, entity: &str, alias: &str) -> Result<SubqueryBuilder, CriteriaError> {
        SubqueryBuilder::new(self.metamodel.clone(), entity, alias)
    }

    /// Builder for the CTE `cte_entity`, selecting from `from_entity`
    pub fn create_cte(&self, cte_entity: &str, from_entity: &str, alias: &str) -> Result<CteBuilder, CriteriaError> {
        CteBuilder::new(self.metamodel.clone(), cte_entity, from_entity, alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metamodel::EntityType;
    use crate::query::BaseQueryBuilder;

    fn metamodel() -> Arc<Metamodel> {
        Arc::new(Metamodel::new().with_entity(EntityType::new("Cat").id("id").attribute("name")))
    }

    #[test]
    fn test_default_alias() {
        let factory = CriteriaBuilderFactory::new(metamodel(), CriteriaConfig::default()).unwrap();
        let cb = factory.create("Cat").unwrap();
        assert_eq!(cb.root_alias(), "cat");
        assert_eq!(factory.dialect().name(), "postgresql");
    }

    #[test]
    fn test_unknown_dialect() {
        let config = CriteriaConfig {
            dialect: "informix".to_string(),
            ..CriteriaConfig::default()
        };
        let err = CriteriaBuilderFactory::new(metamodel(), config).unwrap_err();
        assert!(matches!(err, CriteriaError::UnknownDialect(_)));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_unknown_entity() {
        let factory = CriteriaBuilderFactory::new(metamodel(), CriteriaConfig::default()).unwrap();
        assert!(matches!(factory.create("Dog"), Err(CriteriaError::UnknownEntity(_))));
        assert!(matches!(factory.create_subquery("Dog", "d"), Err(CriteriaError::UnknownEntity(_))));
    }

    #[test]
    fn test_custom_id_parameter_is_reserved() {
        let config = CriteriaConfig {
            id_param_name: "pageIds".to_string(),
            ..CriteriaConfig::default()
        };
        let factory = CriteriaBuilderFactory::new(metamodel(), config).unwrap();
        let mut cb = factory.create("Cat").unwrap();
        assert!(cb.set_parameter("ids", 1i64).is_ok());
        assert!(matches!(
            cb.set_parameter("pageIds", 1i64),
            Err(CriteriaError::ReservedParameterName(_))
        ));
    }
}
