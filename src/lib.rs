//! # Lifeguard Criteria
//!
//! Criteria query builder with three-query pagination, CTEs, subqueries and
//! entity views.
//!
//! Queries are assembled from fluent builder calls into a clause-per-manager
//! model, rendered once into a criteria query string and handed to a
//! [`QueryProvider`] for execution. Paginated builders render a count query, an
//! id-window query and a data query restricted to the ids of the page.
//!
//! ```
//! use std::sync::Arc;
//! use lifeguard_criteria::prelude::*;
//!
//! let metamodel = Arc::new(
//!     Metamodel::new()
//!         .with_entity(EntityType::new("Cat").id("id").attribute("name").to_one("owner", "Person"))
//!         .with_entity(EntityType::new("Person").id("id").attribute("name")),
//! );
//! let factory = CriteriaBuilderFactory::new(metamodel, CriteriaConfig::default())?;
//!
//! let mut cb = factory.create_with_alias("Cat", "c")?;
//! cb.select("c.name")?
//!     .filter(restrict("c.owner.name").like("J%"))?
//!     .order_by_asc("c.name")?;
//! assert_eq!(
//!     cb.get_query_string()?,
//!     "SELECT c.name FROM Cat c JOIN c.owner owner_1 WHERE owner_1.name LIKE 'J%' ORDER BY c.name ASC NULLS LAST"
//! );
//! # Ok::<(), lifeguard_criteria::CriteriaError>(())
//! ```
//!
//! See the README for the full architecture.

pub mod config;
pub mod dialect;
pub mod error;
pub mod expression;
pub mod metamodel;
pub mod parameter;
pub mod predicate;
pub mod provider;
pub mod query;
pub mod specification;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
#[cfg(feature = "tracing")]
mod tracing_helpers;
pub mod view;

pub use config::CriteriaConfig;
pub use error::CriteriaError;
pub use provider::{ProviderError, QueryProvider, Tuple, TypedQuery};
pub use query::{CriteriaBuilder, CriteriaBuilderFactory, PaginatedCriteriaBuilder};

/// Everything needed to build and run criteria queries
pub mod prelude {
    pub use crate::config::CriteriaConfig;
    pub use crate::error::CriteriaError;
    pub use crate::metamodel::{EntityType, Metamodel};
    pub use crate::predicate::{restrict, Predicate};
    pub use crate::provider::{QueryProvider, Tuple, TypedQuery};
    pub use crate::query::{
        BaseQueryBuilder, CriteriaBuilder, CriteriaBuilderFactory, CteBuilder, JoinType, PagedList,
        PaginatedCriteriaBuilder, SubqueryBuilder,
    };
    pub use crate::view::{EntityViewManager, EntityViewSetting, ViewMetadata, ViewObject};
}
