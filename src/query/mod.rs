//! Criteria builders and the machinery that renders them.
//!
//! Every builder owns a [`QueryState`](state::QueryState) with one manager per
//! clause. Builders accumulate state through the fluent [`BaseQueryBuilder`]
//! methods until a terminal operation finalizes them; from then on the state is
//! frozen and rendered query strings are cached per query kind.
//!
//! - [`CriteriaBuilder`]: single query, optionally windowed
//! - [`PaginatedCriteriaBuilder`]: count / id-window / data query protocol
//! - [`SubqueryBuilder`]: correlated subquery for EXISTS predicates
//! - [`CteBuilder`]: body of a common table expression

pub mod builder;
pub mod clause;
pub mod cte;
pub mod factory;
pub mod group_by;
pub mod join;
pub mod object_builder;
pub mod order_by;
pub mod paged_list;
pub mod paginated;
pub mod select;
pub mod state;
pub mod subquery;

pub use builder::{BaseQueryBuilder, BuilderContext, CriteriaBuilder};
pub use cte::CteBuilder;
pub use factory::CriteriaBuilderFactory;
pub use join::JoinType;
pub use object_builder::{MappingObjectBuilder, ObjectBuilder, TupleObjectBuilder};
pub use paged_list::PagedList;
pub use paginated::PaginatedCriteriaBuilder;
pub use state::{BuilderState, QueryKind};
pub use subquery::SubqueryBuilder;
