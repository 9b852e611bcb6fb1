//! Entity views: declared projections of an entity, loaded through a criteria
//! builder.
//!
//! A [`ViewMetadata`] lists the fields of a view and the entity paths they map.
//! The [`EntityViewManager`] validates views against the metamodel and turns an
//! [`EntityViewSetting`] into select items, left joins, filters and sorters on a
//! criteria builder. Results come back as [`ViewObject`]s, or as any
//! `DeserializeOwned` type through [`TypedViewObjectBuilder`].

pub mod filter;
pub mod manager;
pub mod metadata;
pub mod object_builder;
pub mod setting;

pub use filter::{
    AttributeFilter, ContainsFilter, ContainsIgnoreCaseFilter, EndsWithFilter, EqualFilter, GreaterThanFilter,
    LessThanFilter, NullFilter, StartsWithFilter,
};
pub use manager::EntityViewManager;
pub use metadata::{AttributeMapping, MappingKind, ViewMetadata};
pub use object_builder::{TypedViewObjectBuilder, ViewObject, ViewObjectBuilder, ViewValue};
pub use setting::EntityViewSetting;
