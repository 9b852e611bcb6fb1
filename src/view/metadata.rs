//! Field-level mapping declarations of entity views.

use crate::error::CriteriaError;
use crate::metamodel::{AssociationKind, EntityType, Metamodel};
use std::sync::Arc;

/// How a view field is populated
#[derive(Debug, Clone, PartialEq)]
pub enum MappingKind {
    /// Identifier of the view, used to merge collection rows
    Id,
    /// Basic value reached through a to-one path (`name`, `owner.name`)
    Attribute,
    /// Nested view over a to-one association
    Nested(Arc<ViewMetadata>),
    /// Basic values of a collection (`kittens.name`, `nicknames`)
    Collection,
}

/// One field of a view
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMapping {
    /// Field name in the view
    pub name: String,
    /// Attribute path relative to the view's entity
    pub mapping: String,
    pub kind: MappingKind,
}

/// Declaration of an entity view
///
/// ```
/// use lifeguard_criteria::view::ViewMetadata;
///
/// let owner = ViewMetadata::new("OwnerView", "Person").id("id", "id").attribute("name", "name");
/// let cat = ViewMetadata::new("CatView", "Cat")
///     .id("id", "id")
///     .attribute("name", "name")
///     .nested("owner", "owner", owner)
///     .collection("kittenNames", "kittens.name");
/// assert_eq!(cat.mappings().len(), 4);
/// assert!(cat.has_collections());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ViewMetadata {
    name: String,
    entity: String,
    mappings: Vec<AttributeMapping>,
}

impl ViewMetadata {
    pub fn new(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity: entity.into(),
            mappings: Vec::new(),
        }
    }

    pub fn id(self, name: &str, mapping: &str) -> Self {
        self.mapping(name, mapping, MappingKind::Id)
    }

    pub fn attribute(self, name: &str, mapping: &str) -> Self {
        self.mapping(name, mapping, MappingKind::Attribute)
    }

    pub fn nested(self, name: &str, mapping: &str, view: ViewMetadata) -> Self {
        self.mapping(name, mapping, MappingKind::Nested(Arc::new(view)))
    }

    pub fn collection(self, name: &str, mapping: &str) -> Self {
        self.mapping(name, mapping, MappingKind::Collection)
    }

    fn mapping(mut self, name: &str, mapping: &str, kind: MappingKind) -> Self {
        self.mappings.push(AttributeMapping {
            name: name.to_string(),
            mapping: mapping.to_string(),
            kind,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn mappings(&self) -> &[AttributeMapping] {
        &self.mappings
    }

    pub fn id_mapping(&self) -> Option<&AttributeMapping> {
        self.mappings.iter().find(|m| m.kind == MappingKind::Id)
    }

    /// Whether this view declares a collection mapping
    pub fn has_collections(&self) -> bool {
        self.mappings.iter().any(|m| m.kind == MappingKind::Collection)
    }

    /// Check every mapping against the metamodel
    ///
    /// # Errors
    ///
    /// - `UnknownEntity` when the view's entity is not registered
    /// - `UnknownAttribute` when a mapping path does not resolve
    /// - `Mapping` for duplicate field names, collection paths in attribute
    ///   mappings, nested views over the wrong entity, or collection mappings
    ///   without an id mapping
    /// - `UnsupportedOperation` for collection mappings inside nested views
    pub fn validate(&self, metamodel: &Metamodel) -> Result<(), CriteriaError> {
        let entity = metamodel.entity(&self.entity)?;
        self.validate_against(metamodel, &entity, true)
    }

    fn validate_against(&self, metamodel: &Metamodel, entity: &EntityType, root: bool) -> Result<(), CriteriaError> {
        for (i, m) in self.mappings.iter().enumerate() {
            if self.mappings[..i].iter().any(|other| other.name == m.name) {
                return Err(CriteriaError::Mapping(format!(
                    "view '{}' declares field '{}' twice",
                    self.name, m.name
                )));
            }
            match &m.kind {
                MappingKind::Id | MappingKind::Attribute => {
                    self.resolve_to_one(metamodel, entity, &m.mapping, false)?;
                }
                MappingKind::Nested(view) => {
                    let target = self.resolve_to_one(metamodel, entity, &m.mapping, true)?;
                    let target = target.ok_or_else(|| {
                        CriteriaError::Mapping(format!(
                            "field '{}.{}' maps '{}', which is not an entity association",
                            self.name, m.name, m.mapping
                        ))
                    })?;
                    if target.name() != view.entity() {
                        return Err(CriteriaError::Mapping(format!(
                            "nested view '{}' is declared for '{}' but '{}' targets '{}'",
                            view.name(),
                            view.entity(),
                            m.mapping,
                            target.name()
                        )));
                    }
                    view.validate_against(metamodel, &target, false)?;
                }
                MappingKind::Collection => {
                    if !root {
                        return Err(CriteriaError::UnsupportedOperation(format!(
                            "collection mapping '{}' in nested view '{}'",
                            m.name, self.name
                        )));
                    }
                    self.validate_collection(metamodel, entity, &m.mapping)?;
                }
            }
        }
        if root && self.has_collections() && self.id_mapping().is_none() {
            return Err(CriteriaError::Mapping(format!(
                "view '{}' has collection mappings but no id mapping",
                self.name
            )));
        }
        Ok(())
    }

    /// Walk a to-one path; returns the target entity when the path ends on an
    /// association and `association_end` is set
    fn resolve_to_one(
        &self,
        metamodel: &Metamodel,
        entity: &EntityType,
        path: &str,
        association_end: bool,
    ) -> Result<Option<Arc<EntityType>>, CriteriaError> {
        let segments: Vec<&str> = path.split('.').collect();
        let mut current: Option<Arc<EntityType>> = None;
        for (i, segment) in segments.iter().enumerate() {
            let owner: &EntityType = current.as_deref().unwrap_or(entity);
            if !owner.has_attribute(segment) {
                return Err(CriteriaError::UnknownAttribute(format!("{}.{}", owner.name(), segment)));
            }
            let last = i + 1 == segments.len();
            match owner.association(segment) {
                Some(association) if association.kind.is_collection() => {
                    return Err(CriteriaError::Mapping(format!(
                        "'{}' in view '{}' dereferences collection '{}'; use a collection mapping",
                        path, self.name, segment
                    )));
                }
                Some(_) => {
                    let target = metamodel.association_target(owner, segment);
                    if last {
                        return Ok(if association_end { target } else { None });
                    }
                    current = Some(target.ok_or_else(|| {
                        CriteriaError::UnknownEntity(format!("target of {}.{}", owner.name(), segment))
                    })?);
                }
                None if last => return Ok(None),
                None => {
                    return Err(CriteriaError::Mapping(format!(
                        "'{}' in view '{}' dereferences basic attribute '{}'",
                        path, self.name, segment
                    )));
                }
            }
        }
        Ok(None)
    }

    fn validate_collection(&self, metamodel: &Metamodel, entity: &EntityType, path: &str) -> Result<(), CriteriaError> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let association = entity
            .association(head)
            .filter(|a| a.kind.is_collection())
            .ok_or_else(|| {
                CriteriaError::Mapping(format!(
                    "collection mapping '{}' in view '{}' must start with a collection association",
                    path, self.name
                ))
            })?;
        match (association.kind, rest) {
            (AssociationKind::ElementCollection, None) => Ok(()),
            (AssociationKind::ElementCollection, Some(_)) => Err(CriteriaError::Mapping(format!(
                "element collection '{head}' has no attributes"
            ))),
            (_, None) => Err(CriteriaError::Mapping(format!(
                "collection mapping '{}' in view '{}' must select an attribute of '{}'",
                path, self.name, head
            ))),
            (_, Some(rest)) => {
                let target = metamodel
                    .association_target(entity, head)
                    .ok_or_else(|| CriteriaError::UnknownEntity(format!("target of {}.{}", entity.name(), head)))?;
                self.resolve_to_one(metamodel, &target, rest, false).map(|_| ())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metamodel() -> Metamodel {
        Metamodel::new()
            .with_entity(
                EntityType::new("Cat")
                    .id("id")
                    .attribute("name")
                    .to_one("owner", "Person")
                    .to_many("kittens", "Cat")
                    .element_collection("nicknames"),
            )
            .with_entity(EntityType::new("Person").id("id").attribute("name"))
    }

    #[test]
    fn test_valid_view() {
        let view = ViewMetadata::new("CatView", "Cat")
            .id("id", "id")
            .attribute("ownerName", "owner.name")
            .nested("owner", "owner", ViewMetadata::new("OwnerView", "Person").attribute("name", "name"))
            .collection("kittenNames", "kittens.name")
            .collection("nicknames", "nicknames");
        view.validate(&metamodel()).unwrap();
    }

    #[test]
    fn test_unknown_attribute() {
        let view = ViewMetadata::new("CatView", "Cat").attribute("age", "age");
        let err = view.validate(&metamodel()).unwrap_err();
        assert!(matches!(err, CriteriaError::UnknownAttribute(ref a) if a == "Cat.age"));
    }

    #[test]
    fn test_attribute_through_collection_is_rejected() {
        let view = ViewMetadata::new("CatView", "Cat").attribute("kittenName", "kittens.name");
        assert!(matches!(view.validate(&metamodel()), Err(CriteriaError::Mapping(_))));
    }

    #[test]
    fn test_nested_view_entity_mismatch() {
        let view = ViewMetadata::new("CatView", "Cat").nested("owner", "owner", ViewMetadata::new("X", "Cat"));
        assert!(matches!(view.validate(&metamodel()), Err(CriteriaError::Mapping(_))));
    }

    #[test]
    fn test_collection_requires_id() {
        let view = ViewMetadata::new("CatView", "Cat").collection("nicknames", "nicknames");
        let err = view.validate(&metamodel()).unwrap_err();
        assert!(err.to_string().contains("no id mapping"));
    }

    #[test]
    fn test_duplicate_field() {
        let view = ViewMetadata::new("CatView", "Cat").attribute("name", "name").attribute("name", "id");
        assert!(matches!(view.validate(&metamodel()), Err(CriteriaError::Mapping(_))));
    }
}
