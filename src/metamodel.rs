//! Explicit schema description consumed by the builders.
//!
//! The metamodel replaces runtime introspection of provider metadata: it is built
//! once, passed to the [`CriteriaBuilderFactory`](crate::CriteriaBuilderFactory)
//! and shared by every builder it creates. Identifier attributes, association
//! targets and CTE entities are all resolved from here.

use crate::error::CriteriaError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Cardinality of an association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationKind {
    /// Many-to-one or one-to-one
    ToOne,
    /// One-to-many or many-to-many
    ToMany,
    /// Collection of basic values (element collection)
    ElementCollection,
}

impl AssociationKind {
    /// Whether joining this association can multiply root rows
    pub fn is_collection(&self) -> bool {
        matches!(self, AssociationKind::ToMany | AssociationKind::ElementCollection)
    }
}

/// Association from one entity to another (or to a collection of basic values)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub kind: AssociationKind,
    /// Target entity name; `None` for element collections
    pub target: Option<String>,
}

/// Description of one entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
    name: String,
    id_attribute: Option<String>,
    attributes: Vec<String>,
    associations: BTreeMap<String, Association>,
    cte: bool,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_attribute: None,
            attributes: Vec::new(),
            associations: BTreeMap::new(),
            cte: false,
        }
    }

    /// Declare the identifier attribute (also registered as a basic attribute)
    pub fn id(mut self, attribute: impl Into<String>) -> Self {
        let attribute = attribute.into();
        if !self.attributes.contains(&attribute) {
            self.attributes.push(attribute.clone());
        }
        self.id_attribute = Some(attribute);
        self
    }

    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        let attribute = attribute.into();
        if !self.attributes.contains(&attribute) {
            self.attributes.push(attribute);
        }
        self
    }

    pub fn to_one(mut self, attribute: impl Into<String>, target: impl Into<String>) -> Self {
        self.associations.insert(
            attribute.into(),
            Association {
                kind: AssociationKind::ToOne,
                target: Some(target.into()),
            },
        );
        self
    }

    pub fn to_many(mut self, attribute: impl Into<String>, target: impl Into<String>) -> Self {
        self.associations.insert(
            attribute.into(),
            Association {
                kind: AssociationKind::ToMany,
                target: Some(target.into()),
            },
        );
        self
    }

    pub fn element_collection(mut self, attribute: impl Into<String>) -> Self {
        self.associations.insert(
            attribute.into(),
            Association {
                kind: AssociationKind::ElementCollection,
                target: None,
            },
        );
        self
    }

    /// Mark the entity as a CTE entity (usable in `WITH` clauses)
    pub fn cte(mut self) -> Self {
        self.cte = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_attribute(&self) -> Option<&str> {
        self.id_attribute.as_deref()
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn association(&self, attribute: &str) -> Option<&Association> {
        self.associations.get(attribute)
    }

    /// Whether `attribute` is declared as a basic attribute or association
    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| a == attribute) || self.associations.contains_key(attribute)
    }

    pub fn is_cte(&self) -> bool {
        self.cte
    }
}

/// Registry of all entity types known to the builders
#[derive(Debug, Clone, Default)]
pub struct Metamodel {
    entities: BTreeMap<String, Arc<EntityType>>,
}

impl Metamodel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity: EntityType) -> Self {
        self.register(entity);
        self
    }

    pub fn register(&mut self, entity: EntityType) {
        self.entities.insert(entity.name.clone(), Arc::new(entity));
    }

    /// Look up an entity type by name
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntity` if no entity with that name was registered.
    pub fn entity(&self, name: &str) -> Result<Arc<EntityType>, CriteriaError> {
        self.entities
            .get(name)
            .cloned()
            .ok_or_else(|| CriteriaError::UnknownEntity(name.to_string()))
    }

    /// Resolve the identifier attribute of an entity
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntity` for unregistered entities and `IdentifierUnresolved`
    /// when the entity declares no identifier.
    pub fn id_attribute(&self, name: &str) -> Result<String, CriteriaError> {
        let entity = self.entity(name)?;
        entity
            .id_attribute()
            .map(str::to_string)
            .ok_or_else(|| CriteriaError::IdentifierUnresolved(name.to_string()))
    }

    /// Target entity of an association, when it is itself a registered entity
    pub fn association_target(&self, owner: &EntityType, attribute: &str) -> Option<Arc<EntityType>> {
        owner
            .association(attribute)
            .and_then(|a| a.target.as_deref())
            .and_then(|target| self.entities.get(target).cloned())
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
            .with_entity(EntityType::new("Person").id("id").to_one("address", "Address"))
            .with_entity(EntityType::new("Address").attribute("city"))
    }

    #[test]
    fn test_id_resolution() {
        let mm = metamodel();
        assert_eq!(mm.id_attribute("Cat").unwrap(), "id");
        assert!(matches!(
            mm.id_attribute("Address"),
            Err(CriteriaError::IdentifierUnresolved(ref e)) if e == "Address"
        ));
        assert!(matches!(mm.id_attribute("Dog"), Err(CriteriaError::UnknownEntity(_))));
    }

    #[test]
    fn test_association_targets() {
        let mm = metamodel();
        let cat = mm.entity("Cat").unwrap();
        assert_eq!(mm.association_target(&cat, "owner").unwrap().name(), "Person");
        assert!(mm.association_target(&cat, "nicknames").is_none());
        assert!(cat.association("kittens").unwrap().kind.is_collection());
        assert!(!cat.association("owner").unwrap().kind.is_collection());
        assert!(cat.has_attribute("nicknames"));
        assert!(cat.has_attribute("id"));
        assert!(!cat.has_attribute("age"));
    }
}
