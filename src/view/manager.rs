//! Registry of entity views and application of view settings to builders.

use crate::error::CriteriaError;
use crate::metamodel::Metamodel;
use crate::predicate::restrict;
use crate::query::{BaseQueryBuilder, CriteriaBuilder, PaginatedCriteriaBuilder};
use crate::view::metadata::{MappingKind, ViewMetadata};
use crate::view::object_builder::{FieldLayout, ObjectLayout, TypedViewObjectBuilder, ViewObject, ViewObjectBuilder};
use crate::view::setting::EntityViewSetting;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Validated entity views of one metamodel
///
/// ```
/// use std::sync::Arc;
/// use lifeguard_criteria::prelude::*;
/// use lifeguard_criteria::view::filter::EndsWithFilter;
///
/// let metamodel = Arc::new(
///     Metamodel::new()
///         .with_entity(EntityType::new("Cat").id("id").attribute("name").to_one("owner", "Person"))
///         .with_entity(EntityType::new("Person").id("id").attribute("name")),
/// );
/// let factory = CriteriaBuilderFactory::new(metamodel.clone(), CriteriaConfig::default())?;
/// let mut evm = EntityViewManager::new(metamodel);
/// evm.register(ViewMetadata::new("CatView", "Cat").id("id", "id").attribute("ownerName", "owner.name"))?;
///
/// let mut setting = EntityViewSetting::new("CatView");
/// setting.add_attribute_filter("ownerName", EndsWithFilter::new(Some("son"))?);
///
/// let mut cb = evm.apply_setting(&setting, factory.create_with_alias("Cat", "c")?)?;
/// assert_eq!(
///     cb.get_query_string()?,
///     "SELECT c.id, owner_1.name FROM Cat c JOIN c.owner owner_1 WHERE owner_1.name LIKE '%son'"
/// );
/// # Ok::<(), lifeguard_criteria::CriteriaError>(())
/// ```
#[derive(Debug, Clone)]
pub struct EntityViewManager {
    metamodel: Arc<Metamodel>,
    views: BTreeMap<String, Arc<ViewMetadata>>,
}

impl EntityViewManager {
    pub fn new(metamodel: Arc<Metamodel>) -> Self {
        Self {
            metamodel,
            views: BTreeMap::new(),
        }
    }

    /// Validate and register a view
    ///
    /// # Errors
    ///
    /// Returns the validation error of [`ViewMetadata::validate`], or `Mapping`
    /// when a view with the same name is already registered.
    pub fn register(&mut self, view: ViewMetadata) -> Result<&mut Self, CriteriaError> {
        view.validate(&self.metamodel)?;
        if self.views.contains_key(view.name()) {
            return Err(CriteriaError::Mapping(format!("view '{}' is already registered", view.name())));
        }
        log::debug!("Registered entity view {} for {}", view.name(), view.entity());
        self.views.insert(view.name().to_string(), Arc::new(view));
        Ok(self)
    }

    pub fn view(&self, name: &str) -> Result<&Arc<ViewMetadata>, CriteriaError> {
        self.views
            .get(name)
            .ok_or_else(|| CriteriaError::Mapping(format!("unknown entity view '{name}'")))
    }

    pub fn views(&self) -> impl Iterator<Item = &Arc<ViewMetadata>> {
        self.views.values()
    }

    /// Project `cb` onto the setting's view
    ///
    /// Adds the view's select items and left joins, then the setting's filters
    /// and sorters.
    ///
    /// # Errors
    ///
    /// - `Mapping` for unknown views or when `cb` queries another entity
    /// - `UnknownAttribute` for filters or sorters on undeclared fields
    /// - `BuilderFinalized` when `cb` was already rendered
    pub fn apply_setting(
        &self,
        setting: &EntityViewSetting,
        mut cb: CriteriaBuilder,
    ) -> Result<CriteriaBuilder<ViewObject>, CriteriaError> {
        let builder = self.prepare(setting, &mut cb)?;
        cb.select_new(builder)
    }

    /// [`apply_setting`](Self::apply_setting) producing `T` through serde
    pub fn apply_setting_as<T: DeserializeOwned + 'static>(
        &self,
        setting: &EntityViewSetting,
        mut cb: CriteriaBuilder,
    ) -> Result<CriteriaBuilder<T>, CriteriaError> {
        let builder = self.prepare(setting, &mut cb)?;
        cb.select_new(TypedViewObjectBuilder::<T>::new(builder))
    }

    /// Apply a paginated setting
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedOperation` when the setting carries no page size.
    pub fn apply_paginated_setting(
        &self,
        setting: &EntityViewSetting,
        cb: CriteriaBuilder,
    ) -> Result<PaginatedCriteriaBuilder<ViewObject>, CriteriaError> {
        let page_size = page_size(setting)?;
        self.apply_setting(setting, cb)?.page(setting.first_result(), page_size)
    }

    pub fn apply_paginated_setting_as<T: DeserializeOwned + 'static>(
        &self,
        setting: &EntityViewSetting,
        cb: CriteriaBuilder,
    ) -> Result<PaginatedCriteriaBuilder<T>, CriteriaError> {
        let page_size = page_size(setting)?;
        self.apply_setting_as::<T>(setting, cb)?.page(setting.first_result(), page_size)
    }

    fn prepare(&self, setting: &EntityViewSetting, cb: &mut CriteriaBuilder) -> Result<ViewObjectBuilder, CriteriaError> {
        let view = self.view(setting.view())?;
        let entity = cb.query_state().root_entity().name().to_string();
        if entity != view.entity() {
            return Err(CriteriaError::Mapping(format!(
                "view '{}' maps '{}' but the builder queries '{}'",
                view.name(),
                view.entity(),
                entity
            )));
        }

        let root = cb.root_alias().to_string();
        let mut planner = ProjectionPlanner {
            taken: cb.query_state().joins.aliases().map(str::to_string).collect(),
            ..ProjectionPlanner::default()
        };
        let layout = planner.plan_object(view, &root, "");

        for (path, alias) in &planner.joins {
            cb.left_join(path, alias)?;
        }
        for (attribute, filter) in setting.filters() {
            let expression = planner.expression_for(view, attribute)?;
            cb.filter(filter.apply(restrict(expression))?)?;
        }
        for (attribute, ascending) in setting.sorters() {
            let expression = planner.expression_for(view, attribute)?;
            cb.order_by(expression, *ascending, false)?;
        }
        Ok(ViewObjectBuilder::new(planner.selects, layout, view.has_collections()))
    }
}

fn page_size(setting: &EntityViewSetting) -> Result<u64, CriteriaError> {
    setting.max_results().ok_or_else(|| {
        CriteriaError::UnsupportedOperation(format!("setting for view '{}' is not paginated", setting.view()))
    })
}

/// Select items, joins and field paths of one view projection
#[derive(Debug, Default)]
struct ProjectionPlanner {
    taken: BTreeSet<String>,
    selects: Vec<String>,
    joins: Vec<(String, String)>,
    /// Dotted field path to select expression
    paths: Vec<(String, String)>,
}

impl ProjectionPlanner {
    fn plan_object(&mut self, view: &ViewMetadata, base: &str, prefix: &str) -> ObjectLayout {
        let mut fields = Vec::with_capacity(view.mappings().len());
        let mut id = None;
        for m in view.mappings() {
            let field_path = if prefix.is_empty() {
                m.name.clone()
            } else {
                format!("{prefix}.{}", m.name)
            };
            let layout = match &m.kind {
                MappingKind::Id | MappingKind::Attribute => {
                    let index = self.select(format!("{base}.{}", m.mapping), field_path);
                    if m.kind == MappingKind::Id {
                        id = Some((m.name.clone(), index));
                    }
                    FieldLayout::Value(index)
                }
                MappingKind::Nested(nested) => {
                    let alias = self.join(format!("{base}.{}", m.mapping), &m.name);
                    FieldLayout::Nested(self.plan_object(nested, &alias, &field_path))
                }
                MappingKind::Collection => {
                    let (head, rest) = match m.mapping.split_once('.') {
                        Some((head, rest)) => (head, Some(rest)),
                        None => (m.mapping.as_str(), None),
                    };
                    let alias = self.join(format!("{base}.{head}"), &m.name);
                    let expression = match rest {
                        Some(rest) => format!("{alias}.{rest}"),
                        None => alias,
                    };
                    FieldLayout::Collection(self.select(expression, field_path))
                }
            };
            fields.push((m.name.clone(), layout));
        }
        ObjectLayout {
            view: view.name().to_string(),
            fields,
            id,
        }
    }

    fn select(&mut self, expression: String, field_path: String) -> usize {
        self.paths.push((field_path, expression.clone()));
        self.selects.push(expression);
        self.selects.len() - 1
    }

    /// Left join `path` under a fresh `v_<field>` alias
    fn join(&mut self, path: String, field: &str) -> String {
        let mut alias = format!("v_{field}");
        let mut n = 1;
        while self.taken.contains(&alias) {
            n += 1;
            alias = format!("v_{field}_{n}");
        }
        self.taken.insert(alias.clone());
        self.joins.push((path, alias.clone()));
        alias
    }

    fn expression_for(&self, view: &ViewMetadata, field_path: &str) -> Result<String, CriteriaError> {
        self.paths
            .iter()
            .find(|(path, _)| path == field_path)
            .map(|(_, expression)| expression.clone())
            .ok_or_else(|| CriteriaError::UnknownAttribute(format!("{}.{}", view.name(), field_path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CriteriaConfig;
    use crate::metamodel::EntityType;
    use crate::query::CriteriaBuilderFactory;
    use crate::view::filter::{ContainsIgnoreCaseFilter, EndsWithFilter};

    fn setup() -> (CriteriaBuilderFactory, EntityViewManager) {
        let mm = Arc::new(
            Metamodel::new()
                .with_entity(
                    EntityType::new("Cat")
                        .id("id")
                        .attribute("name")
                        .to_one("owner", "Person")
                        .to_many("kittens", "Cat")
                        .element_collection("nicknames"),
                )
                .with_entity(EntityType::new("Person").id("id").attribute("name")),
        );
        let factory = CriteriaBuilderFactory::new(mm.clone(), CriteriaConfig::default()).unwrap();
        let mut evm = EntityViewManager::new(mm);
        evm.register(
            ViewMetadata::new("CatView", "Cat")
                .id("id", "id")
                .attribute("name", "name")
                .nested(
                    "owner",
                    "owner",
                    ViewMetadata::new("OwnerView", "Person").id("id", "id").attribute("name", "name"),
                )
                .collection("kittenNames", "kittens.name"),
        )
        .unwrap();
        (factory, evm)
    }

    #[test]
    fn test_projection_query() {
        let (factory, evm) = setup();
        let mut setting = EntityViewSetting::new("CatView");
        setting
            .add_attribute_filter("owner.name", EndsWithFilter::new(Some("son")).unwrap())
            .add_attribute_sorter("name", true);
        let mut cb = evm.apply_setting(&setting, factory.create_with_alias("Cat", "c").unwrap()).unwrap();
        assert_eq!(
            cb.get_query_string().unwrap(),
            "SELECT c.id, c.name, v_owner.id, v_owner.name, v_kittenNames.name FROM Cat c \
             LEFT JOIN c.owner v_owner LEFT JOIN c.kittens v_kittenNames \
             WHERE v_owner.name LIKE '%son' ORDER BY c.name ASC NULLS LAST"
        );
    }

    #[test]
    fn test_paginated_projection() {
        let (factory, evm) = setup();
        let mut setting = EntityViewSetting::paginated("CatView", 0, 10);
        setting.add_attribute_filter("name", ContainsIgnoreCaseFilter::new(Some("to")).unwrap());
        let mut pcb = evm
            .apply_paginated_setting(&setting, factory.create_with_alias("Cat", "c").unwrap())
            .unwrap();
        assert_eq!(
            pcb.get_page_count_query_string().unwrap(),
            "SELECT COUNT(DISTINCT c.id) FROM Cat c LEFT JOIN c.owner v_owner LEFT JOIN c.kittens v_kittenNames \
             WHERE UPPER(c.name) LIKE UPPER('%to%')"
        );
    }

    #[test]
    fn test_unknown_filter_attribute() {
        let (factory, evm) = setup();
        let mut setting = EntityViewSetting::new("CatView");
        setting.add_attribute_filter("age", EndsWithFilter::new(Some("1")).unwrap());
        let err = evm
            .apply_setting(&setting, factory.create("Cat").unwrap())
            .unwrap_err();
        assert!(matches!(err, CriteriaError::UnknownAttribute(ref a) if a == "CatView.age"));
    }

    #[test]
    fn test_view_for_other_entity() {
        let (factory, evm) = setup();
        let setting = EntityViewSetting::new("CatView");
        assert!(matches!(
            evm.apply_setting(&setting, factory.create("Person").unwrap()),
            Err(CriteriaError::Mapping(_))
        ));
    }

    #[test]
    fn test_unpaginated_setting_cannot_page() {
        let (factory, evm) = setup();
        let setting = EntityViewSetting::new("CatView");
        assert!(matches!(
            evm.apply_paginated_setting(&setting, factory.create("Cat").unwrap()),
            Err(CriteriaError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_duplicate_registration() {
        let (_, mut evm) = setup();
        let err = evm.register(ViewMetadata::new("CatView", "Cat").id("id", "id")).unwrap_err();
        assert!(matches!(err, CriteriaError::Mapping(_)));
    }
}
