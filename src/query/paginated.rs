//! Paginated execution through the count / id-window / data query protocol.
//!
//! Joining collections multiplies root rows, so windowing the data query
//! directly would cut pages in the middle of an entity. Instead a page is
//! loaded with three queries against the same clause state:
//!
//! 1. `SELECT COUNT(*) ...` for the total, without ordering
//! 2. `SELECT DISTINCT root.id ... ORDER BY ...` windowed by the provider
//! 3. the data query, restricted to `root.id IN (:ids)`
//!
//! Fetch joins are only rendered in the data query. Plain collection joins
//! that the select list never reads are collapsed with `SELECT DISTINCT` so
//! that a page holds at most one row per id.

use crate::error::CriteriaError;
use crate::expression::{Expression, PathResolver};
use crate::parameter::ParameterValue;
use crate::predicate::restrict;
use crate::provider::{value_as_u64, QueryProvider, Tuple};
use crate::query::builder::{create_typed_query, BaseQueryBuilder, BuilderContext};
use crate::query::object_builder::ObjectBuilder;
use crate::query::paged_list::PagedList;
use crate::query::state::{join_parts, QueryKind, QueryState};
use sea_query::Value;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use crate::tracing_helpers;

/// Criteria builder that loads one page at a time
pub struct PaginatedCriteriaBuilder<T> {
    state: QueryState,
    object_builder: Arc<dyn ObjectBuilder<T>>,
    context: BuilderContext,
    first_row: u64,
    page_size: u64,
    id_attribute: String,
}

impl<T> fmt::Debug for PaginatedCriteriaBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginatedCriteriaBuilder")
            .field("state", &self.state)
            .field("first_row", &self.first_row)
            .field("page_size", &self.page_size)
            .field("id_attribute", &self.id_attribute)
            .finish()
    }
}

impl<T> PaginatedCriteriaBuilder<T> {
    pub(crate) fn new(
        state: QueryState,
        object_builder: Arc<dyn ObjectBuilder<T>>,
        context: BuilderContext,
        first_row: u64,
        page_size: u64,
    ) -> Result<Self, CriteriaError> {
        if page_size == 0 {
            return Err(CriteriaError::InvalidPageSize(page_size));
        }
        let id_attribute = state.metamodel().id_attribute(state.root_entity().name())?;
        Ok(Self {
            state,
            object_builder,
            context,
            first_row,
            page_size,
            id_attribute,
        })
    }

    pub fn first_row(&self) -> u64 {
        self.first_row
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// `root.id`
    fn id_path(&self) -> String {
        format!("{}.{}", self.state.root_alias(), self.id_attribute)
    }

    fn with_cte_prefix(&self, body: String) -> Result<String, CriteriaError> {
        let prefix = self.state.build_cte_prefix(self.context.dialect.cte_keyword(false))?;
        Ok(join_parts(&[prefix, body]))
    }

    fn count_query_body(&mut self) -> Result<String, CriteriaError> {
        self.state.finalize()?;
        let id_path = self.id_path();
        let count_distinct = self.context.config.count_distinct_collection_joins;
        self.state.render_cached(QueryKind::Count, |state| {
            let select = if count_distinct && state.group_by.is_empty() && state.joins.has_collection_joins() {
                format!("SELECT COUNT(DISTINCT {id_path})")
            } else {
                "SELECT COUNT(*)".to_string()
            };
            Ok(join_parts(&[
                select,
                state.build_from(),
                state.joins.build_joins(false)?,
                state.where_clause.build_clause(&state.joins)?,
                state.group_by.build_group_by(&state.joins),
                state.having.build_clause(&state.joins)?,
            ]))
        })
    }

    fn id_query_body(&mut self) -> Result<String, CriteriaError> {
        self.state.finalize()?;
        let id_path = self.id_path();
        self.state.render_cached(QueryKind::Id, |state| {
            Ok(join_parts(&[
                format!("SELECT DISTINCT {id_path}"),
                state.build_from(),
                state.joins.build_joins(false)?,
                state.where_clause.build_clause(&state.joins)?,
                state.group_by.build_group_by(&state.joins),
                state.having.build_clause(&state.joins)?,
                state.order_by.build_order_by(&state.joins, Some(&state.select)),
            ]))
        })
    }

    fn data_query_body(&mut self) -> Result<String, CriteriaError> {
        self.state.finalize()?;
        let id_restriction = restrict(self.id_path()).in_parameter(&self.context.config.id_param_name);
        self.state.render_cached(QueryKind::PaginatedMain, |state| {
            let distinct = state.select.is_distinct() || has_unselected_multiplying_joins(state);
            Ok(join_parts(&[
                state.build_select_clause_with(distinct),
                state.build_from(),
                state.joins.build_joins(true)?,
                state.where_clause.build_clause_with(&state.joins, Some(id_restriction))?,
                state.group_by.build_group_by(&state.joins),
                state.having.build_clause(&state.joins)?,
                state.order_by.build_order_by(&state.joins, None),
            ]))
        })
    }

    /// Count query: no select list, ordering or fetch joins (finalizes the builder)
    pub fn get_page_count_query_string(&mut self) -> Result<String, CriteriaError> {
        let body = self.count_query_body()?;
        self.with_cte_prefix(body)
    }

    /// Id-window query: distinct root ids in the requested order (finalizes the builder)
    pub fn get_page_id_query_string(&mut self) -> Result<String, CriteriaError> {
        let body = self.id_query_body()?;
        self.with_cte_prefix(body)
    }

    /// Data query restricted to the ids of the page (finalizes the builder)
    pub fn get_query_string(&mut self) -> Result<String, CriteriaError> {
        let body = self.data_query_body()?;
        self.with_cte_prefix(body)
    }

    /// Load the page
    ///
    /// The three queries run in sequence on `provider`. When the total is zero
    /// or the window holds no ids, the data query is skipped and an empty page
    /// carrying the total is returned.
    ///
    /// # Errors
    ///
    /// Returns `UnsatisfiedParameter` for unbound parameters, `Mapping` when
    /// a count or id row is malformed, and provider errors unmodified.
    pub fn get_result_list<P: QueryProvider + ?Sized>(&mut self, provider: &P) -> Result<PagedList<T>, CriteriaError> {
        let total_size = self.execute_count_query(provider)?;
        if total_size == 0 {
            log::debug!("Count query matched no rows, skipping id and data queries");
            return Ok(PagedList::new(Vec::new(), 0, self.first_row, self.page_size));
        }

        let ids = self.execute_id_query(provider)?;
        if ids.is_empty() {
            log::debug!("Page at row {} is empty (total {})", self.first_row, total_size);
            return Ok(PagedList::new(Vec::new(), total_size, self.first_row, self.page_size));
        }

        let id_count = ids.len();
        let items = self.execute_data_query(provider, ids)?;
        if items.len() != id_count {
            log::warn!(
                "Data query built {} result(s) for {} id(s) of {}",
                items.len(),
                id_count,
                self.state.root_entity().name()
            );
        }
        Ok(PagedList::new(items, total_size, self.first_row, self.page_size))
    }

    fn execute_count_query<P: QueryProvider + ?Sized>(&mut self, provider: &P) -> Result<u64, CriteriaError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::count_query_span().entered();

        let query_string = self.count_query_body()?;
        let query = create_typed_query(&mut self.state, &self.context, provider, &query_string)?;
        log::debug!("Executing page count query: {}", query.query_string);
        let rows = provider.get_result_list(&query).map_err(CriteriaError::Provider)?;

        // Grouped counts return one row per group
        if !self.state.group_by.is_empty() {
            return Ok(rows.len() as u64);
        }
        match rows.first().and_then(|row| row.value(0)) {
            Some(value) => value_as_u64(value),
            None => Ok(0),
        }
    }

    fn execute_id_query<P: QueryProvider + ?Sized>(&mut self, provider: &P) -> Result<Vec<Value>, CriteriaError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::id_query_span().entered();

        let query_string = self.id_query_body()?;
        let mut query = create_typed_query(&mut self.state, &self.context, provider, &query_string)?;
        query.first_result = Some(self.first_row);
        query.max_results = Some(self.page_size);
        log::debug!("Executing page id query: {}", query.query_string);
        let rows = provider.get_result_list(&query).map_err(CriteriaError::Provider)?;
        rows.into_iter().map(first_value).collect()
    }

    fn execute_data_query<P: QueryProvider + ?Sized>(
        &mut self,
        provider: &P,
        ids: Vec<Value>,
    ) -> Result<Vec<T>, CriteriaError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::data_query_span().entered();

        let query_string = self.data_query_body()?;
        self.state
            .parameters
            .add_parameter_mapping(&self.context.config.id_param_name, ParameterValue::List(ids));
        let query = create_typed_query(&mut self.state, &self.context, provider, &query_string)?;
        log::debug!("Executing page data query: {}", query.query_string);
        let rows = provider.get_result_list(&query).map_err(CriteriaError::Provider)?;
        self.object_builder.build_rows(rows)
    }
}

/// Whether a plain collection join multiplies data rows without the select
/// list reading any of them
fn has_unselected_multiplying_joins(state: &QueryState) -> bool {
    if !state.group_by.is_empty() {
        return false;
    }
    let multiplying = state.joins.multiplying_aliases();
    if multiplying.is_empty() {
        return false;
    }
    !state.select.expressions().iter().any(|expression| {
        let resolved = Expression::new(state.joins.resolve(expression));
        let reads_collection = resolved.identifier_roots().any(|root| multiplying.contains(root));
        reads_collection
    })
}

fn first_value(row: Tuple) -> Result<Value, CriteriaError> {
    row.into_values()
        .into_iter()
        .next()
        .ok_or_else(|| CriteriaError::Mapping("Id query returned an empty row".to_string()))
}

impl<T> BaseQueryBuilder for PaginatedCriteriaBuilder<T> {
    fn query_state(&self) -> &QueryState {
        &self.state
    }

    fn query_state_mut(&mut self) -> &mut QueryState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CriteriaConfig;
    use crate::metamodel::{EntityType, Metamodel};
    use crate::query::CriteriaBuilderFactory;
    use crate::test_helpers::MockProvider;

    fn factory() -> CriteriaBuilderFactory {
        let mm = Metamodel::new()
            .with_entity(
                EntityType::new("Cat")
                    .id("id")
                    .attribute("name")
                    .attribute("age")
                    .to_one("owner", "Person")
                    .to_many("kittens", "Cat"),
            )
            .with_entity(EntityType::new("Person").id("id").attribute("name"))
            .with_entity(EntityType::new("Log").attribute("message"));
        CriteriaBuilderFactory::new(Arc::new(mm), CriteriaConfig::default()).unwrap()
    }

    fn id_rows(ids: &[i64]) -> Vec<Tuple> {
        ids.iter().map(|id| Tuple::new(vec![Value::from(*id)])).collect()
    }

    #[test]
    fn test_page_size_zero() {
        let cb = factory().create("Cat").unwrap();
        assert!(matches!(cb.page(0, 0), Err(CriteriaError::InvalidPageSize(0))));
    }

    #[test]
    fn test_missing_identifier() {
        let cb = factory().create("Log").unwrap();
        let err = cb.page(0, 10).unwrap_err();
        assert!(matches!(err, CriteriaError::IdentifierUnresolved(ref e) if e == "Log"));
    }

    #[test]
    fn test_query_strings() {
        let mut pcb = factory().create_with_alias("Cat", "c").unwrap().page(0, 10).unwrap();
        pcb.select_as("c.name", "catName")
            .unwrap()
            .left_join_fetch("c.kittens", "k")
            .unwrap()
            .filter(restrict("c.owner.name").like("J%"))
            .unwrap()
            .order_by_asc("catName")
            .unwrap();

        assert_eq!(
            pcb.get_page_count_query_string().unwrap(),
            "SELECT COUNT(*) FROM Cat c JOIN c.owner owner_1 WHERE owner_1.name LIKE 'J%'"
        );
        assert_eq!(
            pcb.get_page_id_query_string().unwrap(),
            "SELECT DISTINCT c.id FROM Cat c JOIN c.owner owner_1 WHERE owner_1.name LIKE 'J%' ORDER BY c.name ASC NULLS LAST"
        );
        assert_eq!(
            pcb.get_query_string().unwrap(),
            "SELECT c.name AS catName FROM Cat c LEFT JOIN FETCH c.kittens k JOIN c.owner owner_1 \
             WHERE owner_1.name LIKE 'J%' AND c.id IN (:ids) ORDER BY catName ASC NULLS LAST"
        );
    }

    #[test]
    fn test_unselected_collection_join_collapses_data_rows() {
        let mut pcb = factory().create_with_alias("Cat", "c").unwrap().page(0, 2).unwrap();
        pcb.select("c.id")
            .unwrap()
            .left_join("c.kittens", "k")
            .unwrap()
            .filter(restrict("k.name").like("A%"))
            .unwrap();
        assert_eq!(
            pcb.get_query_string().unwrap(),
            "SELECT DISTINCT c.id FROM Cat c LEFT JOIN c.kittens k WHERE k.name LIKE 'A%' AND c.id IN (:ids)"
        );
    }

    #[test]
    fn test_selected_collection_join_keeps_data_rows() {
        let mut pcb = factory().create_with_alias("Cat", "c").unwrap().page(0, 2).unwrap();
        pcb.select("c.id")
            .unwrap()
            .select("UPPER(k.name)")
            .unwrap()
            .left_join("c.kittens", "k")
            .unwrap();
        assert_eq!(
            pcb.get_query_string().unwrap(),
            "SELECT c.id, UPPER(k.name) FROM Cat c LEFT JOIN c.kittens k WHERE c.id IN (:ids)"
        );
    }

    #[test]
    fn test_root_select_with_collection_join_is_distinct() {
        let mut pcb = factory().create_with_alias("Cat", "c").unwrap().page(0, 2).unwrap();
        pcb.inner_join("c.kittens", "k").unwrap();
        assert_eq!(
            pcb.get_query_string().unwrap(),
            "SELECT DISTINCT c FROM Cat c JOIN c.kittens k WHERE c.id IN (:ids)"
        );
    }

    #[test]
    fn test_count_distinct_with_collection_join() {
        let mut pcb = factory().create_with_alias("Cat", "c").unwrap().page(0, 10).unwrap();
        pcb.left_join("c.kittens", "k")
            .unwrap()
            .filter(restrict("k.age").lt("2"))
            .unwrap();
        assert_eq!(
            pcb.get_page_count_query_string().unwrap(),
            "SELECT COUNT(DISTINCT c.id) FROM Cat c LEFT JOIN c.kittens k WHERE k.age < 2"
        );
    }

    #[test]
    fn test_grouped_count_uses_row_count() {
        let provider = MockProvider::new();
        provider.append_query_results(vec![
            vec![
                Tuple::new(vec![Value::from(2i64)]),
                Tuple::new(vec![Value::from(1i64)]),
                Tuple::new(vec![Value::from(4i64)]),
            ],
            id_rows(&[1]),
            vec![Tuple::new(vec![Value::from("Tom")])],
        ]);
        let mut pcb = factory().create_with_alias("Cat", "c").unwrap().page(0, 1).unwrap();
        pcb.select("c.name").unwrap().group_by("c.id").unwrap().group_by("c.name").unwrap();
        let page = pcb.get_result_list(&provider).unwrap();
        assert_eq!(page.total_size(), 3);
        assert_eq!(page.size(), 1);
    }

    #[test]
    fn test_empty_count_skips_remaining_queries() {
        let provider = MockProvider::new();
        provider.append_query_results(vec![vec![Tuple::new(vec![Value::from(0i64)])]]);
        let mut pcb = factory().create("Cat").unwrap().page(0, 5).unwrap();
        let page = pcb.get_result_list(&provider).unwrap();
        assert_eq!(page.size(), 0);
        assert_eq!(page.total_size(), 0);
        assert_eq!(provider.queries().len(), 1);
    }

    #[test]
    fn test_page_past_the_end() {
        let provider = MockProvider::new();
        provider.append_query_results(vec![vec![Tuple::new(vec![Value::from(3i64)])], vec![]]);
        let mut pcb = factory().create("Cat").unwrap().page(10, 5).unwrap();
        let page = pcb.get_result_list(&provider).unwrap();
        assert!(page.is_empty());
        assert_eq!(page.total_size(), 3);
        assert_eq!(provider.queries().len(), 2);
    }

    #[test]
    fn test_ids_are_bound_to_data_query() {
        let provider = MockProvider::new();
        provider.append_query_results(vec![
            vec![Tuple::new(vec![Value::from(7i64)])],
            id_rows(&[3, 4]),
            vec![
                Tuple::new(vec![Value::from(3i64)]),
                Tuple::new(vec![Value::from(4i64)]),
            ],
        ]);
        let mut pcb = factory().create_with_alias("Cat", "c").unwrap().page(2, 2).unwrap();
        pcb.select("c.id").unwrap().order_by_asc("c.id").unwrap();
        pcb.get_result_list(&provider).unwrap();

        let queries = provider.queries();
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[0].first_result, None);
        assert_eq!(queries[1].first_result, Some(2));
        assert_eq!(queries[1].max_results, Some(2));
        assert_eq!(
            queries[2].parameter("ids"),
            Some(&ParameterValue::List(vec![Value::from(3i64), Value::from(4i64)]))
        );
        assert_eq!(queries[2].max_results, None);
    }

    #[test]
    fn test_cte_bodies_are_translated_once_per_page() {
        let mm = Metamodel::new()
            .with_entity(EntityType::new("Cat").id("id").attribute("age"))
            .with_entity(EntityType::new("OldCat").id("id").cte());
        let factory = CriteriaBuilderFactory::new(Arc::new(mm), CriteriaConfig::default()).unwrap();
        let mut cte = factory.create_cte("OldCat", "Cat", "c").unwrap();
        cte.bind("id", "c.id").unwrap();
        cte.filter(restrict("c.age").gt("10")).unwrap();
        let mut cb = factory.create_with_alias("OldCat", "o").unwrap();
        cb.with(cte).unwrap();
        let mut pcb = cb.page(0, 2).unwrap();
        pcb.select("o.id").unwrap();

        let provider = MockProvider::new();
        provider.append_query_results(vec![
            vec![Tuple::new(vec![Value::from(2i64)])],
            id_rows(&[1, 2]),
            id_rows(&[1, 2]),
        ]);
        let page = pcb.get_result_list(&provider).unwrap();
        assert_eq!(page.size(), 2);

        // The CTE body once, then the count, id and data queries
        assert_eq!(provider.native_sql_calls(), 4);
        let queries = provider.queries();
        assert_eq!(queries.len(), 3);
        assert!(queries
            .iter()
            .all(|q| q.query_string.starts_with("WITH OldCat(id) AS (SELECT c.id FROM Cat c WHERE c.age > 10) ")));
        assert!(queries[2].query_string.ends_with("WHERE o.id IN (:ids)"));
    }

    #[test]
    fn test_mutation_after_execution_fails() {
        let provider = MockProvider::new();
        provider.append_query_results(vec![vec![Tuple::new(vec![Value::from(0i64)])]]);
        let mut pcb = factory().create("Cat").unwrap().page(0, 5).unwrap();
        pcb.get_result_list(&provider).unwrap();
        assert!(matches!(
            pcb.filter(restrict("cat.age").gt("1")),
            Err(CriteriaError::BuilderFinalized)
        ));
    }
}
