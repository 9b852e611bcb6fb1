//! Three-query pagination against an in-memory provider.

use fake::faker::name::en::FirstName;
use fake::Fake;
use lifeguard_criteria::parameter::ParameterValue;
use lifeguard_criteria::prelude::*;
use lifeguard_criteria::test_helpers::MockProvider;
use sea_query::Value;
use std::sync::Arc;

fn factory() -> CriteriaBuilderFactory {
    let metamodel = Metamodel::new()
        .with_entity(EntityType::new("Cat").id("id").attribute("name").to_many("kittens", "Cat"));
    CriteriaBuilderFactory::new(Arc::new(metamodel), CriteriaConfig::default()).unwrap()
}

fn cats(n: i64) -> Vec<(i64, String)> {
    (1..=n).map(|id| (id, FirstName().fake::<String>())).collect()
}

/// Ids bound to a data query, `None` for count and id queries
fn bound_ids(query: &TypedQuery) -> Option<Vec<Value>> {
    match query.parameter("ids") {
        Some(ParameterValue::List(ids)) => Some(ids.clone()),
        _ => None,
    }
}

/// Answers count, id and data queries over `cats`, ordered by id
fn provider_for(cats: Vec<(i64, String)>) -> MockProvider {
    MockProvider::new().with_handler(move |query: &TypedQuery| {
        let sql = &query.query_string;
        if let Some(ids) = bound_ids(query) {
            return Ok(cats
                .iter()
                .filter(|(id, _)| ids.contains(&Value::from(*id)))
                .map(|(id, name)| Tuple::new(vec![Value::from(*id), Value::from(name.clone())]))
                .collect());
        }
        if sql.starts_with("SELECT COUNT") {
            return Ok(vec![Tuple::new(vec![Value::from(cats.len() as i64)])]);
        }
        if sql.starts_with("SELECT DISTINCT") {
            let first = query.first_result.unwrap_or(0) as usize;
            let max = query.max_results.map_or(usize::MAX, |m| m as usize);
            return Ok(cats
                .iter()
                .skip(first)
                .take(max)
                .map(|(id, _)| Tuple::new(vec![Value::from(*id)]))
                .collect());
        }
        Err(format!("unexpected query {sql}").into())
    })
}

/// Like `provider_for`, but every cat has `kittens` kittens and a data query
/// returns one row per kitten unless it selects distinct rows
fn provider_with_kittens(cats: Vec<(i64, String)>, kittens: usize) -> MockProvider {
    let inner = provider_for(cats);
    MockProvider::new().with_handler(move |query: &TypedQuery| {
        let rows = inner.get_result_list(query)?;
        if bound_ids(query).is_none() || query.query_string.starts_with("SELECT DISTINCT") {
            return Ok(rows);
        }
        Ok(rows
            .into_iter()
            .flat_map(|row| std::iter::repeat(row).take(kittens))
            .collect())
    })
}

#[test]
fn test_first_page() {
    let cats = cats(5);
    let provider = provider_for(cats.clone());

    let mut pcb = factory().create_with_alias("Cat", "c").unwrap().page(0, 2).unwrap();
    pcb.select("c.id").unwrap().select("c.name").unwrap().order_by_asc("c.id").unwrap();
    let page = pcb.get_result_list(&provider).unwrap();

    assert_eq!(page.size(), 2);
    assert_eq!(page.total_size(), 5);
    assert_eq!(page.total_pages(), 3);
    assert_eq!(page.page(), 1);
    let names: Vec<String> = page.iter().map(|t| t.get::<String>(1).unwrap()).collect();
    assert_eq!(names, vec![cats[0].1.clone(), cats[1].1.clone()]);

    let queries = provider.queries();
    assert_eq!(queries.len(), 3);
    assert_eq!(queries[0].query_string, "SELECT COUNT(*) FROM Cat c");
    assert_eq!(
        queries[1].query_string,
        "SELECT DISTINCT c.id FROM Cat c ORDER BY c.id ASC NULLS LAST"
    );
    assert_eq!((queries[1].first_result, queries[1].max_results), (Some(0), Some(2)));
    assert_eq!(
        queries[2].query_string,
        "SELECT c.id, c.name FROM Cat c WHERE c.id IN (:ids) ORDER BY c.id ASC NULLS LAST"
    );
    assert_eq!(
        queries[2].parameter("ids"),
        Some(&ParameterValue::List(vec![Value::from(1i64), Value::from(2i64)]))
    );
    assert_eq!(queries[2].first_result, None);
}

#[test]
fn test_last_partial_page() {
    let provider = provider_for(cats(5));
    let mut pcb = factory().create_with_alias("Cat", "c").unwrap().page(4, 2).unwrap();
    pcb.select("c.id").unwrap().select("c.name").unwrap();
    let page = pcb.get_result_list(&provider).unwrap();

    assert_eq!(page.size(), 1);
    assert_eq!(page.total_size(), 5);
    assert_eq!(page.page(), 3);
    assert_eq!(page.items()[0].get::<i64>(0).unwrap(), 5);
}

#[test]
fn test_page_beyond_total_skips_data_query() {
    let provider = provider_for(cats(3));
    let mut pcb = factory().create("Cat").unwrap().page(10, 5).unwrap();
    let page = pcb.get_result_list(&provider).unwrap();

    assert!(page.is_empty());
    assert_eq!(page.total_size(), 3);
    assert_eq!(provider.queries().len(), 2);
}

#[test]
fn test_empty_result_runs_only_count_query() {
    let provider = provider_for(Vec::new());
    let mut pcb = factory().create("Cat").unwrap().page(0, 10).unwrap();
    let page = pcb.get_result_list(&provider).unwrap();

    assert!(page.is_empty());
    assert_eq!(page.total_size(), 0);
    assert_eq!(provider.queries().len(), 1);
}

#[test]
fn test_collection_join_counts_distinct_ids() {
    let provider = provider_for(cats(2));
    let mut pcb = factory().create_with_alias("Cat", "c").unwrap().page(0, 10).unwrap();
    pcb.left_join("c.kittens", "k")
        .unwrap()
        .filter(restrict("k.name").like("A%"))
        .unwrap();
    pcb.get_result_list(&provider).unwrap();

    assert_eq!(
        provider.queries()[0].query_string,
        "SELECT COUNT(DISTINCT c.id) FROM Cat c LEFT JOIN c.kittens k WHERE k.name LIKE 'A%'"
    );
}

#[test]
fn test_collection_join_keeps_page_within_size() {
    let provider = provider_with_kittens(cats(5), 2);
    let mut pcb = factory().create_with_alias("Cat", "c").unwrap().page(0, 2).unwrap();
    pcb.select("c.id")
        .unwrap()
        .left_join("c.kittens", "k")
        .unwrap()
        .filter(restrict("k.name").like("A%"))
        .unwrap();
    let page = pcb.get_result_list(&provider).unwrap();

    let queries = provider.queries();
    let ids = match queries[2].parameter("ids") {
        Some(ParameterValue::List(ids)) => ids.len(),
        other => panic!("expected bound ids, got {other:?}"),
    };
    assert!(page.size() <= 2);
    assert_eq!(page.size(), ids);
    assert_eq!(
        queries[2].query_string,
        "SELECT DISTINCT c.id FROM Cat c LEFT JOIN c.kittens k WHERE k.name LIKE 'A%' AND c.id IN (:ids)"
    );
}

#[test]
fn test_provider_error_is_passed_through() {
    let provider = MockProvider::new();
    provider.append_query_errors(vec!["connection reset"]);
    let mut pcb = factory().create("Cat").unwrap().page(0, 10).unwrap();
    match pcb.get_result_list(&provider) {
        Err(CriteriaError::Provider(e)) => assert_eq!(e.to_string(), "connection reset"),
        other => panic!("expected provider error, got {other:?}"),
    }
}
