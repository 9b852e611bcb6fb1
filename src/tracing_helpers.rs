//! Spans around provider round trips.

use tracing::{info_span, Span};

pub fn count_query_span() -> Span {
    info_span!("criteria.page_count_query")
}

pub fn id_query_span() -> Span {
    info_span!("criteria.page_id_query")
}

pub fn data_query_span() -> Span {
    info_span!("criteria.page_data_query")
}

/// Native rendering of one CTE body
pub fn specification_span(cte_name: &str) -> Span {
    info_span!("criteria.cte_specification", cte = %cte_name)
}
