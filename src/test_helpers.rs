//! In-memory [`QueryProvider`] for tests.
//!
//! `MockProvider` answers queries from a queue of prepared results, in the
//! order they are executed, or from a handler closure. Every executed query
//! is recorded so tests can assert on query strings, bindings and windows.
//!
//! ```
//! use lifeguard_criteria::test_helpers::MockProvider;
//! use lifeguard_criteria::{QueryProvider, Tuple, TypedQuery};
//! use sea_query::Value;
//!
//! let provider = MockProvider::new();
//! provider.append_query_results(vec![vec![Tuple::new(vec![Value::from(5i64)])]]);
//!
//! let rows = provider.get_result_list(&TypedQuery::new("SELECT COUNT(*) FROM Cat cat")).unwrap();
//! assert_eq!(rows.len(), 1);
//! assert_eq!(provider.queries()[0].query_string, "SELECT COUNT(*) FROM Cat cat");
//! ```

use crate::provider::{ProviderError, QueryProvider, Tuple, TypedQuery};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

type QueryHandler = Box<dyn Fn(&TypedQuery) -> Result<Vec<Tuple>, ProviderError> + Send + Sync>;
type NativeSqlHandler = Box<dyn Fn(&str) -> Result<String, ProviderError> + Send + Sync>;

/// Provider returning prepared results
pub struct MockProvider {
    results: Mutex<VecDeque<Result<Vec<Tuple>, String>>>,
    queries: Mutex<Vec<TypedQuery>>,
    native_sql_calls: Mutex<usize>,
    handler: Option<QueryHandler>,
    native_sql: Option<NativeSqlHandler>,
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("pending_results", &lock(&self.results).len())
            .field("queries", &lock(&self.queries).len())
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            queries: Mutex::new(Vec::new()),
            native_sql_calls: Mutex::new(0),
            handler: None,
            native_sql: None,
        }
    }

    /// Answer every query with `handler` instead of the result queue
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&TypedQuery) -> Result<Vec<Tuple>, ProviderError> + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Translate query strings with `translate`; without it the query string
    /// is returned unchanged
    pub fn with_native_sql<F>(mut self, translate: F) -> Self
    where
        F: Fn(&str) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        self.native_sql = Some(Box::new(translate));
        self
    }

    /// Queue one result set per future query
    pub fn append_query_results(&self, results: Vec<Vec<Tuple>>) -> &Self {
        lock(&self.results).extend(results.into_iter().map(Ok));
        self
    }

    /// Queue one failure per future query
    pub fn append_query_errors(&self, errors: Vec<impl Into<String>>) -> &Self {
        lock(&self.results).extend(errors.into_iter().map(|e| Err(e.into())));
        self
    }

    /// Every query executed so far, in order
    pub fn queries(&self) -> Vec<TypedQuery> {
        lock(&self.queries).clone()
    }

    /// Number of native SQL translations performed
    pub fn native_sql_calls(&self) -> usize {
        *lock(&self.native_sql_calls)
    }
}

impl QueryProvider for MockProvider {
    fn get_result_list(&self, query: &TypedQuery) -> Result<Vec<Tuple>, ProviderError> {
        lock(&self.queries).push(query.clone());
        if let Some(handler) = &self.handler {
            return handler(query);
        }
        match lock(&self.results).pop_front() {
            Some(Ok(rows)) => Ok(rows),
            Some(Err(message)) => Err(message.into()),
            None => Err(format!("No mock result prepared for query: {}", query.query_string).into()),
        }
    }

    fn native_sql(&self, query_string: &str) -> Result<String, ProviderError> {
        *lock(&self.native_sql_calls) += 1;
        match &self.native_sql {
            Some(translate) => translate(query_string),
            None => Ok(query_string.to_string()),
        }
    }
}
