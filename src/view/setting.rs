//! Per-request view settings.

use crate::view::filter::AttributeFilter;
use std::sync::Arc;

/// Which view to load, how to filter and sort it and which page to fetch
///
/// Attribute names are view field paths (`name`, `owner.name`).
#[derive(Debug, Clone)]
pub struct EntityViewSetting {
    view: String,
    first_result: Option<u64>,
    max_results: Option<u64>,
    filters: Vec<(String, Arc<dyn AttributeFilter>)>,
    sorters: Vec<(String, bool)>,
}

impl EntityViewSetting {
    /// Setting loading every matching view
    pub fn new(view: impl Into<String>) -> Self {
        Self {
            view: view.into(),
            first_result: None,
            max_results: None,
            filters: Vec::new(),
            sorters: Vec::new(),
        }
    }

    /// Setting loading one page of `max_results` views starting at `first_result`
    pub fn paginated(view: impl Into<String>, first_result: u64, max_results: u64) -> Self {
        Self {
            first_result: Some(first_result),
            max_results: Some(max_results),
            ..Self::new(view)
        }
    }

    pub fn add_attribute_filter(&mut self, attribute: &str, filter: impl AttributeFilter + 'static) -> &mut Self {
        self.filters.push((attribute.to_string(), Arc::new(filter)));
        self
    }

    /// Order by a view attribute, nulls last
    pub fn add_attribute_sorter(&mut self, attribute: &str, ascending: bool) -> &mut Self {
        self.sorters.push((attribute.to_string(), ascending));
        self
    }

    pub fn view(&self) -> &str {
        &self.view
    }

    pub fn is_paginated(&self) -> bool {
        self.max_results.is_some()
    }

    pub fn first_result(&self) -> u64 {
        self.first_result.unwrap_or(0)
    }

    pub fn max_results(&self) -> Option<u64> {
        self.max_results
    }

    pub fn filters(&self) -> &[(String, Arc<dyn AttributeFilter>)] {
        &self.filters
    }

    pub fn sorters(&self) -> &[(String, bool)] {
        &self.sorters
    }
}
