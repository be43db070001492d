//! Deduplicated per-URL element index.
//!
//! Every source of element sightings (local crawl, plugin pages, worker
//! sitreps) feeds the same registry, and the partitioner reads nothing else.
//! Updates are set unions, so they commute and may arrive in any order.

use crate::crawl::types::Page;

use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet, HashSet};

pub struct ElementRegistry {
    entries: DashMap<String, HashSet<String>>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Unions the given identifiers into each URL's entry, creating it if
    /// absent. Never removes anything.
    pub fn record<U, I>(&self, url_to_ids: U)
    where
        U: IntoIterator<Item = (String, I)>,
        I: IntoIterator<Item = String>,
    {
        for (url, ids) in url_to_ids {
            self.entries.entry(url).or_default().extend(ids);
        }
    }

    pub fn record_page(&self, page: &Page) {
        self.entries
            .entry(page.url.clone())
            .or_default()
            .extend(page.elements.iter().cloned());
    }

    /// Ordered copy used as the frozen input of a partitioning pass.
    pub fn snapshot(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.value().iter().cloned().collect()))
            .collect()
    }

    pub fn elements_for(&self, url: &str) -> BTreeSet<String> {
        self.entries
            .get(url)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn contains(&self, url: &str, id: &str) -> bool {
        self.entries
            .get(url)
            .map(|ids| ids.contains(id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct element identifiers across all URLs.
    pub fn element_count(&self) -> usize {
        let mut all = HashSet::new();
        for entry in self.entries.iter() {
            all.extend(entry.value().iter().cloned());
        }
        all.len()
    }
}

impl Default for ElementRegistry {
    fn default() -> Self {
        Self::new()
    }
}
