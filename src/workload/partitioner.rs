//! Workload partitioning across the master and its workers.
//!
//! Splitting happens over URLs, not elements: all elements of a page stay
//! with one participant, at the cost of uneven element counts when element
//! density varies between pages.

use crate::crawl::types::Page;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// One participant's share of the work.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Partition {
    pub urls: Vec<String>,
    pub elements: BTreeSet<String>,
    pub pages: Vec<Page>,
}

impl Partition {
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty() && self.pages.is_empty()
    }
}

/// Contiguous, order-preserving split into exactly `n` chunks whose sizes
/// differ by at most one. Leading chunks take the remainder.
pub fn split_evenly<T: Clone>(items: &[T], n: usize) -> Vec<Vec<T>> {
    let n = n.max(1);
    let base = items.len() / n;
    let extra = items.len() % n;

    let mut chunks = Vec::with_capacity(n);
    let mut start = 0;
    for i in 0..n {
        let size = base + usize::from(i < extra);
        chunks.push(items[start..start + size].to_vec());
        start += size;
    }
    chunks
}

pub fn split_urls(urls: &[String], n: usize) -> Vec<Vec<String>> {
    split_evenly(urls, n)
}

pub fn split_pages(pages: &[Page], n: usize) -> Vec<Vec<Page>> {
    split_evenly(pages, n)
}

/// Element set of each URL chunk.
///
/// An identifier sighted under URLs that landed in different chunks goes
/// to the first such chunk only, so the returned sets are pairwise
/// disjoint and their union is every identifier in `registry`.
pub fn distribute_elements(
    url_chunks: &[Vec<String>],
    registry: &BTreeMap<String, BTreeSet<String>>,
) -> Vec<BTreeSet<String>> {
    let mut claimed: HashSet<&str> = HashSet::new();

    url_chunks
        .iter()
        .map(|chunk| {
            let mut elements = BTreeSet::new();
            for url in chunk {
                let Some(ids) = registry.get(url) else {
                    continue;
                };
                for id in ids {
                    if claimed.insert(id.as_str()) {
                        elements.insert(id.clone());
                    }
                }
            }
            elements
        })
        .collect()
}

/// Builds `participants` partitions from a registry snapshot and the
/// extra page objects queued during the crawl. Partition 0 belongs to the
/// master, partition i to the (i-1)-th enrolled worker.
pub fn partition(
    registry: &BTreeMap<String, BTreeSet<String>>,
    pages: &[Page],
    participants: usize,
) -> Vec<Partition> {
    let urls: Vec<String> = registry.keys().cloned().collect();

    let url_chunks = split_urls(&urls, participants);
    let element_chunks = distribute_elements(&url_chunks, registry);
    let page_chunks = split_pages(pages, participants);

    url_chunks
        .into_iter()
        .zip(element_chunks)
        .zip(page_chunks)
        .map(|((urls, elements), pages)| Partition {
            urls,
            elements,
            pages,
        })
        .collect()
}
