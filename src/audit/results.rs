use super::types::Issue;

use dashmap::DashMap;
use std::collections::{BTreeSet, HashMap};

/// Shared results registry. Findings are deduplicated by identity, so the
/// same issue reported by two participants is kept once.
pub struct IssueStore {
    issues: DashMap<String, Issue>,
}

impl IssueStore {
    pub fn new() -> Self {
        Self {
            issues: DashMap::new(),
        }
    }

    /// Returns how many of `issues` were new.
    pub fn record(&self, issues: impl IntoIterator<Item = Issue>) -> usize {
        let mut added = 0;
        for issue in issues {
            if self.issues.insert(issue.identity(), issue).is_none() {
                added += 1;
            }
        }
        added
    }

    /// All findings, most severe first.
    pub fn all(&self) -> Vec<Issue> {
        let mut issues: Vec<Issue> = self.issues.iter().map(|e| e.value().clone()).collect();
        issues.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.identity().cmp(&b.identity()))
        });
        issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

impl Default for IssueStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Platform fingerprints per URL, accumulated by set union.
pub struct PlatformStore {
    platforms: DashMap<String, BTreeSet<String>>,
}

impl PlatformStore {
    pub fn new() -> Self {
        Self {
            platforms: DashMap::new(),
        }
    }

    pub fn update(&self, platforms: HashMap<String, Vec<String>>) {
        for (url, found) in platforms {
            self.platforms.entry(url).or_default().extend(found);
        }
    }

    pub fn get(&self, url: &str) -> BTreeSet<String> {
        self.platforms
            .get(url)
            .map(|p| p.value().clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }
}

impl Default for PlatformStore {
    fn default() -> Self {
        Self::new()
    }
}
