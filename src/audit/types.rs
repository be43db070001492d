use crate::crawl::types::Page;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Informational,
    Low,
    Medium,
    High,
}

/// A finding produced by a check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Issue {
    /// Name of the check that raised it.
    pub check: String,
    pub url: String,
    pub element: String,
    pub severity: Severity,
    pub description: String,
}

impl Issue {
    /// Identity used for deduplication: the same check flagging the same
    /// element of the same page is one finding, whoever reports it.
    pub fn identity(&self) -> String {
        format!("{}|{}|{}", self.check, self.url, self.element)
    }
}

/// Unit of work handed to every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInput {
    pub url: String,
    pub element: String,
}

/// What a participant is allowed to audit: these pages, and only the
/// elements listed in `elements`.
#[derive(Debug, Clone, Default)]
pub struct AuditScope {
    pub pages: Vec<Page>,
    pub elements: BTreeSet<String>,
}

impl AuditScope {
    /// `(page, element)` pairs inside the restriction, in page order. An
    /// element carried by several pages is audited once, on the first.
    pub fn work_items(&self) -> Vec<CheckInput> {
        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for page in &self.pages {
            for element in &page.elements {
                if !self.elements.contains(element) || !seen.insert(element.as_str()) {
                    continue;
                }
                items.push(CheckInput {
                    url: page.url.clone(),
                    element: element.clone(),
                });
            }
        }

        items
    }
}
