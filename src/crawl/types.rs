use serde::{Deserialize, Serialize};

/// A crawled page as far as the grid cares: where it lives and which
/// auditable elements it carries.
///
/// Element IDs are opaque to everything but the spider and the checks;
/// they are unique within a page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    pub url: String,
    pub elements: Vec<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
}

impl Page {
    pub fn new(url: impl Into<String>, elements: Vec<String>) -> Self {
        Self {
            url: url.into(),
            elements,
            platforms: Vec::new(),
        }
    }
}
