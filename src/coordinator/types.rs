use crate::audit::types::Issue;

use serde::{Deserialize, Serialize};

/// Where a node is in its distributed run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    #[default]
    Idle,
    Enrolling,
    Crawling,
    Distributing,
    Auditing,
    Done,
}

/// Summary returned by a master run once teardown has happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub workers: usize,
    pub urls: usize,
    pub elements: usize,
    pub issues: Vec<Issue>,
}
