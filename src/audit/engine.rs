//! Audit Engine
//!
//! A fixed pool of tokio workers draining a shared queue of
//! `(page, element)` work items and running each through the check
//! registry. Used both for the master's own share and for a worker's
//! dispatched share.

use super::checks::CheckRegistry;
use super::types::{AuditScope, CheckInput, Issue};

use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// Per-element auditor as seen by the coordinator.
#[async_trait]
pub trait Auditor: Send + Sync {
    /// Audits exactly the elements allowed by `scope`.
    async fn audit(&self, scope: AuditScope) -> Result<Vec<Issue>>;
}

pub struct AuditEngine {
    checks: Arc<CheckRegistry>,
    worker_count: usize,
}

impl AuditEngine {
    pub fn new(checks: Arc<CheckRegistry>, worker_count: usize) -> Arc<Self> {
        Arc::new(Self {
            checks,
            worker_count: worker_count.max(1),
        })
    }

    async fn worker_loop(
        worker_id: usize,
        checks: Arc<CheckRegistry>,
        queue: Arc<Mutex<VecDeque<CheckInput>>>,
    ) -> Vec<Issue> {
        let mut issues = Vec::new();
        let mut processed = 0usize;

        loop {
            let Some(item) = queue.lock().await.pop_front() else {
                break;
            };

            tracing::trace!("Worker {} auditing {} on {}", worker_id, item.element, item.url);
            issues.extend(checks.run_all(&item).await);
            processed += 1;
        }

        tracing::debug!(
            "Audit worker {} finished: {} items, {} issues",
            worker_id,
            processed,
            issues.len()
        );
        issues
    }
}

#[async_trait]
impl Auditor for AuditEngine {
    async fn audit(&self, scope: AuditScope) -> Result<Vec<Issue>> {
        let items = scope.work_items();
        tracing::info!(
            "Auditing {} elements across {} pages with {} workers",
            items.len(),
            scope.pages.len(),
            self.worker_count
        );

        if items.is_empty() {
            return Ok(Vec::new());
        }

        let workers = self.worker_count.min(items.len());
        let queue = Arc::new(Mutex::new(VecDeque::from(items)));

        let mut set = JoinSet::new();
        for worker_id in 0..workers {
            let checks = self.checks.clone();
            let queue = queue.clone();
            set.spawn(Self::worker_loop(worker_id, checks, queue));
        }

        let mut issues = Vec::new();
        while let Some(joined) = set.join_next().await {
            issues.extend(joined?);
        }

        Ok(issues)
    }
}
