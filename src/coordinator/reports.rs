//! Privileged entry points workers report through.
//!
//! Every call is gated by the access-control check first and answers
//! `false` on a token mismatch. None of them ever returns an error: the
//! caller is remote and possibly hostile.

use super::Coordinator;
use crate::audit::types::Issue;
use crate::rpc::protocol::Sitrep;

use std::collections::HashMap;
use std::sync::Arc;

impl Coordinator {
    async fn authorize(&self, call: &str, token: &str) -> bool {
        let ok = self.guard.check_privileged(token).await;
        if !ok {
            tracing::warn!("Rejected {} call: token mismatch", call);
        }
        ok
    }

    /// Records that `worker_url` finished, then re-evaluates the barrier.
    pub async fn report_done(self: &Arc<Self>, worker_url: &str, token: &str) -> bool {
        if !self.authorize("report_done", token).await {
            return false;
        }

        let first_report = self.tracker.lock().await.mark_done(worker_url);
        if first_report {
            tracing::info!("Worker {} reported done", worker_url);
        } else {
            tracing::debug!("Worker {} reported done again", worker_url);
        }

        self.evaluate_barrier().await;
        true
    }

    /// Forwards findings to the results store, which deduplicates them.
    pub async fn report_issues(&self, issues: Vec<Issue>, token: &str) -> bool {
        if !self.authorize("report_issues", token).await {
            return false;
        }

        let count = issues.len();
        let added = self.issues.record(issues);
        tracing::debug!("Received {} issues ({} new)", count, added);
        true
    }

    pub async fn update_elements(
        &self,
        elements: HashMap<String, Vec<String>>,
        token: &str,
    ) -> bool {
        if !self.authorize("update_elements", token).await {
            return false;
        }

        tracing::debug!("Element update for {} URLs", elements.len());
        self.registry.record(elements);
        true
    }

    /// Consolidated report; each present field is applied independently.
    pub async fn report_sitrep(
        self: &Arc<Self>,
        data: Sitrep,
        worker_url: &str,
        token: &str,
    ) -> bool {
        if !self.authorize("sitrep", token).await {
            return false;
        }

        if let Some(elements) = data.elements {
            self.registry.record(elements);
        }

        if let Some(issues) = data.issues {
            self.issues.record(issues);
        }

        if let Some(platforms) = data.platforms {
            if self.options.read().await.fingerprint {
                self.platforms.update(platforms);
            }
        }

        if data.crawl_done {
            self.spider.peer_done(worker_url).await;
        }

        if data.audit_done {
            return self.report_done(worker_url, token).await;
        }

        true
    }

    /// Fires teardown the first time the barrier holds.
    pub(crate) async fn evaluate_barrier(self: &Arc<Self>) {
        let fire = self.tracker.lock().await.evaluate();
        if fire {
            tracing::info!("All participants finished");
            self.teardown().await;
        }
    }
}
