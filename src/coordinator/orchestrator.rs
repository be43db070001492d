//! Distributed Run Orchestrator
//!
//! Drives a master scan end to end:
//! `idle → enrolling → crawling → distributing → auditing → done`.
//!
//! The crawl runs under the configured limits; they are divided across
//! the participants afterwards, before the shares are dispatched.
//!
//! Distribution marks every dispatched worker as running before any
//! dispatch goes out and before the local audit starts, so the completion
//! barrier can never observe a finished local audit next to a running set
//! that is still being filled.

use super::Coordinator;
use super::types::{RunPhase, RunReport};
use crate::audit::types::AuditScope;
use crate::crawl::types::Page;
use crate::error::GridError;
use crate::membership::guard::Promotion;
use crate::membership::types::InstanceInfo;
use crate::workload::partitioner::{Partition, partition};

use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::task::JoinSet;

const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(200);

impl Coordinator {
    /// Runs a master scan and resolves once teardown has happened.
    pub async fn run(self: &Arc<Self>) -> Result<RunReport> {
        self.wait_while_paused().await;

        if let Promotion::Refused { master } = self.promote_to_master().await {
            return Err(GridError::PromotionRefused { master }.into());
        }

        self.set_phase(RunPhase::Enrolling);
        if self.grid_options().enabled {
            let enrolled = self.acquire_workers().await?;
            tracing::info!("Broker acquisition enrolled {} workers", enrolled);
        }

        let workers = self.roster.workers().await;

        self.set_phase(RunPhase::Crawling);
        let options = self.options().await;
        self.spider.set_peers(workers.clone()).await;
        let pages = self.spider.crawl(&options).await?;
        for page in &pages {
            self.record_local_page(page, options.fingerprint);
        }
        tracing::info!(
            "Crawl complete: {} pages, {} URLs and {} elements registered",
            pages.len(),
            self.registry.len(),
            self.registry.element_count()
        );

        // The master crawls under the full limits; only the shares handed
        // out from here on are bounded by the split ceilings.
        self.apportion_limits(&workers).await;

        // Partitioning and dispatch run on their own task, leaving the
        // runtime free to serve incoming sitreps meanwhile.
        let this = self.clone();
        tokio::spawn(async move { this.distribute(workers).await }).await??;

        let mut phase = self.subscribe_phase();
        phase.wait_for(|p| *p == RunPhase::Done).await?;

        Ok(RunReport {
            workers: self.roster.len().await,
            urls: self.registry.len(),
            elements: self.registry.element_count(),
            issues: self.issues.all(),
        })
    }

    async fn wait_while_paused(&self) {
        while self.is_paused() {
            tokio::time::sleep(PAUSE_POLL_INTERVAL).await;
        }
    }

    /// Divides the configured ceilings across every participant and pushes
    /// the result to each worker.
    async fn apportion_limits(&self, workers: &[InstanceInfo]) {
        let participants = workers.len() + 1;
        let options = self.options.read().await.split_limits(participants);
        *self.options.write().await = options.clone();

        tracing::info!(
            "Limits per participant ({}): links={:?} requests={:?}",
            participants,
            options.link_count_limit,
            options.http_request_limit
        );

        let mut set = JoinSet::new();
        for worker in workers.iter().cloned() {
            let client = self.client.clone();
            let options = options.clone();
            set.spawn(async move {
                let result = client.configure(&worker, &options).await;
                (worker, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((worker, Err(e))) => {
                    tracing::warn!("Failed to push options to {}: {}", worker.url, e);
                }
                Err(e) => tracing::error!("Options push task failed: {}", e),
            }
        }
    }

    fn record_local_page(&self, page: &Page, fingerprint: bool) {
        self.registry.record_page(page);
        if fingerprint && !page.platforms.is_empty() {
            self.platforms
                .update([(page.url.clone(), page.platforms.clone())].into());
        }
    }

    async fn distribute(self: Arc<Self>, workers: Vec<InstanceInfo>) -> Result<()> {
        self.set_phase(RunPhase::Distributing);

        let queued = self.drain_queued_pages().await;
        for page in &queued {
            self.registry.record_page(page);
        }

        if self.registry.element_count() == 0 {
            tracing::info!("No elements discovered, nothing to audit");
            self.teardown().await;
            return Ok(());
        }

        let participants = workers.len() + 1;
        let snapshot = self.registry.snapshot();
        let partitions =
            tokio::task::spawn_blocking(move || partition(&snapshot, &queued, participants))
                .await?;

        tracing::info!(
            "Workload: {} URLs, {} elements, {} queued pages across {} participants",
            self.registry.len(),
            self.registry.element_count(),
            partitions.iter().map(|p| p.pages.len()).sum::<usize>(),
            participants
        );

        let mut partitions = partitions.into_iter();
        let local = partitions.next().unwrap_or_default();
        tracing::info!(
            "  - self ({}): {} URLs, {} elements, {} pages",
            self.self_url(),
            local.urls.len(),
            local.elements.len(),
            local.pages.len()
        );

        let mut assignments = Vec::new();
        for (worker, share) in workers.into_iter().zip(partitions) {
            if share.is_empty() {
                tracing::info!("  - {}: nothing assigned", worker.url);
                continue;
            }
            tracing::info!(
                "  - {}: {} URLs, {} elements, {} pages",
                worker.url,
                share.urls.len(),
                share.elements.len(),
                share.pages.len()
            );
            assignments.push((worker, share));
        }

        {
            let mut tracker = self.tracker.lock().await;
            for (worker, _) in &assignments {
                tracker.mark_running(&worker.url);
            }
        }

        self.dispatch(assignments);
        self.audit_locally(local).await;
        Ok(())
    }

    /// Sends each worker its share. A failed dispatch leaves the worker
    /// running, which stalls the barrier.
    fn dispatch(&self, assignments: Vec<(InstanceInfo, Partition)>) {
        let mut set = JoinSet::new();
        for (worker, share) in assignments {
            let client = self.client.clone();
            set.spawn(async move {
                let result = client.dispatch(&worker, &share).await;
                (worker, result)
            });
        }

        tokio::spawn(async move {
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((worker, Ok(()))) => tracing::debug!("Dispatched to {}", worker.url),
                    Ok((worker, Err(e))) => {
                        tracing::error!("Dispatch to {} failed: {}", worker.url, e);
                    }
                    Err(e) => tracing::error!("Dispatch task failed: {}", e),
                }
            }
        });
    }

    /// Audits partition 0, then marks the local audit finished.
    async fn audit_locally(self: &Arc<Self>, local: Partition) {
        self.set_phase(RunPhase::Auditing);

        let scope = self.local_scope(&local);
        self.options.write().await.restrict_paths = local.urls.clone();
        self.set_assignment(local).await;

        match self.auditor.audit(scope).await {
            Ok(issues) => {
                let added = self.issues.record(issues);
                tracing::info!("Local audit finished with {} new issues", added);
            }
            Err(e) => tracing::error!("Local audit failed: {}", e),
        }

        self.tracker.lock().await.mark_local_audit_done();
        self.evaluate_barrier().await;
    }

    /// Pages for the local URL chunk rebuilt from the registry, plus the
    /// local page chunk, restricted to the local element set.
    fn local_scope(&self, local: &Partition) -> AuditScope {
        let mut pages: Vec<Page> = local
            .urls
            .iter()
            .map(|url| {
                let elements = self.registry.elements_for(url).into_iter().collect();
                Page::new(url.clone(), elements)
            })
            .collect();
        pages.extend(local.pages.iter().cloned());

        AuditScope {
            pages,
            elements: local.elements.clone(),
        }
    }

    /// Runs once: tells every worker to shut down and publishes `Done`.
    pub async fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let workers = self.roster.workers().await;
        for worker in &workers {
            if let Err(e) = self.client.shutdown(worker).await {
                tracing::warn!("Failed to shut down {}: {}", worker.url, e);
            }
        }

        tracing::info!(
            "Teardown: {} workers released, {} URLs, {} elements, {} issues",
            workers.len(),
            self.registry.len(),
            self.registry.element_count(),
            self.issues.len()
        );
        self.set_phase(RunPhase::Done);
    }
}
