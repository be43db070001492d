//! Slave side of the grid protocol.

use super::Coordinator;
use super::types::RunPhase;
use crate::audit::types::AuditScope;
use crate::config::ScanOptions;
use crate::crawl::types::Page;
use crate::membership::types::MasterLink;
use crate::rpc::protocol::{Sitrep, SitrepRequest};
use crate::workload::partitioner::Partition;

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

impl Coordinator {
    /// Accepts `master` as authoritative. Refused when this node is a
    /// master itself or already reports elsewhere.
    pub async fn accept_master(&self, master: MasterLink) -> bool {
        let url = master.url.clone();
        let accepted = self.guard.set_master(master).await;
        if accepted {
            tracing::info!("Now reporting to master {}", url);
        } else {
            tracing::warn!("Refused master {}", url);
        }
        accepted
    }

    /// Replaces the scan options with those pushed by the master.
    pub async fn configure(&self, options: ScanOptions) {
        tracing::debug!("Options updated: {:?}", options);
        *self.options.write().await = options;
    }

    /// Starts working on a dispatched partition in the background.
    pub async fn accept_assignment(self: &Arc<Self>, assignment: Partition) -> bool {
        let Some(master) = self.guard.master().await else {
            tracing::warn!("Dispatch received without a master, ignoring");
            return false;
        };

        tracing::info!(
            "Assigned {} URLs, {} elements, {} pages by {}",
            assignment.urls.len(),
            assignment.elements.len(),
            assignment.pages.len(),
            master.url
        );

        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.run_assignment(master, assignment).await {
                tracing::error!("Assignment failed: {}", e);
            }
        });
        true
    }

    /// Fetches the assigned paths, reports what they contain, audits the
    /// allowed elements and reports the findings with `audit_done`.
    pub async fn run_assignment(&self, master: MasterLink, assignment: Partition) -> Result<()> {
        self.set_assignment(assignment.clone()).await;

        let options = {
            let mut options = self.options.write().await;
            options.restrict_paths = assignment.urls.clone();
            options.clone()
        };

        self.set_phase(RunPhase::Crawling);
        let mut pages = if assignment.urls.is_empty() {
            Vec::new()
        } else {
            self.spider.crawl(&options).await.unwrap_or_else(|e| {
                tracing::warn!("Crawl of assigned paths failed: {}", e);
                Vec::new()
            })
        };
        pages.extend(assignment.pages.iter().cloned());

        for page in &pages {
            self.registry.record_page(page);
        }

        let crawl_report = Sitrep {
            crawl_done: true,
            elements: Some(elements_by_url(&pages)),
            ..Default::default()
        };
        if let Err(e) = self.send_sitrep(&master, crawl_report).await {
            tracing::warn!("Crawl sitrep to {} failed: {}", master.url, e);
        }

        self.set_phase(RunPhase::Auditing);
        let scope = AuditScope {
            pages: pages.clone(),
            elements: assignment.elements,
        };
        let issues = self.auditor.audit(scope).await.unwrap_or_else(|e| {
            tracing::error!("Audit failed: {}", e);
            Vec::new()
        });
        self.issues.record(issues.clone());

        let platforms = if options.fingerprint {
            Some(platforms_by_url(&pages))
        } else {
            None
        };

        self.send_sitrep(
            &master,
            Sitrep {
                audit_done: true,
                issues: Some(issues),
                platforms,
                ..Default::default()
            },
        )
        .await?;

        self.set_phase(RunPhase::Done);
        Ok(())
    }

    async fn send_sitrep(&self, master: &MasterLink, data: Sitrep) -> Result<()> {
        let request = SitrepRequest {
            data,
            url: self.self_url().to_string(),
            token: master.token.as_str().to_string(),
        };

        if !self.client.report_sitrep(master, &request).await? {
            tracing::warn!("Master {} rejected sitrep", master.url);
        }
        Ok(())
    }
}

fn elements_by_url(pages: &[Page]) -> HashMap<String, Vec<String>> {
    let mut elements: HashMap<String, Vec<String>> = HashMap::new();
    for page in pages {
        let entry = elements.entry(page.url.clone()).or_default();
        for id in &page.elements {
            if !entry.contains(id) {
                entry.push(id.clone());
            }
        }
    }
    elements
}

fn platforms_by_url(pages: &[Page]) -> HashMap<String, Vec<String>> {
    pages
        .iter()
        .filter(|p| !p.platforms.is_empty())
        .map(|p| (p.url.clone(), p.platforms.clone()))
        .collect()
}
