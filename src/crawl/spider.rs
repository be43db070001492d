use super::extract::{extract, fingerprint, same_origin};
use super::types::Page;
use crate::config::ScanOptions;
use crate::membership::types::InstanceInfo;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashSet;
use reqwest::Url;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::RwLock;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Crawler as seen by the coordinator.
#[async_trait]
pub trait Spider: Send + Sync {
    /// Crawls according to `options` and returns every page found.
    ///
    /// With non-empty `restrict_paths` exactly those paths are fetched and
    /// no links are followed.
    async fn crawl(&self, options: &ScanOptions) -> Result<Vec<Page>>;

    /// Peer workers the spider may share discovered paths with.
    async fn set_peers(&self, peers: Vec<InstanceInfo>);

    /// A peer finished its own crawl.
    async fn peer_done(&self, peer_url: &str);
}

/// Same-origin breadth-first HTTP crawler.
pub struct HttpSpider {
    client: reqwest::Client,
    peers: RwLock<Vec<InstanceInfo>>,
    peers_done: DashSet<String>,
}

impl HttpSpider {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            peers: RwLock::new(Vec::new()),
            peers_done: DashSet::new(),
        }
    }

    async fn fetch(&self, url: &Url, options: &ScanOptions) -> Result<(Page, Vec<Url>)> {
        let response = self
            .client
            .get(url.clone())
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;

        let platforms = if options.fingerprint {
            fingerprint(response.headers())
        } else {
            Vec::new()
        };
        let body = response.text().await?;
        let extracted = extract(url, &body);

        let page = Page {
            url: url.to_string(),
            elements: extracted.elements,
            platforms,
        };

        Ok((page, extracted.links))
    }

    async fn fetch_restricted(&self, base: &Url, options: &ScanOptions) -> Vec<Page> {
        let mut pages = Vec::new();

        for path in &options.restrict_paths {
            let url = match base.join(path) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!("Skipping restricted path {}: {}", path, e);
                    continue;
                }
            };

            match self.fetch(&url, options).await {
                Ok((page, _)) => pages.push(page),
                Err(e) => tracing::warn!("Failed to fetch {}: {}", url, e),
            }
        }

        pages
    }
}

impl Default for HttpSpider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Spider for HttpSpider {
    async fn crawl(&self, options: &ScanOptions) -> Result<Vec<Page>> {
        let target = options
            .target
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No target configured"))?;
        let base = Url::parse(target)?;

        if !options.restrict_paths.is_empty() {
            tracing::info!("Fetching {} restricted paths", options.restrict_paths.len());
            return Ok(self.fetch_restricted(&base, options).await);
        }

        let link_limit = options.link_count_limit.unwrap_or(usize::MAX);
        let request_limit = options.http_request_limit.unwrap_or(usize::MAX);

        let mut queue = VecDeque::from([base.clone()]);
        let mut seen = HashSet::from([base.to_string()]);
        let mut pages = Vec::new();
        let mut requests = 0usize;

        while let Some(url) = queue.pop_front() {
            if pages.len() >= link_limit || requests >= request_limit {
                tracing::info!("Crawl limit reached after {} requests", requests);
                break;
            }
            requests += 1;

            match self.fetch(&url, options).await {
                Ok((page, links)) => {
                    for link in links {
                        if same_origin(&base, &link) && seen.insert(link.to_string()) {
                            queue.push_back(link);
                        }
                    }
                    tracing::debug!("Crawled {} ({} elements)", page.url, page.elements.len());
                    pages.push(page);
                }
                Err(e) => tracing::warn!("Failed to fetch {}: {}", url, e),
            }
        }

        Ok(pages)
    }

    async fn set_peers(&self, peers: Vec<InstanceInfo>) {
        tracing::info!("Spider registered {} peers", peers.len());
        *self.peers.write().await = peers;
    }

    async fn peer_done(&self, peer_url: &str) {
        self.peers_done.insert(peer_url.to_string());
        tracing::info!(
            "Peer {} finished crawling ({}/{} peers done)",
            peer_url,
            self.peers_done.len(),
            self.peers.read().await.len()
        );
    }
}
