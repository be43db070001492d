//! Worker acquisition from resource brokers.
//!
//! - *Aggregated*: walk the brokers sharing this node's pipe id one after
//!   another and enroll whatever each hands out.
//! - *Balanced*: fire `max_workers` concurrent requests at the local broker
//!   and wait on a countdown latch until every one of them has resolved.

use super::latch::CountdownLatch;
use super::types::InstanceOffer;
use crate::coordinator::Coordinator;
use crate::rpc::protocol::{BROKER_ENDPOINT_DISPATCH, BROKER_ENDPOINT_LIST};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const BROKER_TIMEOUT: Duration = Duration::from_secs(5);

/// A broker known to the local broker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrokerInfo {
    pub url: String,
    #[serde(default)]
    pub pipe_id: Option<String>,
}

#[async_trait]
pub trait Broker: Send + Sync {
    /// URL of the broker this node talks to first.
    fn local_url(&self) -> &str;

    /// Every broker the local broker knows about, itself included.
    async fn list(&self) -> Result<Vec<BrokerInfo>>;

    /// Asks `broker_url` for one idle instance.
    async fn dispatch(&self, broker_url: &str) -> Result<InstanceOffer>;
}

pub struct HttpBroker {
    local_url: String,
    http_client: reqwest::Client,
}

impl HttpBroker {
    pub fn new(local_url: impl Into<String>) -> Self {
        Self {
            local_url: local_url.into().trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Broker for HttpBroker {
    fn local_url(&self) -> &str {
        &self.local_url
    }

    async fn list(&self) -> Result<Vec<BrokerInfo>> {
        let url = format!("{}{}", self.local_url, BROKER_ENDPOINT_LIST);
        let brokers = self
            .http_client
            .get(url)
            .timeout(BROKER_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(brokers)
    }

    async fn dispatch(&self, broker_url: &str) -> Result<InstanceOffer> {
        let url = format!("{}{}", broker_url.trim_end_matches('/'), BROKER_ENDPOINT_DISPATCH);
        let offer = self
            .http_client
            .post(url)
            .timeout(BROKER_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(offer)
    }
}

impl Coordinator {
    /// Fills the roster from the configured broker. Returns the roster
    /// size afterwards.
    pub async fn acquire_workers(self: &Arc<Self>) -> Result<usize> {
        let Some(broker) = self.broker.clone() else {
            tracing::info!("No broker configured, continuing without workers");
            return Ok(self.roster.len().await);
        };

        if self.grid_options().aggregate {
            self.acquire_aggregated(broker).await?;
        } else {
            self.acquire_balanced(broker).await;
        }

        Ok(self.roster.len().await)
    }

    async fn acquire_aggregated(self: &Arc<Self>, broker: Arc<dyn Broker>) -> Result<()> {
        let grid = self.grid_options().clone();
        let brokers = broker.list().await?;

        let matching: Vec<BrokerInfo> = brokers
            .iter()
            .filter(|b| grid.pipe_id.is_none() || b.pipe_id == grid.pipe_id)
            .cloned()
            .collect();
        let candidates = if matching.is_empty() {
            tracing::warn!("No broker shares pipe id {:?}, using all brokers", grid.pipe_id);
            brokers
        } else {
            matching
        };

        let mut enrolled = 0usize;
        for info in candidates {
            if grid.max_workers > 0 && enrolled >= grid.max_workers {
                break;
            }

            let offer = match broker.dispatch(&info.url).await {
                Ok(offer) => offer,
                Err(e) => {
                    tracing::warn!("Broker {} had nothing to offer: {}", info.url, e);
                    continue;
                }
            };

            match self.enslave(offer).await {
                Ok(handle) => {
                    if handle.wait().await {
                        enrolled += 1;
                    }
                }
                Err(e) => tracing::warn!("Broker {} offered an unusable instance: {}", info.url, e),
            }
        }

        Ok(())
    }

    async fn acquire_balanced(self: &Arc<Self>, broker: Arc<dyn Broker>) {
        let wanted = self.grid_options().max_workers;
        let latch = Arc::new(CountdownLatch::new(wanted));
        tracing::info!("Requesting {} workers from {}", wanted, broker.local_url());

        for _ in 0..wanted {
            let this = self.clone();
            let broker = broker.clone();
            let latch = latch.clone();
            tokio::spawn(async move {
                let enrolled = match broker.dispatch(broker.local_url()).await {
                    Ok(offer) => match this.enslave(offer).await {
                        Ok(handle) => handle.wait().await,
                        Err(e) => {
                            tracing::warn!("Broker offered an unusable instance: {}", e);
                            false
                        }
                    },
                    Err(e) => {
                        tracing::warn!("Broker dispatch failed: {}", e);
                        false
                    }
                };
                if !enrolled {
                    tracing::debug!("One balanced enrollment did not complete");
                }
                latch.count_down();
            });
        }

        latch.wait().await;
    }
}
