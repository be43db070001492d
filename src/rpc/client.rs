use super::protocol::{
    ENDPOINT_CONFIGURE, ENDPOINT_DISPATCH, ENDPOINT_SET_MASTER, ENDPOINT_SHUTDOWN, ENDPOINT_SITREP,
    INSTANCE_TOKEN_HEADER, ReportResponse, SetMasterRequest, SitrepRequest,
};
use crate::config::ScanOptions;
use crate::membership::types::{InstanceInfo, MasterLink};
use crate::workload::partitioner::Partition;

use anyhow::{Result, bail};
use async_trait::async_trait;
use std::time::Duration;

const CALL_TIMEOUT: Duration = Duration::from_secs(2);
const DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);
const CALL_ATTEMPTS: usize = 3;

/// Outgoing remote calls, from a master to its workers and from a worker
/// back to its master.
#[async_trait]
pub trait InstanceClient: Send + Sync {
    /// Pushes scan options to a worker.
    async fn configure(&self, instance: &InstanceInfo, options: &ScanOptions) -> Result<()>;

    /// Tells a worker to treat `master` as authoritative. Fails if the
    /// worker refuses.
    async fn set_master(&self, instance: &InstanceInfo, master: &MasterLink) -> Result<()>;

    /// Hands a worker its partition.
    async fn dispatch(&self, instance: &InstanceInfo, assignment: &Partition) -> Result<()>;

    async fn shutdown(&self, instance: &InstanceInfo) -> Result<()>;

    /// Sends a sitrep to `master`; returns whether it was accepted.
    async fn report_sitrep(&self, master: &MasterLink, request: &SitrepRequest) -> Result<bool>;
}

pub struct HttpInstanceClient {
    http_client: reqwest::Client,
}

impl HttpInstanceClient {
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
        }
    }

    async fn post_with_retry<T: serde::Serialize>(
        &self,
        url: String,
        instance_token: Option<&str>,
        payload: &T,
        timeout: Duration,
        attempts: usize,
    ) -> Result<reqwest::Response> {
        let mut delay_ms = 150u64;

        for attempt in 0..attempts {
            let mut request = self.http_client.post(url.clone()).json(payload).timeout(timeout);
            if let Some(token) = instance_token {
                request = request.header(INSTANCE_TOKEN_HEADER, token);
            }

            match request.send().await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == attempts {
                        return Err(anyhow::anyhow!(e));
                    }
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(anyhow::anyhow!("Retry attempts exhausted"))
    }

    /// Calls a worker endpoint and requires `accepted: true`.
    async fn call_instance<T: serde::Serialize + Sync>(
        &self,
        instance: &InstanceInfo,
        endpoint: &str,
        payload: &T,
        timeout: Duration,
    ) -> Result<()> {
        let url = format!("{}{}", instance.url, endpoint);
        let resp = self
            .post_with_retry(url, Some(&instance.token), payload, timeout, CALL_ATTEMPTS)
            .await?
            .error_for_status()?;

        let reply: ReportResponse = resp.json().await?;
        if !reply.accepted {
            bail!("{} refused {}", instance.url, endpoint);
        }

        Ok(())
    }
}

impl Default for HttpInstanceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InstanceClient for HttpInstanceClient {
    async fn configure(&self, instance: &InstanceInfo, options: &ScanOptions) -> Result<()> {
        self.call_instance(instance, ENDPOINT_CONFIGURE, options, CALL_TIMEOUT)
            .await
    }

    async fn set_master(&self, instance: &InstanceInfo, master: &MasterLink) -> Result<()> {
        let req = SetMasterRequest::from(master);
        self.call_instance(instance, ENDPOINT_SET_MASTER, &req, CALL_TIMEOUT)
            .await
    }

    async fn dispatch(&self, instance: &InstanceInfo, assignment: &Partition) -> Result<()> {
        self.call_instance(instance, ENDPOINT_DISPATCH, assignment, DISPATCH_TIMEOUT)
            .await
    }

    async fn shutdown(&self, instance: &InstanceInfo) -> Result<()> {
        self.call_instance(instance, ENDPOINT_SHUTDOWN, &serde_json::json!({}), CALL_TIMEOUT)
            .await
    }

    async fn report_sitrep(&self, master: &MasterLink, request: &SitrepRequest) -> Result<bool> {
        let url = format!("{}{}", master.url, ENDPOINT_SITREP);
        let resp = self
            .post_with_retry(url, None, request, DISPATCH_TIMEOUT, CALL_ATTEMPTS)
            .await?
            .error_for_status()?;

        let reply: ReportResponse = resp.json().await?;
        Ok(reply.accepted)
    }
}
