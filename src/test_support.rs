//! In-process fakes for the transport, crawler, auditor and broker, so the
//! coordinator can be exercised without a network.

use crate::audit::engine::Auditor;
use crate::audit::types::{AuditScope, Issue, Severity};
use crate::config::{GridOptions, NodeConfig, ScanOptions};
use crate::coordinator::{Collaborators, Coordinator};
use crate::crawl::spider::Spider;
use crate::crawl::types::Page;
use crate::membership::broker::{Broker, BrokerInfo};
use crate::membership::types::{InstanceInfo, InstanceOffer, MasterLink};
use crate::rpc::client::InstanceClient;
use crate::rpc::protocol::SitrepRequest;
use crate::workload::partitioner::Partition;

use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Configure(String),
    SetMaster(String),
    Dispatch(String),
    Shutdown(String),
}

/// Records every outgoing call; instances listed in `refuse` fail
/// `set_master`.
#[derive(Default)]
pub struct FakeClient {
    pub calls: Mutex<Vec<Call>>,
    pub dispatched: Mutex<Vec<(String, Partition)>>,
    pub configured: Mutex<Vec<(String, ScanOptions)>>,
    pub masters: Mutex<Vec<(String, MasterLink)>>,
    pub sitreps: Mutex<Vec<SitrepRequest>>,
    pub refuse: Mutex<HashSet<String>>,
    /// Number of upcoming sitreps to fail at the transport level.
    pub failing_sitreps: Mutex<usize>,
}

impl FakeClient {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn dispatches(&self) -> Vec<(String, Partition)> {
        self.dispatched.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn refuse(&self, url: &str) {
        self.refuse.lock().unwrap().insert(url.to_string());
    }
}

#[async_trait]
impl InstanceClient for FakeClient {
    async fn configure(&self, instance: &InstanceInfo, options: &ScanOptions) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Configure(instance.url.clone()));
        self.configured
            .lock()
            .unwrap()
            .push((instance.url.clone(), options.clone()));
        Ok(())
    }

    async fn set_master(&self, instance: &InstanceInfo, master: &MasterLink) -> Result<()> {
        self.calls.lock().unwrap().push(Call::SetMaster(instance.url.clone()));
        if self.refuse.lock().unwrap().contains(&instance.url) {
            bail!("{} refused", instance.url);
        }
        self.masters
            .lock()
            .unwrap()
            .push((instance.url.clone(), master.clone()));
        Ok(())
    }

    async fn dispatch(&self, instance: &InstanceInfo, assignment: &Partition) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Dispatch(instance.url.clone()));
        self.dispatched
            .lock()
            .unwrap()
            .push((instance.url.clone(), assignment.clone()));
        Ok(())
    }

    async fn shutdown(&self, instance: &InstanceInfo) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Shutdown(instance.url.clone()));
        Ok(())
    }

    async fn report_sitrep(&self, master: &MasterLink, request: &SitrepRequest) -> Result<bool> {
        {
            let mut failing = self.failing_sitreps.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                bail!("{} unreachable", master.url);
            }
        }
        self.sitreps.lock().unwrap().push(request.clone());
        Ok(true)
    }
}

/// Returns canned pages and records peer notifications.
#[derive(Default)]
pub struct FakeSpider {
    pub pages: Mutex<Vec<Page>>,
    pub peers: Mutex<Vec<InstanceInfo>>,
    pub peers_done: Mutex<Vec<String>>,
    pub crawled_with: Mutex<Vec<ScanOptions>>,
}

impl FakeSpider {
    pub fn with_pages(pages: Vec<Page>) -> Self {
        Self {
            pages: Mutex::new(pages),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Spider for FakeSpider {
    async fn crawl(&self, options: &ScanOptions) -> Result<Vec<Page>> {
        self.crawled_with.lock().unwrap().push(options.clone());
        let pages = self.pages.lock().unwrap().clone();
        if options.restrict_paths.is_empty() {
            return Ok(pages);
        }
        Ok(pages
            .into_iter()
            .filter(|p| options.restrict_paths.contains(&p.url))
            .collect())
    }

    async fn set_peers(&self, peers: Vec<InstanceInfo>) {
        *self.peers.lock().unwrap() = peers;
    }

    async fn peer_done(&self, peer_url: &str) {
        self.peers_done.lock().unwrap().push(peer_url.to_string());
    }
}

/// Flags every element it is allowed to see and remembers each scope.
#[derive(Default)]
pub struct FakeAuditor {
    pub scopes: Mutex<Vec<AuditScope>>,
}

#[async_trait]
impl Auditor for FakeAuditor {
    async fn audit(&self, scope: AuditScope) -> Result<Vec<Issue>> {
        let issues = scope
            .work_items()
            .into_iter()
            .map(|item| Issue {
                check: "fake".to_string(),
                url: item.url,
                element: item.element,
                severity: Severity::Low,
                description: "seen".to_string(),
            })
            .collect();
        self.scopes.lock().unwrap().push(scope);
        Ok(issues)
    }
}

/// Broker handing out queued offers per broker URL.
pub struct FakeBroker {
    pub local: String,
    pub brokers: Vec<BrokerInfo>,
    pub offers: Mutex<HashMap<String, VecDeque<InstanceOffer>>>,
    pub dispatch_calls: Mutex<Vec<String>>,
}

impl FakeBroker {
    pub fn new(local: &str, brokers: Vec<BrokerInfo>) -> Self {
        Self {
            local: local.to_string(),
            brokers,
            offers: Mutex::new(HashMap::new()),
            dispatch_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn offer(&self, broker_url: &str, offer: InstanceOffer) {
        self.offers
            .lock()
            .unwrap()
            .entry(broker_url.to_string())
            .or_default()
            .push_back(offer);
    }

    pub fn dispatch_calls(&self) -> Vec<String> {
        self.dispatch_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Broker for FakeBroker {
    fn local_url(&self) -> &str {
        &self.local
    }

    async fn list(&self) -> Result<Vec<BrokerInfo>> {
        Ok(self.brokers.clone())
    }

    async fn dispatch(&self, broker_url: &str) -> Result<InstanceOffer> {
        self.dispatch_calls.lock().unwrap().push(broker_url.to_string());
        let next = self
            .offers
            .lock()
            .unwrap()
            .get_mut(broker_url)
            .and_then(|q| q.pop_front());
        match next {
            Some(offer) => Ok(offer),
            None => bail!("{} has no idle instances", broker_url),
        }
    }
}

/// A coordinator wired to fakes, plus handles on the fakes.
pub struct Harness {
    pub coordinator: Arc<Coordinator>,
    pub client: Arc<FakeClient>,
    pub spider: Arc<FakeSpider>,
    pub auditor: Arc<FakeAuditor>,
}

pub const MASTER_URL: &str = "http://127.0.0.1:7331";

pub fn harness(pages: Vec<Page>) -> Harness {
    harness_with(pages, ScanOptions::default(), GridOptions::default(), None)
}

pub fn harness_with(
    pages: Vec<Page>,
    options: ScanOptions,
    grid: GridOptions,
    broker: Option<Arc<dyn Broker>>,
) -> Harness {
    let client = Arc::new(FakeClient::default());
    let spider = Arc::new(FakeSpider::with_pages(pages));
    let auditor = Arc::new(FakeAuditor::default());

    let coordinator = Coordinator::new(
        NodeConfig {
            self_url: MASTER_URL.to_string(),
            instance_token: "instance-secret".to_string(),
            options,
            grid,
        },
        Collaborators {
            client: client.clone(),
            spider: spider.clone(),
            auditor: auditor.clone(),
            broker,
        },
    );

    Harness {
        coordinator,
        client,
        spider,
        auditor,
    }
}

pub fn offer(url: &str, token: &str) -> InstanceOffer {
    InstanceOffer {
        url: Some(url.to_string()),
        token: Some(token.to_string()),
    }
}

pub fn worker(url: &str) -> InstanceInfo {
    InstanceInfo {
        url: url.to_string(),
        token: format!("{}-token", url),
    }
}

pub fn page(url: &str, elements: &[&str]) -> Page {
    Page::new(url, elements.iter().map(|e| e.to_string()).collect())
}
