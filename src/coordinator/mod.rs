//! Grid Coordinator Module
//!
//! One `Coordinator` per process owns every piece of distributed
//! bookkeeping: role and token, roster, element registry, completion
//! barrier and results. Request handlers and the run orchestrator all
//! reach it through an `Arc` handle; there is no ambient global state.
//!
//! ## Roles
//! - **Master**: enrolls workers, crawls, partitions the discovered
//!   workload, audits its own share and waits for every worker to report.
//! - **Slave**: accepts a master, audits the partition it is dispatched and
//!   reports back through sitreps.
//! - **Solo**: neither, until one of the above happens.
//!
//! ## Submodules
//! - **`tracker`**: level-triggered completion barrier.
//! - **`reports`**: token-gated entry points workers report through.
//! - **`orchestrator`**: the master's `idle → enrolling → crawling →
//!   distributing → auditing → done` sequence and teardown.
//! - **`worker`**: the slave side of the same protocol.

pub mod orchestrator;
pub mod reports;
pub mod tracker;
pub mod types;
pub mod worker;


use crate::audit::engine::Auditor;
use crate::audit::results::{IssueStore, PlatformStore};
use crate::config::{GridOptions, NodeConfig, ScanOptions};
use crate::crawl::spider::Spider;
use crate::crawl::types::Page;
use crate::membership::broker::Broker;
use crate::membership::guard::{Promotion, RoleGuard};
use crate::membership::roster::Roster;
use crate::rpc::client::InstanceClient;
use crate::rpc::protocol::StatusResponse;
use crate::workload::partitioner::Partition;
use crate::workload::registry::ElementRegistry;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock, watch};

use tracker::CompletionTracker;
use types::RunPhase;

/// The pluggable parts of a node: transport, crawler, auditor and an
/// optional broker.
pub struct Collaborators {
    pub client: Arc<dyn InstanceClient>,
    pub spider: Arc<dyn Spider>,
    pub auditor: Arc<dyn Auditor>,
    pub broker: Option<Arc<dyn Broker>>,
}

pub struct Coordinator {
    self_url: String,
    instance_token: String,
    grid: GridOptions,

    pub(crate) guard: RoleGuard,
    pub(crate) roster: Roster,
    pub(crate) registry: ElementRegistry,
    pub(crate) tracker: Mutex<CompletionTracker>,
    pub(crate) options: RwLock<ScanOptions>,
    pub(crate) issues: IssueStore,
    pub(crate) platforms: PlatformStore,

    pub(crate) client: Arc<dyn InstanceClient>,
    pub(crate) spider: Arc<dyn Spider>,
    pub(crate) auditor: Arc<dyn Auditor>,
    pub(crate) broker: Option<Arc<dyn Broker>>,

    /// Pages queued by checks or operators during the crawl; drained when
    /// the workload is distributed.
    queued_pages: Mutex<Vec<Page>>,
    /// This node's own share once distributed (master) or dispatched (slave).
    assignment: RwLock<Option<Partition>>,

    paused: AtomicBool,
    torn_down: AtomicBool,
    phase: watch::Sender<RunPhase>,
    shutdown: watch::Sender<bool>,
}

impl Coordinator {
    pub fn new(config: NodeConfig, collaborators: Collaborators) -> Arc<Self> {
        let (phase, _) = watch::channel(RunPhase::Idle);
        let (shutdown, _) = watch::channel(false);

        Arc::new(Self {
            self_url: config.self_url,
            instance_token: config.instance_token,
            grid: config.grid,
            guard: RoleGuard::new(),
            roster: Roster::new(),
            registry: ElementRegistry::new(),
            tracker: Mutex::new(CompletionTracker::new()),
            options: RwLock::new(config.options),
            issues: IssueStore::new(),
            platforms: PlatformStore::new(),
            client: collaborators.client,
            spider: collaborators.spider,
            auditor: collaborators.auditor,
            broker: collaborators.broker,
            queued_pages: Mutex::new(Vec::new()),
            assignment: RwLock::new(None),
            paused: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            phase,
            shutdown,
        })
    }

    pub fn self_url(&self) -> &str {
        &self.self_url
    }

    pub fn instance_token(&self) -> &str {
        &self.instance_token
    }

    pub fn grid_options(&self) -> &GridOptions {
        &self.grid
    }

    /// One-way, idempotent promotion. Concurrent callers may race here;
    /// only one of them mints the token.
    pub async fn promote_to_master(&self) -> Promotion {
        let promotion = self.guard.promote().await;

        match &promotion {
            Promotion::Promoted(_) => {
                tracing::info!("Promoted to master at {}", self.self_url);
            }
            Promotion::AlreadyMaster => {
                tracing::debug!("Already master, keeping the existing token");
            }
            Promotion::Refused { master } => {
                tracing::warn!("Cannot become master: enslaved to {}", master);
            }
        }

        promotion
    }

    pub async fn is_master(&self) -> bool {
        self.guard.is_master().await
    }

    pub async fn is_slave(&self) -> bool {
        self.guard.is_slave().await
    }

    /// Queues an extra page to be distributed with the crawl results.
    pub async fn queue_page(&self, page: Page) {
        tracing::debug!("Queued page {}", page.url);
        self.queued_pages.lock().await.push(page);
    }

    pub(crate) async fn drain_queued_pages(&self) -> Vec<Page> {
        std::mem::take(&mut *self.queued_pages.lock().await)
    }

    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            tracing::info!("Scan paused");
        }
    }

    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            tracing::info!("Scan resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<RunPhase> {
        self.phase.subscribe()
    }

    pub(crate) fn set_phase(&self, phase: RunPhase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            tracing::info!("Run phase: {:?} -> {:?}", previous, phase);
        }
    }

    pub async fn assignment(&self) -> Option<Partition> {
        self.assignment.read().await.clone()
    }

    pub(crate) async fn set_assignment(&self, assignment: Partition) {
        *self.assignment.write().await = Some(assignment);
    }

    pub async fn options(&self) -> ScanOptions {
        self.options.read().await.clone()
    }

    /// Asks the node's server to stop.
    pub fn request_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    pub async fn status(&self) -> StatusResponse {
        let (running, done) = {
            let tracker = self.tracker.lock().await;
            (tracker.running_count(), tracker.done_count())
        };

        StatusResponse {
            role: self.guard.role().await,
            phase: self.phase(),
            paused: self.is_paused(),
            workers: self
                .roster
                .workers()
                .await
                .into_iter()
                .map(|w| w.url)
                .collect(),
            running,
            done,
            urls: self.registry.len(),
            elements: self.registry.element_count(),
            issues: self.issues.len(),
        }
    }

    pub fn issues(&self) -> &IssueStore {
        &self.issues
    }

    pub fn platforms(&self) -> &PlatformStore {
        &self.platforms
    }

    pub fn registry(&self) -> &ElementRegistry {
        &self.registry
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }
}
