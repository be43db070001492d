//! Configuration types for audit-grid
//!
//! `Cli` is the command line of the node binary. It is split into
//! `ScanOptions` (serialisable, pushed to every enrolled worker) and
//! `GridOptions` (local to the master: how workers get acquired).

use crate::membership::types::InstanceOffer;

use anyhow::{Result, bail};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Master/worker node for distributed crawl and audit scans
#[derive(Parser, Debug, Clone)]
#[command(
    name = "audit-grid",
    version,
    about = "Distributed crawl/audit coordinator",
    after_help = "EXAMPLES:\n    \
        # Idle worker node, waiting for a master\n    \
        audit-grid --bind 127.0.0.1:7332 --instance-token s3cret\n\n    \
        # Master scan with one directly enrolled worker\n    \
        audit-grid --bind 127.0.0.1:7331 --target http://testsite.local/ \\\n        \
            --worker http://127.0.0.1:7332=s3cret\n\n    \
        # Master scan acquiring 4 workers from a broker\n    \
        audit-grid --target http://testsite.local/ --grid --broker http://127.0.0.1:7300 --max-workers 4"
)]
pub struct Cli {
    /// Address the RPC server listens on
    #[arg(long, env = "AUDIT_GRID_BIND", default_value = "127.0.0.1:7331")]
    pub bind: SocketAddr,

    /// Externally reachable URL of this node (defaults to http://<bind>)
    #[arg(long, env = "AUDIT_GRID_PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Token callers must present to reach this node's worker endpoints
    #[arg(long, env = "AUDIT_GRID_INSTANCE_TOKEN")]
    pub instance_token: Option<String>,

    /// Start a master scan against this URL
    #[arg(long, value_name = "URL")]
    pub target: Option<String>,

    /// Enroll a worker directly (repeatable)
    #[arg(long = "worker", value_name = "URL=TOKEN", value_parser = parse_worker)]
    pub workers: Vec<InstanceOffer>,

    /// Acquire workers from a broker before crawling
    #[arg(long)]
    pub grid: bool,

    /// Prefer brokers sharing --pipe-id instead of balancing on the local broker
    #[arg(long)]
    pub grid_aggregate: bool,

    /// Number of workers to request in balanced mode
    #[arg(long, default_value_t = 0, value_name = "NUM")]
    pub max_workers: usize,

    /// Grouping key used to pick brokers in aggregated mode
    #[arg(long, value_name = "KEY")]
    pub pipe_id: Option<String>,

    /// URL of the local broker
    #[arg(long, env = "AUDIT_GRID_BROKER", value_name = "URL")]
    pub broker: Option<String>,

    /// Maximum number of pages to crawl (split across participants)
    #[arg(long, value_name = "NUM")]
    pub link_count_limit: Option<usize>,

    /// Maximum number of HTTP requests (split across participants)
    #[arg(long, value_name = "NUM")]
    pub http_request_limit: Option<usize>,

    /// Record platform fingerprints
    #[arg(long)]
    pub fingerprint: bool,

    /// Audit exactly these paths instead of crawling (repeatable)
    #[arg(long = "restrict-path", value_name = "PATH")]
    pub restrict_paths: Vec<String>,

    /// Concurrent workers of the local audit engine
    #[arg(long, default_value_t = 4, value_name = "NUM")]
    pub audit_concurrency: usize,

    /// Verbose output
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    pub fn public_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.bind))
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            target: self.target.clone(),
            link_count_limit: self.link_count_limit,
            http_request_limit: self.http_request_limit,
            fingerprint: self.fingerprint,
            restrict_paths: self.restrict_paths.clone(),
        }
    }

    /// Everything a `Coordinator` needs from the command line. A missing
    /// instance token is generated.
    pub fn node_config(&self) -> Result<NodeConfig> {
        Ok(NodeConfig {
            self_url: self.public_url().trim_end_matches('/').to_string(),
            instance_token: self
                .instance_token
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            options: self.scan_options(),
            grid: self.grid_options()?,
        })
    }

    pub fn grid_options(&self) -> Result<GridOptions> {
        if self.grid && self.broker.is_none() {
            bail!("--grid requires --broker");
        }
        if self.grid && !self.grid_aggregate && self.max_workers == 0 {
            bail!("--grid in balanced mode requires --max-workers > 0");
        }
        if self.audit_concurrency == 0 {
            bail!("--audit-concurrency must be at least 1");
        }

        Ok(GridOptions {
            enabled: self.grid,
            aggregate: self.grid_aggregate,
            max_workers: self.max_workers,
            pipe_id: self.pipe_id.clone(),
            broker: self.broker.clone(),
        })
    }
}

fn parse_worker(s: &str) -> std::result::Result<InstanceOffer, String> {
    match s.rsplit_once('=') {
        Some((url, token)) => Ok(InstanceOffer {
            url: Some(url.to_string()),
            token: Some(token.to_string()),
        }),
        None => Err(format!("expected URL=TOKEN, got '{}'", s)),
    }
}

/// Scan settings shared by the master and every worker it enrolls.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanOptions {
    pub target: Option<String>,
    pub link_count_limit: Option<usize>,
    pub http_request_limit: Option<usize>,
    pub fingerprint: bool,
    /// When non-empty the spider fetches exactly these paths.
    pub restrict_paths: Vec<String>,
}

impl ScanOptions {
    /// Divides the request-count ceilings evenly across `participants`
    /// (workers plus the master itself).
    pub fn split_limits(&self, participants: usize) -> Self {
        let participants = participants.max(1);
        let split = |limit: Option<usize>| limit.map(|l| (l / participants).max(1));

        Self {
            link_count_limit: split(self.link_count_limit),
            http_request_limit: split(self.http_request_limit),
            ..self.clone()
        }
    }
}

/// How the master acquires its workers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridOptions {
    pub enabled: bool,
    pub aggregate: bool,
    pub max_workers: usize,
    pub pipe_id: Option<String>,
    pub broker: Option<String>,
}

/// Identity and settings of one node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Externally reachable RPC address of this node.
    pub self_url: String,
    /// Token callers must present on this node's worker endpoints.
    pub instance_token: String,
    pub options: ScanOptions,
    pub grid: GridOptions,
}
