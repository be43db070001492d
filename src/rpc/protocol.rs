//! Grid Network Protocol
//!
//! API endpoints and Data Transfer Objects exchanged between a master, its
//! workers, brokers and operators. Bodies are JSON over HTTP.
//!
//! Master-side report calls authenticate with the master token carried in
//! the body. Worker-side calls authenticate with the worker's own instance
//! token carried in the `x-instance-token` header.

use crate::audit::types::Issue;
use crate::coordinator::types::RunPhase;
use crate::membership::types::{MasterLink, Role, Token};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// --- Master endpoints (called by workers) ---

/// A worker finished auditing its partition.
pub const ENDPOINT_REPORT_DONE: &str = "/grid/report_done";
/// A worker forwards findings.
pub const ENDPOINT_REPORT_ISSUES: &str = "/grid/report_issues";
/// A worker forwards element sightings.
pub const ENDPOINT_UPDATE_ELEMENTS: &str = "/grid/update_elements";
/// Consolidated status report.
pub const ENDPOINT_SITREP: &str = "/grid/sitrep";

// --- Worker endpoints (called by a master) ---

pub const ENDPOINT_SET_MASTER: &str = "/grid/set_master";
pub const ENDPOINT_CONFIGURE: &str = "/grid/configure";
pub const ENDPOINT_DISPATCH: &str = "/grid/dispatch";
pub const ENDPOINT_SHUTDOWN: &str = "/grid/shutdown";

// --- Operator endpoints ---

pub const ENDPOINT_STATUS: &str = "/status";
pub const ENDPOINT_PAUSE: &str = "/scan/pause";
pub const ENDPOINT_RESUME: &str = "/scan/resume";

// --- Broker endpoints (consumed) ---

pub const BROKER_ENDPOINT_LIST: &str = "/brokers";
pub const BROKER_ENDPOINT_DISPATCH: &str = "/dispatch";

/// Header carrying the callee's instance token on worker-side calls.
pub const INSTANCE_TOKEN_HEADER: &str = "x-instance-token";

// --- Data Transfer Objects ---

/// Reply to every report and worker-side call.
///
/// Authorization failures are reported as `accepted: false`, never as an
/// error status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportResponse {
    pub accepted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDoneRequest {
    /// URL of the reporting worker.
    pub url: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportIssuesRequest {
    pub issues: Vec<Issue>,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateElementsRequest {
    /// Page URL to element IDs sighted on it.
    pub elements: HashMap<String, Vec<String>>,
    pub token: String,
}

/// Payload of a sitrep. Every field is independent and any subset may be
/// present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sitrep {
    #[serde(default)]
    pub crawl_done: bool,
    #[serde(default)]
    pub audit_done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<HashMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platforms: Option<HashMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<Issue>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitrepRequest {
    pub data: Sitrep,
    /// URL of the reporting worker.
    pub url: String,
    pub token: String,
}

/// Sent by a master to a worker it is enrolling: where to report, and the
/// token to present when doing so.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetMasterRequest {
    pub url: String,
    pub token: String,
}

impl From<&MasterLink> for SetMasterRequest {
    fn from(master: &MasterLink) -> Self {
        Self {
            url: master.url.clone(),
            token: master.token.as_str().to_string(),
        }
    }
}

impl From<SetMasterRequest> for MasterLink {
    fn from(req: SetMasterRequest) -> Self {
        Self {
            url: req.url,
            token: Token(req.token),
        }
    }
}

/// Snapshot served on `/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub role: Role,
    pub phase: RunPhase,
    pub paused: bool,
    pub workers: Vec<String>,
    pub running: usize,
    pub done: usize,
    pub urls: usize,
    pub elements: usize,
    pub issues: usize,
}
