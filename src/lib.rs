//! Distributed Crawl/Audit Grid Library
//!
//! A node can run solo, promote itself to *master* and enroll *worker*
//! nodes, or be enrolled as a worker by someone else. A master crawls its
//! target, partitions the discovered pages and elements across itself and
//! its workers without duplication, dispatches the shares, and tears the
//! grid down exactly once when every participant has reported.
//!
//! ## Architecture Modules
//! - **`membership`**: role and token, access control, roster, enrollment
//!   and broker acquisition.
//! - **`workload`**: the element registry and the partitioner.
//! - **`coordinator`**: the per-process `Coordinator`, completion barrier,
//!   report entry points, the master's run sequence and the worker side.
//! - **`rpc`**: HTTP transport between nodes (client, handlers, DTOs).
//! - **`audit`**: per-element checks, the audit engine and result stores.
//! - **`crawl`**: the spider and element extraction.
//! - **`config`**: command line and scan/grid options.
//! - **`error`**: typed precondition errors.

pub mod audit;
pub mod config;
pub mod coordinator;
pub mod crawl;
pub mod error;
pub mod membership;
pub mod rpc;
pub mod workload;

#[cfg(test)]
pub(crate) mod test_support;
