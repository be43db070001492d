//! Enrollment Manager
//!
//! Enrollment is a two-step round-trip with the worker: push the current
//! scan options, then hand it this node's address and token. The worker
//! joins the roster only once both steps were acknowledged.

use super::guard::Promotion;
use super::types::{InstanceInfo, InstanceOffer, MasterLink};
use crate::coordinator::Coordinator;
use crate::error::{GridError, GridResult};

use std::sync::Arc;
use tokio::task::JoinHandle;

/// Continuation of an accepted enrollment request.
pub struct EnrollmentHandle(JoinHandle<bool>);

impl EnrollmentHandle {
    /// Resolves to whether the worker ended up in the roster.
    pub async fn wait(self) -> bool {
        self.0.await.unwrap_or(false)
    }
}

impl Coordinator {
    /// Starts enrolling the worker described by `offer`.
    ///
    /// Preconditions are checked synchronously and nothing is mutated when
    /// they fail: a slave cannot enslave, and the offer must carry both a
    /// usable URL and a token. The remote round-trip then runs in the
    /// background; await the returned handle to learn its outcome.
    pub async fn enslave(self: &Arc<Self>, offer: InstanceOffer) -> GridResult<EnrollmentHandle> {
        if self.guard.is_slave().await {
            return Err(GridError::SlaveCannotEnslave);
        }

        let worker = InstanceInfo::try_from(offer)?;

        if let Promotion::Refused { master } = self.promote_to_master().await {
            return Err(GridError::PromotionRefused { master });
        }
        let token = self
            .guard
            .token()
            .await
            .ok_or(GridError::SlaveCannotEnslave)?;

        let master = MasterLink {
            url: self.self_url().to_string(),
            token,
        };

        tracing::info!("Enrolling worker {}", worker.url);
        let this = self.clone();
        Ok(EnrollmentHandle(tokio::spawn(async move {
            this.complete_enrollment(worker, master).await
        })))
    }

    async fn complete_enrollment(&self, worker: InstanceInfo, master: MasterLink) -> bool {
        let options = self.options().await;
        if let Err(e) = self.client.configure(&worker, &options).await {
            tracing::warn!("Enrollment of {} failed while configuring: {}", worker.url, e);
            return false;
        }

        if let Err(e) = self.client.set_master(&worker, &master).await {
            tracing::warn!("Enrollment of {} failed at set_master: {}", worker.url, e);
            return false;
        }

        let url = worker.url.clone();
        if !self.roster.push(worker).await {
            tracing::warn!("Worker {} is already enrolled", url);
            return false;
        }

        tracing::info!("Enrolled worker {} ({} total)", url, self.roster.len().await);
        true
    }
}
