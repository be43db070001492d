use super::types::InstanceInfo;

use tokio::sync::RwLock;

/// Append-only list of enrolled workers, in enrollment order.
///
/// Order matters: the i-th enrolled worker receives partition i+1.
pub struct Roster {
    workers: RwLock<Vec<InstanceInfo>>,
}

impl Roster {
    pub fn new() -> Self {
        Self {
            workers: RwLock::new(Vec::new()),
        }
    }

    /// Returns false if a worker with the same URL is already enrolled.
    pub async fn push(&self, worker: InstanceInfo) -> bool {
        let mut workers = self.workers.write().await;
        if workers.iter().any(|w| w.url == worker.url) {
            return false;
        }
        workers.push(worker);
        true
    }

    pub async fn workers(&self) -> Vec<InstanceInfo> {
        self.workers.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.workers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.workers.read().await.is_empty()
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::new()
    }
}
