use std::collections::HashSet;

/// Completion barrier over worker reports.
///
/// A level check: it holds once the local audit has finished and the set
/// of workers reported done equals the set of workers handed work. It
/// fires at most once, however many times it is evaluated.
#[derive(Debug, Default)]
pub struct CompletionTracker {
    running: HashSet<String>,
    done: HashSet<String>,
    local_audit_done: bool,
    fired: bool,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_running(&mut self, worker_url: &str) {
        self.running.insert(worker_url.to_string());
    }

    /// Returns false if the worker had already reported.
    pub fn mark_done(&mut self, worker_url: &str) -> bool {
        self.done.insert(worker_url.to_string())
    }

    pub fn mark_local_audit_done(&mut self) {
        self.local_audit_done = true;
    }

    /// True exactly once: the first time the barrier condition holds.
    pub fn evaluate(&mut self) -> bool {
        if self.fired || !self.local_audit_done || self.running != self.done {
            return false;
        }
        self.fired = true;
        true
    }

    #[cfg(test)]
    pub fn is_running(&self, worker_url: &str) -> bool {
        self.running.contains(worker_url)
    }

    #[cfg(test)]
    pub fn is_done(&self, worker_url: &str) -> bool {
        self.done.contains(worker_url)
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn done_count(&self) -> usize {
        self.done.len()
    }

    #[cfg(test)]
    pub fn has_fired(&self) -> bool {
        self.fired
    }
}
