//! Check Registry
//!
//! Maps check names to async closures so the audit engine stays generic:
//! a check receives one `(page, element)` pair and returns its findings.

use super::types::{CheckInput, Issue, Severity};

use anyhow::Result;
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type CheckFuture = Pin<Box<dyn Future<Output = Result<Vec<Issue>>> + Send>>;

/// Type-erased async check.
pub type CheckFn = Arc<dyn Fn(CheckInput) -> CheckFuture + Send + Sync>;

pub struct CheckRegistry {
    checks: DashMap<String, CheckFn>,
}

impl CheckRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            checks: DashMap::new(),
        })
    }

    /// Registry preloaded with the checks shipped in this crate.
    pub fn with_builtin_checks() -> Arc<Self> {
        let registry = Self::new();
        registry.register("insecure_form_action", |input| async move {
            Ok::<Vec<Issue>, anyhow::Error>(insecure_form_action(&input).into_iter().collect())
        });
        registry.register("email_disclosure", |input| async move {
            Ok::<Vec<Issue>, anyhow::Error>(email_disclosure(&input).into_iter().collect())
        });
        registry
    }

    pub fn register<F, Fut>(&self, name: &str, check: F)
    where
        F: Fn(CheckInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Issue>>> + Send + 'static,
    {
        let check_fn: CheckFn = Arc::new(move |input: CheckInput| {
            Box::pin(check(input)) as CheckFuture
        });

        self.checks.insert(name.to_string(), check_fn);

        tracing::info!("Registered check: {}", name);
    }

    /// Runs a single check by name.
    pub async fn run(&self, name: &str, input: CheckInput) -> Result<Vec<Issue>> {
        // Clone the Arc out so no map guard is held across the await.
        let check_fn = self
            .checks
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow::anyhow!("Unknown check: {}", name))?;

        check_fn(input).await
    }

    /// Runs every registered check; a failing check is logged and skipped.
    pub async fn run_all(&self, input: &CheckInput) -> Vec<Issue> {
        let mut issues = Vec::new();

        for name in self.list_checks() {
            match self.run(&name, input.clone()).await {
                Ok(found) => issues.extend(found),
                Err(e) => {
                    tracing::warn!(
                        "Check '{}' failed on {} ({}): {}",
                        name,
                        input.url,
                        input.element,
                        e
                    );
                }
            }
        }

        issues
    }

    /// Registered names, sorted so runs are reproducible.
    pub fn list_checks(&self) -> Vec<String> {
        let mut names: Vec<String> = self.checks.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    #[cfg(test)]
    pub fn has_check(&self, name: &str) -> bool {
        self.checks.contains_key(name)
    }

    #[cfg(test)]
    pub fn check_count(&self) -> usize {
        self.checks.len()
    }
}

/// Forms submitting over plain HTTP.
pub fn insecure_form_action(input: &CheckInput) -> Option<Issue> {
    let action = input.element.strip_prefix("form:")?.split_once(':')?.1;
    if !action.starts_with("http://") {
        return None;
    }

    Some(Issue {
        check: "insecure_form_action".to_string(),
        url: input.url.clone(),
        element: input.element.clone(),
        severity: Severity::Medium,
        description: format!("Form submits to unencrypted endpoint {}", action),
    })
}

/// `mailto:` links exposing addresses.
pub fn email_disclosure(input: &CheckInput) -> Option<Issue> {
    let address = input.element.strip_prefix("link:mailto:")?;

    Some(Issue {
        check: "email_disclosure".to_string(),
        url: input.url.clone(),
        element: input.element.clone(),
        severity: Severity::Informational,
        description: format!("E-mail address disclosed: {}", address),
    })
}
