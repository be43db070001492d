//! Membership Module Tests
//!
//! ## Test Scopes
//! - **Data Types**: enrollment payload validation and token generation.
//! - **Role Guard**: promotion, slave acceptance and token gating.
//! - **Enrollment**: precondition failures leave no state behind; the
//!   roster only grows after the remote round-trip succeeds.
//! - **Broker Acquisition**: aggregated and balanced strategies.

#[cfg(test)]
mod tests {
    use crate::config::{GridOptions, ScanOptions};
    use crate::error::GridError;
    use crate::membership::broker::{Broker, BrokerInfo};
    use crate::membership::guard::{Promotion, RoleGuard};
    use crate::membership::latch::CountdownLatch;
    use crate::membership::roster::Roster;
    use crate::membership::types::{InstanceInfo, InstanceOffer, MasterLink, Role, Token};
    use crate::test_support::{Call, FakeBroker, harness, harness_with, offer, worker};
    use std::sync::Arc;
    use std::time::Duration;

    fn link(url: &str) -> MasterLink {
        MasterLink {
            url: url.to_string(),
            token: Token("other-master-token".to_string()),
        }
    }

    // ============================================================
    // DATA TYPE TESTS
    // ============================================================

    #[test]
    fn test_instance_info_requires_url_and_token() {
        let missing_url = InstanceInfo::try_from(InstanceOffer {
            url: None,
            token: Some("t".to_string()),
        });
        let missing_token = InstanceInfo::try_from(InstanceOffer {
            url: Some("http://127.0.0.1:7332".to_string()),
            token: None,
        });

        assert_eq!(missing_url.unwrap_err(), GridError::MissingField("url"));
        assert_eq!(missing_token.unwrap_err(), GridError::MissingField("token"));
    }

    #[test]
    fn test_instance_info_rejects_malformed_url() {
        let result = InstanceInfo::new("127.0.0.1:7332", "t");

        assert!(matches!(result, Err(GridError::InvalidUrl { .. })));
    }

    #[test]
    fn test_instance_info_trims_trailing_slash() {
        let info = InstanceInfo::new("http://worker.local:7332/", "t").unwrap();

        assert_eq!(info.url, "http://worker.local:7332");
        assert_eq!(info.token, "t");
    }

    #[test]
    fn test_instance_offer_deserializes_with_missing_fields() {
        let offer: InstanceOffer = serde_json::from_str(r#"{"url":"http://w:1"}"#).unwrap();

        assert_eq!(offer.url.as_deref(), Some("http://w:1"));
        assert!(offer.token.is_none());
    }

    #[test]
    fn test_token_generation_is_unique_and_hex() {
        let a = Token::generate();
        let b = Token::generate();

        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(format!("{:?}", a), "Token(..)");
    }

    // ============================================================
    // ROLE GUARD TESTS
    // ============================================================

    #[tokio::test]
    async fn test_promotion_is_idempotent() {
        // ARRANGE
        let guard = RoleGuard::new();

        // ACT
        let first = guard.promote().await;
        let token = guard.token().await;
        let second = guard.promote().await;

        // ASSERT: the token minted first stays valid
        assert!(matches!(first, Promotion::Promoted(_)));
        assert_eq!(second, Promotion::AlreadyMaster);
        assert_eq!(guard.token().await, token);
        assert_eq!(guard.role().await, Role::Master);
    }

    #[tokio::test]
    async fn test_slave_cannot_be_promoted() {
        // ARRANGE
        let h = harness(vec![]);
        assert!(h.coordinator.accept_master(link("http://other:1")).await);

        // ACT
        let promotion = h.coordinator.promote_to_master().await;

        // ASSERT: refused, nothing minted, nothing enrolled
        assert_eq!(
            promotion,
            Promotion::Refused {
                master: "http://other:1".to_string()
            }
        );
        assert!(!promotion.succeeded());
        assert!(!h.coordinator.is_master().await);
        assert!(h.coordinator.is_slave().await);
        assert!(h.coordinator.roster().is_empty().await);
    }

    #[tokio::test]
    async fn test_master_refuses_set_master() {
        let guard = RoleGuard::new();
        guard.promote().await;

        assert!(!guard.set_master(link("http://other:1")).await);
        assert!(!guard.is_slave().await);
    }

    #[tokio::test]
    async fn test_slave_keeps_its_first_master() {
        let guard = RoleGuard::new();

        assert!(guard.set_master(link("http://a:1")).await);
        assert!(guard.set_master(link("http://a:1")).await);
        assert!(!guard.set_master(link("http://b:1")).await);
        assert_eq!(guard.master().await.unwrap().url, "http://a:1");
    }

    #[tokio::test]
    async fn test_check_privileged() {
        // ARRANGE
        let guard = RoleGuard::new();

        // ASSERT: outside master role everything passes
        assert!(guard.check_privileged("anything").await);

        // ACT
        guard.promote().await;
        let token = guard.token().await.unwrap();

        // ASSERT: a master demands its own token
        assert!(guard.check_privileged(token.as_str()).await);
        assert!(!guard.check_privileged("wrong").await);
        assert!(!guard.check_privileged("").await);
    }

    // ============================================================
    // ROSTER & LATCH TESTS
    // ============================================================

    #[tokio::test]
    async fn test_roster_rejects_duplicate_urls() {
        let roster = Roster::new();

        assert!(roster.push(worker("http://w1:1")).await);
        assert!(roster.push(worker("http://w2:1")).await);
        assert!(!roster.push(worker("http://w1:1")).await);

        let urls: Vec<String> = roster.workers().await.into_iter().map(|w| w.url).collect();
        assert_eq!(urls, vec!["http://w1:1", "http://w2:1"]);
    }

    #[tokio::test]
    async fn test_latch_releases_after_count() {
        // ARRANGE
        let latch = Arc::new(CountdownLatch::new(3));

        // ACT: count down from other tasks
        for _ in 0..3 {
            let latch = latch.clone();
            tokio::spawn(async move { latch.count_down() });
        }

        // ASSERT
        tokio::time::timeout(Duration::from_secs(1), latch.wait())
            .await
            .expect("latch never opened");
        assert_eq!(latch.remaining(), 0);

        latch.count_down();
        assert_eq!(latch.remaining(), 0);
    }

    #[tokio::test]
    async fn test_latch_blocks_until_zero() {
        let latch = CountdownLatch::new(2);
        latch.count_down();

        let waited = tokio::time::timeout(Duration::from_millis(50), latch.wait()).await;

        assert!(waited.is_err());
        assert_eq!(latch.remaining(), 1);
    }

    // ============================================================
    // ENROLLMENT TESTS
    // ============================================================

    #[tokio::test]
    async fn test_enslave_enrolls_after_round_trip() {
        // ARRANGE
        let h = harness(vec![]);

        // ACT
        let handle = h
            .coordinator
            .enslave(offer("http://w1:7332", "w1-secret"))
            .await
            .unwrap();
        let enrolled = handle.wait().await;

        // ASSERT: promoted, configured, told who its master is, enrolled
        assert!(enrolled);
        assert!(h.coordinator.is_master().await);
        assert_eq!(
            h.client.calls(),
            vec![
                Call::Configure("http://w1:7332".to_string()),
                Call::SetMaster("http://w1:7332".to_string()),
            ]
        );

        let masters = h.client.masters.lock().unwrap().clone();
        let token = h.coordinator.guard.token().await.unwrap();
        assert_eq!(masters[0].1.url, h.coordinator.self_url());
        assert_eq!(masters[0].1.token, token);

        let roster = h.coordinator.roster().workers().await;
        assert_eq!(roster, vec![InstanceInfo::new("http://w1:7332", "w1-secret").unwrap()]);
    }

    #[tokio::test]
    async fn test_enslave_missing_token_touches_nothing() {
        // ARRANGE
        let h = harness(vec![]);
        let offer = InstanceOffer {
            url: Some("http://w1:7332".to_string()),
            token: None,
        };

        // ACT
        let result = h.coordinator.enslave(offer).await;

        // ASSERT: no roster entry, no remote call, no promotion
        assert_eq!(result.err(), Some(GridError::MissingField("token")));
        assert!(h.coordinator.roster().is_empty().await);
        assert!(h.client.calls().is_empty());
        assert!(!h.coordinator.is_master().await);
    }

    #[tokio::test]
    async fn test_slave_cannot_enslave() {
        let h = harness(vec![]);
        h.coordinator.accept_master(link("http://other:1")).await;

        let result = h.coordinator.enslave(offer("http://w1:7332", "s")).await;

        assert_eq!(result.err(), Some(GridError::SlaveCannotEnslave));
        assert!(h.client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_refused_set_master_is_not_enrolled() {
        // ARRANGE
        let h = harness(vec![]);
        h.client.refuse("http://w1:7332");

        // ACT
        let enrolled = h
            .coordinator
            .enslave(offer("http://w1:7332", "s"))
            .await
            .unwrap()
            .wait()
            .await;

        // ASSERT
        assert!(!enrolled);
        assert!(h.coordinator.roster().is_empty().await);
    }

    #[tokio::test]
    async fn test_second_enrollment_keeps_token() {
        let h = harness(vec![]);

        h.coordinator.enslave(offer("http://w1:1", "a")).await.unwrap().wait().await;
        let token = h.coordinator.guard.token().await;
        h.coordinator.enslave(offer("http://w2:1", "b")).await.unwrap().wait().await;

        assert_eq!(h.coordinator.guard.token().await, token);
        assert_eq!(h.coordinator.roster().len().await, 2);
    }

    // ============================================================
    // BROKER ACQUISITION TESTS
    // ============================================================

    fn grid(aggregate: bool, max_workers: usize, pipe_id: Option<&str>) -> GridOptions {
        GridOptions {
            enabled: true,
            aggregate,
            max_workers,
            pipe_id: pipe_id.map(str::to_string),
            broker: Some("http://broker:7300".to_string()),
        }
    }

    #[tokio::test]
    async fn test_balanced_acquisition_waits_for_every_request() {
        // ARRANGE: three requests, only two idle instances
        let broker = Arc::new(FakeBroker::new("http://broker:7300", vec![]));
        broker.offer("http://broker:7300", offer("http://w1:1", "a"));
        broker.offer("http://broker:7300", offer("http://w2:1", "b"));

        let h = harness_with(
            vec![],
            ScanOptions::default(),
            grid(false, 3, None),
            Some(broker.clone() as Arc<dyn Broker>),
        );

        // ACT
        let enrolled = tokio::time::timeout(
            Duration::from_secs(2),
            h.coordinator.acquire_workers(),
        )
        .await
        .expect("acquisition hung")
        .unwrap();

        // ASSERT
        assert_eq!(enrolled, 2);
        assert_eq!(broker.dispatch_calls().len(), 3);
        assert!(h.coordinator.is_master().await);
    }

    #[tokio::test]
    async fn test_aggregated_acquisition_prefers_matching_pipe() {
        // ARRANGE
        let brokers = vec![
            BrokerInfo { url: "http://a:1".into(), pipe_id: Some("x".into()) },
            BrokerInfo { url: "http://b:1".into(), pipe_id: Some("y".into()) },
            BrokerInfo { url: "http://c:1".into(), pipe_id: Some("x".into()) },
        ];
        let broker = Arc::new(FakeBroker::new("http://a:1", brokers));
        broker.offer("http://a:1", offer("http://wa:1", "a"));
        broker.offer("http://b:1", offer("http://wb:1", "b"));
        broker.offer("http://c:1", offer("http://wc:1", "c"));

        let h = harness_with(
            vec![],
            ScanOptions::default(),
            grid(true, 0, Some("x")),
            Some(broker.clone() as Arc<dyn Broker>),
        );

        // ACT
        let enrolled = h.coordinator.acquire_workers().await.unwrap();

        // ASSERT: brokers visited in order, only the matching ones
        assert_eq!(enrolled, 2);
        assert_eq!(broker.dispatch_calls(), vec!["http://a:1", "http://c:1"]);
        let urls: Vec<String> = h
            .coordinator
            .roster()
            .workers()
            .await
            .into_iter()
            .map(|w| w.url)
            .collect();
        assert_eq!(urls, vec!["http://wa:1", "http://wc:1"]);
    }

    #[tokio::test]
    async fn test_aggregated_acquisition_respects_max_workers() {
        let brokers = vec![
            BrokerInfo { url: "http://a:1".into(), pipe_id: None },
            BrokerInfo { url: "http://b:1".into(), pipe_id: None },
        ];
        let broker = Arc::new(FakeBroker::new("http://a:1", brokers));
        broker.offer("http://a:1", offer("http://wa:1", "a"));
        broker.offer("http://b:1", offer("http://wb:1", "b"));

        let h = harness_with(
            vec![],
            ScanOptions::default(),
            grid(true, 1, None),
            Some(broker.clone() as Arc<dyn Broker>),
        );

        let enrolled = h.coordinator.acquire_workers().await.unwrap();

        assert_eq!(enrolled, 1);
        assert_eq!(broker.dispatch_calls(), vec!["http://a:1"]);
    }

    #[tokio::test]
    async fn test_aggregated_skips_unusable_offers() {
        let brokers = vec![
            BrokerInfo { url: "http://a:1".into(), pipe_id: None },
            BrokerInfo { url: "http://b:1".into(), pipe_id: None },
        ];
        let broker = Arc::new(FakeBroker::new("http://a:1", brokers));
        broker.offer("http://a:1", InstanceOffer { url: Some("http://wa:1".into()), token: None });
        broker.offer("http://b:1", offer("http://wb:1", "b"));

        let h = harness_with(
            vec![],
            ScanOptions::default(),
            grid(true, 0, None),
            Some(broker.clone() as Arc<dyn Broker>),
        );

        let enrolled = h.coordinator.acquire_workers().await.unwrap();

        assert_eq!(enrolled, 1);
        assert_eq!(h.coordinator.roster().workers().await[0].url, "http://wb:1");
    }
}
