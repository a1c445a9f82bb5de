//! # Fleet Learning Scenarios
//!
//! Several in-process workers on one `LocalNetwork`, each with its own
//! registry, pin store and event log.
//!
//! 1. Lonely mode issues no requests and finds no teacher
//! 2. A seeded teacher is verified and its peers are pinned and remembered
//! 3. A peer announced with a rotated certificate is a trust conflict
//!
//! Plus: merge order independence, request coalescing and transitive
//! discovery across three hops.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rand::seq::SliceRandom;

    use fleet_discovery::adapters::LocalNetwork;
    use fleet_discovery::domain::{TeacherSelection, TeacherSelector};
    use fleet_discovery::testing::{
        public_address, test_certificate, test_identity, ManualTimeSource, TestWorker,
    };
    use fleet_discovery::{
        fingerprint_of, FleetLearningApi, LearningConfig, LocalNode, OperatingMode, PeerRecord,
        PeerRegistry, PeerStatus, RejectReason, RoundOutcome, Timestamp,
    };

    const NOW: u64 = 1_700_000_000;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    fn clock() -> Arc<ManualTimeSource> {
        Arc::new(ManualTimeSource::new(NOW))
    }

    fn worker(network: &LocalNetwork, index: u8) -> TestWorker {
        TestWorker::start(
            network,
            index,
            OperatingMode::default(),
            clock(),
            LearningConfig::for_testing(),
        )
    }

    fn lonely_worker(network: &LocalNetwork, index: u8) -> TestWorker {
        TestWorker::start(
            network,
            index,
            OperatingMode {
                lonely: true,
                ..OperatingMode::default()
            },
            clock(),
            LearningConfig::for_testing(),
        )
    }

    /// Put `teacher` into `student`'s registry as if configured by hand.
    fn seed_registry(student: &TestWorker, teacher: &TestWorker) {
        student.ctx.registry().merge(vec![teacher.as_teacher()]);
    }

    // =========================================================================
    // SCENARIO 1: LONELY MODE
    // =========================================================================

    #[tokio::test]
    async fn test_lonely_worker_never_contacts_anyone() {
        let network = LocalNetwork::new();
        let alice = lonely_worker(&network, 1);

        for _ in 0..3 {
            assert_eq!(alice.learner.learn_now().await, RoundOutcome::Lonely);
        }
        assert_eq!(network.request_count(), 0);

        let mut selector = TeacherSelector::new(Duration::from_secs(60));
        let selection = selector.select(
            &alice.ctx.registry().snapshot(),
            &alice.identity(),
            Timestamp::new(NOW),
        );
        assert_eq!(selection, TeacherSelection::NoTeacherAvailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lonely_learning_loop_exits_without_requests() {
        let network = LocalNetwork::new();
        let alice = lonely_worker(&network, 1);
        let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        tokio::time::timeout(Duration::from_secs(1), alice.learner.clone().run(shutdown_rx))
            .await
            .unwrap();
        assert_eq!(network.request_count(), 0);
    }

    // =========================================================================
    // SCENARIO 2: SEEDED TEACHER
    // =========================================================================

    #[tokio::test]
    async fn test_seeded_teacher_round_learns_fleet() {
        let network = LocalNetwork::new();
        let teacher = worker(&network, 1);
        let carol = worker(&network, 3);
        let dave = worker(&network, 4);
        teacher.learner.learn_from_teacher(carol.as_teacher()).await.unwrap();
        teacher.learner.learn_from_teacher(dave.as_teacher()).await.unwrap();

        let student = worker(&network, 2);
        seed_registry(&student, &teacher);

        let outcome = student.learner.learn_now().await;
        assert!(matches!(outcome, RoundOutcome::Learned(_)), "{outcome:?}");

        let recorded = student.ctx.registry().get(&teacher.identity()).unwrap();
        assert_eq!(recorded.status, PeerStatus::Verified);

        for peer in [&teacher, &carol, &dave] {
            assert!(student.knows(&peer.identity()));
            let pin = student.ctx.certificates().get(&peer.identity()).unwrap().unwrap();
            assert_eq!(pin.fingerprint, peer.ctx.local().fingerprint);
        }
        assert_eq!(student.ctx.registry().len(), 3);
        let saved = student.events.certificates_saved();
        assert!(saved.contains(&carol.identity()) && saved.contains(&dave.identity()));
    }

    #[tokio::test]
    async fn test_second_round_against_same_teacher_is_unchanged() {
        let network = LocalNetwork::new();
        let teacher = worker(&network, 1);
        let carol = worker(&network, 3);
        teacher.learner.learn_from_teacher(carol.as_teacher()).await.unwrap();

        let student = worker(&network, 2);
        let first = student.learner.learn_from_teacher(teacher.as_teacher()).await.unwrap();
        let second = student.learner.learn_from_teacher(teacher.as_teacher()).await.unwrap();

        assert!(!first.unchanged);
        assert!(second.unchanged);
        assert!(second.merged.is_empty());
    }

    #[tokio::test]
    async fn test_discovery_is_transitive() {
        let network = LocalNetwork::new();
        let alice = worker(&network, 1);
        let bob = worker(&network, 2);
        let carol = worker(&network, 3);

        bob.learner.learn_from_teacher(alice.as_teacher()).await.unwrap();
        carol.learner.learn_from_teacher(bob.as_teacher()).await.unwrap();

        assert!(carol.knows(&alice.identity()));
        assert!(carol.knows(&bob.identity()));
        assert!(!alice.knows(&carol.identity()));
    }

    // =========================================================================
    // SCENARIO 3: TRUST CONFLICT
    // =========================================================================

    #[tokio::test]
    async fn test_rotated_certificate_is_rejected_and_reported() {
        let network = LocalNetwork::new();
        let alice = worker(&network, 1);
        let bob = worker(&network, 2);
        let carol = worker(&network, 3);

        // Bob pins Carol's original certificate.
        bob.learner.learn_from_teacher(carol.as_teacher()).await.unwrap();
        let before = bob.ctx.registry().get(&carol.identity()).unwrap();
        let pinned = bob.ctx.certificates().get(&carol.identity()).unwrap().unwrap();

        // Carol's identity resurfaces elsewhere with another certificate.
        let impostor = TestWorker::with_local(
            &network,
            LocalNode::new(
                carol.identity(),
                public_address(33),
                test_certificate(33),
                OperatingMode::default(),
            ),
            clock(),
            LearningConfig::for_testing(),
        );
        alice.learner.learn_from_teacher(impostor.as_teacher()).await.unwrap();

        let result = bob.learner.learn_from_teacher(alice.as_teacher()).await.unwrap();

        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].reason, RejectReason::TrustConflict);
        assert_eq!(bob.ctx.registry().get(&carol.identity()).unwrap(), before);
        assert_eq!(
            bob.ctx.certificates().get(&carol.identity()).unwrap().unwrap(),
            pinned
        );
        assert_eq!(bob.events.trust_conflicts(), vec![carol.identity()]);
    }

    // =========================================================================
    // CONCURRENCY PROPERTIES
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_rounds_share_one_request() {
        let network = LocalNetwork::with_latency(Duration::from_millis(500));
        let teacher = worker(&network, 1);
        let student = worker(&network, 2);
        seed_registry(&student, &teacher);

        let (a, b, c) = tokio::join!(
            student.learner.learn_from_teacher(teacher.as_teacher()),
            student.learner.learn_from_teacher(teacher.as_teacher()),
            student.learner.learn_from_teacher(teacher.as_teacher()),
        );

        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(network.requests_to(&teacher.address()), 1);
        assert_eq!(student.learner.requests_in_flight(), 0);
    }

    #[test]
    fn test_merge_order_does_not_matter() {
        let identity = test_identity(9);
        let fingerprint = fingerprint_of(&test_certificate(9));
        let mut candidates = Vec::new();
        for (offset, index) in [(0u64, 1u8), (5, 2), (5, 3), (9, 4), (9, 4)] {
            let mut record = PeerRecord::new(
                identity,
                public_address(index),
                fingerprint,
                Timestamp::new(NOW + offset),
            );
            if index == 3 {
                record.status = PeerStatus::Verified;
            }
            candidates.push(record);
        }

        let reference = PeerRegistry::new();
        for record in candidates.clone() {
            reference.merge(vec![record]);
        }
        let expected = reference.get(&identity).unwrap();

        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            candidates.shuffle(&mut rng);
            let registry = PeerRegistry::new();
            for record in candidates.clone() {
                registry.merge(vec![record]);
            }
            // Replaying everything changes nothing.
            assert!(registry.merge(candidates.clone()).is_empty());
            assert_eq!(registry.get(&identity).unwrap(), expected);
        }
    }
}
