//! # Fleet Registry and Responder Benchmarks
//!
//! Paths exercised on every learning round:
//! - merging a teacher's announced peers into the registry
//! - replaying an already-known fleet (the idempotent path)
//! - answering a fleet request with every pinned peer
//! - identity checksums and fingerprints

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use rand::Rng;

use fleet_discovery::adapters::LocalNetwork;
use fleet_discovery::testing::{ManualTimeSource, TestWorker};
use fleet_discovery::{
    fingerprint_of, FleetRequest, FleetServingApi, IpAddr, LearningConfig, OperatingMode,
    PeerIdentity, PeerRecord, PeerRegistry, SocketAddr, Timestamp,
};

const NOW: u64 = 1_700_000_000;
const FLEET_SIZES: [usize; 3] = [100, 1_000, 5_000];

/// `count` peers with random identities on distinct public addresses.
pub fn random_fleet(count: usize) -> Vec<(PeerRecord, Vec<u8>)> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            let identity = PeerIdentity::new(rng.gen());
            let certificate: Vec<u8> = (0..256).map(|_| rng.gen()).collect();
            let address = SocketAddr::new(
                IpAddr::v4(45, 77, (i / 250) as u8, (i % 250) as u8 + 1),
                9151,
            );
            let record = PeerRecord::new(
                identity,
                address,
                fingerprint_of(&certificate),
                Timestamp::new(NOW),
            );
            (record, certificate)
        })
        .collect()
}

pub fn bench_registry_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("fleet-registry");
    group.measurement_time(Duration::from_secs(5));

    for size in FLEET_SIZES {
        let records: Vec<PeerRecord> = random_fleet(size).into_iter().map(|(r, _)| r).collect();
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("merge_new_peers", size), &records, |b, records| {
            b.iter(|| {
                let registry = PeerRegistry::new();
                black_box(registry.merge(records.clone()))
            })
        });

        let known = PeerRegistry::new();
        known.merge(records.clone());
        group.bench_with_input(BenchmarkId::new("merge_known_peers", size), &records, |b, records| {
            b.iter(|| black_box(known.merge(records.clone())))
        });

        group.bench_with_input(BenchmarkId::new("fleet_state", size), &known, |b, registry| {
            b.iter(|| black_box(registry.fleet_state().checksum_hex()))
        });
    }
    group.finish();
}

pub fn bench_responder_answer(c: &mut Criterion) {
    let mut group = c.benchmark_group("fleet-responder");
    group.measurement_time(Duration::from_secs(5));

    for size in FLEET_SIZES {
        let network = LocalNetwork::new();
        let worker = TestWorker::start(
            &network,
            1,
            OperatingMode::default(),
            Arc::new(ManualTimeSource::new(NOW)),
            LearningConfig::default(),
        );
        let fleet = random_fleet(size);
        for (record, certificate) in &fleet {
            let _ = worker
                .ctx
                .certificates()
                .put_if_absent(record.identity, certificate, Timestamp::new(NOW));
        }
        worker
            .ctx
            .registry()
            .merge(fleet.into_iter().map(|(record, _)| record).collect());

        let full = FleetRequest {
            include_certificate: true,
            known_checksum: None,
        };
        let unchanged = FleetRequest {
            include_certificate: true,
            known_checksum: Some(worker.ctx.registry().fleet_state().checksum_hex()),
        };

        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(BenchmarkId::new("answer_full", size), |b| {
            b.iter(|| black_box(worker.responder.answer(&full)))
        });
        group.bench_function(BenchmarkId::new("answer_unchanged", size), |b| {
            b.iter(|| black_box(worker.responder.answer(&unchanged)))
        });
    }
    group.finish();
}

pub fn bench_identity(c: &mut Criterion) {
    let mut group = c.benchmark_group("fleet-identity");
    let identity = PeerIdentity::derive(b"worker public key material");
    let certificate = vec![0xabu8; 1024];

    group.bench_function("derive", |b| {
        b.iter(|| black_box(PeerIdentity::derive(black_box(b"worker public key material"))))
    });
    group.bench_function("checksum_string", |b| {
        b.iter(|| black_box(identity.to_checksum_string()))
    });
    group.bench_function("parse_checksum", |b| {
        let text = identity.to_checksum_string();
        b.iter(|| black_box(PeerIdentity::parse(&text)))
    });
    group.bench_function("fingerprint_1k", |b| {
        b.iter(|| black_box(fingerprint_of(black_box(&certificate))))
    });
    group.finish();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_fleet_has_distinct_routable_peers() {
        let fleet = random_fleet(600);
        let registry = PeerRegistry::new();
        let report = registry.merge(fleet.iter().map(|(r, _)| r.clone()).collect());
        assert_eq!(report.inserted.len(), 600);
        assert!(fleet.iter().all(|(r, _)| r.network_address.is_routable()));
    }
}
