//! # Worker Fleet Benchmarks
//!
//! | Path | Runs |
//! |------|------|
//! | Registry merge | once per learning round, per announced batch |
//! | Responder answer | once per inbound fleet request |
//! | Identity checksum | on every log line and persisted record |

use criterion::{criterion_group, criterion_main};

use fleet_tests::benchmarks::fleet::{bench_identity, bench_registry_merge, bench_responder_answer};

criterion_group!(
    benches,
    bench_registry_merge,
    bench_responder_answer,
    bench_identity
);
criterion_main!(benches);
