//! Benchmarks for the long-poll hot path.
//!
//! Every poll cycle snapshots the registry, encodes the listening configs and
//! decodes the server's answer; these should stay cheap for a few thousand keys.

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use nacos_config_watch::core::{Fingerprint, ListenKey, ListenerRegistry};
use nacos_config_watch::error::Result;
use nacos_config_watch::notify::FnListener;
use nacos_config_watch::protocol::codec;
use nacos_config_watch::transport::ConfigTransport;
use std::time::Duration;

struct Seed;

#[async_trait]
impl ConfigTransport for Seed {
    async fn fetch_content(&self, key: &ListenKey) -> Result<String> {
        Ok(format!("content of {}", key))
    }

    async fn long_poll(&self, _listening_configs: &str, _timeout: Duration) -> Result<String> {
        Ok(String::new())
    }
}

fn keys(n: usize) -> Vec<ListenKey> {
    (0..n)
        .map(|i| {
            let namespace_id = if i % 2 == 0 { "" } else { "dev" };
            ListenKey::new(namespace_id, "DEFAULT_GROUP", &format!("service-{}.yaml", i)).unwrap()
        })
        .collect()
}

fn registry_with(n: usize) -> ListenerRegistry {
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let registry = ListenerRegistry::new();
    let listener = FnListener::shared(|_| {});
    runtime.block_on(async {
        for key in keys(n) {
            registry.add(&key, listener.clone(), &Seed).await.unwrap();
        }
    });
    registry
}

/// Benchmark encoding the listening configs of a snapshot
fn benchmark_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for size in [10, 100, 1000] {
        let registry = registry_with(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &registry, |b, registry| {
            b.iter(|| {
                let snapshot = registry.snapshot();
                black_box(codec::encode(snapshot.iter()));
            });
        });
    }
    group.finish();
}

/// Benchmark decoding a change report
fn benchmark_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for size in [1, 10, 100] {
        let mut raw = String::new();
        for key in keys(size) {
            raw.push_str(key.data_id());
            raw.push('\u{2}');
            raw.push_str(key.group());
            if !key.is_default_namespace() {
                raw.push('\u{2}');
                raw.push_str(key.namespace_id());
            }
            raw.push('\u{1}');
        }
        let body = urlencoding::encode(&raw).into_owned();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &body, |b, body| {
            b.iter(|| black_box(codec::decode(body).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark a fingerprint update, which copies the registry map
fn benchmark_update_fingerprint(c: &mut Criterion) {
    let registry = registry_with(1000);
    let key = keys(1000).swap_remove(500);
    let fingerprints = [Fingerprint::of("a=1"), Fingerprint::of("a=2")];

    let mut i = 0;
    c.bench_function("update_fingerprint_1000_keys", |b| {
        b.iter(|| {
            i += 1;
            black_box(registry.update_fingerprint(&key, fingerprints[i % 2].clone()));
        });
    });
}

criterion_group!(
    benches,
    benchmark_encode,
    benchmark_decode,
    benchmark_update_fingerprint
);
criterion_main!(benches);
