//! Performance benchmarks for the entity store.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use livestore::{DataStore, Entity, LivePoll, MemoryStore, Query};
use std::borrow::Cow;
use std::time::Duration;

#[derive(Clone, Debug)]
struct Contact {
    id: u64,
    name: String,
}

impl Entity for Contact {
    type Id = u64;

    fn id(&self) -> u64 {
        self.id
    }

    fn search_string(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }
}

fn contacts(count: u64) -> Vec<Contact> {
    (0..count)
        .map(|id| Contact {
            id,
            name: format!("Contact Nümber {id}"),
        })
        .collect()
}

fn populated_store(count: u64) -> MemoryStore<Contact> {
    let store = MemoryStore::new();
    store.store(contacts(count)).unwrap();
    store
}

/// Benchmark batch upserts of varying size
fn bench_store_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_batch");

    for size in [10, 100, 1000] {
        let batch = contacts(size);
        group.bench_with_input(BenchmarkId::new("items", size), &batch, |b, batch| {
            let store = MemoryStore::new();
            b.iter(|| store.store(batch.clone()).unwrap());
        });
    }

    group.finish();
}

/// Benchmark each query kind over a 10k-entity store
fn bench_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("list");
    let store = populated_store(10_000);

    group.bench_function("all", |b| {
        b.iter(|| black_box(store.list(&Query::All).unwrap()));
    });

    let ids = Query::by_ids(0..100);
    group.bench_function("by_ids_100", |b| {
        b.iter(|| black_box(store.list(&ids).unwrap()));
    });

    let search = Query::search("number 99");
    group.bench_function("search", |b| {
        b.iter(|| black_box(store.list(&search).unwrap()));
    });

    group.finish();
}

/// Benchmark store-to-live-query latency with several subscribers attached
fn bench_live_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("live_update");

    for subscribers in [1, 10, 50] {
        group.bench_with_input(
            BenchmarkId::new("subscribers", subscribers),
            &subscribers,
            |b, &subscribers| {
                let store = populated_store(100);
                let mut queries: Vec<_> = (0..subscribers)
                    .map(|_| store.list_stream(Query::by_id(0)))
                    .collect();
                for live in &mut queries {
                    live.next();
                }

                let mut n = 0;
                b.iter(|| {
                    n += 1;
                    store
                        .store([Contact {
                            id: 0,
                            name: format!("rev {n}"),
                        }])
                        .unwrap();
                    for live in &mut queries {
                        match live.next_timeout(Duration::from_secs(1)) {
                            LivePoll::Item(result) => {
                                black_box(result.unwrap());
                            }
                            _ => panic!("live query stalled"),
                        }
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_store_batch, bench_list, bench_live_update);
criterion_main!(benches);
