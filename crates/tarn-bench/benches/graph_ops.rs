//! Criterion micro-benchmarks for inheritance-graph operations.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tarn_bench::{reference_profile, stress_profile};

/// Benchmark: raw property lookup that falls through the whole type chain.
fn bench_inherited_lookup(c: &mut Criterion) {
    let town = reference_profile().unwrap();
    let store = town.realm.store();
    let item = town.items[0];

    c.bench_function("inherited_lookup_depth8", |b| {
        b.iter(|| black_box(store.raw_property(black_box(item), "weight")));
    });
}

/// Benchmark: same lookup on the stress profile's 32-deep chain.
fn bench_inherited_lookup_deep(c: &mut Criterion) {
    let town = stress_profile().unwrap();
    let store = town.realm.store();
    let item = town.items[0];

    c.bench_function("inherited_lookup_depth32", |b| {
        b.iter(|| black_box(store.raw_property(black_box(item), "weight")));
    });
}

/// Benchmark: compute the full lookup order for an item.
fn bench_lookup_order(c: &mut Criterion) {
    let town = reference_profile().unwrap();
    let store = town.realm.store();
    let item = town.items[0];

    c.bench_function("lookup_order_depth8", |b| {
        b.iter(|| black_box(store.lookup_order(black_box(item))));
    });
}

/// Benchmark: add then remove a parent edge, re-tightening depths each time.
fn bench_inherit_toggle(c: &mut Criterion) {
    let mut town = reference_profile().unwrap();
    let mixin = town.realm.create(Some("mixin"), &[]).unwrap();
    let leaf = town.leaf_type;

    c.bench_function("inherit_uninherit_leaf", |b| {
        b.iter(|| {
            let store = town.realm.store_mut();
            store.inherit(leaf, mixin).unwrap();
            store.uninherit(leaf, mixin).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_inherited_lookup,
    bench_inherited_lookup_deep,
    bench_lookup_order,
    bench_inherit_toggle
);
criterion_main!(benches);
