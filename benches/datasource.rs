use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use entigraph::{
    BasicEntity, CompositeDataSource, DataSourceConfig, Entity, Identity, IdentityFactory,
    MergeStrategy, Predicate, Value,
};

fn predicate(uri: &str) -> Predicate {
    Predicate::new(uri).expect("valid predicate")
}

/// Builds a foreign chain of `len` entities, each pointing at the next.
fn foreign_chain(len: u64) -> Arc<BasicEntity> {
    let name = predicate("http://example.org/name");
    let next = predicate("http://example.org/next");
    let mut tail: Option<Arc<BasicEntity>> = None;
    for i in (0..len).rev() {
        let mut entity = BasicEntity::new(Identity::local(i)).with(name.clone(), format!("node-{i}"));
        if let Some(t) = tail.take() {
            entity = entity.with(next.clone(), t);
        }
        tail = Some(Arc::new(entity));
    }
    tail.expect("chain has at least one node")
}

fn bench_new_entity(c: &mut Criterion) {
    let mut group = c.benchmark_group("new_entity");
    group.throughput(Throughput::Elements(1));
    group.bench_function("fresh_identity", |b| {
        let ds = CompositeDataSource::new(DataSourceConfig::default());
        let ids = IdentityFactory::default();
        b.iter(|| black_box(ds.new_entity(ids.next_local()).expect("new entity")));
    });
    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    for strategy in [MergeStrategy::ByIdentity, MergeStrategy::ByReference, MergeStrategy::ByValue] {
        group.throughput(Throughput::Elements(64));
        group.bench_function(strategy.as_str(), |b| {
            b.iter_batched(
                || {
                    let ds = CompositeDataSource::new(
                        DataSourceConfig::default().with_merge_strategy(strategy),
                    );
                    (ds, foreign_chain(64))
                },
                |(ds, chain)| black_box(ds.merge(chain).expect("merge")),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_aggregated_read(c: &mut Criterion) {
    let ds = CompositeDataSource::new(DataSourceConfig::default());
    let p = predicate("http://example.org/p");
    let id = Identity::local(1);
    let member = ds.new_entity(id.clone()).expect("new entity");
    for i in 0..16 {
        ds.merge(Arc::new(BasicEntity::new(id.clone()).with(p.clone(), i64::from(i))))
            .expect("merge");
    }

    let mut group = c.benchmark_group("aggregation");
    group.bench_function("cached_read", |b| {
        b.iter(|| black_box(member.get_property(&p)));
    });
    group.bench_function("invalidated_read", |b| {
        let mut n = 0_i64;
        b.iter(|| {
            n += 1;
            member.add_property(p.clone(), Value::from(n)).expect("add");
            black_box(member.get_property(&p))
        });
    });
    group.finish();
}

criterion_group!(benches, bench_new_entity, bench_merge, bench_aggregated_read);
criterion_main!(benches);
