#![forbid(unsafe_code)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sombra_batch::storage::{BatchInserter, InserterOptions, PropValue};
use sombra_batch::types::NodeId;
use tempfile::TempDir;

const NODE_COUNT: usize = 2_048;
const REL_COUNT: usize = 4_096;

fn bulk_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_insert");
    group.sample_size(10);

    group.throughput(Throughput::Elements(NODE_COUNT as u64));
    group.bench_function("nodes_with_properties", |b| {
        b.iter_batched(
            InsertHarness::new,
            |mut harness| black_box(harness.insert_nodes()),
            BatchSize::PerIteration,
        );
    });

    group.throughput(Throughput::Elements(REL_COUNT as u64));
    group.bench_function("relationships", |b| {
        b.iter_batched(
            || {
                let mut harness = InsertHarness::new();
                let nodes = harness.insert_nodes();
                (harness, nodes)
            },
            |(mut harness, nodes)| black_box(harness.insert_relationships(&nodes)),
            BatchSize::PerIteration,
        );
    });

    group.throughput(Throughput::Elements(NODE_COUNT as u64));
    group.bench_function("shutdown_with_index", |b| {
        b.iter_batched(
            || {
                let mut harness = InsertHarness::new();
                harness
                    .inserter
                    .create_deferred_schema_index("Person")
                    .on("score")
                    .create()
                    .expect("index");
                harness.insert_nodes();
                harness
            },
            |mut harness| harness.inserter.shutdown().expect("shutdown"),
            BatchSize::PerIteration,
        );
    });

    group.finish();
}

struct InsertHarness {
    _tmpdir: TempDir,
    inserter: BatchInserter,
    rng: ChaCha8Rng,
}

impl InsertHarness {
    fn new() -> Self {
        let tmpdir = tempfile::tempdir().expect("tmpdir");
        let inserter = BatchInserter::open_with(
            tmpdir.path(),
            InserterOptions::default().batch_size(512),
        )
        .expect("open");
        Self {
            _tmpdir: tmpdir,
            inserter,
            rng: ChaCha8Rng::seed_from_u64(0xC0FFEE),
        }
    }

    fn insert_nodes(&mut self) -> Vec<NodeId> {
        (0..NODE_COUNT)
            .map(|i| {
                let score = self.rng.gen_range(0..10_000i64);
                self.inserter
                    .create_node(
                        &[
                            ("name", PropValue::from(format!("person-{i}"))),
                            ("score", PropValue::Int(score)),
                        ],
                        &["Person"],
                    )
                    .expect("create node")
            })
            .collect()
    }

    fn insert_relationships(&mut self, nodes: &[NodeId]) -> usize {
        for _ in 0..REL_COUNT {
            let start = nodes[self.rng.gen_range(0..nodes.len())];
            let end = nodes[self.rng.gen_range(0..nodes.len())];
            self.inserter
                .create_relationship(start, end, "KNOWS", &[])
                .expect("create relationship");
        }
        REL_COUNT
    }
}

criterion_group!(benches, bulk_insert);
criterion_main!(benches);
