use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use manp_core::{
    propagate, ClearConstant, Graph, GraphBuilder, IntegerType, Location, OpId, OpKind, Registry,
    ValueType,
};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

/// Layered random circuit: every layer combines random picks of the
/// previous one with additions, scalar products, selects and lookups.
fn layered_graph(registry: &Registry, width: usize, depth: usize, rng: &mut StdRng) -> Graph {
    let eint = ValueType::encrypted(IntegerType::unsigned(8).unwrap());
    let clear = IntegerType::signed(8).unwrap();
    let mut b = GraphBuilder::new(registry);

    let mut layer: Vec<OpId> = (0..width)
        .map(|_| b.add_input(eint.clone(), Location::Unknown).unwrap())
        .collect();
    for _ in 0..depth {
        let mut next = Vec::with_capacity(width);
        for _ in 0..width {
            let a = layer[rng.gen_range(0..width)];
            let c = layer[rng.gen_range(0..width)];
            let id = match rng.gen_range(0..4) {
                0 => b.add_op(OpKind::Add, vec![a.into(), c.into()], eint.clone(), Location::Unknown),
                1 => {
                    let k = ClearConstant::scalar(clear, rng.gen_range(-128..128)).unwrap();
                    b.add_op(OpKind::MulEintInt, vec![a.into(), k.into()], eint.clone(), Location::Unknown)
                }
                2 => b.add_op(OpKind::Where, vec![a.into(), c.into()], eint.clone(), Location::Unknown),
                _ => b.add_op(OpKind::Tlu, vec![a.into()], eint.clone(), Location::Unknown),
            };
            next.push(id.unwrap());
        }
        layer = next;
    }
    for id in layer {
        b.tag_output(id).unwrap();
    }
    b.build()
}

fn propagate_layered(c: &mut Criterion) {
    let registry = Registry::default();
    let mut rng = StdRng::seed_from_u64(0x6d616e70);
    let mut group = c.benchmark_group("propagate_layered");
    for depth in [8, 32, 128] {
        let graph = layered_graph(&registry, 64, depth, &mut rng);
        group.bench_with_input(BenchmarkId::from_parameter(graph.len()), &graph, |b, g| {
            b.iter(|| propagate(g).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, propagate_layered);
criterion_main!(benches);
