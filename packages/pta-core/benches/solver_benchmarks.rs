//! Performance benchmarks for the points-to solver
//!
//! Synthetic programs, solved with and without the offline optimizer:
//! - copy chains closed into one big cycle
//! - random programs mixing all four constraint kinds
//! - indirect calls through a table of function pointers

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pta_core::config::{Preset, PtaConfig};
use pta_core::features::points_to::{Constraint, ConstraintSink, NodeIndex, PointsToAnalyzer};

/// Small deterministic generator so every run sees the same program
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: usize) -> usize {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) as usize) % bound
    }
}

fn cycle_program(analyzer: &mut PointsToAnalyzer, len: usize) {
    let mut cx = analyzer.generation();
    let values: Vec<NodeIndex> = (0..len).map(|i| cx.create_value_node(&format!("v{i}"))).collect();
    for i in 0..len {
        let next = values[(i + 1) % len];
        cx.add_constraint(Constraint::copy(next, values[i])).unwrap();
        if i % 16 == 0 {
            let object = cx.create_object_node(&format!("o{i}"));
            cx.add_constraint(Constraint::addr_of(values[i], object)).unwrap();
        }
    }
}

fn random_program(analyzer: &mut PointsToAnalyzer, values: usize, constraints: usize) {
    let mut rng = Lcg(0x5eed);
    let mut cx = analyzer.generation();
    let vs: Vec<NodeIndex> = (0..values).map(|i| cx.create_value_node(&format!("v{i}"))).collect();
    let os: Vec<NodeIndex> = (0..values / 4)
        .map(|i| cx.create_object_node(&format!("o{i}")))
        .collect();

    for _ in 0..constraints {
        let (a, b) = (vs[rng.next(values)], vs[rng.next(values)]);
        let c = match rng.next(10) {
            0..=2 => Constraint::addr_of(a, os[rng.next(os.len())]),
            3..=6 => Constraint::copy(a, b),
            7 | 8 => Constraint::load(a, b),
            _ => Constraint::store(a, b),
        };
        cx.add_constraint(c).unwrap();
    }
}

fn call_program(analyzer: &mut PointsToAnalyzer, functions: usize, calls: usize) {
    let mut rng = Lcg(0xca11);
    let mut cx = analyzer.generation();
    let table = cx.create_value_node("table");
    for f in 0..functions {
        let name = format!("f{f}");
        let record = cx.add_function(&name, 2, false).unwrap();
        cx.add_constraint(Constraint::copy(record.ret, record.args[rng.next(2)])).unwrap();
        let ptr = cx.create_value_node(&name);
        cx.add_constraint(Constraint::copy(table, ptr)).unwrap();
    }
    for c in 0..calls {
        let (arg, _) = cx.add_allocation(&format!("a{c}"), &format!("heap{c}")).unwrap();
        let result = cx.create_value_node(&format!("r{c}"));
        cx.add_indirect_call(table, vec![Some(arg), None], Some(result)).unwrap();
    }
}

fn solve_with(preset: Preset, build: impl Fn(&mut PointsToAnalyzer)) -> usize {
    let mut analyzer = PointsToAnalyzer::new(PtaConfig::from_preset(preset)).unwrap();
    build(&mut analyzer);
    let graph = analyzer.solve().unwrap();
    graph.stats().propagations
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_cycles(c: &mut Criterion) {
    let mut group = c.benchmark_group("copy_cycle");
    for len in [1_000usize, 10_000] {
        group.throughput(Throughput::Elements(len as u64));
        for preset in [Preset::Custom, Preset::Fast, Preset::Balanced] {
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", preset), len),
                &len,
                |b, &len| b.iter(|| black_box(solve_with(preset, |a| cycle_program(a, len)))),
            );
        }
    }
    group.finish();
}

fn bench_random(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_program");
    group.sample_size(20);
    for (values, constraints) in [(500usize, 1_500usize), (2_000, 6_000)] {
        group.throughput(Throughput::Elements(constraints as u64));
        for preset in [Preset::Custom, Preset::Balanced] {
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", preset), constraints),
                &(values, constraints),
                |b, &(values, constraints)| {
                    b.iter(|| black_box(solve_with(preset, |a| random_program(a, values, constraints))))
                },
            );
        }
    }
    group.finish();
}

fn bench_indirect_calls(c: &mut Criterion) {
    let mut group = c.benchmark_group("indirect_calls");
    for functions in [16usize, 128] {
        group.bench_with_input(BenchmarkId::from_parameter(functions), &functions, |b, &functions| {
            b.iter(|| black_box(solve_with(Preset::Balanced, |a| call_program(a, functions, 256))))
        });
    }
    group.finish();
}

fn bench_incremental(c: &mut Criterion) {
    c.bench_function("incremental_after_random", |b| {
        b.iter(|| {
            let mut analyzer = PointsToAnalyzer::new(PtaConfig::default()).unwrap();
            random_program(&mut analyzer, 1_000, 3_000);
            analyzer.solve().unwrap();
            analyzer.add_alloc("v0", "late").unwrap();
            analyzer.add_copy("v1", "v0").unwrap();
            black_box(analyzer.solve().unwrap().stats().propagations)
        });
    });
}

criterion_group!(
    benches,
    bench_cycles,
    bench_random,
    bench_indirect_calls,
    bench_incremental
);
criterion_main!(benches);
