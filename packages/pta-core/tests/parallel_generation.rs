//! Parallel constraint generation
//!
//! Front ends lower translation units on rayon workers, each holding a clone
//! of `SharedGeneration`. Node indices then depend on scheduling, so results
//! are compared by key.

use pta_core::config::PtaConfig;
use pta_core::errors::Result;
use pta_core::features::points_to::{
    Constraint, ConstraintSink, PointsTo, PointsToAnalyzer, SharedGeneration,
};
use rayon::prelude::*;
use std::collections::BTreeSet;

const UNITS: usize = 48;

/// One translation unit: a local allocation published through a shared
/// global, plus a call to a shared `register` function.
fn lower_unit<S: ConstraintSink>(sink: &mut S, unit: usize) -> Result<()> {
    let (local, _) = sink.add_allocation(&format!("unit{unit}::p"), &format!("unit{unit}::heap"))?;
    let (registry, _) = sink.add_global("registry", true)?;
    sink.add_constraint(Constraint::store(registry, local))?;

    sink.add_function("register", 1, false)?;
    let seen = sink.create_value_node(&format!("unit{unit}::seen"));
    sink.add_direct_call("register", &[Some(local)], Some(seen))?;
    Ok(())
}

/// `register` hands its argument back
fn lower_register<S: ConstraintSink>(sink: &mut S) -> Result<()> {
    let arg = sink.arg_node("register", 0);
    sink.add_return("register", arg)
}

fn object_keys(analyzer: &PointsToAnalyzer, points_to: PointsTo) -> BTreeSet<String> {
    let graph = analyzer.graph().unwrap();
    points_to
        .objects()
        .unwrap()
        .iter()
        .filter_map(|&o| graph.key_for(o).map(str::to_string))
        .collect()
}

fn sequential() -> PointsToAnalyzer {
    let mut analyzer = PointsToAnalyzer::new(PtaConfig::default()).unwrap();
    let mut cx = analyzer.generation();
    lower_register(&mut cx).unwrap();
    for unit in 0..UNITS {
        lower_unit(&mut cx, unit).unwrap();
    }
    analyzer.solve().unwrap();
    analyzer
}

fn parallel() -> PointsToAnalyzer {
    let shared = SharedGeneration::new(PtaConfig::default()).unwrap();
    lower_register(&mut shared.clone()).unwrap();
    (0..UNITS)
        .into_par_iter()
        .try_for_each(|unit| lower_unit(&mut shared.clone(), unit))
        .unwrap();

    let mut analyzer = shared.into_analyzer().unwrap();
    analyzer.solve().unwrap();
    analyzer
}

#[test]
fn test_shared_keys_created_once() {
    let shared = SharedGeneration::new(PtaConfig::default()).unwrap();
    let indices: Vec<_> = (0..UNITS)
        .into_par_iter()
        .map(|_| shared.clone().create_value_node("registry"))
        .collect();
    assert!(indices.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(shared.get_value_node_for("registry"), Some(indices[0]));
}

#[test]
fn test_parallel_generation_solves_like_sequential() {
    let seq = sequential();
    let par = parallel();
    assert_eq!(seq.nodes().len(), par.nodes().len());

    // contents of the global's storage, not the symbol
    let registry = |a: &PointsToAnalyzer| {
        let storage = a.nodes().get_object_node_for("registry").unwrap();
        object_keys(a, a.points_to(storage).unwrap())
    };
    let expected: BTreeSet<String> = (0..UNITS).map(|u| format!("unit{u}::heap")).collect();
    assert_eq!(registry(&seq), expected);
    assert_eq!(registry(&par), expected);

    for unit in [0, UNITS / 2, UNITS - 1] {
        let key = format!("unit{unit}::seen");
        let seen_seq = object_keys(&seq, seq.points_to_key(&key).unwrap());
        let seen_par = object_keys(&par, par.points_to_key(&key).unwrap());
        assert_eq!(seen_seq, seen_par);
        // every caller shares the one return node
        assert_eq!(seen_seq, expected);
    }
}

#[test]
fn test_parallel_generation_rejects_bad_nodes() {
    let shared = SharedGeneration::new(PtaConfig::default()).unwrap();
    let outcome: Result<()> = (0..8).into_par_iter().try_for_each(|i| {
        let mut sink = shared.clone();
        let p = sink.create_value_node(&format!("p{i}"));
        sink.add_constraint(Constraint::copy(p, 1_000_000))
    });
    assert!(outcome.is_err());
    assert_eq!(shared.constraint_count(), 4);
}
