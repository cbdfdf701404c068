extern crate solver;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use solver::{Config, Orchestrator, SolverKind, CNF};

/// A 3-SAT instance with a planted model, satisfiable by construction.
fn planted_3sat(num_vars: i32, num_clauses: usize, seed: u64) -> CNF {
    let mut rng = StdRng::seed_from_u64(seed);
    let model: Vec<bool> = (0..num_vars).map(|_| rng.gen_bool(0.5)).collect();
    let mut expr = CNF::new();
    for cl in 0..num_clauses {
        let mut vars: Vec<i32> = Vec::new();
        while vars.len() < 3 {
            let var = rng.gen_range(1..=num_vars);
            if !vars.contains(&var) {
                vars.push(var);
            }
        }
        let mut lits: Vec<i32> = vars
            .iter()
            .map(|&v| if rng.gen_bool(0.5) { v } else { -v })
            .collect();
        if !lits
            .iter()
            .any(|&lit| model[(lit.abs() - 1) as usize] == (lit > 0))
        {
            let var = lits[0].abs();
            lits[0] = if model[(var - 1) as usize] { var } else { -var };
        }
        for lit in lits {
            expr.add_literal(lit, cl as u32 + 1);
        }
    }
    expr.set_declared_clauses(num_clauses);
    expr
}

/// Pigeonhole instance; unsatisfiable whenever pigeons > holes.
fn pigeonhole(pigeons: i32, holes: i32) -> CNF {
    let var = |p: i32, h: i32| (p - 1) * holes + h;
    let mut expr = CNF::new();
    let mut next = 1u32;
    for p in 1..=pigeons {
        for h in 1..=holes {
            expr.add_literal(var(p, h), next);
        }
        next += 1;
    }
    for h in 1..=holes {
        for p in 1..=pigeons {
            for q in (p + 1)..=pigeons {
                expr.add_literal(-var(p, h), next);
                expr.add_literal(-var(q, h), next);
                next += 1;
            }
        }
    }
    expr.set_declared_clauses(next as usize - 1);
    expr
}

fn create_group_for_mode(c: &mut Criterion, name: &str, kind: SolverKind) {
    let mut group = c.benchmark_group(name);
    let config = Config {
        solver: kind,
        threads: 2,
        verbosity: 0,
        seed: Some(42),
        ..Config::default()
    };

    let inputs = vec![
        ("planted-20", planted_3sat(20, 80, 7)),
        ("planted-40", planted_3sat(40, 160, 11)),
        ("pigeonhole-4-3", pigeonhole(4, 3)),
    ];

    for (input_name, formula) in inputs {
        let config = config.clone();
        group.bench_function(input_name, move |b| {
            b.iter_batched(
                || {
                    (
                        formula.clone(),
                        Orchestrator::new(config.clone(), Arc::new(AtomicUsize::new(0))),
                    )
                },
                |(formula, orchestrator)| orchestrator.run(&formula).unwrap(),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish()
}

fn criterion_benchmark(c: &mut Criterion) {
    create_group_for_mode(c, "DPLL", SolverKind::Dpll);
    create_group_for_mode(c, "CDCL", SolverKind::Cdcl);
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = criterion_benchmark
}
criterion_main!(benches);
