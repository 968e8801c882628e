use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use pollengrid_core::{SimulationConfig, SimulationRun};
use std::time::Duration;

fn bench_run_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_step");
    group.sample_size(30);
    group.warm_up_time(Duration::from_secs(2));
    group.measurement_time(Duration::from_secs(8));

    let steps = 64u64;
    let cases = [
        ("sequential", SimulationConfig::sequential()),
        ("synchronous", SimulationConfig::synchronous()),
    ];
    for (name, base) in cases {
        group.bench_function(format!("{name}_steps{steps}"), |b| {
            b.iter_batched(
                || {
                    let mut config = base.clone();
                    config.rng_seed = Some(0xBEEF);
                    SimulationRun::new(config).expect("run")
                },
                |mut run| {
                    for _ in 0..steps {
                        run.step();
                    }
                    run
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_run_steps);
criterion_main!(benches);
