//! # TIM VM Benchmarks
//!
//! Measures machine creation, stepping and the registration subsystem.
//!
//! Run: `cargo bench --bench vm_bench`

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tim_core::prelude::*;

const BOOT: &str = "push 10, push 20, add, reg_commit, mirror, halt";

/// Countdown loop: ~7 instructions per iteration
fn countdown(n: i64) -> String {
    format!(
        "mov r0 {}, push r0, zjmp 8, push r0, push 1, sub, mov r0 top, jmp 1, halt",
        n
    )
}

fn bench_vm_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("vm_creation");
    let program = assemble(BOOT).unwrap();

    group.bench_function("default_config", |b| {
        b.iter(|| black_box(TimVm::new(&program, VmConfig::default()).unwrap()))
    });

    group.bench_function("small_memory", |b| {
        let config = VmConfig::default().with_memory_size(256).with_stack_capacity(16);
        b.iter(|| black_box(TimVm::new(&program, config.clone()).unwrap()))
    });

    group.finish();
}

fn bench_vm_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("vm_run");

    let boot = assemble(BOOT).unwrap();
    group.bench_function("boot_program", |b| {
        b.iter(|| {
            let mut vm = TimVm::new(&boot, VmConfig::default()).unwrap();
            black_box(vm.run(100))
        })
    });

    for n in [10i64, 100, 1000] {
        let program = assemble(&countdown(n)).unwrap();
        group.bench_with_input(BenchmarkId::new("countdown", n), &program, |b, program| {
            b.iter(|| {
                let mut vm = TimVm::new(program, VmConfig::default()).unwrap();
                black_box(vm.run(u64::MAX))
            })
        });
    }

    group.finish();
}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");

    group.bench_function("observe_and_advance", |b| {
        let mut state = RegistrationState::new();
        let t = Telemetry::new(0.2, 0.1, 0.1);
        b.iter(|| {
            state.observe(black_box(&t));
            black_box(state.advance_tau())
        })
    });

    for n in [4usize, 16, 64] {
        let mut state = RegistrationState::new();
        let basins = vec![Basin::new(1.0 / n as f64, 1.5); n];
        state.complexity_mut().set_distribution(&basins).unwrap();
        group.bench_with_input(BenchmarkId::new("commit", n), &n, |b, _| {
            b.iter(|| black_box(state.commit()))
        });
    }

    group.bench_function("verify", |b| {
        let mut state = RegistrationState::new();
        state.commit();
        let verifier = InvariantVerifier::default();
        b.iter(|| black_box(verifier.verify(&state)))
    });

    group.finish();
}

criterion_group!(benches, bench_vm_creation, bench_vm_run, bench_registration);
criterion_main!(benches);
