//! # tim — TIM reference harness
//!
//! Roda o programa de boot embutido dentro do budget de ciclos e imprime
//! cada ciclo. Sem I/O de arquivo; sempre sai com 0.
//!
//! ```bash
//! tim                # defaults lenient (ou TIM_* do ambiente)
//! tim --strict       # todo achado é fatal
//! tim --json         # imprime também o relatório final em JSON
//! ```

use std::env;
use std::process::ExitCode;

use colored::*;
use tracing_subscriber::EnvFilter;

use tim_core::config::VmConfig;
use tim_core::{MachineState, TimVm, assemble};

/// PUSH 10, PUSH 20, ADD, REG_COMMIT, MIRROR, HALT
const BOOT_PROGRAM: &str = "push 10, push 20, add, reg_commit, mirror, halt";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();

    let mut config = VmConfig::from_env();
    if args.iter().any(|a| a == "--strict") {
        config = VmConfig::strict().with_cycle_budget(config.cycle_budget);
    }
    let budget = config.cycle_budget;

    println!("TIM VM v{} [boot sequence]", tim_core::VERSION);

    let program = match assemble(BOOT_PROGRAM) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return ExitCode::SUCCESS;
        }
    };
    let mut vm = match TimVm::new(&program, config) {
        Ok(vm) => vm,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return ExitCode::SUCCESS;
        }
    };

    let report = vm.run_with(budget, |vm, cycle| {
        let tos = vm.top().map_or_else(|| "-".to_string(), |v| v.to_string());
        println!(
            "cycle {}: pc={} sp={} tos={} η={:.4} τ={:.4}",
            cycle,
            vm.pc(),
            vm.sp(),
            tos,
            vm.registration().eta(),
            vm.registration().tau()
        );
    });

    match report.state {
        MachineState::HaltedNominal => {
            println!("{}", "SYSTEM HALTED: NOMINAL".green().bold());
            println!("   Final proper time: {:.4}", report.tau);
        }
        MachineState::HaltedViolation => {
            let reason = report
                .violation
                .as_ref()
                .map_or_else(String::new, |v| format!(" ({})", v));
            println!("{}{}", "SYSTEM HALTED: VIOLATION DETECTED".red().bold(), reason);
        }
        MachineState::Running => {
            println!(
                "{}",
                format!("CYCLE BUDGET EXHAUSTED after {} cycles", report.cycles).yellow()
            );
        }
    }

    if args.iter().any(|a| a == "--json") {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("{} {}", "error:".red().bold(), e),
        }
    }

    ExitCode::SUCCESS
}
