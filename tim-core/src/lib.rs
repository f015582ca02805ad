//! # TIM-Core
//!
//! Trusted Invariant Machine: uma VM de pilha pequena que confere os próprios
//! invariantes de segurança após cada instrução, mais o encoder TASM que a
//! alimenta.
//!
//! ## Pipeline
//!
//! ```text
//! source ─► lexer ─► Vec<Token> ─► encoder ─► Program ─► (.tim store)
//!                                               │
//!                                               ▼
//!                                ProgramImage in TimVm memory
//!                                               │
//!            step: execute ─► telemetry ─► η, τ ─► invariant verifier
//! ```
//!
//! ## Módulos
//!
//! - [`token`], [`lexer`] - token stream e tokenizer com logos
//! - [`opcode`], [`operand`], [`instruction`], [`program`] - modelo de programa
//! - [`encoder`] - token stream → [`Program`](program::Program)
//! - [`bytecode`] - persistência `.tim`
//! - [`image`], [`memory`], [`bounded`] - o que a máquina de fato guarda
//! - [`vm`] - loop fetch-decode-execute
//! - [`telemetry`], [`registration`] - η, c_reg e tempo próprio τ
//! - [`invariant`] - checagens de simplex, eficiência e complexidade
//! - [`config`] - limites e políticas strict/lenient
//!
//! ## Quick Start
//!
//! ```
//! use tim_core::prelude::*;
//!
//! let program = assemble("push 10, push 20, add, reg_commit, mirror, halt").unwrap();
//! let mut vm = TimVm::new(&program, VmConfig::default()).unwrap();
//! let report = vm.run(100);
//!
//! assert_eq!(report.state, MachineState::HaltedNominal);
//! assert_eq!(report.top, Some(Value::Int(30)));
//! assert!(!vm.violation_flag());
//! ```

pub mod bounded;
pub mod bytecode;
pub mod config;
pub mod encoder;
pub mod error;
pub mod image;
pub mod instruction;
pub mod invariant;
pub mod lexer;
pub mod memory;
pub mod opcode;
pub mod operand;
pub mod prelude;
pub mod program;
pub mod registration;
pub mod telemetry;
pub mod token;
pub mod vm;

pub use encoder::{assemble, encode};
pub use error::{BytecodeError, EncodingError, LoadError, ProgramError, Violation};
pub use program::Program;
pub use vm::{MachineState, RunReport, TimVm, Value};

/// Versão do crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
