//! # Prelude
//!
//! ```
//! use tim_core::prelude::*;
//! ```

// Modelo de programa
pub use crate::instruction::Instruction;
pub use crate::opcode::{Opcode, OpcodeCategory, OperandShape};
pub use crate::operand::Operand;
pub use crate::program::{EntryPoint, Program, ProgramBuilder, NUM_REGISTERS};

// Encoding
pub use crate::encoder::{assemble, encode};
pub use crate::lexer::tokenize;
pub use crate::token::{Span, Token, TokenKind};

// Máquina
pub use crate::config::{ExecutionMode, Severity, VmConfig};
pub use crate::vm::{MachineState, RunReport, TimVm, Value};

// Registro
pub use crate::invariant::InvariantVerifier;
pub use crate::registration::{Basin, ComplexityVector, RegistrationState};
pub use crate::telemetry::Telemetry;

// Erros
pub use crate::error::{
    BytecodeError, CapacityExceeded, EncodingError, LexError, LoadError, ProgramError,
    Violation, ViolationClass,
};
