//! Telemetria de instruções
//!
//! Toda instrução retirada deixa uma tripla de atividade {gate, memory,
//! branch}. Os valores são fixos por categoria de opcode, então o trace de
//! telemetria de um programa é determinado pelas instruções que executa.

use serde::{Deserialize, Serialize};

use crate::opcode::{Opcode, OpcodeCategory};

/// Atividade de gate base de qualquer instrução retirada
pub const GATE_BASELINE: f64 = 0.01;

/// Atividade de gate de trabalho de ALU
pub const GATE_ALU: f64 = 0.2;

/// Atividade de gate do estágio mirror
pub const GATE_MIRROR: f64 = 0.5;

/// Atividade de memória do tráfego de pilha
pub const MEM_STACK: f64 = 0.1;

/// Atividade de memória do acesso à memória linear
pub const MEM_LINEAR: f64 = 0.3;

/// Atividade de branch de transferências de controle
pub const BRANCH_TAKEN: f64 = 0.1;

/// Tripla de atividade de um step
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Telemetry {
    pub gate: f64,
    pub memory: f64,
    pub branch: f64,
}

impl Telemetry {
    /// Tripla nominal (opcodes desconhecidos, controle, sistema)
    pub const NOMINAL: Self = Self::new(GATE_BASELINE, 0.0, 0.0);

    pub const fn new(gate: f64, memory: f64, branch: f64) -> Self {
        Self { gate, memory, branch }
    }

    /// Tripla fixa para `opcode`; `None` é um byte indecodificável
    pub fn for_opcode(opcode: Option<Opcode>) -> Self {
        let Some(opcode) = opcode else {
            return Self::NOMINAL;
        };
        match (opcode, opcode.category()) {
            (Opcode::Mirror, _) => Self::new(GATE_MIRROR, 0.0, 0.0),
            (Opcode::Call | Opcode::Ret, _) => Self::new(GATE_BASELINE, MEM_STACK, BRANCH_TAKEN),
            (_, OpcodeCategory::Arithmetic | OpcodeCategory::Compare | OpcodeCategory::Convert) => {
                Self::new(GATE_ALU, 0.0, 0.0)
            }
            (_, OpcodeCategory::Stack) => Self::new(GATE_BASELINE, MEM_STACK, 0.0),
            (_, OpcodeCategory::Memory) => Self::new(GATE_BASELINE, MEM_LINEAR, 0.0),
            (_, OpcodeCategory::Branch) => Self::new(GATE_BASELINE, 0.0, BRANCH_TAKEN),
            (
                _,
                OpcodeCategory::Control | OpcodeCategory::System | OpcodeCategory::Registration,
            ) => Self::NOMINAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_spikes() {
        assert_eq!(Telemetry::for_opcode(Some(Opcode::Push)), Telemetry::new(0.01, 0.1, 0.0));
        assert_eq!(Telemetry::for_opcode(Some(Opcode::Add)), Telemetry::new(0.2, 0.0, 0.0));
        assert_eq!(Telemetry::for_opcode(Some(Opcode::Mirror)), Telemetry::new(0.5, 0.0, 0.0));
        assert_eq!(Telemetry::for_opcode(Some(Opcode::Halt)), Telemetry::NOMINAL);
        assert_eq!(Telemetry::for_opcode(None), Telemetry::NOMINAL);
    }

    #[test]
    fn test_branch_and_memory_channels() {
        assert!(Telemetry::for_opcode(Some(Opcode::Jmp)).branch > 0.0);
        assert!(Telemetry::for_opcode(Some(Opcode::Store)).memory > MEM_STACK);
        let call = Telemetry::for_opcode(Some(Opcode::Call));
        assert!(call.branch > 0.0 && call.memory > 0.0);
    }
}
