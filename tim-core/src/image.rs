//! Imagem do programa
//!
//! Rebaixa um [`Program`] para os bytes carregados no endereço 0 da memória
//! da VM. Alvos de jump/call e o entry point são índices de instrução no
//! fonte; aqui viram offsets em bytes.

use crate::operand::Operand;
use crate::program::Program;

/// Offset para alvos que não nomeiam instrução; fica além de qualquer
/// tamanho de memória e faz trap no fetch.
pub const UNRESOLVED_TARGET: u32 = u32::MAX;

/// Bytes do programa rebaixado
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramImage {
    bytes: Vec<u8>,
    /// offsets[i] = offset da instrução i; offsets[len] = fim do código
    offsets: Vec<usize>,
    entry: usize,
}

impl ProgramImage {
    pub fn lower(program: &Program) -> Self {
        let instructions = program.instructions();

        let mut offsets = Vec::with_capacity(instructions.len() + 1);
        let mut cursor = 0usize;
        for instr in instructions {
            offsets.push(cursor);
            cursor += instr.image_size();
        }
        offsets.push(cursor);

        let resolve = |index: i64| -> u32 {
            usize::try_from(index)
                .ok()
                .and_then(|i| offsets.get(i))
                .and_then(|&off| u32::try_from(off).ok())
                .unwrap_or(UNRESOLVED_TARGET)
        };

        let mut bytes = Vec::with_capacity(cursor);
        for instr in instructions {
            let operand = match instr.operand {
                Operand::Int(index) if instr.opcode.takes_address() => {
                    Operand::Int(resolve(index) as i64)
                }
                operand => operand,
            };
            instr.encode_into(operand, &mut bytes);
        }

        let entry = match program.entry_point() {
            Some(index) => resolve(index as i64) as usize,
            None => 0,
        };

        Self { bytes, offsets, entry }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Offset onde a execução começa
    pub fn entry(&self) -> usize {
        self.entry
    }

    /// Offset da instrução `index`
    pub fn offset_of(&self, index: usize) -> Option<usize> {
        self.offsets.get(index).copied()
    }
}
