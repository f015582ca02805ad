//! Bytecode store (`.tim`)
//!
//! Persiste um [`Program`] de forma que carregar reconstrói um igual:
//! sequência de instruções, string pool, entry point e flag de declaração.
//!
//! ```text
//! ┌──────────┬─────────┬───────┬───────┬─────────┬─────────┐
//! │ "TIMB"   │ version │ flags │ entry │ n_instr │ n_str   │  header, 19 bytes
//! │ 4        │ u16     │ u8    │ u32   │ u32     │ u32     │
//! ├──────────┴─────────┴───────┴───────┴─────────┴─────────┤
//! │ n_instr × [opcode u8][register u8, 0xFF = none][operand]│
//! ├────────────────────────────────────────────────────────┤
//! │ n_str × [len u32][utf-8 bytes]                          │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! Inteiros em little-endian; operandos na forma com tag de
//! [`operand`](crate::operand). Na carga, cada instrução passa pelas mesmas
//! checagens do encoder.

use std::path::{Path, PathBuf};

use crate::error::{BytecodeError, BytecodeResult};
use crate::instruction::{Instruction, NO_REGISTER};
use crate::opcode::Opcode;
use crate::operand::{ByteReader, DecodeFault, Operand};
use crate::program::{EntryPoint, Program, ProgramBuilder, StringPool};

/// Magic bytes
pub const TIM_MAGIC: [u8; 4] = *b"TIMB";

/// Versão do formato
pub const TIM_VERSION: u16 = 0x0100; // v1.0

/// Extensão dos programas armazenados
pub const BYTECODE_EXTENSION: &str = "tim";

/// Tamanho do header em bytes
pub const HEADER_SIZE: usize = 19;

const FLAG_ENTRY_DECLARED: u8 = 0x01;

/// Caminho de saída para um fonte: mesmo stem, extensão `.tim`
pub fn output_path(source: &Path) -> PathBuf {
    source.with_extension(BYTECODE_EXTENSION)
}

impl From<DecodeFault> for BytecodeError {
    fn from(fault: DecodeFault) -> Self {
        match fault {
            DecodeFault::Truncated { at } => Self::Truncated { offset: at },
            DecodeFault::InvalidTag { tag, at } => Self::InvalidOperandTag { tag, offset: at },
        }
    }
}

impl Program {
    /// Serializa no formato `.tim`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.len() * 10);
        let entry = self.entry();

        bytes.extend_from_slice(&TIM_MAGIC);
        bytes.extend_from_slice(&TIM_VERSION.to_le_bytes());
        bytes.push(if entry.declared { FLAG_ENTRY_DECLARED } else { 0 });
        bytes.extend_from_slice(&entry.offset.to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.strings().len() as u32).to_le_bytes());

        for instr in self.instructions() {
            bytes.push(instr.opcode as u8);
            bytes.push(instr.register.unwrap_or(NO_REGISTER));
            instr.operand.write_to(&mut bytes);
        }

        for text in self.strings().iter() {
            bytes.extend_from_slice(&(text.len() as u32).to_le_bytes());
            bytes.extend_from_slice(text.as_bytes());
        }

        bytes
    }

    /// Desserializa do formato `.tim`
    pub fn from_bytes(bytes: &[u8]) -> BytecodeResult<Self> {
        let mut reader = ByteReader::new(bytes);

        let magic: [u8; 4] = reader.read_array()?;
        if magic != TIM_MAGIC {
            return Err(BytecodeError::BadMagic {
                expected: TIM_MAGIC,
                found: magic,
            });
        }
        let version = reader.read_u16()?;
        if version != TIM_VERSION {
            return Err(BytecodeError::UnsupportedVersion(version));
        }
        let flags = reader.read_u8()?;
        let entry = reader.read_u32()?;
        let instruction_count = reader.read_u32()?;
        let string_count = reader.read_u32()?;

        // Instruções vêm antes do pool; só são validadas depois dele
        let mut decoded = Vec::new();
        for _ in 0..instruction_count {
            let offset = reader.position();
            let byte = reader.read_u8()?;
            let opcode = Opcode::from_byte(byte)
                .ok_or(BytecodeError::InvalidOpcode { opcode: byte, offset })?;
            let register = match reader.read_u8()? {
                NO_REGISTER => None,
                r => Some(r),
            };
            let operand = Operand::read_from(&mut reader)?;
            decoded.push((
                offset,
                Instruction {
                    opcode,
                    register,
                    operand,
                },
            ));
        }

        let mut strings = StringPool::new();
        for index in 0..string_count as usize {
            let len = reader.read_u32()? as usize;
            let raw = reader.read_bytes(len)?;
            let text = std::str::from_utf8(raw).map_err(|_| BytecodeError::InvalidUtf8 { index })?;
            strings.intern(text)?;
        }

        let mut builder = ProgramBuilder::with_strings(strings);
        for (offset, instr) in decoded {
            if !instr.is_well_formed() {
                return Err(BytecodeError::MalformedInstruction { offset });
            }
            builder.push(instr)?;
        }

        builder.set_entry(EntryPoint {
            offset: entry,
            declared: flags & FLAG_ENTRY_DECLARED != 0,
        });

        Ok(builder.build())
    }

    /// Grava o programa em `path`
    pub fn save(&self, path: &Path) -> BytecodeResult<()> {
        std::fs::write(path, self.to_bytes())?;
        Ok(())
    }

    /// Lê um programa de `path`
    pub fn load(path: &Path) -> BytecodeResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}
