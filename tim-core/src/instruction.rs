//! Instruções
//!
//! Opcode + operando opcional, e a codificação compacta que a VM decodifica
//! em `memory[pc]`:
//!
//! ```text
//! [opcode] [register]? [tag payload]?
//!           └ só mov    └ qualquer shape exceto None
//! ```

use serde::{Deserialize, Serialize};

use crate::opcode::{Opcode, OperandShape};
use crate::operand::{ByteReader, DecodeFault, Operand};
use crate::program::NUM_REGISTERS;

/// Byte de registrador ausente; como destino de `mov` sempre falha na VM
pub const NO_REGISTER: u8 = 0xFF;

/// Uma instrução codificada
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    /// Registrador de destino (só `mov`)
    pub register: Option<u8>,
    pub operand: Operand,
}

impl Instruction {
    /// Instrução sem operando
    pub const fn bare(opcode: Opcode) -> Self {
        Self {
            opcode,
            register: None,
            operand: Operand::None,
        }
    }

    /// Instrução com um operando
    pub const fn with_operand(opcode: Opcode, operand: Operand) -> Self {
        Self {
            opcode,
            register: None,
            operand,
        }
    }

    /// `mov rN, <source>`
    pub const fn mov(register: u8, source: Operand) -> Self {
        Self {
            opcode: Opcode::Mov,
            register: Some(register),
            operand: source,
        }
    }

    /// Registrador e operando batem com o shape do opcode, com os mesmos
    /// limites que o encoder aplica
    pub fn is_well_formed(&self) -> bool {
        let register_ok = |r: u8| (r as usize) < NUM_REGISTERS;
        let literal_ok = |op: Operand| match op {
            Operand::Int(_) | Operand::Float(_) | Operand::Char(_) => true,
            Operand::Register(r) => register_ok(r),
            _ => false,
        };

        match (self.opcode.shape(), self.register) {
            (OperandShape::Move, Some(r)) => {
                register_ok(r) && (self.operand == Operand::Top || literal_ok(self.operand))
            }
            (OperandShape::Move, None) | (_, Some(_)) => false,
            (OperandShape::None, None) => self.operand.is_none(),
            (OperandShape::Literal, None) => literal_ok(self.operand),
            (OperandShape::Target, None) => matches!(self.operand, Operand::Int(_)),
            (OperandShape::StringRef, None) => matches!(self.operand, Operand::StringIndex(_)),
        }
    }

    /// Tamanho na imagem de memória
    pub fn image_size(&self) -> usize {
        match self.opcode.shape() {
            OperandShape::None => 1,
            OperandShape::Move => 2 + self.operand.size(),
            _ => 1 + self.operand.size(),
        }
    }

    /// Acrescenta a forma de imagem. `operand` substitui o armazenado
    /// (a imagem converte alvos de salto de índice para offset).
    /// Um `mov` sem registrador vira [`NO_REGISTER`].
    pub fn encode_into(&self, operand: Operand, out: &mut Vec<u8>) {
        out.push(self.opcode as u8);
        match self.opcode.shape() {
            OperandShape::None => {}
            OperandShape::Move => {
                out.push(self.register.unwrap_or(NO_REGISTER));
                operand.write_to(out);
            }
            _ => operand.write_to(out),
        }
    }

    /// Decodifica os bytes que seguem um opcode já lido
    pub fn decode_operands(opcode: Opcode, reader: &mut ByteReader<'_>) -> Result<Self, DecodeFault> {
        Ok(match opcode.shape() {
            OperandShape::None => Self::bare(opcode),
            OperandShape::Move => {
                let register = reader.read_u8()?;
                let source = Operand::read_from(reader)?;
                Self::mov(register, source)
            }
            _ => Self::with_operand(opcode, Operand::read_from(reader)?),
        })
    }

    /// Desmontagem
    pub fn disassemble(&self) -> String {
        match (self.register, self.operand) {
            (Some(r), op) => format!("{} r{} {}", self.opcode.mnemonic(), r, op),
            (None, Operand::None) => self.opcode.mnemonic().to_string(),
            (None, op) => format!("{} {}", self.opcode.mnemonic(), op),
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.disassemble())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_size() {
        assert_eq!(Instruction::bare(Opcode::Add).image_size(), 1);
        assert_eq!(
            Instruction::with_operand(Opcode::Push, Operand::Int(10)).image_size(),
            10
        );
        assert_eq!(Instruction::mov(2, Operand::Top).image_size(), 3);
    }

    #[test]
    fn test_encode_push() {
        let mut out = Vec::new();
        let push = Instruction::with_operand(Opcode::Push, Operand::Int(10));
        push.encode_into(push.operand, &mut out);
        assert_eq!(out[0], Opcode::Push as u8);
        assert_eq!(out[1], crate::operand::TAG_INT);
        assert_eq!(&out[2..10], &10i64.to_le_bytes());
        assert_eq!(out.len(), push.image_size());
    }

    #[test]
    fn test_decode_mov_from_image() {
        let mov = Instruction::mov(5, Operand::Char('x'));
        let mut out = Vec::new();
        mov.encode_into(mov.operand, &mut out);

        let mut reader = ByteReader::at(&out, 1);
        let decoded = Instruction::decode_operands(Opcode::Mov, &mut reader).unwrap();
        assert_eq!(decoded, mov);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_disassemble() {
        assert_eq!(Instruction::bare(Opcode::Halt).disassemble(), "halt");
        assert_eq!(
            Instruction::with_operand(Opcode::Push, Operand::Int(-3)).disassemble(),
            "push -3"
        );
        assert_eq!(Instruction::mov(1, Operand::Top).disassemble(), "mov r1 top");
        assert_eq!(
            Instruction::with_operand(Opcode::PushStr, Operand::StringIndex(0)).to_string(),
            "push_str $0"
        );
    }

    #[test]
    fn test_well_formed_by_shape() {
        assert!(Instruction::bare(Opcode::Add).is_well_formed());
        assert!(Instruction::mov(7, Operand::Top).is_well_formed());
        assert!(Instruction::with_operand(Opcode::Push, Operand::Register(3)).is_well_formed());
        assert!(Instruction::with_operand(Opcode::Jmp, Operand::Int(4)).is_well_formed());

        let headless_mov = Instruction {
            register: None,
            ..Instruction::mov(5, Operand::Int(42))
        };
        assert!(!headless_mov.is_well_formed());
        assert!(!Instruction::mov(8, Operand::Int(1)).is_well_formed());
        assert!(!Instruction::with_operand(Opcode::Push, Operand::None).is_well_formed());
        assert!(!Instruction::with_operand(Opcode::Push, Operand::Register(200)).is_well_formed());
        assert!(!Instruction::with_operand(Opcode::Add, Operand::Int(1)).is_well_formed());
        assert!(!Instruction::with_operand(Opcode::Jmp, Operand::Float(1.0)).is_well_formed());
        assert!(!Instruction::with_operand(Opcode::PushStr, Operand::Int(0)).is_well_formed());
    }

    #[test]
    fn test_mov_without_register_never_targets_r0() {
        let headless_mov = Instruction {
            register: None,
            ..Instruction::mov(5, Operand::Int(42))
        };
        let mut out = Vec::new();
        headless_mov.encode_into(headless_mov.operand, &mut out);
        assert_eq!(out[1], NO_REGISTER);
    }
}
