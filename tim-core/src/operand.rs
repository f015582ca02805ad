//! Operandos de instrução
//!
//! Um sum type sobre todo operando que uma instrução pode carregar, mais a
//! forma little-endian com tag compartilhada pela imagem na memória da VM
//! e pelo store de bytecode `.tim`.
//!
//! ```text
//! ┌──────┬────────────────────────┐
//! │ tag  │ payload (LE)           │
//! ├──────┼────────────────────────┤
//! │ 0x00 │ -            (none)    │
//! │ 0x01 │ i64          (int)     │
//! │ 0x02 │ f64 bits     (float)   │
//! │ 0x03 │ u32 scalar   (char)    │
//! │ 0x04 │ u8           (register)│
//! │ 0x05 │ u32          (string)  │
//! │ 0x06 │ -            (top)     │
//! └──────┴────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

pub const TAG_NONE: u8 = 0x00;
pub const TAG_INT: u8 = 0x01;
pub const TAG_FLOAT: u8 = 0x02;
pub const TAG_CHAR: u8 = 0x03;
pub const TAG_REGISTER: u8 = 0x04;
pub const TAG_STRING: u8 = 0x05;
pub const TAG_TOP: u8 = 0x06;

/// Operando anexado a uma [`Instruction`](crate::instruction::Instruction)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Operand {
    #[default]
    None,
    Int(i64),
    Float(f64),
    Char(char),
    /// Índice de registrador, validado contra o banco no encoding
    Register(u8),
    /// Índice no string pool do programa
    StringIndex(u32),
    /// Marcador de topo da pilha (só válido como fonte de `mov`)
    Top,
}

impl Operand {
    pub const fn tag(&self) -> u8 {
        match self {
            Self::None => TAG_NONE,
            Self::Int(_) => TAG_INT,
            Self::Float(_) => TAG_FLOAT,
            Self::Char(_) => TAG_CHAR,
            Self::Register(_) => TAG_REGISTER,
            Self::StringIndex(_) => TAG_STRING,
            Self::Top => TAG_TOP,
        }
    }

    /// Tamanho codificado: byte de tag + payload
    pub const fn size(&self) -> usize {
        1 + match self {
            Self::None | Self::Top => 0,
            Self::Int(_) | Self::Float(_) => 8,
            Self::Char(_) | Self::StringIndex(_) => 4,
            Self::Register(_) => 1,
        }
    }

    /// Tipo legível para diagnósticos
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Char(_) => "char",
            Self::Register(_) => "register",
            Self::StringIndex(_) => "string",
            Self::Top => "top",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Anexa a forma com tag em `out`
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.tag());
        match *self {
            Self::None | Self::Top => {}
            Self::Int(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::Float(v) => out.extend_from_slice(&v.to_bits().to_le_bytes()),
            Self::Char(c) => out.extend_from_slice(&(c as u32).to_le_bytes()),
            Self::Register(r) => out.push(r),
            Self::StringIndex(i) => out.extend_from_slice(&i.to_le_bytes()),
        }
    }

    /// Lê um operando com tag na posição do reader
    pub fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, DecodeFault> {
        let at = reader.position();
        let tag = reader.read_u8()?;
        Ok(match tag {
            TAG_NONE => Self::None,
            TAG_INT => Self::Int(reader.read_u64()? as i64),
            TAG_FLOAT => Self::Float(f64::from_bits(reader.read_u64()?)),
            TAG_CHAR => {
                let scalar = reader.read_u32()?;
                Self::Char(char::from_u32(scalar).ok_or(DecodeFault::InvalidTag { tag, at })?)
            }
            TAG_REGISTER => Self::Register(reader.read_u8()?),
            TAG_STRING => Self::StringIndex(reader.read_u32()?),
            TAG_TOP => Self::Top,
            _ => return Err(DecodeFault::InvalidTag { tag, at }),
        })
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{:?}", v),
            Self::Char(c) => write!(f, "{:?}", c),
            Self::Register(r) => write!(f, "r{}", r),
            Self::StringIndex(i) => write!(f, "${}", i),
            Self::Top => write!(f, "top"),
        }
    }
}

/// Falha de decode de baixo nível; quem chama mapeia para seu próprio erro
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFault {
    /// Leitura além do fim do buffer
    Truncated { at: usize },
    /// Tag de operando desconhecida (ou char inválido)
    InvalidTag { tag: u8, at: usize },
}

/// Cursor little-endian com bounds check sobre um slice
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Cursor começando em `pos`
    pub fn at(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Lê `N` bytes, avançando só em caso de sucesso
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeFault> {
        let end = self
            .pos
            .checked_add(N)
            .ok_or(DecodeFault::Truncated { at: self.pos })?;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(DecodeFault::Truncated { at: self.pos })?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.pos = end;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeFault> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeFault> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeFault> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeFault> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeFault> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or(DecodeFault::Truncated { at: self.pos })?;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(DecodeFault::Truncated { at: self.pos })?;
        self.pos = end;
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_matches_written_bytes() {
        let operands = [
            Operand::None,
            Operand::Int(-7),
            Operand::Float(2.5),
            Operand::Char('λ'),
            Operand::Register(3),
            Operand::StringIndex(9),
            Operand::Top,
        ];
        for op in operands {
            let mut buf = Vec::new();
            op.write_to(&mut buf);
            assert_eq!(buf.len(), op.size(), "{:?}", op);
        }
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = [TAG_INT, 1, 2, 3];
        let err = Operand::read_from(&mut ByteReader::new(&bytes)).unwrap_err();
        assert_eq!(err, DecodeFault::Truncated { at: 1 });
    }

    #[test]
    fn test_unknown_tag() {
        let err = Operand::read_from(&mut ByteReader::new(&[0x7F])).unwrap_err();
        assert_eq!(err, DecodeFault::InvalidTag { tag: 0x7F, at: 0 });
    }

    #[test]
    fn test_reader_does_not_advance_on_failure() {
        let bytes = [1u8, 2];
        let mut reader = ByteReader::new(&bytes);
        assert!(reader.read_u32().is_err());
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.read_u16().unwrap(), 0x0201);
        assert!(reader.is_empty());
    }
}
