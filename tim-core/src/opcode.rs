//! Opcodes TIM
//!
//! O conjunto de instruções da Trusted Invariant Machine. As ops do núcleo
//! (`halt`..`store`, `reg_commit`, `reg_check`, `mirror`) ficam em bytes
//! fixos; o resto da linguagem de pilha preenche os buracos.

use serde::{Deserialize, Serialize};

/// Categorias de opcode (guiam telemetria e agrupamento no disassembly)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpcodeCategory {
    /// halt, nop
    Control,
    /// push/pop/dup/swap/mov e referências a strings
    Stack,
    /// Trabalho de ALU inteira e float
    Arithmetic,
    /// Comparações
    Compare,
    /// Conversões de tipo
    Convert,
    /// Acesso à memória linear
    Memory,
    /// Saltos e chamadas
    Branch,
    /// Operações voltadas ao host (print, native)
    System,
    /// Subsistema de registro (reg_commit, reg_check, mirror)
    Registration,
}

/// Forma do operando que segue um opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandShape {
    /// Sem operando
    None,
    /// Um literal inteiro / float / char / registrador
    Literal,
    /// Um alvo inteiro (índice de instrução no fonte, offset na memória)
    Target,
    /// Registrador, depois um literal ou `top`
    Move,
    /// Índice no string pool
    StringRef,
}

/// Opcodes TIM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    // ═══════════════════════════════════════════════════════════════
    // CORE (0x00-0x0C)
    // ═══════════════════════════════════════════════════════════════
    Halt = 0x00,
    Push = 0x01,
    Pop = 0x02,
    Add = 0x03,
    Sub = 0x04,
    Mul = 0x05,
    Div = 0x06,
    Jmp = 0x07,
    /// Salta se zero
    Zjmp = 0x08,
    /// Salta se não zero
    Nzjmp = 0x09,
    Load = 0x0A,
    Store = 0x0B,
    Nop = 0x0C,

    // ═══════════════════════════════════════════════════════════════
    // INTEGER / FLOAT ALU (0x0D-0x14)
    // ═══════════════════════════════════════════════════════════════
    Mod = 0x0D,
    And = 0x0E,
    Or = 0x0F,
    AddF = 0x10,
    SubF = 0x11,
    MulF = 0x12,
    DivF = 0x13,
    ModF = 0x14,

    // ═══════════════════════════════════════════════════════════════
    // COMPARE (0x18-0x1D)
    // ═══════════════════════════════════════════════════════════════
    Cmpe = 0x18,
    Cmpne = 0x19,
    Cmpg = 0x1A,
    Cmpl = 0x1B,
    Cmpge = 0x1C,
    Cmple = 0x1D,

    // ═══════════════════════════════════════════════════════════════
    // CONVERT (0x20-0x22)
    // ═══════════════════════════════════════════════════════════════
    Itof = 0x20,
    Ftoi = 0x21,
    Itoc = 0x22,

    // ═══════════════════════════════════════════════════════════════
    // STACK SHUFFLING (0x28-0x2C)
    // ═══════════════════════════════════════════════════════════════
    Dup = 0x28,
    /// Duplica a entrada n abaixo do topo
    Indup = 0x29,
    Swap = 0x2A,
    /// Troca o topo com a entrada n abaixo
    Inswap = 0x2B,
    Mov = 0x2C,

    // ═══════════════════════════════════════════════════════════════
    // CALLS (0x30-0x32)
    // ═══════════════════════════════════════════════════════════════
    Call = 0x30,
    Ret = 0x31,
    Native = 0x32,

    // ═══════════════════════════════════════════════════════════════
    // STRINGS / OUTPUT (0x38-0x3B)
    // ═══════════════════════════════════════════════════════════════
    PushStr = 0x38,
    GetStr = 0x39,
    Strlen = 0x3A,
    Print = 0x3B,

    // ═══════════════════════════════════════════════════════════════
    // REGISTRATION (0xF0-0xF2)
    // ═══════════════════════════════════════════════════════════════
    /// Commit da complexidade da distribuição de basins atual
    RegCommit = 0xF0,
    /// Roda o verificador de invariantes explicitamente
    RegCheck = 0xF1,
    /// Estágio mirror: introspecção
    Mirror = 0xF2,
}

/// Todo opcode com seu mnemônico. Construído em compile time, nunca mutado.
pub const MNEMONICS: [(&str, Opcode); 46] = [
    ("halt", Opcode::Halt),
    ("push", Opcode::Push),
    ("pop", Opcode::Pop),
    ("add", Opcode::Add),
    ("sub", Opcode::Sub),
    ("mul", Opcode::Mul),
    ("div", Opcode::Div),
    ("jmp", Opcode::Jmp),
    ("zjmp", Opcode::Zjmp),
    ("nzjmp", Opcode::Nzjmp),
    ("load", Opcode::Load),
    ("store", Opcode::Store),
    ("nop", Opcode::Nop),
    ("mod", Opcode::Mod),
    ("and", Opcode::And),
    ("or", Opcode::Or),
    ("addf", Opcode::AddF),
    ("subf", Opcode::SubF),
    ("mulf", Opcode::MulF),
    ("divf", Opcode::DivF),
    ("modf", Opcode::ModF),
    ("cmpe", Opcode::Cmpe),
    ("cmpne", Opcode::Cmpne),
    ("cmpg", Opcode::Cmpg),
    ("cmpl", Opcode::Cmpl),
    ("cmpge", Opcode::Cmpge),
    ("cmple", Opcode::Cmple),
    ("itof", Opcode::Itof),
    ("ftoi", Opcode::Ftoi),
    ("itoc", Opcode::Itoc),
    ("dup", Opcode::Dup),
    ("indup", Opcode::Indup),
    ("swap", Opcode::Swap),
    ("inswap", Opcode::Inswap),
    ("mov", Opcode::Mov),
    ("call", Opcode::Call),
    ("ret", Opcode::Ret),
    ("native", Opcode::Native),
    ("push_str", Opcode::PushStr),
    ("get_str", Opcode::GetStr),
    ("strlen", Opcode::Strlen),
    ("print", Opcode::Print),
    ("reg_commit", Opcode::RegCommit),
    ("reg_check", Opcode::RegCheck),
    ("mirror", Opcode::Mirror),
    ("hlt", Opcode::Halt),
];

impl Opcode {
    /// Decodifica um byte de opcode
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x00 => Self::Halt,
            0x01 => Self::Push,
            0x02 => Self::Pop,
            0x03 => Self::Add,
            0x04 => Self::Sub,
            0x05 => Self::Mul,
            0x06 => Self::Div,
            0x07 => Self::Jmp,
            0x08 => Self::Zjmp,
            0x09 => Self::Nzjmp,
            0x0A => Self::Load,
            0x0B => Self::Store,
            0x0C => Self::Nop,
            0x0D => Self::Mod,
            0x0E => Self::And,
            0x0F => Self::Or,
            0x10 => Self::AddF,
            0x11 => Self::SubF,
            0x12 => Self::MulF,
            0x13 => Self::DivF,
            0x14 => Self::ModF,
            0x18 => Self::Cmpe,
            0x19 => Self::Cmpne,
            0x1A => Self::Cmpg,
            0x1B => Self::Cmpl,
            0x1C => Self::Cmpge,
            0x1D => Self::Cmple,
            0x20 => Self::Itof,
            0x21 => Self::Ftoi,
            0x22 => Self::Itoc,
            0x28 => Self::Dup,
            0x29 => Self::Indup,
            0x2A => Self::Swap,
            0x2B => Self::Inswap,
            0x2C => Self::Mov,
            0x30 => Self::Call,
            0x31 => Self::Ret,
            0x32 => Self::Native,
            0x38 => Self::PushStr,
            0x39 => Self::GetStr,
            0x3A => Self::Strlen,
            0x3B => Self::Print,
            0xF0 => Self::RegCommit,
            0xF1 => Self::RegCheck,
            0xF2 => Self::Mirror,
            _ => return None,
        })
    }

    /// Busca um mnemônico do fonte (case-insensitive)
    pub fn from_mnemonic(text: &str) -> Option<Self> {
        MNEMONICS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(text))
            .map(|&(_, op)| op)
    }

    /// Mnemônico canônico
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::Halt => "halt",
            Self::Push => "push",
            Self::Pop => "pop",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Jmp => "jmp",
            Self::Zjmp => "zjmp",
            Self::Nzjmp => "nzjmp",
            Self::Load => "load",
            Self::Store => "store",
            Self::Nop => "nop",
            Self::Mod => "mod",
            Self::And => "and",
            Self::Or => "or",
            Self::AddF => "addf",
            Self::SubF => "subf",
            Self::MulF => "mulf",
            Self::DivF => "divf",
            Self::ModF => "modf",
            Self::Cmpe => "cmpe",
            Self::Cmpne => "cmpne",
            Self::Cmpg => "cmpg",
            Self::Cmpl => "cmpl",
            Self::Cmpge => "cmpge",
            Self::Cmple => "cmple",
            Self::Itof => "itof",
            Self::Ftoi => "ftoi",
            Self::Itoc => "itoc",
            Self::Dup => "dup",
            Self::Indup => "indup",
            Self::Swap => "swap",
            Self::Inswap => "inswap",
            Self::Mov => "mov",
            Self::Call => "call",
            Self::Ret => "ret",
            Self::Native => "native",
            Self::PushStr => "push_str",
            Self::GetStr => "get_str",
            Self::Strlen => "strlen",
            Self::Print => "print",
            Self::RegCommit => "reg_commit",
            Self::RegCheck => "reg_check",
            Self::Mirror => "mirror",
        }
    }

    pub fn category(&self) -> OpcodeCategory {
        use Opcode::*;
        match self {
            Halt | Nop => OpcodeCategory::Control,
            Push | Pop | Dup | Indup | Swap | Inswap | Mov | PushStr | GetStr => {
                OpcodeCategory::Stack
            }
            Add | Sub | Mul | Div | Mod | And | Or | AddF | SubF | MulF | DivF | ModF
            | Strlen => OpcodeCategory::Arithmetic,
            Cmpe | Cmpne | Cmpg | Cmpl | Cmpge | Cmple => OpcodeCategory::Compare,
            Itof | Ftoi | Itoc => OpcodeCategory::Convert,
            Load | Store => OpcodeCategory::Memory,
            Jmp | Zjmp | Nzjmp | Call | Ret => OpcodeCategory::Branch,
            Native | Print => OpcodeCategory::System,
            RegCommit | RegCheck | Mirror => OpcodeCategory::Registration,
        }
    }

    /// Operando que o encoder consome após este opcode
    pub fn shape(&self) -> OperandShape {
        use Opcode::*;
        match self {
            Call | Native | Jmp | Zjmp | Nzjmp => OperandShape::Target,
            Push | Inswap | Indup | GetStr => OperandShape::Literal,
            Mov => OperandShape::Move,
            PushStr => OperandShape::StringRef,
            _ => OperandShape::None,
        }
    }

    /// Se o operando é posição de código (rebaixado para offset em bytes).
    /// `native` tem a forma de alvo mas carrega um id de chamada.
    pub fn takes_address(&self) -> bool {
        matches!(self, Self::Jmp | Self::Zjmp | Self::Nzjmp | Self::Call)
    }

    /// Número de entradas da pilha que o opcode consome
    pub fn stack_inputs(&self) -> usize {
        use Opcode::*;
        match self {
            Add | Sub | Mul | Div | Mod | And | Or | AddF | SubF | MulF | DivF | ModF | Cmpe
            | Cmpne | Cmpg | Cmpl | Cmpge | Cmple | Swap | Store => 2,
            Pop | Itof | Ftoi | Itoc | Dup | Zjmp | Nzjmp | Ret | Strlen | Print | Load => 1,
            _ => 0,
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for byte in 0..=255u8 {
            if let Some(op) = Opcode::from_byte(byte) {
                assert_eq!(op as u8, byte);
            }
        }
    }

    #[test]
    fn test_reference_byte_values() {
        assert_eq!(Opcode::Halt as u8, 0x00);
        assert_eq!(Opcode::Push as u8, 0x01);
        assert_eq!(Opcode::Add as u8, 0x03);
        assert_eq!(Opcode::RegCommit as u8, 0xF0);
        assert_eq!(Opcode::Mirror as u8, 0xF2);
    }

    #[test]
    fn test_mnemonic_table_is_consistent() {
        for (name, op) in MNEMONICS {
            assert_eq!(Opcode::from_mnemonic(name), Some(op));
        }
        for byte in 0..=255u8 {
            if let Some(op) = Opcode::from_byte(byte) {
                assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(op));
            }
        }
        assert_eq!(Opcode::from_mnemonic("PUSH"), Some(Opcode::Push));
        assert_eq!(Opcode::from_mnemonic("frobnicate"), None);
    }

    #[test]
    fn test_shapes() {
        assert_eq!(Opcode::Jmp.shape(), OperandShape::Target);
        assert_eq!(Opcode::Push.shape(), OperandShape::Literal);
        assert_eq!(Opcode::Mov.shape(), OperandShape::Move);
        assert_eq!(Opcode::PushStr.shape(), OperandShape::StringRef);
        assert_eq!(Opcode::Add.shape(), OperandShape::None);
        assert!(Opcode::Call.takes_address());
        assert!(!Opcode::Native.takes_address());
    }

    #[test]
    fn test_categories() {
        assert_eq!(Opcode::Halt.category(), OpcodeCategory::Control);
        assert_eq!(Opcode::Push.category(), OpcodeCategory::Stack);
        assert_eq!(Opcode::Add.category(), OpcodeCategory::Arithmetic);
        assert_eq!(Opcode::Store.category(), OpcodeCategory::Memory);
        assert_eq!(Opcode::Call.category(), OpcodeCategory::Branch);
        assert_eq!(Opcode::Mirror.category(), OpcodeCategory::Registration);
    }
}
