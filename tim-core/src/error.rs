//! Erros do TIM
//!
//! Falhas de encoding abortam antes de existir qualquer
//! [`Program`](crate::program::Program). Falhas em execução são
//! [`Violation`]s: nunca saem de [`TimVm::step`](crate::vm::TimVm::step),
//! ficam registradas na máquina e a param.

use serde::Serialize;
use thiserror::Error;

/// Tipo de resultado do encoder
pub type EncodeResult<T> = Result<T, EncodingError>;

/// Tipo de resultado do bytecode store
pub type BytecodeResult<T> = Result<T, BytecodeError>;

/// Um container limitado recusou crescer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{container} capacity exceeded (capacity {capacity})")]
pub struct CapacityExceeded {
    /// Qual container estourou
    pub container: &'static str,
    /// Capacidade fixa dele
    pub capacity: usize,
}

impl CapacityExceeded {
    pub const fn new(container: &'static str, capacity: usize) -> Self {
        Self { container, capacity }
    }
}

/// Erro léxico ao produzir o token stream
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}, col {col}: unexpected input '{text}'")]
pub struct LexError {
    pub text: String,
    pub line: usize,
    pub col: usize,
}

/// Instrução ou pool recusados pelo [`ProgramBuilder`](crate::program::ProgramBuilder)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProgramError {
    /// Registrador ou operando não batem com o shape do opcode
    #[error("instruction {index} ('{instruction}') does not fit the operand shape of its opcode")]
    MalformedInstruction { index: usize, instruction: String },

    /// `push_str` aponta para fora do pool
    #[error("instruction {index} references string {string}, pool holds {len}")]
    DanglingString { index: usize, string: u32, len: usize },

    #[error(transparent)]
    Capacity(#[from] CapacityExceeded),
}

/// Erros do encoder
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodingError {
    /// `@entrypoint` apareceu duas vezes
    #[error("line {line}: cannot define entrypoint more than once")]
    DuplicateEntryPoint { line: usize },

    /// Registrador além do register file
    #[error("line {line}: register index {index} is too great (max {max})")]
    RegisterOutOfRange { index: u64, max: usize, line: usize },

    /// Token de operando do tipo errado para o opcode
    #[error("line {line}: '{mnemonic}' cannot take operand '{found}'")]
    MalformedOperand {
        mnemonic: &'static str,
        found: String,
        line: usize,
    },

    /// Literal que não parseia como o tipo declarado
    #[error("line {line}: invalid {kind} literal '{text}'")]
    InvalidLiteral {
        kind: &'static str,
        text: String,
        line: usize,
    },

    /// Token stream acabou esperando um operando
    #[error("'{mnemonic}' expects an operand but the input ended")]
    MissingOperand { mnemonic: &'static str },

    /// Literal ou marcador onde se esperava instrução
    #[error("line {line}: expected an instruction, found '{found}'")]
    UnexpectedToken { found: String, line: usize },

    /// Programa ou string pool no limite
    #[error(transparent)]
    Capacity(#[from] CapacityExceeded),

    #[error(transparent)]
    Program(ProgramError),

    /// Lexing falhou antes do encoding
    #[error(transparent)]
    Lex(#[from] LexError),
}

impl From<ProgramError> for EncodingError {
    fn from(err: ProgramError) -> Self {
        match err {
            ProgramError::Capacity(capacity) => Self::Capacity(capacity),
            other => Self::Program(other),
        }
    }
}

/// Erros do bytecode store
#[derive(Debug, Error)]
pub enum BytecodeError {
    #[error("invalid magic: expected {expected:?}, got {found:?}")]
    BadMagic { expected: [u8; 4], found: [u8; 4] },

    #[error("unsupported bytecode version 0x{0:04X}")]
    UnsupportedVersion(u16),

    #[error("bytecode truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("invalid opcode 0x{opcode:02X} at offset {offset}")]
    InvalidOpcode { opcode: u8, offset: usize },

    #[error("invalid operand tag {tag} at offset {offset}")]
    InvalidOperandTag { tag: u8, offset: usize },

    /// Registrador ou operando incompatíveis com o opcode
    #[error("malformed instruction at offset {offset}")]
    MalformedInstruction { offset: usize },

    #[error("string pool entry {index} is not valid UTF-8")]
    InvalidUtf8 { index: usize },

    #[error(transparent)]
    Capacity(#[from] CapacityExceeded),

    #[error(transparent)]
    Program(ProgramError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProgramError> for BytecodeError {
    fn from(err: ProgramError) -> Self {
        match err {
            ProgramError::Capacity(capacity) => Self::Capacity(capacity),
            other => Self::Program(other),
        }
    }
}

/// Erros ao carregar um programa numa máquina nova
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("program image of {size} bytes does not fit in {capacity} bytes of memory")]
    ImageTooLarge { size: usize, capacity: usize },
}

/// Classe de uma [`Violation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViolationClass {
    /// Limite de stack, memória ou program counter
    Bounds,
    /// Invariante de registro quebrado
    Invariant,
    /// Instrução não pôde ser executada
    Execution,
}

/// Condição fatal que leva a máquina a `HaltedViolation`
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum Violation {
    #[error("stack overflow (capacity {capacity})")]
    StackOverflow { capacity: usize },

    #[error("stack underflow: {required} operand(s) required, {available} available")]
    StackUnderflow { required: usize, available: usize },

    #[error("program counter out of bounds: 0x{pc:08X}")]
    PcOutOfBounds { pc: usize },

    #[error("memory access out of bounds: 0x{addr:08X}")]
    MemoryOutOfBounds { addr: usize },

    #[error("register index {index} out of bounds")]
    RegisterOutOfBounds { index: u8 },

    #[error("string index {index} out of bounds")]
    StringOutOfBounds { index: u32 },

    #[error("invalid operand tag {tag} at 0x{addr:08X}")]
    InvalidOperand { tag: u8, addr: usize },

    #[error("integer division by zero")]
    DivisionByZero,

    #[error("native call {id} unsupported")]
    NativeCallUnsupported { id: i64 },

    #[error("simplex broken: probability sum = {sum}")]
    SimplexBroken { sum: f64 },

    #[error("efficiency bound exceeded: eta {eta} > max {eta_max}")]
    EfficiencyExceeded { eta: f64, eta_max: f64 },

    #[error("complexity bomb: c_reg {c_reg} > {ceiling}")]
    ComplexityBomb { c_reg: f64, ceiling: f64 },
}

impl Violation {
    pub fn class(&self) -> ViolationClass {
        match self {
            Self::StackOverflow { .. }
            | Self::StackUnderflow { .. }
            | Self::PcOutOfBounds { .. }
            | Self::MemoryOutOfBounds { .. }
            | Self::RegisterOutOfBounds { .. }
            | Self::StringOutOfBounds { .. } => ViolationClass::Bounds,
            Self::SimplexBroken { .. }
            | Self::EfficiencyExceeded { .. }
            | Self::ComplexityBomb { .. } => ViolationClass::Invariant,
            Self::InvalidOperand { .. }
            | Self::DivisionByZero
            | Self::NativeCallUnsupported { .. } => ViolationClass::Execution,
        }
    }
}
