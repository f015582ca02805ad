//! Modelo de programa
//!
//! Um [`Program`] é produzido uma vez (pelo encoder, pelo loader de
//! bytecode ou por serde) e é somente leitura depois disso. Todos passam
//! pelo [`ProgramBuilder`], que aplica cada limite de encode: tamanho do
//! programa, pool de strings, shape dos operandos e referências ao pool.

use serde::{Deserialize, Serialize};

use crate::error::{CapacityExceeded, EncodeResult, EncodingError, ProgramError};
use crate::instruction::Instruction;
use crate::opcode::Opcode;
use crate::operand::Operand;

/// Máximo de instruções por programa
pub const MAX_PROGRAM_SIZE: usize = 1024;

/// Tamanho do register file; operandos de registrador são checados contra ele
pub const NUM_REGISTERS: usize = 8;

/// Máximo de entradas no string pool
pub const MAX_STRINGS: usize = 4096;

/// Máximo de bytes UTF-8 no string pool
pub const MAX_STRING_BYTES: usize = 65536;

/// Literais de string internados, endereçados pelo índice de inserção.
/// Serializa como lista; ao desserializar, a contagem de bytes é refeita.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "Vec<String>", try_from = "Vec<String>")]
pub struct StringPool {
    strings: Vec<String>,
    bytes: usize,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acrescenta `text` no próximo índice
    pub fn intern(&mut self, text: &str) -> Result<u32, CapacityExceeded> {
        if self.strings.len() >= MAX_STRINGS {
            return Err(CapacityExceeded::new("string pool", MAX_STRINGS));
        }
        if self.bytes + text.len() > MAX_STRING_BYTES {
            return Err(CapacityExceeded::new("string pool bytes", MAX_STRING_BYTES));
        }
        let index = self.strings.len() as u32;
        self.strings.push(text.to_owned());
        self.bytes += text.len();
        Ok(index)
    }

    pub fn get(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Total de bytes UTF-8 internados
    pub fn byte_len(&self) -> usize {
        self.bytes
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }
}

impl From<StringPool> for Vec<String> {
    fn from(pool: StringPool) -> Self {
        pool.strings
    }
}

impl TryFrom<Vec<String>> for StringPool {
    type Error = CapacityExceeded;

    fn try_from(strings: Vec<String>) -> Result<Self, Self::Error> {
        let mut pool = Self::new();
        for text in &strings {
            pool.intern(text)?;
        }
        Ok(pool)
    }
}

/// Entry point: offset + flag "declarado"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntryPoint {
    /// Índice da instrução onde a execução começa
    pub offset: u32,
    pub declared: bool,
}

/// Programa codificado, imutável
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "ProgramParts")]
pub struct Program {
    instructions: Vec<Instruction>,
    strings: StringPool,
    entry: EntryPoint,
}

/// Forma desserializada, revalidada pelo builder
#[derive(Deserialize)]
struct ProgramParts {
    instructions: Vec<Instruction>,
    strings: StringPool,
    entry: EntryPoint,
}

impl TryFrom<ProgramParts> for Program {
    type Error = ProgramError;

    fn try_from(parts: ProgramParts) -> Result<Self, Self::Error> {
        let mut builder = ProgramBuilder::with_strings(parts.strings);
        for instr in parts.instructions {
            builder.push(instr)?;
        }
        builder.set_entry(parts.entry);
        Ok(builder.build())
    }
}

impl Program {
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    pub fn entry(&self) -> EntryPoint {
        self.entry
    }

    /// Entry point declarado, se houver
    pub fn entry_point(&self) -> Option<u32> {
        self.entry.declared.then_some(self.entry.offset)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Listagem com índices de instrução, seguida do string pool
    pub fn disassemble(&self) -> String {
        let mut output = String::new();
        if let Some(entry) = self.entry_point() {
            output.push_str(&format!("; entrypoint {}\n", entry));
        }
        for (index, instr) in self.instructions.iter().enumerate() {
            output.push_str(&format!("{:04}  {}\n", index, instr));
        }
        if !self.strings.is_empty() {
            output.push_str("\n; strings\n");
            for (index, text) in self.strings.iter().enumerate() {
                output.push_str(&format!("${:<4} {:?}\n", index, text));
            }
        }
        output
    }
}

/// Construção incremental com as checagens de encode
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    instructions: Vec<Instruction>,
    strings: StringPool,
    entry: EntryPoint,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Começa de um pool já preenchido (loader e serde)
    pub(crate) fn with_strings(strings: StringPool) -> Self {
        Self {
            strings,
            ..Self::default()
        }
    }

    /// Acrescenta uma instrução. Recusa programa cheio, shape inválido e
    /// `push_str` para string ainda não internada.
    pub fn push(&mut self, instr: Instruction) -> Result<&mut Self, ProgramError> {
        let index = self.instructions.len();
        if index >= MAX_PROGRAM_SIZE {
            return Err(CapacityExceeded::new("program", MAX_PROGRAM_SIZE).into());
        }
        if !instr.is_well_formed() {
            return Err(ProgramError::MalformedInstruction {
                index,
                instruction: instr.to_string(),
            });
        }
        if let Operand::StringIndex(string) = instr.operand {
            if self.strings.get(string).is_none() {
                return Err(ProgramError::DanglingString {
                    index,
                    string,
                    len: self.strings.len(),
                });
            }
        }
        self.instructions.push(instr);
        Ok(self)
    }

    /// Instrução sem operando
    pub fn op(&mut self, opcode: Opcode) -> Result<&mut Self, ProgramError> {
        self.push(Instruction::bare(opcode))
    }

    /// Instrução com um operando
    pub fn op_with(&mut self, opcode: Opcode, operand: Operand) -> Result<&mut Self, ProgramError> {
        self.push(Instruction::with_operand(opcode, operand))
    }

    /// Interna `text` e emite `push_str` apontando para ele
    pub fn push_str(&mut self, text: &str) -> Result<&mut Self, ProgramError> {
        let index = self.strings.intern(text)?;
        self.push(Instruction::with_operand(Opcode::PushStr, Operand::StringIndex(index)))
    }

    pub fn intern(&mut self, text: &str) -> Result<u32, CapacityExceeded> {
        self.strings.intern(text)
    }

    /// Declara o entry point; uma segunda declaração é erro
    pub fn declare_entry(&mut self, offset: u32, line: usize) -> EncodeResult<&mut Self> {
        if self.entry.declared {
            return Err(EncodingError::DuplicateEntryPoint { line });
        }
        self.entry = EntryPoint {
            offset,
            declared: true,
        };
        Ok(self)
    }

    /// Restaura um entry point armazenado, como está
    pub(crate) fn set_entry(&mut self, entry: EntryPoint) -> &mut Self {
        self.entry = entry;
        self
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn build(self) -> Program {
        Program {
            instructions: self.instructions,
            strings: self.strings,
            entry: self.entry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_pool_indices_are_sequential() {
        let mut pool = StringPool::new();
        assert_eq!(pool.intern("a").unwrap(), 0);
        assert_eq!(pool.intern("a").unwrap(), 1);
        assert_eq!(pool.intern("bc").unwrap(), 2);
        assert_eq!(pool.get(2), Some("bc"));
        assert_eq!(pool.get(3), None);
    }

    #[test]
    fn test_string_pool_byte_bound() {
        let mut pool = StringPool::new();
        let big = "x".repeat(MAX_STRING_BYTES);
        pool.intern(&big).unwrap();
        let err = pool.intern("y").unwrap_err();
        assert_eq!(err.container, "string pool bytes");
    }

    #[test]
    fn test_builder_rejects_second_entry() {
        let mut builder = ProgramBuilder::new();
        builder.declare_entry(2, 1).unwrap();
        let err = builder.declare_entry(4, 7).unwrap_err();
        assert_eq!(err, EncodingError::DuplicateEntryPoint { line: 7 });
        assert_eq!(builder.build().entry_point(), Some(2));
    }

    #[test]
    fn test_builder_program_bound() {
        let mut builder = ProgramBuilder::new();
        for _ in 0..MAX_PROGRAM_SIZE {
            builder.op(Opcode::Nop).unwrap();
        }
        assert!(builder.op(Opcode::Halt).is_err());
        assert_eq!(builder.len(), MAX_PROGRAM_SIZE);
    }

    #[test]
    fn test_disassemble_listing() {
        let mut builder = ProgramBuilder::new();
        builder
            .op_with(Opcode::Push, Operand::Int(10))
            .unwrap()
            .push_str("hi")
            .unwrap()
            .op(Opcode::Halt)
            .unwrap();
        let listing = builder.build().disassemble();
        assert!(listing.contains("0000  push 10"));
        assert!(listing.contains("0001  push_str $0"));
        assert!(listing.contains("\"hi\""));
    }

    #[test]
    fn test_builder_rejects_malformed_instructions() {
        let mut builder = ProgramBuilder::new();
        let headless_mov = Instruction {
            register: None,
            ..Instruction::mov(5, Operand::Int(42))
        };
        assert!(matches!(
            builder.push(headless_mov),
            Err(ProgramError::MalformedInstruction { index: 0, .. })
        ));
        assert!(builder.op(Opcode::Push).is_err());
        assert!(builder.op_with(Opcode::PushStr, Operand::StringIndex(0)).is_err());
        assert!(builder.is_empty());
    }

    #[test]
    fn test_deserialize_replays_through_builder() {
        let json = r#"{
            "instructions": [
                {"opcode": "PushStr", "register": null, "operand": {"StringIndex": 0}},
                {"opcode": "Halt", "register": null, "operand": "None"}
            ],
            "strings": ["abc"],
            "entry": {"offset": 0, "declared": false}
        }"#;
        let program: Program = serde_json::from_str(json).unwrap();
        assert_eq!(program.len(), 2);
        assert_eq!(program.strings().byte_len(), 3);

        let restored = Program::from_bytes(&program.to_bytes()).unwrap();
        assert_eq!(restored, program);
    }

    #[test]
    fn test_deserialize_rejects_out_of_range_register() {
        let json = r#"{
            "instructions": [
                {"opcode": "Mov", "register": 200, "operand": {"Int": 1}}
            ],
            "strings": [],
            "entry": {"offset": 0, "declared": false}
        }"#;
        let err = serde_json::from_str::<Program>(json).unwrap_err();
        assert!(err.to_string().contains("operand shape"));
    }

    #[test]
    fn test_deserialize_rejects_dangling_string() {
        let json = r#"{
            "instructions": [
                {"opcode": "PushStr", "register": null, "operand": {"StringIndex": 3}}
            ],
            "strings": ["only"],
            "entry": {"offset": 0, "declared": false}
        }"#;
        assert!(serde_json::from_str::<Program>(json).is_err());
    }

    #[test]
    fn test_deserialize_rejects_oversized_program() {
        let halt = r#"{"opcode": "Halt", "register": null, "operand": "None"}"#;
        let body = vec![halt; MAX_PROGRAM_SIZE + 1].join(",");
        let json = format!(
            r#"{{"instructions": [{}], "strings": [], "entry": {{"offset": 0, "declared": false}}}}"#,
            body
        );
        assert!(serde_json::from_str::<Program>(&json).is_err());
    }
}
