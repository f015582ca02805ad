//! Encoder de instruções
//!
//! Consome um stream de tokens e produz um [`Program`] imutável. O encoding é
//! tudo-ou-nada: o primeiro erro aborta e nenhum programa é retornado.
//!
//! Regras de operando seguem [`Opcode::shape`]:
//!
//! | shape       | tokens seguintes                                 |
//! |-------------|--------------------------------------------------|
//! | `Target`    | inteiro                                          |
//! | `Literal`   | inteiro, float, char ou registrador              |
//! | `Move`      | registrador, depois literal ou `top`             |
//! | `StringRef` | string (internada no próximo índice do pool)     |
//!
//! `@entrypoint N` registra o índice de instrução `N` como entry point e
//! é codificado como `nop`.

use tracing::debug;

use crate::error::{EncodeResult, EncodingError};
use crate::instruction::Instruction;
use crate::lexer;
use crate::opcode::{Opcode, OperandShape};
use crate::operand::Operand;
use crate::program::{NUM_REGISTERS, Program, ProgramBuilder};
use crate::token::{Token, TokenKind};

/// Codifica um stream de tokens completo
pub fn encode(tokens: &[Token]) -> EncodeResult<Program> {
    Encoder::new(tokens).run()
}

/// Faz lexing e encoding de fonte assembly
pub fn assemble(source: &str) -> EncodeResult<Program> {
    let tokens = lexer::tokenize(source)?;
    encode(&tokens)
}

struct Encoder<'t> {
    tokens: std::slice::Iter<'t, Token>,
    builder: ProgramBuilder,
}

impl<'t> Encoder<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens: tokens.iter(),
            builder: ProgramBuilder::new(),
        }
    }

    fn run(mut self) -> EncodeResult<Program> {
        while let Some(token) = self.tokens.next() {
            match token.kind {
                TokenKind::Mnemonic => {
                    let opcode = Opcode::from_mnemonic(&token.text).ok_or_else(|| {
                        EncodingError::UnexpectedToken {
                            found: token.text.clone(),
                            line: token.line(),
                        }
                    })?;
                    self.instruction(opcode)?;
                }
                TokenKind::EntryPoint => self.entry_point(token)?,
                _ => {
                    return Err(EncodingError::UnexpectedToken {
                        found: token.to_string(),
                        line: token.line(),
                    });
                }
            }
        }

        let program = self.builder.build();
        debug!(
            instructions = program.len(),
            strings = program.strings().len(),
            entry = ?program.entry_point(),
            "program encoded"
        );
        Ok(program)
    }

    fn instruction(&mut self, opcode: Opcode) -> EncodeResult<()> {
        let instr = match opcode.shape() {
            OperandShape::None => Instruction::bare(opcode),
            OperandShape::Target => {
                let token = self.operand_token(opcode)?;
                match token.kind {
                    TokenKind::Int => Instruction::with_operand(opcode, Operand::Int(parse_int(token)?)),
                    _ => return Err(malformed(opcode, token)),
                }
            }
            OperandShape::Literal => {
                let token = self.operand_token(opcode)?;
                Instruction::with_operand(opcode, literal(opcode, token)?)
            }
            OperandShape::Move => {
                let token = self.operand_token(opcode)?;
                let register = match token.kind {
                    TokenKind::Register => parse_register(token)?,
                    _ => return Err(malformed(opcode, token)),
                };
                let token = self.operand_token(opcode)?;
                let source = match token.kind {
                    TokenKind::Top => Operand::Top,
                    _ => literal(opcode, token)?,
                };
                Instruction::mov(register, source)
            }
            OperandShape::StringRef => {
                let token = self.operand_token(opcode)?;
                if token.kind != TokenKind::Str {
                    return Err(malformed(opcode, token));
                }
                let index = self.builder.intern(&token.text)?;
                Instruction::with_operand(opcode, Operand::StringIndex(index))
            }
        };
        self.builder.push(instr)?;
        Ok(())
    }

    fn entry_point(&mut self, directive: &Token) -> EncodeResult<()> {
        let token = self
            .tokens
            .next()
            .ok_or(EncodingError::MissingOperand { mnemonic: "@entrypoint" })?;
        if token.kind != TokenKind::Int {
            return Err(EncodingError::MalformedOperand {
                mnemonic: "@entrypoint",
                found: token.to_string(),
                line: token.line(),
            });
        }
        let offset = u32::try_from(parse_int(token)?).map_err(|_| EncodingError::InvalidLiteral {
            kind: "entrypoint",
            text: token.text.clone(),
            line: token.line(),
        })?;
        self.builder.declare_entry(offset, directive.line())?;
        self.builder.op(Opcode::Nop)?;
        Ok(())
    }

    fn operand_token(&mut self, opcode: Opcode) -> EncodeResult<&'t Token> {
        self.tokens.next().ok_or(EncodingError::MissingOperand {
            mnemonic: opcode.mnemonic(),
        })
    }
}

fn literal(opcode: Opcode, token: &Token) -> EncodeResult<Operand> {
    Ok(match token.kind {
        TokenKind::Int => Operand::Int(parse_int(token)?),
        TokenKind::Float => Operand::Float(parse_float(token)?),
        TokenKind::Char => Operand::Char(parse_char(token)?),
        TokenKind::Register => Operand::Register(parse_register(token)?),
        _ => return Err(malformed(opcode, token)),
    })
}

fn malformed(opcode: Opcode, token: &Token) -> EncodingError {
    EncodingError::MalformedOperand {
        mnemonic: opcode.mnemonic(),
        found: token.to_string(),
        line: token.line(),
    }
}

fn invalid(kind: &'static str, token: &Token) -> EncodingError {
    EncodingError::InvalidLiteral {
        kind,
        text: token.text.clone(),
        line: token.line(),
    }
}

fn parse_int(token: &Token) -> EncodeResult<i64> {
    let text = token.text.as_str();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i128::from_str_radix(hex, 16),
        None => digits.parse::<i128>(),
    }
    .map_err(|_| invalid("integer", token))?;
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).map_err(|_| invalid("integer", token))
}

fn parse_float(token: &Token) -> EncodeResult<f64> {
    token.text.parse().map_err(|_| invalid("float", token))
}

fn parse_char(token: &Token) -> EncodeResult<char> {
    let mut chars = token.text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(invalid("char", token)),
    }
}

fn parse_register(token: &Token) -> EncodeResult<u8> {
    let digits = token.text.get(1..).unwrap_or_default();
    let index: u64 = digits.parse().map_err(|_| invalid("register", token))?;
    if index >= NUM_REGISTERS as u64 {
        return Err(EncodingError::RegisterOutOfRange {
            index,
            max: NUM_REGISTERS - 1,
            line: token.line(),
        });
    }
    Ok(index as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::MAX_PROGRAM_SIZE;

    #[test]
    fn test_reference_program() {
        let program = assemble("push 10, push 20, add, reg_commit, mirror, halt").unwrap();
        let ops: Vec<Opcode> = program.instructions().iter().map(|i| i.opcode).collect();
        assert_eq!(
            ops,
            vec![
                Opcode::Push,
                Opcode::Push,
                Opcode::Add,
                Opcode::RegCommit,
                Opcode::Mirror,
                Opcode::Halt
            ]
        );
        assert_eq!(program.instructions()[1].operand, Operand::Int(20));
        assert_eq!(program.entry_point(), None);
    }

    #[test]
    fn test_duplicate_entrypoint_fails() {
        let err = assemble("@entrypoint 0\nhalt\n@entrypoint 1").unwrap_err();
        assert_eq!(err, EncodingError::DuplicateEntryPoint { line: 3 });
    }

    #[test]
    fn test_entrypoint_becomes_nop() {
        let program = assemble("push 1\n@entrypoint 2\nhalt").unwrap();
        assert_eq!(program.instructions()[1], Instruction::bare(Opcode::Nop));
        assert_eq!(program.entry_point(), Some(2));
        assert!(program.entry().declared);
    }

    #[test]
    fn test_register_bounds() {
        let program = assemble("mov r7 42").unwrap();
        assert_eq!(program.instructions()[0], Instruction::mov(7, Operand::Int(42)));

        let err = assemble("mov r8 1").unwrap_err();
        assert!(matches!(err, EncodingError::RegisterOutOfRange { index: 8, max: 7, .. }));

        let err = assemble("push r99").unwrap_err();
        assert!(matches!(err, EncodingError::RegisterOutOfRange { index: 99, .. }));
    }

    #[test]
    fn test_mov_sources() {
        let program = assemble("mov r0 top\nmov r1 'z'\nmov r2 r0\nmov r3 1.5").unwrap();
        let sources: Vec<Operand> = program.instructions().iter().map(|i| i.operand).collect();
        assert_eq!(
            sources,
            vec![
                Operand::Top,
                Operand::Char('z'),
                Operand::Register(0),
                Operand::Float(1.5)
            ]
        );
    }

    #[test]
    fn test_malformed_operands() {
        assert!(matches!(
            assemble("jmp 1.5").unwrap_err(),
            EncodingError::MalformedOperand { mnemonic: "jmp", .. }
        ));
        assert!(matches!(
            assemble("push top").unwrap_err(),
            EncodingError::MalformedOperand { mnemonic: "push", .. }
        ));
        assert!(matches!(
            assemble("mov 3 4").unwrap_err(),
            EncodingError::MalformedOperand { mnemonic: "mov", .. }
        ));
        assert!(matches!(
            assemble("push_str 5").unwrap_err(),
            EncodingError::MalformedOperand { mnemonic: "push_str", .. }
        ));
        assert!(matches!(
            assemble("push push").unwrap_err(),
            EncodingError::MalformedOperand { .. }
        ));
    }

    #[test]
    fn test_missing_operand_and_stray_literal() {
        assert_eq!(
            assemble("push").unwrap_err(),
            EncodingError::MissingOperand { mnemonic: "push" }
        );
        assert!(matches!(
            assemble("halt 4").unwrap_err(),
            EncodingError::UnexpectedToken { line: 1, .. }
        ));
    }

    #[test]
    fn test_push_str_interns_sequentially() {
        let program = assemble(r#"push_str "a" push_str "b" push_str "a""#).unwrap();
        let indices: Vec<Operand> = program.instructions().iter().map(|i| i.operand).collect();
        assert_eq!(
            indices,
            vec![
                Operand::StringIndex(0),
                Operand::StringIndex(1),
                Operand::StringIndex(2)
            ]
        );
        assert_eq!(program.strings().get(1), Some("b"));
        assert_eq!(program.strings().len(), 3);
    }

    #[test]
    fn test_int_literals() {
        let program = assemble("push 0x10 push -0x2 push -9").unwrap();
        let values: Vec<Operand> = program.instructions().iter().map(|i| i.operand).collect();
        assert_eq!(values, vec![Operand::Int(16), Operand::Int(-2), Operand::Int(-9)]);

        assert!(matches!(
            assemble("push 99999999999999999999").unwrap_err(),
            EncodingError::InvalidLiteral { kind: "integer", .. }
        ));
        assert!(matches!(
            assemble("@entrypoint -1").unwrap_err(),
            EncodingError::InvalidLiteral { .. }
        ));
    }

    #[test]
    fn test_encode_from_hand_built_tokens() {
        let tokens = vec![
            Token::bare(TokenKind::Mnemonic, "push"),
            Token::bare(TokenKind::Char, "x"),
            Token::bare(TokenKind::Mnemonic, "print"),
        ];
        let program = encode(&tokens).unwrap();
        assert_eq!(program.instructions()[0].operand, Operand::Char('x'));

        let bad = vec![Token::bare(TokenKind::Mnemonic, "warp")];
        assert!(matches!(
            encode(&bad).unwrap_err(),
            EncodingError::UnexpectedToken { .. }
        ));
    }

    #[test]
    fn test_program_size_bound() {
        let source = "nop ".repeat(MAX_PROGRAM_SIZE + 1);
        assert!(matches!(
            assemble(&source).unwrap_err(),
            EncodingError::Capacity(_)
        ));
    }

    #[test]
    fn test_lex_error_surfaces() {
        assert!(matches!(assemble("push $").unwrap_err(), EncodingError::Lex(_)));
    }
}
