//! Lexer do assembly TIM
//!
//! Transforma fonte assembly no stream de [`Token`] consumido pelo encoder.
//!
//! ```text
//! ; comentário até o fim da linha
//! @entrypoint 2
//! push 10, push 0x14
//! mov r1 top
//! push_str "hello\n"
//! ```
//!
//! Vírgulas separam, como espaço. Keywords são case-insensitive.

use logos::Logos;

use crate::error::LexError;
use crate::opcode::Opcode;
use crate::token::{Span, Token, TokenKind};

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n\f,]+")]
#[logos(skip r";[^\n]*")]
enum RawToken {
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Word,

    #[regex(r"[@.][a-zA-Z_]+")]
    Directive,

    #[regex(r"-?[0-9]+")]
    #[regex(r"-?0[xX][0-9a-fA-F]+")]
    Int,

    #[regex(r"-?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?")]
    Float,

    #[regex(r"'([^'\\\n]|\\.)'")]
    Char,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    Str,
}

pub struct Lexer<'src> {
    source: &'src str,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self { source }
    }

    /// Tokeniza todo o fonte, parando no primeiro lexema inválido
    pub fn tokenize(&self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        let mut lex = RawToken::lexer(self.source);

        let line_starts: Vec<usize> = std::iter::once(0)
            .chain(self.source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        while let Some(raw) = lex.next() {
            let slice = lex.slice();
            let (line, col) = offset_to_line_col(&line_starts, lex.span().start);
            let span = Span::new(line, col);
            let fail = || LexError {
                text: slice.to_string(),
                line,
                col,
            };

            let token = match raw {
                Ok(RawToken::Word) => Token::new(classify_word(slice).ok_or_else(fail)?, slice, span),
                Ok(RawToken::Directive) => {
                    if !is_entry_directive(slice) {
                        return Err(fail());
                    }
                    Token::new(TokenKind::EntryPoint, slice, span)
                }
                Ok(RawToken::Int) => Token::new(TokenKind::Int, slice, span),
                Ok(RawToken::Float) => Token::new(TokenKind::Float, slice, span),
                Ok(RawToken::Char) => {
                    let body = unescape(&slice[1..slice.len() - 1]).ok_or_else(fail)?;
                    Token::new(TokenKind::Char, body, span)
                }
                Ok(RawToken::Str) => {
                    let body = unescape(&slice[1..slice.len() - 1]).ok_or_else(fail)?;
                    Token::new(TokenKind::Str, body, span)
                }
                Err(()) => return Err(fail()),
            };
            tokens.push(token);
        }

        Ok(tokens)
    }
}

/// Atalho para `Lexer::new(source).tokenize()`
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}

fn classify_word(word: &str) -> Option<TokenKind> {
    if word.eq_ignore_ascii_case("top") {
        return Some(TokenKind::Top);
    }
    let mut chars = word.chars();
    if matches!(chars.next(), Some('r' | 'R'))
        && !chars.as_str().is_empty()
        && chars.as_str().bytes().all(|b| b.is_ascii_digit())
    {
        return Some(TokenKind::Register);
    }
    Opcode::from_mnemonic(word).map(|_| TokenKind::Mnemonic)
}

fn is_entry_directive(text: &str) -> bool {
    text.eq_ignore_ascii_case("@entrypoint") || text.eq_ignore_ascii_case(".entry")
}

fn unescape(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        out.push(match chars.next()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            _ => return None,
        });
    }
    Some(out)
}

/// Offset em bytes para linha e coluna (base 1)
fn offset_to_line_col(line_starts: &[usize], offset: usize) -> (usize, usize) {
    let line = line_starts.partition_point(|&start| start <= offset);
    let line_start = line_starts.get(line.saturating_sub(1)).copied().unwrap_or(0);
    (line, offset - line_start + 1)
}
