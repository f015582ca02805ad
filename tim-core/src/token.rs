//! Stream de tokens
//!
//! O contrato entre lexer e encoder. Tokens são dados simples: qualquer coisa
//! que produza um `Vec<Token>` (o [`lexer`](crate::lexer) embutido, um teste,
//! um gerador de código) pode alimentar [`encode`](crate::encoder::encode).

use std::fmt;

/// Posição no fonte (base 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

/// Tipo léxico de um token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Keyword de instrução (`push`, `reg_commit`, ...)
    Mnemonic,
    /// Diretiva `@entrypoint`
    EntryPoint,
    Int,
    Float,
    Char,
    Str,
    /// `rN`
    Register,
    /// Marcador `top`
    Top,
}

impl TokenKind {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Mnemonic => "instruction",
            Self::EntryPoint => "entrypoint directive",
            Self::Int => "integer",
            Self::Float => "float",
            Self::Char => "char",
            Self::Str => "string",
            Self::Register => "register",
            Self::Top => "top",
        }
    }
}

/// Um token.
///
/// `text` é o slice bruto do fonte, exceto em `Char` e `Str`, onde guarda o
/// conteúdo sem escapes e sem aspas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
        }
    }

    /// Token sem posição significativa
    pub fn bare(kind: TokenKind, text: impl Into<String>) -> Self {
        Self::new(kind, text, Span::default())
    }

    pub fn line(&self) -> usize {
        self.span.line
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Char => write!(f, "'{}'", self.text.escape_default()),
            TokenKind::Str => write!(f, "\"{}\"", self.text.escape_default()),
            _ => write!(f, "{}", self.text),
        }
    }
}
