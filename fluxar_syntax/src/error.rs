use thiserror::Error;

use crate::token::Span;

#[derive(Clone, Debug, PartialEq, Error)]
#[error("Lexical Error: {message}\n  {span}")]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Error)]
#[error("Invalid Syntax: {message}\n  {span}")]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
}

#[derive(Debug)]
pub enum ErrorMsg {
    // Lex errors
    IllegalChar(char),
    ExpectedEqualAfterBang,
    UnterminatedString,
    MalformedNumber,
    // Parse errors
    Expected(&'static str),
    InvalidAssignment,
}

impl std::fmt::Display for ErrorMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IllegalChar(c) => write!(f, "Illegal character '{c}'"),
            Self::ExpectedEqualAfterBang => f.write_str("Expected '=' after '!'"),
            Self::UnterminatedString => f.write_str("Unterminated string"),
            Self::MalformedNumber => f.write_str("Number literal has more than one '.'"),
            Self::Expected(what) => write!(f, "Expected {what}"),
            Self::InvalidAssignment => f.write_str("Expected identifier or index before '='"),
        }
    }
}

impl LexError {
    pub fn new(msg: ErrorMsg, span: Span) -> Self {
        Self {
            message: msg.to_string(),
            span,
        }
    }
}

impl SyntaxError {
    pub fn new(msg: ErrorMsg, span: Span) -> Self {
        Self {
            message: msg.to_string(),
            span,
        }
    }
}
