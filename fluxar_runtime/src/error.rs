use std::fmt::Display;

use fluxar_syntax::{
    ast::{BinOp, UnaryOp},
    error::{LexError, SyntaxError},
    token::Span,
};
use thiserror::Error;

/// Any failure of one pass through the pipeline
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// One entry of a traceback: the call context active at `span`
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub label: String,
    pub span: Span,
}

impl Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, in {}", self.span, self.label)
    }
}

#[derive(Clone, Debug, PartialEq, Error)]
#[error("{}Runtime Error: {message}", render_traceback(.traceback))]
pub struct RuntimeError {
    pub message: String,
    pub span: Span,
    /// Innermost call first; the last frame is always the program
    pub traceback: Vec<Frame>,
}

fn render_traceback(frames: &[Frame]) -> String {
    let mut out = String::from("Traceback (innermost call first):\n");
    for frame in frames {
        out.push_str(&format!("  {frame}\n"));
    }
    out
}

impl RuntimeError {
    pub fn new(msg: ErrorMsg, span: Span, traceback: Vec<Frame>) -> Self {
        Self {
            message: msg.to_string(),
            span,
            traceback,
        }
    }
}

#[derive(Debug)]
pub enum ErrorMsg {
    // Name resolution
    Undefined(String),
    // Operators
    DivisionByZero,
    ModuloByZero,
    IllegalUnary(UnaryOp, &'static str),
    IllegalBinary(&'static str, BinOp, &'static str),
    IllegalIndex(&'static str, &'static str),
    IndexOutOfRange,
    StringTooLong,
    NotRealPower,
    // Control flow
    NotACondition(&'static str),
    ExpectedNumber(&'static str, &'static str),
    ZeroStep,
    NotIterable(&'static str),
    OutsideFunction,
    OutsideLoop(&'static str),
    // Calls
    NotCallable(String),
    TooManyArgs(String, usize, usize),
    TooFewArgs(String, usize, usize),
    ArgType(&'static str, String, &'static str),
    // Built-in specific failures
    Custom(String),
}

impl Display for ErrorMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Undefined(name) => write!(f, "'{name}' is not defined"),
            Self::DivisionByZero => f.write_str("Division by zero"),
            Self::ModuloByZero => f.write_str("Modulo by zero"),
            Self::IllegalUnary(op, ty) => write!(f, "Illegal operation: {op} {ty}"),
            Self::IllegalBinary(lhs, op, rhs) => {
                write!(f, "Illegal operation: {lhs} {op} {rhs}")
            }
            Self::IllegalIndex(target, index) => {
                write!(f, "Illegal operation: cannot index {target} with {index}")
            }
            Self::IndexOutOfRange => f.write_str("Index out of range"),
            Self::StringTooLong => f.write_str("Resulting string is too long"),
            Self::NotRealPower => f.write_str("Power has no real result"),
            Self::NotACondition(ty) => write!(f, "Condition must be a number, found {ty}"),
            Self::ExpectedNumber(what, ty) => write!(f, "{what} must be a number, found {ty}"),
            Self::ZeroStep => f.write_str("Step of a for loop cannot be 0"),
            Self::NotIterable(ty) => write!(f, "Cannot iterate over {ty}"),
            Self::OutsideFunction => f.write_str("'return' outside of a function"),
            Self::OutsideLoop(keyword) => write!(f, "'{keyword}' outside of a loop"),
            Self::NotCallable(value) => write!(f, "'{value}' is not callable"),
            Self::TooManyArgs(name, expected, got) => write!(
                f,
                "Too many arguments passed into '{name}' (expected {expected}, got {got})"
            ),
            Self::TooFewArgs(name, expected, got) => write!(
                f,
                "Too few arguments passed into '{name}' (expected {expected}, got {got})"
            ),
            Self::ArgType(arg, func, ty) => {
                write!(f, "Argument '{arg}' of {func}() must be a {ty}")
            }
            Self::Custom(msg) => f.write_str(msg),
        }
    }
}
