use std::{fmt::Display, rc::Rc};

use crate::token::{Span, TokenKind};

#[derive(Clone, Debug)]
pub struct Node {
    pub span: Span,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self { span, kind }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    Plus,
    Not,
}

impl UnaryOp {
    pub fn from_token(t: TokenKind) -> Option<Self> {
        let op = match t {
            TokenKind::MINUS => Self::Minus,
            TokenKind::PLUS => Self::Plus,
            TokenKind::NOT => Self::Not,
            _ => return None,
        };
        Some(op)
    }
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Minus => "-",
            Self::Plus => "+",
            Self::Not => "not",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Plus,
    Minus,
    Star,
    Slash,
    Modulo,
    Caret,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    BangEqual,
    EqualEqual,
}

impl Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Modulo => "%",
            Self::Caret => "^",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::BangEqual => "!=",
            Self::EqualEqual => "==",
        })
    }
}

impl BinOp {
    pub fn from_token(t: TokenKind) -> Option<Self> {
        let op = match t {
            TokenKind::PLUS => Self::Plus,
            TokenKind::MINUS => Self::Minus,
            TokenKind::STAR => Self::Star,
            TokenKind::SLASH => Self::Slash,
            TokenKind::MODULO => Self::Modulo,
            TokenKind::CARET => Self::Caret,
            TokenKind::GREATER => Self::Greater,
            TokenKind::GREATER_EQUAL => Self::GreaterEqual,
            TokenKind::LESS => Self::Less,
            TokenKind::LESS_EQUAL => Self::LessEqual,
            TokenKind::BANG_EQUAL => Self::BangEqual,
            TokenKind::EQUAL_EQUAL => Self::EqualEqual,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn from_token(t: TokenKind) -> Option<Self> {
        let op = match t {
            TokenKind::AND => Self::And,
            TokenKind::OR => Self::Or,
            _ => return None,
        };
        Some(op)
    }
}

impl Display for LogicalOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::And => "and",
            Self::Or => "or",
        })
    }
}

/// Everything a function value needs from its definition site.
/// Shared so that function values never copy the body.
#[derive(Debug)]
pub struct FuncDecl {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Node,
    /// Written in arrow form (`func f(x) -> x`). Only rendering reads it,
    /// every body yields the value of its last statement when called.
    pub auto_return: bool,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Number(f64),
    Str(String),
    List(Vec<Node>),
    Access(String),
    Assign {
        name: String,
        value: Box<Node>,
    },
    Index {
        target: Box<Node>,
        index: Box<Node>,
    },
    IndexAssign {
        target: Box<Node>,
        index: Box<Node>,
        value: Box<Node>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Node>,
    },
    Binary {
        lhs: Box<Node>,
        op: BinOp,
        rhs: Box<Node>,
    },
    Logical {
        lhs: Box<Node>,
        op: LogicalOp,
        rhs: Box<Node>,
    },
    If {
        cases: Vec<(Node, Node)>,
        else_case: Option<Box<Node>>,
    },
    For {
        var: String,
        start: Box<Node>,
        stop: Box<Node>,
        step: Option<Box<Node>>,
        body: Box<Node>,
    },
    ForIn {
        var: String,
        iterable: Box<Node>,
        body: Box<Node>,
    },
    While {
        condition: Box<Node>,
        body: Box<Node>,
    },
    FuncDef(Rc<FuncDecl>),
    Call {
        callee: Box<Node>,
        args: Vec<Node>,
    },
    Return(Option<Box<Node>>),
    Continue,
    Break,
    Block(Vec<Node>),
}

fn join(nodes: &[Node]) -> String {
    nodes
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders the tree as an S-expression, mostly useful for tests and logs
impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            NodeKind::Number(n) => write!(f, "{n}"),
            NodeKind::Str(s) => write!(f, "{s:?}"),
            NodeKind::List(items) => write!(f, "[{}]", join(items)),
            NodeKind::Access(name) => f.write_str(name),
            NodeKind::Assign { name, value } => write!(f, "(= {name} {value})"),
            NodeKind::Index { target, index } => write!(f, "(index {target} {index})"),
            NodeKind::IndexAssign {
                target,
                index,
                value,
            } => write!(f, "(= (index {target} {index}) {value})"),
            NodeKind::Unary { op, expr } => write!(f, "({op} {expr})"),
            NodeKind::Binary { lhs, op, rhs } => write!(f, "({op} {lhs} {rhs})"),
            NodeKind::Logical { lhs, op, rhs } => write!(f, "({op} {lhs} {rhs})"),
            NodeKind::If { cases, else_case } => {
                f.write_str("(if")?;
                for (condition, body) in cases {
                    write!(f, " {condition} {body}")?;
                }
                if let Some(body) = else_case {
                    write!(f, " else {body}")?;
                }
                f.write_str(")")
            }
            NodeKind::For {
                var,
                start,
                stop,
                step,
                body,
            } => match step {
                Some(step) => write!(f, "(for {var} {start} {stop} {step} {body})"),
                None => write!(f, "(for {var} {start} {stop} {body})"),
            },
            NodeKind::ForIn {
                var,
                iterable,
                body,
            } => write!(f, "(for {var} in {iterable} {body})"),
            NodeKind::While { condition, body } => write!(f, "(while {condition} {body})"),
            NodeKind::FuncDef(decl) => write!(
                f,
                "(func {}({}) {}{})",
                decl.name.as_deref().unwrap_or(""),
                decl.params.join(", "),
                if decl.auto_return { "-> " } else { "" },
                decl.body
            ),
            NodeKind::Call { callee, args } => {
                if args.is_empty() {
                    write!(f, "(call {callee})")
                } else {
                    write!(f, "(call {callee} {})", join(args))
                }
            }
            NodeKind::Return(Some(value)) => write!(f, "(return {value})"),
            NodeKind::Return(None) => f.write_str("(return)"),
            NodeKind::Continue => f.write_str("(continue)"),
            NodeKind::Break => f.write_str("(break)"),
            NodeKind::Block(items) => write!(f, "{{{}}}", join(items)),
        }
    }
}
